//! Core IR data model
//!
//! This module defines the in-memory representation of a module: values,
//! instructions, basic blocks, functions and global constants. Construction
//! goes through the builders in [`crate::builder`], which enforce the type
//! and control-flow invariants at the API boundary; the types here are the
//! passive, serializable state they mutate.

use crate::types::Type;
use sbfgen_common::IrError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SSA value identifier, unique within its function
pub type ValueId = u32;

/// Compile-time constant payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstPayload {
    /// Integer literal
    Int(i64),

    /// Raw byte-array literal (string data, including any NUL terminator)
    Bytes(Vec<u8>),
}

/// Typed compile-time constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub ty: Type,
    pub payload: ConstPayload,
}

impl Constant {
    /// Integer constant of the given integer type
    pub fn int(ty: Type, value: i64) -> Result<Self, IrError> {
        if !ty.is_integer() {
            return Err(IrError::type_mismatch("integer constant", "integer type", &ty));
        }
        Ok(Self {
            ty,
            payload: ConstPayload::Int(value),
        })
    }

    /// Byte-array constant of type [len x i8]
    pub fn bytes(data: Vec<u8>) -> Self {
        Self {
            ty: Type::Array {
                len: data.len() as u64,
                elem: Box::new(Type::Int { bits: 8 }),
            },
            payload: ConstPayload::Bytes(data),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            ConstPayload::Int(value) => write!(f, "{}", value),
            ConstPayload::Bytes(data) => {
                write!(f, "c\"")?;
                for &byte in data {
                    // Printable ASCII passes through, except the two
                    // characters the c"..." syntax reserves.
                    if (0x20..0x7f).contains(&byte) && byte != b'"' && byte != b'\\' {
                        write!(f, "{}", byte as char)?;
                    } else {
                        write!(f, "\\{:02X}", byte)?;
                    }
                }
                write!(f, "\"")
            }
        }
    }
}

/// IR value - an operand in IR instructions
///
/// Every value carries exactly one type; consuming instructions check it
/// against their operand requirements when the value is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Compile-time constant
    Const(Constant),

    /// Result of a previously appended instruction
    Inst { id: ValueId, ty: Type },

    /// Named reference to a module-level global (pointer-typed)
    Global { name: String, ty: Type },

    /// Function parameter
    Param { name: String, ty: Type },
}

impl Value {
    /// The type of this value
    pub fn ty(&self) -> &Type {
        match self {
            Value::Const(c) => &c.ty,
            Value::Inst { ty, .. } => ty,
            Value::Global { ty, .. } => ty,
            Value::Param { ty, .. } => ty,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Const(c) => write!(f, "{}", c),
            Value::Inst { id, .. } => write!(f, "%{}", id),
            Value::Global { name, .. } => write!(f, "@{}", name),
            Value::Param { name, .. } => write!(f, "%{}", name),
        }
    }
}

/// IR instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// Cast an integer value to a pointer: result = inttoptr value to target
    IntToPtr {
        result: ValueId,
        operand: Value,
        target: Type,
    },

    /// Reinterpret a value at an equal representation width:
    /// result = bitcast value to target
    BitCast {
        result: ValueId,
        operand: Value,
        target: Type,
    },

    /// Call through a function value: result = call callee(args...)
    Call {
        result: Option<ValueId>,
        callee: Value,
        args: Vec<Value>,
        result_type: Type,
    },

    /// Return: ret value or ret void
    Ret(Option<Value>),

    /// Unconditional branch: br label
    Br { target: String },

    /// Conditional branch: br cond, then_label, else_label
    CondBr {
        cond: Value,
        then_label: String,
        else_label: String,
    },
}

impl Instruction {
    /// Check if this instruction ends a basic block
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Ret(_) | Instruction::Br { .. } | Instruction::CondBr { .. }
        )
    }

    /// All value operands of this instruction, callee included
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Instruction::IntToPtr { operand, .. } | Instruction::BitCast { operand, .. } => {
                vec![operand]
            }
            Instruction::Call { callee, args, .. } => {
                std::iter::once(callee).chain(args.iter()).collect()
            }
            Instruction::Ret(Some(value)) => vec![value],
            Instruction::Ret(None) | Instruction::Br { .. } => Vec::new(),
            Instruction::CondBr { cond, .. } => vec![cond],
        }
    }

    /// The SSA id this instruction defines, if any
    pub fn result(&self) -> Option<ValueId> {
        match self {
            Instruction::IntToPtr { result, .. } | Instruction::BitCast { result, .. } => {
                Some(*result)
            }
            Instruction::Call { result, .. } => *result,
            Instruction::Ret(_) | Instruction::Br { .. } | Instruction::CondBr { .. } => None,
        }
    }
}

/// Render a value with its type, as LLVM operand syntax requires
fn typed(value: &Value) -> String {
    format!("{} {}", value.ty(), value)
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::IntToPtr {
                result,
                operand,
                target,
            } => {
                write!(f, "%{} = inttoptr {} to {}", result, typed(operand), target)
            }
            Instruction::BitCast {
                result,
                operand,
                target,
            } => {
                write!(f, "%{} = bitcast {} to {}", result, typed(operand), target)
            }
            Instruction::Call {
                result,
                callee,
                args,
                result_type,
            } => {
                if let Some(result) = result {
                    write!(f, "%{} = ", result)?;
                }
                write!(f, "call {} {}(", result_type, callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", typed(arg))?;
                }
                write!(f, ")")
            }
            Instruction::Ret(Some(value)) => write!(f, "ret {}", typed(value)),
            Instruction::Ret(None) => write!(f, "ret void"),
            Instruction::Br { target } => write!(f, "br label %{}", target),
            Instruction::CondBr {
                cond,
                then_label,
                else_label,
            } => {
                write!(
                    f,
                    "br {}, label %{}, label %{}",
                    typed(cond),
                    then_label,
                    else_label
                )
            }
        }
    }
}

/// Basic block - a named straight-line instruction sequence ending in one
/// terminator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub name: String,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn has_terminator(&self) -> bool {
        self.instructions
            .last()
            .is_some_and(Instruction::is_terminator)
    }
}

/// Linkage classification for module-level symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    /// Visible to the loading environment
    External,
    /// Module-private
    Internal,
    /// Not visible outside this module, may be renamed freely
    Private,
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Linkage::External => write!(f, "external"),
            Linkage::Internal => write!(f, "internal"),
            Linkage::Private => write!(f, "private"),
        }
    }
}

/// Function attributes recognised by the target loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionAttribute {
    NoInline,
}

impl fmt::Display for FunctionAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionAttribute::NoInline => write!(f, "noinline"),
        }
    }
}

/// Function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<(String, Type)>,
    pub linkage: Linkage,
    pub attributes: Vec<FunctionAttribute>,
    pub blocks: Vec<BasicBlock>,

    /// Next unassigned SSA id within this function
    pub next_value: ValueId,
}

impl Function {
    pub fn new(name: impl Into<String>, return_type: Type, params: Vec<(String, Type)>) -> Self {
        Self {
            name: name.into(),
            return_type,
            params,
            linkage: Linkage::External,
            attributes: Vec::new(),
            blocks: Vec::new(),
            next_value: 0,
        }
    }

    /// The function's signature as a `Type::Function`
    pub fn signature(&self) -> Type {
        Type::Function {
            ret: Box::new(self.return_type.clone()),
            params: self.params.iter().map(|(_, ty)| ty.clone()).collect(),
        }
    }

    /// Typed value referencing the parameter at `index`
    pub fn param_value(&self, index: usize) -> Option<Value> {
        self.params.get(index).map(|(name, ty)| Value::Param {
            name: name.clone(),
            ty: ty.clone(),
        })
    }

    /// Allocate a fresh SSA id
    pub fn fresh_value(&mut self) -> ValueId {
        let id = self.next_value;
        self.next_value += 1;
        id
    }

    pub fn block(&self, name: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.name == name)
    }
}

/// Module-level global variable or constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,
    pub ty: Type,
    pub linkage: Linkage,
    pub is_constant: bool,
    pub initializer: Option<Constant>,
    pub align: u64,
}

/// IR module - one complete translation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub target_triple: String,
    pub globals: Vec<GlobalVariable>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>, target_triple: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_triple: target_triple.into(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.name == name)
    }
}
