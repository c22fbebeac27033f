//! Module and instruction builders
//!
//! All IR construction goes through [`ModuleBuilder`] and the per-block
//! [`BlockBuilder`] cursor it hands out. Every invariant the verifier will
//! later re-check (name uniqueness, single terminator, operand types) is
//! also enforced here, eagerly, so the caller learns about a bad request at
//! the call that introduces it rather than at verification time.

use crate::ir::{
    BasicBlock, Constant, Function, FunctionAttribute, GlobalVariable, Instruction, Linkage,
    Module, Value,
};
use crate::types::Type;
use log::{debug, trace};
use sbfgen_common::IrError;
use serde::{Deserialize, Serialize};

/// Handle to a function declared through a [`ModuleBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionId(usize);

/// Handle to a basic block appended through a [`ModuleBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockId(usize);

/// Owns one module under construction
///
/// The builder is the only mutation path; there is no ambient or shared
/// state, so independent builders can run on separate modules concurrently.
#[derive(Debug)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>, target_triple: impl Into<String>) -> Self {
        Self {
            module: Module::new(name, target_triple),
        }
    }

    /// Declare a function definition; its blocks are appended separately
    pub fn declare_function(
        &mut self,
        name: &str,
        return_type: Type,
        params: Vec<(String, Type)>,
        linkage: Linkage,
        attributes: Vec<FunctionAttribute>,
    ) -> Result<FunctionId, IrError> {
        if self.symbol_exists(name) {
            return Err(IrError::duplicate_symbol(name, "module"));
        }
        debug!("declaring function '{}'", name);

        let mut function = Function::new(name, return_type, params);
        function.linkage = linkage;
        function.attributes = attributes;
        self.module.functions.push(function);
        Ok(FunctionId(self.module.functions.len() - 1))
    }

    /// Append a new basic block to a function
    pub fn append_block(&mut self, func: FunctionId, name: &str) -> Result<BlockId, IrError> {
        let function = &mut self.module.functions[func.0];
        if function.blocks.iter().any(|b| b.name == name) {
            return Err(IrError::duplicate_symbol(
                name,
                format!("function '{}'", function.name),
            ));
        }
        function.blocks.push(BasicBlock::new(name));
        Ok(BlockId(function.blocks.len() - 1))
    }

    /// Declare a module-level constant and return the pointer-typed value
    /// that references it
    pub fn declare_global_constant(
        &mut self,
        name: &str,
        linkage: Linkage,
        initializer: Constant,
        align: u64,
    ) -> Result<Value, IrError> {
        if align == 0 || !align.is_power_of_two() {
            return Err(IrError::AlignmentInvalid {
                name: name.to_string(),
                alignment: align,
            });
        }
        if self.symbol_exists(name) {
            return Err(IrError::duplicate_symbol(name, "module"));
        }
        debug!("declaring global constant '{}'", name);

        let ty = initializer.ty.clone();
        self.module.globals.push(GlobalVariable {
            name: name.to_string(),
            ty: ty.clone(),
            linkage,
            is_constant: true,
            initializer: Some(initializer),
            align,
        });
        Ok(Value::Global {
            name: name.to_string(),
            ty: Type::Ptr(Box::new(ty)),
        })
    }

    /// Typed value for a declared parameter of `func`
    pub fn param(&self, func: FunctionId, index: usize) -> Option<Value> {
        self.module.functions[func.0].param_value(index)
    }

    /// Obtain an instruction cursor positioned at the end of `block`
    pub fn position_at_end(&mut self, func: FunctionId, block: BlockId) -> BlockBuilder<'_> {
        BlockBuilder {
            func: &mut self.module.functions[func.0],
            block: block.0,
        }
    }

    /// The module as built so far
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Consume the builder, yielding the finished module
    pub fn finish(self) -> Module {
        self.module
    }

    fn symbol_exists(&self, name: &str) -> bool {
        self.module.function(name).is_some() || self.module.global(name).is_some()
    }
}

/// Stateful cursor that appends instructions to one basic block
///
/// Each `build` method type-checks its operands, allocates the result id
/// and appends in one step. Once a terminator lands, every further append
/// fails with `BlockAlreadyTerminated`.
#[derive(Debug)]
pub struct BlockBuilder<'a> {
    func: &'a mut Function,
    block: usize,
}

impl BlockBuilder<'_> {
    /// Cast an integer value to a pointer type
    pub fn int_to_ptr(&mut self, operand: Value, target: Type) -> Result<Value, IrError> {
        self.check_open()?;
        if !operand.ty().is_integer() {
            return Err(IrError::type_mismatch(
                "inttoptr operand",
                "integer type",
                operand.ty(),
            ));
        }
        if !target.is_pointer() {
            return Err(IrError::type_mismatch(
                "inttoptr result",
                "pointer type",
                &target,
            ));
        }

        let result = self.func.fresh_value();
        self.push(Instruction::IntToPtr {
            result,
            operand,
            target: target.clone(),
        });
        Ok(Value::Inst { id: result, ty: target })
    }

    /// Reinterpret a value as another type of the same representation width
    pub fn bit_cast(&mut self, operand: Value, target: Type) -> Result<Value, IrError> {
        self.check_open()?;
        if !same_width_class(operand.ty(), &target) {
            return Err(IrError::type_mismatch(
                "bitcast",
                format!("type in the width class of {}", operand.ty()),
                &target,
            ));
        }

        let result = self.func.fresh_value();
        self.push(Instruction::BitCast {
            result,
            operand,
            target: target.clone(),
        });
        Ok(Value::Inst { id: result, ty: target })
    }

    /// Call through a function-pointer value
    ///
    /// Returns `Some` result value for non-void signatures, `None` for void.
    pub fn call(&mut self, callee: Value, args: Vec<Value>) -> Result<Option<Value>, IrError> {
        self.check_open()?;
        let (ret, params) = match callee.ty().pointee().and_then(Type::signature) {
            Some((ret, params)) => (ret.clone(), params.to_vec()),
            None => {
                return Err(IrError::type_mismatch(
                    "call target",
                    "function pointer type",
                    callee.ty(),
                ));
            }
        };
        if args.len() != params.len() {
            return Err(IrError::type_mismatch(
                "call arguments",
                format!("{} arguments", params.len()),
                format!("{} arguments", args.len()),
            ));
        }
        for (i, (arg, param)) in args.iter().zip(&params).enumerate() {
            if arg.ty() != param {
                return Err(IrError::type_mismatch(
                    format!("call argument {}", i),
                    param,
                    arg.ty(),
                ));
            }
        }

        let result = if ret.is_void() {
            None
        } else {
            Some(self.func.fresh_value())
        };
        self.push(Instruction::Call {
            result,
            callee,
            args,
            result_type: ret.clone(),
        });
        Ok(result.map(|id| Value::Inst { id, ty: ret }))
    }

    /// Invoke foreign functionality by casting a trusted numeric identifier
    /// to a function pointer and calling through it
    ///
    /// This is the one trust boundary in the builder: the address is taken
    /// as given and nothing checks that the target environment really binds
    /// `signature` at that address.
    pub fn foreign_call_by_address(
        &mut self,
        address: i64,
        signature: Type,
        args: Vec<Value>,
    ) -> Result<Option<Value>, IrError> {
        if signature.signature().is_none() {
            return Err(IrError::type_mismatch(
                "foreign call signature",
                "function type",
                &signature,
            ));
        }
        debug!(
            "foreign call by address {:#x} with signature {}",
            address, signature
        );

        let addr = Value::Const(Constant::int(Type::Int { bits: 64 }, address)?);
        let callee = self.int_to_ptr(addr, Type::Ptr(Box::new(signature)))?;
        self.call(callee, args)
    }

    /// Return a value; its type must equal the function's return type
    pub fn ret(&mut self, value: Value) -> Result<(), IrError> {
        self.check_open()?;
        if value.ty() != &self.func.return_type {
            return Err(IrError::type_mismatch(
                "ret",
                &self.func.return_type,
                value.ty(),
            ));
        }
        self.push(Instruction::Ret(Some(value)));
        Ok(())
    }

    /// Return from a void function
    pub fn ret_void(&mut self) -> Result<(), IrError> {
        self.check_open()?;
        if !self.func.return_type.is_void() {
            return Err(IrError::type_mismatch(
                "ret void",
                &self.func.return_type,
                "void",
            ));
        }
        self.push(Instruction::Ret(None));
        Ok(())
    }

    /// Unconditional branch to a block label
    pub fn br(&mut self, target: &str) -> Result<(), IrError> {
        self.check_open()?;
        self.push(Instruction::Br {
            target: target.to_string(),
        });
        Ok(())
    }

    /// Conditional branch; the condition must be i1
    pub fn cond_br(
        &mut self,
        cond: Value,
        then_label: &str,
        else_label: &str,
    ) -> Result<(), IrError> {
        self.check_open()?;
        if cond.ty() != &(Type::Int { bits: 1 }) {
            return Err(IrError::type_mismatch("br condition", "i1", cond.ty()));
        }
        self.push(Instruction::CondBr {
            cond,
            then_label: then_label.to_string(),
            else_label: else_label.to_string(),
        });
        Ok(())
    }

    fn check_open(&self) -> Result<(), IrError> {
        let block = &self.func.blocks[self.block];
        if block.has_terminator() {
            return Err(IrError::BlockAlreadyTerminated {
                block: block.name.clone(),
            });
        }
        Ok(())
    }

    fn push(&mut self, inst: Instruction) {
        let block = &mut self.func.blocks[self.block];
        trace!("block '{}': {}", block.name, inst);
        block.instructions.push(inst);
    }
}

/// Two types may be bitcast between each other only when they occupy the
/// same representation width class
pub(crate) fn same_width_class(from: &Type, to: &Type) -> bool {
    match (from, to) {
        (Type::Ptr(_), Type::Ptr(_)) => true,
        (Type::Int { bits: a }, Type::Int { bits: b }) => a == b,
        _ => false,
    }
}
