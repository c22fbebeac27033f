//! Module verifier
//!
//! A read-only structural and type check over a completed module. The
//! builder already enforces these invariants at append time; the verifier
//! re-checks them independently so a module assembled by any other means
//! (deserialized, hand-built, or mutated directly) gets the same guarantees
//! before emission.
//!
//! Checks run in a fixed category order and stop at the first failure:
//! (a) block structure, (b) instruction operand types, (c) named symbol
//! resolution, (d) the entry-point convention when one is requested. Given
//! the same module, the result is always the same.

use crate::builder::same_width_class;
use crate::ir::{Function, Instruction, Module, Value};
use crate::types::Type;
use log::debug;
use sbfgen_common::{Diagnostic, IrError};

/// Structural verifier for completed modules
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    entry_point: Option<String>,
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Additionally require `name` to exist and match the platform entry
    /// convention: exactly one byte-pointer parameter, integer return type
    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = Some(name.into());
        self
    }

    pub fn verify(&self, module: &Module) -> Result<(), IrError> {
        debug!("verifying module '{}'", module.name);
        self.check_block_structure(module)?;
        self.check_instruction_types(module)?;
        self.check_symbol_references(module)?;
        self.check_entry_point(module)?;
        debug!("module '{}' verified", module.name);
        Ok(())
    }

    /// (a) every function has blocks, every block ends in its only terminator
    fn check_block_structure(&self, module: &Module) -> Result<(), IrError> {
        for function in &module.functions {
            if function.blocks.is_empty() {
                return fail(Diagnostic::new("function has no basic blocks")
                    .in_function(&function.name));
            }
            for block in &function.blocks {
                let last = block.instructions.len().wrapping_sub(1);
                for (i, inst) in block.instructions.iter().enumerate() {
                    if inst.is_terminator() && i != last {
                        return fail(Diagnostic::new(
                            "terminator is not the last instruction in its block",
                        )
                        .in_function(&function.name)
                        .in_block(&block.name)
                        .at_instruction(i));
                    }
                }
                if !block.has_terminator() {
                    return fail(Diagnostic::new("block has no terminator")
                        .in_function(&function.name)
                        .in_block(&block.name));
                }
            }
        }
        Ok(())
    }

    /// (b) every instruction's operand and result types agree with its kind
    fn check_instruction_types(&self, module: &Module) -> Result<(), IrError> {
        for function in &module.functions {
            for block in &function.blocks {
                for (i, inst) in block.instructions.iter().enumerate() {
                    if let Err(reason) = check_instruction(function, inst) {
                        return fail(Diagnostic::new(reason)
                            .in_function(&function.name)
                            .in_block(&block.name)
                            .at_instruction(i));
                    }
                }
            }
        }
        Ok(())
    }

    /// (c) every named reference resolves within the module
    ///
    /// Indirect call targets reached through casted pointers are exempt by
    /// design; only `@name` references and branch labels are resolved.
    fn check_symbol_references(&self, module: &Module) -> Result<(), IrError> {
        for function in &module.functions {
            for block in &function.blocks {
                for (i, inst) in block.instructions.iter().enumerate() {
                    let at = |reason: String| {
                        Diagnostic::new(reason)
                            .in_function(&function.name)
                            .in_block(&block.name)
                            .at_instruction(i)
                    };

                    for operand in inst.operands() {
                        if let Value::Global { name, .. } = operand {
                            if module.global(name).is_none() && module.function(name).is_none() {
                                return fail(at(format!(
                                    "reference to undefined symbol '@{}'",
                                    name
                                )));
                            }
                        }
                    }

                    let labels: Vec<&String> = match inst {
                        Instruction::Br { target } => vec![target],
                        Instruction::CondBr {
                            then_label,
                            else_label,
                            ..
                        } => vec![then_label, else_label],
                        _ => Vec::new(),
                    };
                    for label in labels {
                        if function.block(label).is_none() {
                            return fail(at(format!(
                                "branch to undefined block '%{}'",
                                label
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// (d) the requested entry point matches the loader's calling convention
    fn check_entry_point(&self, module: &Module) -> Result<(), IrError> {
        let Some(name) = &self.entry_point else {
            return Ok(());
        };
        let Some(function) = module.function(name) else {
            return fail(Diagnostic::new(format!(
                "entry point '{}' is not defined in the module",
                name
            )));
        };

        let byte_ptr = Type::Ptr(Box::new(Type::Int { bits: 8 }));
        if function.params.len() != 1 || function.params[0].1 != byte_ptr {
            return fail(Diagnostic::new(
                "entry point must take exactly one i8* parameter",
            )
            .in_function(name));
        }
        if !function.return_type.is_integer() {
            return fail(Diagnostic::new(
                "entry point must return an integer type",
            )
            .in_function(name));
        }
        Ok(())
    }
}

/// Verify with no entry-point convention requested
pub fn verify(module: &Module) -> Result<(), IrError> {
    Verifier::new().verify(module)
}

fn fail(diagnostic: Diagnostic) -> Result<(), IrError> {
    Err(IrError::VerificationFailed(diagnostic))
}

fn check_instruction(function: &Function, inst: &Instruction) -> Result<(), String> {
    match inst {
        Instruction::IntToPtr { operand, target, .. } => {
            if !operand.ty().is_integer() {
                return Err(format!(
                    "inttoptr operand has non-integer type {}",
                    operand.ty()
                ));
            }
            if !target.is_pointer() {
                return Err(format!("inttoptr target {} is not a pointer type", target));
            }
        }
        Instruction::BitCast { operand, target, .. } => {
            if !same_width_class(operand.ty(), target) {
                return Err(format!(
                    "bitcast between incompatible width classes {} and {}",
                    operand.ty(),
                    target
                ));
            }
        }
        Instruction::Call {
            result,
            callee,
            args,
            result_type,
        } => {
            let Some((ret, params)) = callee.ty().pointee().and_then(Type::signature) else {
                return Err(format!(
                    "call target has non-function-pointer type {}",
                    callee.ty()
                ));
            };
            if ret != result_type {
                return Err(format!(
                    "call result type {} disagrees with callee return type {}",
                    result_type, ret
                ));
            }
            if result.is_some() == ret.is_void() {
                return Err("call result presence disagrees with return type".to_string());
            }
            if args.len() != params.len() {
                return Err(format!(
                    "call passes {} arguments, callee expects {}",
                    args.len(),
                    params.len()
                ));
            }
            for (i, (arg, param)) in args.iter().zip(params).enumerate() {
                if arg.ty() != param {
                    return Err(format!(
                        "call argument {} has type {}, callee expects {}",
                        i,
                        arg.ty(),
                        param
                    ));
                }
            }
        }
        Instruction::Ret(Some(value)) => {
            if value.ty() != &function.return_type {
                return Err(format!(
                    "returned type {} does not match function return type {}",
                    value.ty(),
                    function.return_type
                ));
            }
        }
        Instruction::Ret(None) => {
            if !function.return_type.is_void() {
                return Err(format!(
                    "void return from function returning {}",
                    function.return_type
                ));
            }
        }
        Instruction::Br { .. } => {}
        Instruction::CondBr { cond, .. } => {
            if cond.ty() != &(Type::Int { bits: 1 }) {
                return Err(format!("branch condition has type {}, expected i1", cond.ty()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModuleBuilder;
    use crate::ir::{Constant, FunctionAttribute, Linkage};
    use crate::types::TypeTable;

    fn i64_const(value: i64) -> Value {
        Value::Const(Constant::int(Type::Int { bits: 64 }, value).unwrap())
    }

    fn entry_module(terminate: bool) -> Module {
        let types = TypeTable::new();
        let mut builder = ModuleBuilder::new("test", "bpf");
        let func = builder
            .declare_function(
                "entrypoint",
                types.integer(64).unwrap(),
                vec![("input".to_string(), types.pointer(types.integer(8).unwrap()))],
                Linkage::External,
                vec![FunctionAttribute::NoInline],
            )
            .unwrap();
        let block = builder.append_block(func, "entry").unwrap();
        let mut cursor = builder.position_at_end(func, block);

        let sig = types
            .function(
                types.void(),
                vec![types.pointer(types.integer(8).unwrap()), types.integer(64).unwrap()],
            )
            .unwrap();
        let input = Value::Param {
            name: "input".to_string(),
            ty: types.pointer(types.integer(8).unwrap()),
        };
        cursor
            .foreign_call_by_address(544561597, sig, vec![input, i64_const(25)])
            .unwrap();
        if terminate {
            cursor.ret(i64_const(0)).unwrap();
        }
        builder.finish()
    }

    #[test]
    fn test_well_formed_module_passes() {
        let module = entry_module(true);
        assert!(verify(&module).is_ok());
        assert!(Verifier::new()
            .with_entry_point("entrypoint")
            .verify(&module)
            .is_ok());
    }

    #[test]
    fn test_missing_terminator_names_block() {
        // Sole block holds only the call, no return.
        let module = entry_module(false);
        let err = verify(&module).unwrap_err();
        match err {
            IrError::VerificationFailed(diag) => {
                assert_eq!(diag.function.as_deref(), Some("entrypoint"));
                assert_eq!(diag.block.as_deref(), Some("entry"));
                assert_eq!(diag.reason, "block has no terminator");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_verification_is_deterministic() {
        let module = entry_module(false);
        assert_eq!(verify(&module), verify(&module));
    }

    #[test]
    fn test_function_without_blocks() {
        let mut module = entry_module(true);
        module
            .functions
            .push(Function::new("empty", Type::Void, vec![]));

        let err = verify(&module).unwrap_err();
        assert!(matches!(
            err,
            IrError::VerificationFailed(ref diag) if diag.function.as_deref() == Some("empty")
        ));
    }

    #[test]
    fn test_terminator_must_be_last() {
        let mut module = entry_module(true);
        // Slip an extra instruction in behind the builder's back.
        module.functions[0].blocks[0]
            .instructions
            .push(Instruction::Ret(Some(i64_const(1))));

        let err = verify(&module).unwrap_err();
        match err {
            IrError::VerificationFailed(diag) => {
                assert_eq!(diag.instruction, Some(2));
                assert_eq!(
                    diag.reason,
                    "terminator is not the last instruction in its block"
                );
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_type_checks_rerun_independently_of_builder() {
        let mut module = entry_module(true);
        // Corrupt the return to carry the wrong type.
        let block = &mut module.functions[0].blocks[0];
        *block.instructions.last_mut().unwrap() = Instruction::Ret(Some(Value::Const(
            Constant::int(Type::Int { bits: 32 }, 0).unwrap(),
        )));

        let err = verify(&module).unwrap_err();
        assert!(matches!(
            err,
            IrError::VerificationFailed(ref diag)
                if diag.reason.contains("does not match function return type")
        ));
    }

    #[test]
    fn test_undefined_global_reference() {
        let mut module = entry_module(true);
        let block = &mut module.functions[0].blocks[0];
        block.instructions.insert(
            0,
            Instruction::BitCast {
                result: 99,
                operand: Value::Global {
                    name: "missing".to_string(),
                    ty: Type::Ptr(Box::new(Type::Int { bits: 8 })),
                },
                target: Type::Ptr(Box::new(Type::Int { bits: 8 })),
            },
        );

        let err = verify(&module).unwrap_err();
        assert!(matches!(
            err,
            IrError::VerificationFailed(ref diag)
                if diag.reason == "reference to undefined symbol '@missing'"
        ));
    }

    #[test]
    fn test_branch_to_undefined_block() {
        let types = TypeTable::new();
        let mut builder = ModuleBuilder::new("test", "bpf");
        let func = builder
            .declare_function("f", types.void(), vec![], Linkage::Internal, vec![])
            .unwrap();
        let block = builder.append_block(func, "entry").unwrap();
        builder.position_at_end(func, block).br("nowhere").unwrap();
        let module = builder.finish();

        let err = verify(&module).unwrap_err();
        assert!(matches!(
            err,
            IrError::VerificationFailed(ref diag)
                if diag.reason == "branch to undefined block '%nowhere'"
        ));
    }

    #[test]
    fn test_entry_point_convention() {
        let types = TypeTable::new();

        // Entry point absent entirely.
        let mut builder = ModuleBuilder::new("test", "bpf");
        let func = builder
            .declare_function("other", types.void(), vec![], Linkage::Internal, vec![])
            .unwrap();
        let block = builder.append_block(func, "entry").unwrap();
        builder.position_at_end(func, block).ret_void().unwrap();
        let module = builder.finish();

        assert!(verify(&module).is_ok());
        assert!(Verifier::new()
            .with_entry_point("entrypoint")
            .verify(&module)
            .is_err());

        // Wrong parameter shape.
        let mut builder = ModuleBuilder::new("test", "bpf");
        let func = builder
            .declare_function(
                "entrypoint",
                types.integer(64).unwrap(),
                vec![],
                Linkage::External,
                vec![],
            )
            .unwrap();
        let block = builder.append_block(func, "entry").unwrap();
        builder
            .position_at_end(func, block)
            .ret(i64_const(0))
            .unwrap();
        let module = builder.finish();

        let err = Verifier::new()
            .with_entry_point("entrypoint")
            .verify(&module)
            .unwrap_err();
        assert!(matches!(
            err,
            IrError::VerificationFailed(ref diag)
                if diag.reason == "entry point must take exactly one i8* parameter"
        ));
    }
}
