//! Built-in sample programs
//!
//! These are complete module builds used by the driver's `emit` command and
//! by the end-to-end tests. They double as worked examples of the builder
//! API.

use crate::builder::ModuleBuilder;
use crate::ir::{Constant, FunctionAttribute, Linkage, Module, Value};
use crate::types::TypeTable;
use sbfgen_common::IrError;

/// Syscall hash of the Solana `sol_log_` helper (0x207559bd)
pub const SOL_LOG_SYSCALL: i64 = 544561597;

/// Message logged by the hello-world program, NUL terminator included
pub const HELLO_MESSAGE: &[u8] = b"Hello World from Python!\0";

/// Build the hello-world logger program
///
/// One `entrypoint(i8*) -> i64` function that logs a fixed message through
/// the `sol_log_` syscall, reached by address, and returns 0.
pub fn hello_world() -> Result<Module, IrError> {
    let types = TypeTable::new();
    let i8 = types.integer(8)?;
    let i64 = types.integer(64)?;
    let i8_ptr = types.pointer(i8);

    let mut builder = ModuleBuilder::new("solana_program", "bpf");

    let message = builder.declare_global_constant(
        "python_message",
        Linkage::Internal,
        Constant::bytes(HELLO_MESSAGE.to_vec()),
        1,
    )?;

    let entry = builder.declare_function(
        "entrypoint",
        i64.clone(),
        vec![("input".to_string(), i8_ptr.clone())],
        Linkage::External,
        vec![FunctionAttribute::NoInline],
    )?;
    let block = builder.append_block(entry, "entry")?;
    let mut cursor = builder.position_at_end(entry, block);

    let message_ptr = cursor.bit_cast(message, i8_ptr.clone())?;
    let message_len = Value::Const(Constant::int(i64.clone(), HELLO_MESSAGE.len() as i64)?);

    let log_sig = types.function(types.void(), vec![i8_ptr, i64.clone()])?;
    cursor.foreign_call_by_address(SOL_LOG_SYSCALL, log_sig, vec![message_ptr, message_len])?;

    cursor.ret(Value::Const(Constant::int(i64, 0)?))?;

    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::Verifier;

    #[test]
    fn test_hello_world_builds_and_verifies() {
        let module = hello_world().unwrap();

        assert_eq!(module.target_triple, "bpf");
        assert_eq!(module.globals.len(), 1);
        assert_eq!(module.globals[0].ty.to_string(), "[25 x i8]");
        assert_eq!(module.functions.len(), 1);

        Verifier::new()
            .with_entry_point("entrypoint")
            .verify(&module)
            .unwrap();
    }

    #[test]
    fn test_hello_world_block_shape() {
        let module = hello_world().unwrap();
        let block = &module.functions[0].blocks[0];

        // bitcast of the message, inttoptr of the syscall hash, the call,
        // and the final return.
        assert_eq!(block.instructions.len(), 4);
        assert!(block.has_terminator());
    }
}
