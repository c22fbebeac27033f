//! sBPF IR Generator - Intermediate Representation
//!
//! This crate is the IR core: a type table, a builder API for assembling
//! typed modules one instruction at a time, a verifier that re-checks the
//! structural and type invariants over a finished module, and a
//! deterministic LLVM-text emitter.
//!
//! Construction is strictly ordered and single-threaded per module; verify
//! and emit are read-only passes.

pub mod builder;
pub mod emit;
pub mod ir;
pub mod samples;
pub mod types;
pub mod verify;

pub use builder::{BlockBuilder, BlockId, FunctionId, ModuleBuilder};
pub use emit::emit_module;
pub use ir::{
    BasicBlock, ConstPayload, Constant, Function, FunctionAttribute, GlobalVariable, Instruction,
    Linkage, Module, Value, ValueId,
};
pub use sbfgen_common::{Diagnostic, IrError};
pub use types::{Type, TypeTable};
pub use verify::{verify, Verifier};
