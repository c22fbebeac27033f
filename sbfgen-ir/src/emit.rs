//! Textual serialization of verified modules
//!
//! Renders a module to the LLVM assembly dialect, the fixed external format
//! the downstream toolchain parses. The projection is purely structural:
//! globals in declaration order, functions in declaration order, blocks and
//! instructions in append order, so the same module always renders to
//! byte-identical text.

use crate::ir::{ConstPayload, Constant, Function, GlobalVariable, Linkage, Module};
use crate::types::Type;
use sbfgen_common::IrError;

/// Render a module to LLVM assembly text
pub fn emit_module(module: &Module) -> Result<String, IrError> {
    let mut out = String::new();

    out.push_str(&format!("; ModuleID = '{}'\n", module.name));
    out.push_str(&format!("target triple = \"{}\"\n", module.target_triple));

    for global in &module.globals {
        out.push('\n');
        out.push_str(&emit_global(global)?);
        out.push('\n');
    }

    for function in &module.functions {
        out.push('\n');
        emit_function(function, &mut out);
    }

    Ok(out)
}

fn emit_global(global: &GlobalVariable) -> Result<String, IrError> {
    let _kind = if global.is_constant { "constant" } else { "global" };
    let mut line = format!("@{} = ", global.name);

    match global.linkage {
        Linkage::Internal | Linkage::Private => {
            line.push_str(&format!("{} ", global.linkage));
        }
        // External is the dialect's default and stays implicit on
        // definitions; only initializer-less declarations spell it out.
        Linkage::External => {
            if global.initializer.is_none() {
                line.push_str("external ");
            }
        }
    }

    match &global.initializer {
        Some(init) => line.push_str(&typed_constant(init)?),
        None => line.push_str(&global.ty.to_string()),
    }
    line.push_str(&format!(", align {}", global.align));
    Ok(line)
}

/// Render a constant with its leading type, checking that payload and type
/// agree; disagreement is an internal invariant violation surfaced as
/// `SerializationFailed`
fn typed_constant(constant: &Constant) -> Result<String, IrError> {
    match (&constant.payload, &constant.ty) {
        (ConstPayload::Int(_), Type::Int { .. }) => {}
        (ConstPayload::Bytes(data), Type::Array { len, elem })
            if **elem == (Type::Int { bits: 8 }) && *len == data.len() as u64 => {}
        (payload, ty) => {
            return Err(IrError::serialization(format!(
                "constant payload {:?} does not fit type {}",
                payload, ty
            )));
        }
    }
    Ok(format!("{} {}", constant.ty, constant))
}

fn emit_function(function: &Function, out: &mut String) {
    out.push_str("define ");
    if function.linkage != Linkage::External {
        out.push_str(&format!("{} ", function.linkage));
    }
    out.push_str(&format!("{} @{}(", function.return_type, function.name));
    for (i, (name, ty)) in function.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{} %{}", ty, name));
    }
    out.push(')');
    for attr in &function.attributes {
        out.push_str(&format!(" {}", attr));
    }
    out.push_str(" {\n");

    for block in &function.blocks {
        out.push_str(&format!("{}:\n", block.name));
        for inst in &block.instructions {
            out.push_str(&format!("  {}\n", inst));
        }
    }

    out.push_str("}\n");
}
