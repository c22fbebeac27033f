//! sBPF IR Generator Driver
//!
//! Command-line front for the IR core: builds one of the built-in sample
//! programs, verifies it against the loader's entry-point convention, and
//! writes or prints the rendered LLVM IR text.

use clap::{Parser, Subcommand};
use log::info;
use sbfgen_ir::{emit_module, samples, Verifier};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sbfgen")]
#[command(about = "sBPF IR Generator")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a built-in program, verify it, and emit LLVM IR text
    Emit {
        /// Which built-in program to build
        #[arg(short, long, default_value = "hello")]
        program: String,

        /// Output file for the rendered IR
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the entry-point convention check
        #[arg(long)]
        no_entry_check: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Emit {
            program,
            output,
            no_entry_check,
        } => {
            if let Err(e) = run_emit(&program, output.as_deref(), no_entry_check) {
                eprintln!("Error emitting IR: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_emit(
    program: &str,
    output_path: Option<&Path>,
    no_entry_check: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("building program '{}'", program);
    let module = match program {
        "hello" => samples::hello_world()?,
        _ => {
            return Err(format!("Unknown program: {}", program).into());
        }
    };

    let mut verifier = Verifier::new();
    if !no_entry_check {
        verifier = verifier.with_entry_point("entrypoint");
    }
    verifier.verify(&module)?;
    info!("module '{}' verified", module.name);

    let text = emit_module(&module)?;
    match output_path {
        Some(path) => {
            fs::write(path, &text)?;
            println!("IR written to: {}", path.display());
        }
        None => print!("{}", text),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_emission() {
        // Full build-verify-emit pipeline without touching the filesystem.
        let result = run_emit("hello", None, false);
        assert!(result.is_ok());
    }

    #[test]
    fn test_unknown_program_is_rejected() {
        let result = run_emit("missing", None, false);
        assert!(result.is_err());
    }
}
