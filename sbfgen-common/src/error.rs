//! Error handling for the sbfgen IR toolchain
//!
//! This module defines the error type shared by the builder, verifier and
//! emitter, along with the diagnostic payload attached to verification
//! failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type covering every phase of IR construction and emission
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrError {
    #[error("invalid type: {message}")]
    InvalidTypeSpec { message: String },

    #[error("duplicate symbol '{name}' in {scope}")]
    DuplicateSymbol { name: String, scope: String },

    #[error("basic block '{block}' is already terminated")]
    BlockAlreadyTerminated { block: String },

    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("invalid alignment {alignment} for '{name}': must be a power of two")]
    AlignmentInvalid { name: String, alignment: u64 },

    #[error("verification failed: {0}")]
    VerificationFailed(Diagnostic),

    #[error("serialization failed: {message}")]
    SerializationFailed { message: String },

    #[error("IO error: {message}")]
    IoError { message: String },
}

impl IrError {
    /// Create an `InvalidTypeSpec` error
    pub fn invalid_type(message: impl Into<String>) -> Self {
        IrError::InvalidTypeSpec {
            message: message.into(),
        }
    }

    /// Create a `DuplicateSymbol` error
    pub fn duplicate_symbol(name: impl Into<String>, scope: impl Into<String>) -> Self {
        IrError::DuplicateSymbol {
            name: name.into(),
            scope: scope.into(),
        }
    }

    /// Create a `TypeMismatch` error
    pub fn type_mismatch(
        context: impl Into<String>,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        IrError::TypeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Create a `SerializationFailed` error
    pub fn serialization(message: impl Into<String>) -> Self {
        IrError::SerializationFailed {
            message: message.into(),
        }
    }
}

/// Location and reason for a verification failure
///
/// Identifies the offending function, block and instruction as precisely as
/// the failing check allows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub function: Option<String>,
    pub block: Option<String>,
    pub instruction: Option<usize>,
    pub reason: String,
}

impl Diagnostic {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            function: None,
            block: None,
            instruction: None,
            reason: reason.into(),
        }
    }

    pub fn in_function(mut self, name: impl Into<String>) -> Self {
        self.function = Some(name.into());
        self
    }

    pub fn in_block(mut self, name: impl Into<String>) -> Self {
        self.block = Some(name.into());
        self
    }

    pub fn at_instruction(mut self, index: usize) -> Self {
        self.instruction = Some(index);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(func) = &self.function {
            write!(f, "function '{}'", func)?;
            if let Some(block) = &self.block {
                write!(f, ", block '{}'", block)?;
            }
            if let Some(idx) = self.instruction {
                write!(f, ", instruction {}", idx)?;
            }
            write!(f, ": ")?;
        }
        write!(f, "{}", self.reason)
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for IrError {
    fn from(err: std::io::Error) -> Self {
        IrError::IoError {
            message: err.to_string(),
        }
    }
}
