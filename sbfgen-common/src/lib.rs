//! sBPF IR Generator - Common Types and Utilities
//!
//! This crate contains the shared error and diagnostic types used across
//! all components of the sbfgen IR toolchain.

pub mod error;

pub use error::{Diagnostic, IrError};
