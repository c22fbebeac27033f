//! IR type system and type table
//!
//! Types are plain values with structural equality: two types built from
//! the same constructor with the same arguments are interchangeable
//! everywhere. The [`TypeTable`] provides the canonical constructors and
//! rejects malformed requests eagerly.

use sbfgen_common::IrError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// IR type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Void type (function returns only, never a value type)
    Void,

    /// Integer type with explicit bit width
    Int { bits: u32 },

    /// Pointer type
    Ptr(Box<Type>),

    /// Array type [len x element]
    Array { len: u64, elem: Box<Type> },

    /// Function signature type
    Function { ret: Box<Type>, params: Vec<Type> },
}

impl Type {
    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int { .. })
    }

    /// Check if this is a pointer type
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Ptr(_))
    }

    /// Check if this is the void type
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Bit width for integer types
    pub fn bits(&self) -> Option<u32> {
        match self {
            Type::Int { bits } => Some(*bits),
            _ => None,
        }
    }

    /// Pointee type for pointers
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Ptr(target) => Some(target),
            _ => None,
        }
    }

    /// Return and parameter types for function types
    pub fn signature(&self) -> Option<(&Type, &[Type])> {
        match self {
            Type::Function { ret, params } => Some((ret, params)),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int { bits } => write!(f, "i{}", bits),
            Type::Ptr(target) => write!(f, "{}*", target),
            Type::Array { len, elem } => write!(f, "[{} x {}]", len, elem),
            Type::Function { ret, params } => {
                write!(f, "{} (", ret)?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Canonical registry of type constructors
///
/// All constructors are pure and idempotent. A table instance carries no
/// state; it exists so callers thread one explicit type source through a
/// build instead of scattering ad-hoc enum literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeTable;

impl TypeTable {
    pub fn new() -> Self {
        TypeTable
    }

    /// Void type
    pub fn void(&self) -> Type {
        Type::Void
    }

    /// Integer type of the given bit width; width must be positive
    pub fn integer(&self, bits: u32) -> Result<Type, IrError> {
        if bits == 0 {
            return Err(IrError::invalid_type("integer width must be positive"));
        }
        Ok(Type::Int { bits })
    }

    /// Pointer to the given pointee type
    pub fn pointer(&self, pointee: Type) -> Type {
        Type::Ptr(Box::new(pointee))
    }

    /// Array of `len` elements; length must be non-negative
    pub fn array(&self, elem: Type, len: i64) -> Result<Type, IrError> {
        if len < 0 {
            return Err(IrError::invalid_type(format!(
                "array length must be non-negative, got {}",
                len
            )));
        }
        if elem.is_void() {
            return Err(IrError::invalid_type("array element type cannot be void"));
        }
        Ok(Type::Array {
            len: len as u64,
            elem: Box::new(elem),
        })
    }

    /// Function signature type; parameters cannot be void
    pub fn function(&self, ret: Type, params: Vec<Type>) -> Result<Type, IrError> {
        if params.iter().any(Type::is_void) {
            return Err(IrError::invalid_type(
                "function parameter type cannot be void",
            ));
        }
        Ok(Type::Function {
            ret: Box::new(ret),
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let types = TypeTable::new();

        let a = types.integer(64).unwrap();
        let b = types.integer(64).unwrap();
        assert_eq!(a, b);

        let p1 = types.pointer(types.integer(8).unwrap());
        let p2 = types.pointer(types.integer(8).unwrap());
        assert_eq!(p1, p2);

        let f1 = types
            .function(types.void(), vec![p1.clone(), a.clone()])
            .unwrap();
        let f2 = types.function(types.void(), vec![p2, b]).unwrap();
        assert_eq!(f1, f2);

        assert_ne!(types.integer(32).unwrap(), types.integer(64).unwrap());
    }

    #[test]
    fn test_invalid_type_specs() {
        let types = TypeTable::new();

        assert!(matches!(
            types.integer(0),
            Err(IrError::InvalidTypeSpec { .. })
        ));
        assert!(matches!(
            types.array(Type::Int { bits: 8 }, -1),
            Err(IrError::InvalidTypeSpec { .. })
        ));
        assert!(matches!(
            types.function(Type::Void, vec![Type::Void]),
            Err(IrError::InvalidTypeSpec { .. })
        ));
    }

    #[test]
    fn test_display() {
        let types = TypeTable::new();
        let i8 = types.integer(8).unwrap();
        let i64 = types.integer(64).unwrap();
        let i8_ptr = types.pointer(i8.clone());

        assert_eq!(types.void().to_string(), "void");
        assert_eq!(i64.to_string(), "i64");
        assert_eq!(i8_ptr.to_string(), "i8*");
        assert_eq!(types.array(i8, 25).unwrap().to_string(), "[25 x i8]");

        let sig = types
            .function(types.void(), vec![i8_ptr, i64])
            .unwrap();
        assert_eq!(sig.to_string(), "void (i8*, i64)");
        assert_eq!(types.pointer(sig).to_string(), "void (i8*, i64)*");
    }

    #[test]
    fn test_accessors() {
        let types = TypeTable::new();
        let i64 = types.integer(64).unwrap();
        let ptr = types.pointer(i64.clone());

        assert!(i64.is_integer());
        assert_eq!(i64.bits(), Some(64));
        assert!(ptr.is_pointer());
        assert_eq!(ptr.pointee(), Some(&i64));
        assert!(types.void().is_void());

        let sig = types.function(i64.clone(), vec![ptr]).unwrap();
        let (ret, params) = sig.signature().unwrap();
        assert_eq!(ret, &i64);
        assert_eq!(params.len(), 1);
    }
}
