//! Tagged runtime values.
//!
//! Every slot on the runtime stack holds a [`Value`]. Unlike the original's
//! raw memory cells, variants are tagged and reading a cell as the wrong
//! variant is a checked runtime error, never a reinterpretation.
//!
//! Enumeration values (including `boolean`) are stored as their integer
//! ordinals. Records are field-name keyed maps; arrays are element vectors
//! indexed from their type's minimum index.

use rustc_hash::FxHashMap;

/// Runtime value of one stack slot or aggregate element.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Integer(i32),
    Real(f32),
    Character(char),
    Array(Vec<Value>),
    Record(FxHashMap<String, Value>),
    /// Address of another datum; what a VAR parameter slot holds.
    Address(Address),
    /// An intermediate-code position; used in frame-header link slots.
    Location(usize),
    #[default]
    Uninitialized,
}

impl Value {
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f32> {
        match self {
            Value::Real(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_character(&self) -> Option<char> {
        match self {
            Value::Character(ch) => Some(*ch),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Value::Address(address) => Some(address),
            _ => None,
        }
    }

    pub fn as_location(&self) -> Option<usize> {
        match self {
            Value::Location(position) => Some(*position),
            _ => None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self, Value::Uninitialized)
    }

    /// Variant name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Character(_) => "character",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Address(_) => "address",
            Value::Location(_) => "location",
            Value::Uninitialized => "uninitialized",
        }
    }
}

/// Address of a datum: a stack slot plus a path into the aggregate stored
/// there (array elements by position, record fields by name).
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub slot: usize,
    pub path: Vec<AccessStep>,
}

impl Address {
    pub fn slot(slot: usize) -> Self {
        Address {
            slot,
            path: Vec::new(),
        }
    }
}

/// One step into an aggregate value.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessStep {
    Index(usize),
    Field(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Integer(5).as_integer(), Some(5));
        assert_eq!(Value::Real(2.5).as_real(), Some(2.5));
        assert_eq!(Value::Character('x').as_character(), Some('x'));
        assert_eq!(Value::Integer(5).as_real(), None);
        assert!(!Value::Uninitialized.is_initialized());
        assert!(Value::Integer(0).is_initialized());
    }

    #[test]
    fn test_default_is_uninitialized() {
        assert_eq!(Value::default(), Value::Uninitialized);
    }
}
