//! Runtime error types for the executor.
//!
//! Every runtime error is fatal to the interpreted program: the driver
//! reports it with the current source line number and the count of
//! statements executed, then exits with the matching abort code. There is no
//! recovery path inside the interpreted language.

use std::fmt;

use crate::errors::{
    EXIT_RUNTIME_ERROR, EXIT_STACK_OVERFLOW, EXIT_UNIMPLEMENTED_FEATURE,
};

/// Runtime errors raised while executing intermediate code.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Runtime stack capacity exceeded.
    StackOverflow { line: u32 },

    /// A subrange or array-index check failed.
    ValueOutOfRange {
        value: i32,
        min: i32,
        max: i32,
        line: u32,
    },

    /// CASE selector matched no branch label.
    InvalidCaseValue { value: i32, line: u32 },

    /// Integer or real division by zero.
    DivisionByZero { line: u32 },

    /// A standard routine was applied outside its domain.
    InvalidFunctionArgument { name: &'static str, line: u32 },

    /// A value was read before anything was stored into it.
    UninitializedValue { line: u32 },

    /// A tagged value cell held a different variant than the operation
    /// required.
    WrongValueKind {
        expected: &'static str,
        found: &'static str,
        line: u32,
    },

    /// A language feature with no executor support.
    UnimplementedFeature { what: &'static str, line: u32 },
}

impl RuntimeError {
    /// Source line the error was raised at.
    pub fn line(&self) -> u32 {
        match self {
            RuntimeError::StackOverflow { line }
            | RuntimeError::ValueOutOfRange { line, .. }
            | RuntimeError::InvalidCaseValue { line, .. }
            | RuntimeError::DivisionByZero { line }
            | RuntimeError::InvalidFunctionArgument { line, .. }
            | RuntimeError::UninitializedValue { line }
            | RuntimeError::WrongValueKind { line, .. }
            | RuntimeError::UnimplementedFeature { line, .. } => *line,
        }
    }

    /// Process exit code for the driver.
    pub fn exit_code(&self) -> i32 {
        match self {
            RuntimeError::StackOverflow { .. } => EXIT_STACK_OVERFLOW,
            RuntimeError::UnimplementedFeature { .. } => EXIT_UNIMPLEMENTED_FEATURE,
            _ => EXIT_RUNTIME_ERROR,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::StackOverflow { line } => {
                write!(f, "Stack overflow at line {}", line)
            }
            RuntimeError::ValueOutOfRange {
                value,
                min,
                max,
                line,
            } => {
                write!(
                    f,
                    "Value {} out of range {}..{} at line {}",
                    value, min, max, line
                )
            }
            RuntimeError::InvalidCaseValue { value, line } => {
                write!(
                    f,
                    "Invalid CASE expression value {} at line {}",
                    value, line
                )
            }
            RuntimeError::DivisionByZero { line } => {
                write!(f, "Division by zero at line {}", line)
            }
            RuntimeError::InvalidFunctionArgument { name, line } => {
                write!(f, "Invalid '{}' argument at line {}", name, line)
            }
            RuntimeError::UninitializedValue { line } => {
                write!(f, "Read of an uninitialized value at line {}", line)
            }
            RuntimeError::WrongValueKind {
                expected,
                found,
                line,
            } => {
                write!(
                    f,
                    "Expected {} value, found {} at line {}",
                    expected, found, line
                )
            }
            RuntimeError::UnimplementedFeature { what, line } => {
                write!(f, "Unimplemented feature ({}) at line {}", what, line)
            }
        }
    }
}

impl std::error::Error for RuntimeError {}
