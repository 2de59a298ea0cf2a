//! Translation-time error reporting.
//!
//! Two tiers, mirroring the rest of the toolchain:
//!
//! - [`ErrorCode`]: non-fatal syntax/semantic errors. The scanner and parser
//!   flag them through an [`ErrorReporter`], which prints a caret diagnostic
//!   and keeps counting; parsing then resynchronizes and continues.
//! - [`Abort`]: fatal translation conditions (too many errors, scope nesting
//!   exhausted, intermediate-code overflow). These unwind the whole
//!   translation and map to distinct process exit codes.
//!
//! Runtime errors live in [`crate::executor::errors`]; they follow the same
//! shape but are fatal to the interpreted program rather than the translator.

use std::fmt;

use crate::constants::MAX_SYNTAX_ERRORS;

/// Process exit codes, one per abort category.
pub const EXIT_INVALID_ARGUMENTS: i32 = -1;
pub const EXIT_SOURCE_OPEN_FAILED: i32 = -2;
pub const EXIT_TOO_MANY_ERRORS: i32 = -3;
pub const EXIT_STACK_OVERFLOW: i32 = -4;
pub const EXIT_CODE_SEGMENT_OVERFLOW: i32 = -5;
pub const EXIT_NESTING_TOO_DEEP: i32 = -6;
pub const EXIT_RUNTIME_ERROR: i32 = -7;
pub const EXIT_UNIMPLEMENTED_FEATURE: i32 = -8;

/// Non-fatal translation errors.
///
/// Every code maps to one fixed message; the reporter adds the source
/// position and caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnexpectedToken,
    UnexpectedEndOfFile,
    MissingSemicolon,
    MissingPeriod,
    MissingIdentifier,
    MissingColonEqual,
    MissingDo,
    MissingThen,
    MissingToOrDownto,
    MissingUntil,
    MissingOf,
    MissingBegin,
    MissingEnd,
    MissingEqual,
    MissingColon,
    MissingDotDot,
    MissingProgram,
    MissingLeftBracket,
    MissingRightBracket,
    MissingRightParen,
    IdentifierRedefined,
    UndefinedIdentifier,
    IncompatibleTypes,
    IncompatibleAssignment,
    InvalidConstant,
    InvalidExpression,
    InvalidTarget,
    InvalidType,
    InvalidSubrangeType,
    InvalidIndexType,
    InvalidField,
    InvalidVarParm,
    NotATypeIdentifier,
    NotAConstantIdentifier,
    NotARecordVariable,
    TooManySubscripts,
    WrongNumberOfArguments,
    MinGtMax,
    TooManyDigits,
    IntegerOutOfRange,
    InvalidNumber,
    Unrecognizable,
    UnimplementedFeature,
}

impl ErrorCode {
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::UnexpectedToken => "Unexpected token",
            ErrorCode::UnexpectedEndOfFile => "Unexpected end of file",
            ErrorCode::MissingSemicolon => "Missing ;",
            ErrorCode::MissingPeriod => "Missing .",
            ErrorCode::MissingIdentifier => "Missing identifier",
            ErrorCode::MissingColonEqual => "Missing :=",
            ErrorCode::MissingDo => "Missing DO",
            ErrorCode::MissingThen => "Missing THEN",
            ErrorCode::MissingToOrDownto => "Missing TO or DOWNTO",
            ErrorCode::MissingUntil => "Missing UNTIL",
            ErrorCode::MissingOf => "Missing OF",
            ErrorCode::MissingBegin => "Missing BEGIN",
            ErrorCode::MissingEnd => "Missing END",
            ErrorCode::MissingEqual => "Missing =",
            ErrorCode::MissingColon => "Missing :",
            ErrorCode::MissingDotDot => "Missing ..",
            ErrorCode::MissingProgram => "Missing PROGRAM",
            ErrorCode::MissingLeftBracket => "Missing [",
            ErrorCode::MissingRightBracket => "Missing ]",
            ErrorCode::MissingRightParen => "Missing )",
            ErrorCode::IdentifierRedefined => "Redefined identifier",
            ErrorCode::UndefinedIdentifier => "Undefined identifier",
            ErrorCode::IncompatibleTypes => "Incompatible types",
            ErrorCode::IncompatibleAssignment => "Incompatible assignment",
            ErrorCode::InvalidConstant => "Invalid constant",
            ErrorCode::InvalidExpression => "Invalid expression",
            ErrorCode::InvalidTarget => "Invalid assignment target",
            ErrorCode::InvalidType => "Invalid type",
            ErrorCode::InvalidSubrangeType => "Invalid subrange type",
            ErrorCode::InvalidIndexType => "Invalid index type",
            ErrorCode::InvalidField => "Invalid field",
            ErrorCode::InvalidVarParm => "Invalid VAR parameter",
            ErrorCode::NotATypeIdentifier => "Not a type identifier",
            ErrorCode::NotAConstantIdentifier => "Not a constant identifier",
            ErrorCode::NotARecordVariable => "Not a record variable",
            ErrorCode::TooManySubscripts => "Too many subscripts",
            ErrorCode::WrongNumberOfArguments => "Wrong number of arguments",
            ErrorCode::MinGtMax => "Min limit greater than max limit",
            ErrorCode::TooManyDigits => "Too many digits",
            ErrorCode::IntegerOutOfRange => "Integer literal out of range",
            ErrorCode::InvalidNumber => "Invalid number",
            ErrorCode::Unrecognizable => "Unrecognizable input",
            ErrorCode::UnimplementedFeature => "Unimplemented feature",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Fatal translation-time conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abort {
    TooManyErrors,
    NestingTooDeep,
    CodeSegmentOverflow,
}

impl Abort {
    pub fn exit_code(self) -> i32 {
        match self {
            Abort::TooManyErrors => EXIT_TOO_MANY_ERRORS,
            Abort::NestingTooDeep => EXIT_NESTING_TOO_DEEP,
            Abort::CodeSegmentOverflow => EXIT_CODE_SEGMENT_OVERFLOW,
        }
    }
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abort::TooManyErrors => write!(f, "Too many syntax errors"),
            Abort::NestingTooDeep => write!(f, "Nesting too deep"),
            Abort::CodeSegmentOverflow => write!(f, "Code segment overflow"),
        }
    }
}

impl std::error::Error for Abort {}

/// Collects syntax errors and prints caret diagnostics.
///
/// The reporter is owned by the parser; the scanner's errors arrive attached
/// to tokens and are flagged through the same counter, so there is exactly
/// one error count per translation.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    count: u32,
}

impl ErrorReporter {
    pub fn new() -> Self {
        ErrorReporter { count: 0 }
    }

    /// Number of errors flagged so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Report one error at `line`:`column` inside `source_line`.
    ///
    /// Prints the offending line, a caret under the column, and the message.
    /// Escalates to [`Abort::TooManyErrors`] past the fixed threshold.
    pub fn flag(
        &mut self,
        code: ErrorCode,
        line: u32,
        column: u32,
        source_line: &str,
    ) -> Result<(), Abort> {
        self.count += 1;

        if !source_line.is_empty() {
            eprintln!("{}", source_line);
            eprintln!("{:>width$}", "^", width = column.max(1) as usize);
        }
        eprintln!(
            "*** ERROR at line {}, column {}: {}",
            line,
            column,
            code.message()
        );

        if self.count > MAX_SYNTAX_ERRORS {
            return Err(Abort::TooManyErrors);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_threshold() {
        let mut reporter = ErrorReporter::new();
        for _ in 0..MAX_SYNTAX_ERRORS {
            assert!(reporter
                .flag(ErrorCode::MissingSemicolon, 1, 1, "")
                .is_ok());
        }
        assert_eq!(
            reporter.flag(ErrorCode::MissingSemicolon, 1, 1, ""),
            Err(Abort::TooManyErrors)
        );
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            Abort::TooManyErrors.exit_code(),
            Abort::NestingTooDeep.exit_code(),
            Abort::CodeSegmentOverflow.exit_code(),
        ];
        assert!(codes.iter().all(|c| *c < 0));
        assert_ne!(codes[0], codes[1]);
        assert_ne!(codes[1], codes[2]);
    }
}
