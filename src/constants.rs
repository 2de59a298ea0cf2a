//! Capacity limits shared across the toolchain.

/// Syntax errors beyond this count abort the translation.
pub const MAX_SYNTAX_ERRORS: u32 = 25;

/// Maximum lexical nesting depth (program + nested routines).
pub const MAX_NESTING_LEVEL: usize = 16;

/// Maximum number of items in one routine's intermediate code.
pub const MAX_ICODE_ITEMS: usize = 16384;

/// Runtime stack capacity in value slots.
pub const RUNTIME_STACK_SIZE: usize = 4096;

/// Maximum number of digits in a numeric literal.
pub const MAX_DIGIT_COUNT: usize = 20;

/// Tabs expand to the next multiple of this column count.
pub const TAB_SIZE: usize = 8;
