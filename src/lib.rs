//! # Introduction
//!
//! Rascal translates and interprets a Pascal subset, following the classic
//! teaching-compiler pipeline: a scanner feeds a recursive-descent parser,
//! which builds symbol tables with lexical scoping and emits a flattened
//! intermediate code per routine body; a tree-walking executor then replays
//! that intermediate code with one activation frame per routine call.
//!
//! ## Translation pipeline
//!
//! ```text
//! Source → Scanner → Tokens → Parser → Symtab + Types + Icode → Executor
//! ```
//!
//! 1. [`scanner`] — line-oriented source buffer, character classifier, and
//!    tokenizer.
//! 2. [`parser`] — one method per production; declarations populate the
//!    symbol table, statements and expressions type-check and emit icode.
//! 3. [`symtab`] — BST-per-scope symbol tables with a scope display, plus
//!    the nominal type system.
//! 4. [`icode`] — the append-only token/node encoding with line markers,
//!    fixed-up location markers, and CASE jump tables.
//! 5. [`memory`] — tagged runtime values, the shared frame layout, and the
//!    bounded runtime stack.
//! 6. [`executor`] — the icode replay engine: calls with static/dynamic
//!    links, VAR parameters, range-checked stores, and captured I/O.
//!
//! ## Supported Pascal subset
//!
//! Types: `integer`, `real`, `char`, `boolean`, enumerations, subranges,
//! arrays, records. Statements: assignment, compound, `repeat`, `while`,
//! `if`/`else`, `for`, `case`, procedure calls. Routines: nested procedures
//! and functions with value and VAR parameters. Standard routines: `read`,
//! `readln`, `write`, `writeln`, `abs`, `arctan`, `chr`, `cos`, `exp`,
//! `ln`, `odd`, `ord`, `pred`, `round`, `sin`, `sqr`, `sqrt`, `succ`,
//! `trunc`. Sets, files, pointers, and GOTO are not implemented.

mod constants;
pub mod errors;
pub mod executor;
pub mod icode;
pub mod memory;
pub mod parser;
pub mod scanner;
pub mod symtab;
