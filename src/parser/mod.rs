//! Recursive-descent parser for the Pascal subset.
//!
//! One method per grammar production. Declaration processing populates the
//! symbol table and assigns frame offsets; statement and expression
//! processing type-check on the fly and emit intermediate code as a side
//! product, one buffer per routine body.
//!
//! Error strategy: syntax errors are flagged through the [`ErrorReporter`]
//! and parsing continues, resynchronizing on the statement/declaration start
//! sets; only the fatal [`Abort`] conditions unwind, via `?`.
//!
//! The parser submodules extend [`Parser`] the way the rest of the crate
//! splits large impls:
//! - [`declarations`]: CONST/TYPE/VAR/PROCEDURE/FUNCTION processing
//! - [`statements`]: statement productions and icode markers
//! - [`expressions`]: expression productions, variables, and calls

pub mod declarations;
pub mod expressions;
pub mod statements;

use std::rc::Rc;

use crate::errors::{Abort, ErrorCode, ErrorReporter};
use crate::icode::IcodeBuilder;
use crate::memory::frame;
use crate::scanner::token::{Token, TokenCode, TokenValue};
use crate::scanner::Scanner;
use crate::symtab::types::{TypeDesc, TypeForm, TypeTable, CHAR_SIZE, INTEGER_SIZE};
use crate::symtab::{
    ConstantValue, Definition, NodeId, RoutineInfo, ScopeStack, StandardRoutine, Symtab,
};

/// Tokens that can begin a statement.
pub(crate) const STMT_START: &[TokenCode] = &[
    TokenCode::Identifier,
    TokenCode::Begin,
    TokenCode::Repeat,
    TokenCode::While,
    TokenCode::If,
    TokenCode::For,
    TokenCode::Case,
];

/// Tokens that can begin a CASE label.
pub(crate) const CASE_LABEL_START: &[TokenCode] = &[
    TokenCode::IntegerLiteral,
    TokenCode::StringLiteral,
    TokenCode::Identifier,
    TokenCode::Plus,
    TokenCode::Minus,
];

/// Everything later passes need from a translation: the symbol-table forest
/// (with each routine's icode attached), the type arena, and the program
/// entry.
pub struct Translation {
    pub symtab: Symtab,
    pub types: TypeTable,
    pub program: NodeId,
    pub error_count: u32,
}

/// Parser context: scanner, current token, symbol tables, scope display,
/// error reporter, and the icode builder of the routine body being parsed.
pub struct Parser {
    scanner: Scanner,
    token: Token,
    pub(crate) symtab: Symtab,
    pub(crate) types: TypeTable,
    pub(crate) scopes: ScopeStack,
    reporter: ErrorReporter,
    pub(crate) builder: IcodeBuilder,
    /// Next frame slot offset in the scope being declared.
    pub(crate) next_offset: usize,
}

impl Parser {
    pub fn new(scanner: Scanner) -> Self {
        let mut symtab = Symtab::new();
        let global = symtab.new_table();
        let types = TypeTable::new(&mut symtab, global);
        enter_standard_routines(&mut symtab, global);

        Parser {
            scanner,
            token: Token::placeholder(),
            symtab,
            types,
            scopes: ScopeStack::new(global),
            reporter: ErrorReporter::new(),
            builder: IcodeBuilder::new(),
            next_offset: frame::HEADER_SIZE,
        }
    }

    /// Parse a whole program. Consumes the parser; syntax errors are counted
    /// in the returned [`Translation`], fatal conditions return the abort.
    pub fn parse_program(mut self) -> Result<Translation, Abort> {
        self.get_token()?;

        self.expect(TokenCode::Program, ErrorCode::MissingProgram)?;
        let program_id = if self.token.code == TokenCode::Identifier {
            let name = self.token.text.clone();
            let global = self.scopes.global_table();
            let id = match self.symtab.enter_new(global, &name, 0) {
                Ok(id) => id,
                Err(_) => {
                    self.flag(ErrorCode::IdentifierRedefined)?;
                    self.symtab.orphan(&name, 0)
                }
            };
            self.get_token()?;
            id
        } else {
            self.flag(ErrorCode::MissingIdentifier)?;
            self.symtab.orphan("program", 0)
        };

        // Program parameters (input, output) are accepted and ignored; file
        // bindings are not implemented.
        if self.token.code == TokenCode::LParen {
            self.get_token()?;
            while matches!(
                self.token.code,
                TokenCode::Identifier | TokenCode::Comma
            ) {
                self.get_token()?;
            }
            self.expect(TokenCode::RParen, ErrorCode::MissingRightParen)?;
        }
        self.expect(TokenCode::Semicolon, ErrorCode::MissingSemicolon)?;

        let table = self.symtab.new_table();
        self.symtab.node_mut(program_id).defn =
            Definition::Program(Box::new(RoutineInfo::declared(table)));
        self.scopes.enter_scope(table)?;
        self.next_offset = frame::HEADER_SIZE;

        self.parse_block(program_id)?;

        self.scopes.exit_scope();
        self.expect(TokenCode::Period, ErrorCode::MissingPeriod)?;

        Ok(Translation {
            symtab: self.symtab,
            types: self.types,
            program: program_id,
            error_count: self.reporter.count(),
        })
    }

    /// Declarations, then the routine body, emitted into a fresh icode
    /// buffer that is attached to `routine_id`.
    pub(crate) fn parse_block(&mut self, routine_id: NodeId) -> Result<(), Abort> {
        let locals = self.parse_declarations()?;

        for window in locals.windows(2) {
            self.symtab.node_mut(window[0]).next = Some(window[1]);
        }
        if let Some(info) = self.symtab.node_mut(routine_id).defn.routine_mut() {
            info.first_local = locals.first().copied();
            info.local_count = locals.len();
        }

        if self.token.code != TokenCode::Begin {
            self.flag(ErrorCode::MissingBegin)?;
            self.sync(&[&[TokenCode::Begin]])?;
        }

        let saved = std::mem::take(&mut self.builder);
        if self.token.code == TokenCode::Begin {
            self.parse_compound()?;
        }
        let body = std::mem::replace(&mut self.builder, saved).finish();
        if let Some(info) = self.symtab.node_mut(routine_id).defn.routine_mut() {
            info.icode = Some(Rc::new(body));
        }
        Ok(())
    }

    // ===== Token plumbing =====

    /// Fetch the next token. Scan errors are flagged here and error tokens
    /// skipped, so the grammar only ever sees usable tokens (plus EOF).
    pub(crate) fn get_token(&mut self) -> Result<(), Abort> {
        loop {
            let token = self.scanner.next_token();
            if let Some(code) = token.error {
                let line_text = self.scanner.current_line();
                self.reporter
                    .flag(code, token.line, token.column, &line_text)?;
            }
            if token.code == TokenCode::Error {
                continue;
            }
            self.token = token;
            return Ok(());
        }
    }

    pub(crate) fn token_code(&self) -> TokenCode {
        self.token.code
    }

    pub(crate) fn token_text(&self) -> &str {
        &self.token.text
    }

    pub(crate) fn token_line(&self) -> u32 {
        self.token.line
    }

    /// Flag an error at the current token.
    pub(crate) fn flag(&mut self, code: ErrorCode) -> Result<(), Abort> {
        let line_text = self.scanner.current_line();
        self.reporter
            .flag(code, self.token.line, self.token.column, &line_text)
    }

    /// Consume the expected token, or flag `error` and leave the token in
    /// place for resynchronization.
    pub(crate) fn expect(&mut self, code: TokenCode, error: ErrorCode) -> Result<(), Abort> {
        if self.token.code == code {
            self.get_token()
        } else {
            self.flag(error)
        }
    }

    /// Like [`Parser::expect`], but also emits the consumed token.
    pub(crate) fn emit_expect(
        &mut self,
        code: TokenCode,
        error: ErrorCode,
    ) -> Result<(), Abort> {
        if self.token.code == code {
            self.builder.put_code(code)?;
            self.get_token()
        } else {
            self.flag(error)
        }
    }

    /// Emit the current token's code (no node reference).
    pub(crate) fn emit_current(&mut self) -> Result<(), Abort> {
        self.builder.put_code(self.token.code)
    }

    /// Error synchronization: if the current token is in none of the given
    /// sets, flag once and skip tokens until one is found (or EOF).
    pub(crate) fn sync(&mut self, sets: &[&[TokenCode]]) -> Result<(), Abort> {
        let hit = |code: TokenCode| sets.iter().any(|set| set.contains(&code));
        if !hit(self.token.code) {
            self.flag(ErrorCode::UnexpectedToken)?;
            while self.token.code != TokenCode::EndOfFile && !hit(self.token.code) {
                self.get_token()?;
            }
        }
        Ok(())
    }

    // ===== Literal pooling =====

    /// Enter the current literal token into the global table (pooled by
    /// lexeme) and return its node and type.
    pub(crate) fn literal_node(&mut self) -> Result<(NodeId, crate::symtab::types::TypeId), Abort>
    {
        let global = self.scopes.global_table();
        let key = self.token.text.clone();
        let id = self.symtab.enter(global, &key, 0);

        if self.symtab.node(id).type_id.is_none() {
            let (value, type_id) = match (&self.token.code, &self.token.value) {
                (TokenCode::IntegerLiteral, TokenValue::Integer(v)) => {
                    (ConstantValue::Integer(*v), self.types.integer)
                }
                (TokenCode::RealLiteral, TokenValue::Real(v)) => {
                    (ConstantValue::Real(*v), self.types.real)
                }
                (TokenCode::StringLiteral, TokenValue::Str(s)) => {
                    let text = s.clone();
                    let mut chars = text.chars();
                    match (chars.next(), chars.next()) {
                        (Some(ch), None) => {
                            (ConstantValue::Character(ch), self.types.character)
                        }
                        _ => {
                            let type_id = self.string_type(text.chars().count());
                            (ConstantValue::Str(text), type_id)
                        }
                    }
                }
                _ => (ConstantValue::Integer(0), self.types.dummy),
            };
            let node = self.symtab.node_mut(id);
            node.defn = Definition::Constant(value);
            node.type_id = Some(type_id);
        }
        let type_id = self.symtab.node(id).type_id.unwrap_or(self.types.dummy);
        Ok((id, type_id))
    }

    /// Anonymous `array [1..len] of char` descriptor for a string literal.
    pub(crate) fn string_type(&mut self, len: usize) -> crate::symtab::types::TypeId {
        let index = self.types.add(TypeDesc {
            form: TypeForm::Subrange {
                base: self.types.integer,
                min: 1,
                max: len as i32,
            },
            size: INTEGER_SIZE,
            ident: None,
        });
        self.types.add(TypeDesc {
            form: TypeForm::Array {
                index,
                element: self.types.character,
                count: len,
                min_index: 1,
                max_index: len as i32,
            },
            size: len * CHAR_SIZE,
            ident: None,
        })
    }

    // ===== Shared type checks =====

    pub(crate) fn check_boolean(
        &mut self,
        type_id: crate::symtab::types::TypeId,
    ) -> Result<(), Abort> {
        if !self.types.is_boolean(type_id) && !self.types.is_dummy(type_id) {
            self.flag(ErrorCode::IncompatibleTypes)?;
        }
        Ok(())
    }
}

/// Enter the predefined routines into the global scope. They dispatch by
/// routine code; the per-routine argument rules live in the parser and the
/// executor's builtin module.
fn enter_standard_routines(symtab: &mut Symtab, global: crate::symtab::TableId) {
    let scope = symtab.new_table();
    let routines = [
        StandardRoutine::Read,
        StandardRoutine::Readln,
        StandardRoutine::Write,
        StandardRoutine::Writeln,
        StandardRoutine::Abs,
        StandardRoutine::ArcTan,
        StandardRoutine::Chr,
        StandardRoutine::Cos,
        StandardRoutine::Exp,
        StandardRoutine::Ln,
        StandardRoutine::Odd,
        StandardRoutine::Ord,
        StandardRoutine::Pred,
        StandardRoutine::Round,
        StandardRoutine::Sin,
        StandardRoutine::Sqr,
        StandardRoutine::Sqrt,
        StandardRoutine::Succ,
        StandardRoutine::Trunc,
    ];
    for routine in routines {
        let id = symtab.enter(global, routine.name(), 0);
        let info = Box::new(RoutineInfo::standard(routine, scope));
        symtab.node_mut(id).defn = if routine.is_function() {
            Definition::Function(info)
        } else {
            Definition::Procedure(info)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::source::SourceBuffer;
    use crate::symtab::DefnKind;

    fn parse(source: &str) -> Translation {
        let parser = Parser::new(Scanner::new(SourceBuffer::from_text(source)));
        parser.parse_program().expect("no abort expected")
    }

    #[test]
    fn test_minimal_program() {
        let translation = parse("program hello; begin end.");
        assert_eq!(translation.error_count, 0);
        let node = translation.symtab.node(translation.program);
        assert_eq!(node.name, "hello");
        assert_eq!(node.defn.kind(), DefnKind::Program);
        let info = node.defn.routine().unwrap();
        assert!(info.icode.is_some());
    }

    #[test]
    fn test_declarations_populate_scope() {
        let translation = parse(
            "program t;\n\
             const limit = 10;\n\
             type range = 1..limit;\n\
             var x, y: range; r: real;\n\
             begin x := 1 end.",
        );
        assert_eq!(translation.error_count, 0);
        let info = translation
            .symtab
            .node(translation.program)
            .defn
            .routine()
            .unwrap();
        assert_eq!(info.local_count, 3);

        let locals: Vec<&str> = translation
            .symtab
            .chain(info.first_local)
            .map(|id| translation.symtab.node(id).name.as_str())
            .collect();
        assert_eq!(locals, vec!["x", "y", "r"]);
    }

    #[test]
    fn test_variable_offsets_follow_frame_layout() {
        let translation = parse("program t; var a, b, c: integer; begin a := 0 end.");
        let info = translation
            .symtab
            .node(translation.program)
            .defn
            .routine()
            .unwrap();
        let offsets: Vec<usize> = translation
            .symtab
            .chain(info.first_local)
            .map(|id| translation.symtab.node(id).defn.offset().unwrap())
            .collect();
        assert_eq!(
            offsets,
            vec![
                frame::HEADER_SIZE,
                frame::HEADER_SIZE + 1,
                frame::HEADER_SIZE + 2
            ]
        );
    }

    #[test]
    fn test_parameter_offsets_and_kinds() {
        let translation = parse(
            "program t;\n\
             procedure p(a: integer; var b: real);\n\
             begin b := a end;\n\
             begin p(1, r) end.",
        );
        // The undefined actual `r` is the only expected error.
        assert_eq!(translation.error_count, 1);
        let global = {
            let id = translation.symtab.node(translation.program);
            id.defn.routine().unwrap().scope
        };
        let p = translation.symtab.search(global, "p").unwrap();
        let info = translation.symtab.node(p).defn.routine().unwrap();
        assert_eq!(info.param_count, 2);
        let kinds: Vec<(DefnKind, usize)> = translation
            .symtab
            .chain(info.first_param)
            .map(|id| {
                let node = translation.symtab.node(id);
                (node.defn.kind(), node.defn.offset().unwrap())
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                (DefnKind::ValueParam, frame::HEADER_SIZE),
                (DefnKind::VarParam, frame::HEADER_SIZE + 1)
            ]
        );
    }

    #[test]
    fn test_missing_semicolon_reports_exactly_one_error() {
        let translation = parse(
            "program t;\n\
             var a, b: integer;\n\
             begin\n\
               a := 1\n\
               b := 2\n\
             end.",
        );
        assert_eq!(translation.error_count, 1);
    }

    #[test]
    fn test_redeclaration_is_flagged() {
        let translation = parse("program t; var x: integer; x: real; begin end.");
        assert_eq!(translation.error_count, 1);
    }

    #[test]
    fn test_undefined_identifier_flagged_once() {
        let translation = parse("program t; begin y := 3; y := 4 end.");
        // First use flags and enters the name; the second use resolves.
        assert_eq!(translation.error_count, 1);
    }

    #[test]
    fn test_incompatible_assignment() {
        let translation =
            parse("program t; var i: integer; r: real; begin i := r end.");
        assert_eq!(translation.error_count, 1);
    }

    #[test]
    fn test_real_accepts_integer() {
        let translation =
            parse("program t; var i: integer; r: real; begin r := i end.");
        assert_eq!(translation.error_count, 0);
    }

    #[test]
    fn test_unimplemented_features_flagged() {
        let translation = parse("program t; type s = set; begin end.");
        assert!(translation.error_count >= 1);
    }
}
