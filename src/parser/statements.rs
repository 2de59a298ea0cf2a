//! Statement parsing and intermediate-code emission.
//!
//! Each statement parser emits its leading token, retro-inserts a line
//! marker in front of it, and appends location markers for the forward
//! branch targets its executor counterpart repositions to:
//!
//! ```text
//! WHILE  <loc: follow>        expr DO stmt
//! IF     <loc: ELSE-or-follow> expr THEN stmt [ELSE <loc: follow> stmt]
//! FOR    <loc: follow>        var := expr TO|DOWNTO expr DO stmt
//! CASE   <loc: jump table>    expr OF branches END <table>
//! ```
//!
//! REPEAT needs no marker: the executor re-enters the loop by saving the
//! position after the REPEAT token. Every marker opened here is fixed up on
//! every parse path, which the icode builder checks at finalization.

use rustc_hash::FxHashMap;

use crate::errors::{Abort, ErrorCode};
use crate::parser::{Parser, CASE_LABEL_START, STMT_START};
use crate::scanner::token::{TokenCode, TokenValue};
use crate::symtab::types::TypeId;
use crate::symtab::{ConstantValue, DefnKind};

impl Parser {
    /// Dispatch on the statement's leading token.
    pub(crate) fn parse_statement(&mut self) -> Result<(), Abort> {
        match self.token_code() {
            TokenCode::Identifier => self.parse_assignment_or_call(),
            TokenCode::Begin => self.parse_compound(),
            TokenCode::Repeat => self.parse_repeat(),
            TokenCode::While => self.parse_while(),
            TokenCode::If => self.parse_if(),
            TokenCode::For => self.parse_for(),
            TokenCode::Case => self.parse_case(),
            TokenCode::Goto | TokenCode::With => {
                self.flag(ErrorCode::UnimplementedFeature)?;
                self.get_token()?;
                self.skip_to_statement_follow()
            }
            _ => {
                self.flag(ErrorCode::UnexpectedToken)?;
                self.get_token()
            }
        }
    }

    fn skip_to_statement_follow(&mut self) -> Result<(), Abort> {
        while !matches!(
            self.token_code(),
            TokenCode::Semicolon
                | TokenCode::End
                | TokenCode::Else
                | TokenCode::Until
                | TokenCode::EndOfFile
        ) {
            self.get_token()?;
        }
        Ok(())
    }

    /// Emit the current keyword token as the statement head, preceded by its
    /// line marker.
    fn open_statement(&mut self) -> Result<(), Abort> {
        let line = self.token_line();
        self.emit_current()?;
        self.builder.insert_line_marker(line)?;
        Ok(())
    }

    /// `begin stmt-list end`
    pub(crate) fn parse_compound(&mut self) -> Result<(), Abort> {
        self.open_statement()?;
        self.get_token()?;
        self.parse_statement_list(TokenCode::End)?;
        self.emit_expect(TokenCode::End, ErrorCode::MissingEnd)
    }

    /// Semicolon-separated statements up to `terminator`. A missing
    /// semicolon between two statements is flagged exactly once, and parsing
    /// continues with the next statement.
    fn parse_statement_list(&mut self, terminator: TokenCode) -> Result<(), Abort> {
        loop {
            while self.token_code() == TokenCode::Semicolon {
                self.emit_current()?;
                self.get_token()?;
            }
            if self.token_code() == terminator || self.token_code() == TokenCode::EndOfFile {
                return Ok(());
            }
            let code = self.token_code();
            if !STMT_START.contains(&code)
                && !matches!(code, TokenCode::Goto | TokenCode::With)
            {
                self.sync(&[STMT_START, &[terminator, TokenCode::Semicolon]])?;
                continue;
            }

            self.parse_statement()?;

            let code = self.token_code();
            if code == TokenCode::Semicolon
                || code == terminator
                || code == TokenCode::EndOfFile
            {
                continue;
            }
            if STMT_START.contains(&code) {
                self.flag(ErrorCode::MissingSemicolon)?;
            } else {
                self.sync(&[STMT_START, &[terminator, TokenCode::Semicolon]])?;
            }
        }
    }

    /// Statement starting with an identifier: an assignment to a variable or
    /// function result, or a procedure call.
    fn parse_assignment_or_call(&mut self) -> Result<(), Abort> {
        let line = self.token_line();
        let id = match self.scopes.search_all(&self.symtab, self.token_text()) {
            Some(id) => id,
            None => {
                self.flag(ErrorCode::UndefinedIdentifier)?;
                let table = self.scopes.local_table();
                let level = self.scopes.level();
                let name = self.token_text().to_string();
                let id = self.symtab.enter(table, &name, level);
                self.symtab.node_mut(id).type_id = Some(self.types.dummy);
                id
            }
        };

        self.builder.put_code(TokenCode::Identifier)?;
        self.builder.insert_line_marker(line)?;
        self.builder.put_node(id)?;
        self.get_token()?;

        match self.symtab.node(id).defn.kind() {
            DefnKind::Procedure => {
                let _ = self.parse_call(id)?;
                Ok(())
            }
            DefnKind::Function => {
                if self.token_code() == TokenCode::ColonEqual {
                    let target = self.symtab.node(id).type_id.unwrap_or(self.types.dummy);
                    self.parse_assignment_rest(target)
                } else {
                    self.flag(ErrorCode::InvalidTarget)?;
                    let _ = self.parse_call(id)?;
                    Ok(())
                }
            }
            DefnKind::Constant | DefnKind::Type | DefnKind::Program => {
                self.flag(ErrorCode::InvalidTarget)?;
                self.skip_to_statement_follow()
            }
            _ => {
                let target = self.parse_variable_suffix(id)?;
                self.parse_assignment_rest(target)
            }
        }
    }

    /// `:= expression`, with assignment-compatibility against the target.
    fn parse_assignment_rest(&mut self, target: TypeId) -> Result<(), Abort> {
        self.emit_expect(TokenCode::ColonEqual, ErrorCode::MissingColonEqual)?;
        let value = self.parse_expression()?;
        if !self.types.is_assignment_compatible(target, value) {
            self.flag(ErrorCode::IncompatibleAssignment)?;
        }
        Ok(())
    }

    /// `repeat stmt-list until expr`
    fn parse_repeat(&mut self) -> Result<(), Abort> {
        self.open_statement()?;
        self.get_token()?;
        self.parse_statement_list(TokenCode::Until)?;
        self.emit_expect(TokenCode::Until, ErrorCode::MissingUntil)?;
        let condition = self.parse_expression()?;
        self.check_boolean(condition)
    }

    /// `while expr do stmt`
    fn parse_while(&mut self) -> Result<(), Abort> {
        self.open_statement()?;
        let follow = self.builder.put_location_marker()?;
        self.get_token()?;

        let condition = self.parse_expression()?;
        self.check_boolean(condition)?;
        self.emit_expect(TokenCode::Do, ErrorCode::MissingDo)?;
        self.parse_statement()?;

        self.builder.fixup_location_marker(follow);
        Ok(())
    }

    /// `if expr then stmt [else stmt]`
    fn parse_if(&mut self) -> Result<(), Abort> {
        self.open_statement()?;
        let else_or_follow = self.builder.put_location_marker()?;
        self.get_token()?;

        let condition = self.parse_expression()?;
        self.check_boolean(condition)?;
        self.emit_expect(TokenCode::Then, ErrorCode::MissingThen)?;
        self.parse_statement()?;

        // The marker lands on the ELSE token when present, on the follow
        // position otherwise; the executor distinguishes by looking at it.
        self.builder.fixup_location_marker(else_or_follow);

        if self.token_code() == TokenCode::Else {
            self.emit_current()?;
            let follow = self.builder.put_location_marker()?;
            self.get_token()?;
            self.parse_statement()?;
            self.builder.fixup_location_marker(follow);
        }
        Ok(())
    }

    /// `for var := expr to|downto expr do stmt`
    fn parse_for(&mut self) -> Result<(), Abort> {
        self.open_statement()?;
        let follow = self.builder.put_location_marker()?;
        self.get_token()?;

        let mut control = self.types.dummy;
        if self.token_code() == TokenCode::Identifier {
            match self.scopes.search_all(&self.symtab, self.token_text()) {
                Some(id) => {
                    let (kind, type_id) = {
                        let node = self.symtab.node(id);
                        (node.defn.kind(), node.type_id)
                    };
                    if !kind.is_data() {
                        self.flag(ErrorCode::InvalidTarget)?;
                    }
                    control = type_id.unwrap_or(self.types.dummy);
                    if !self.types.is_ordinal(control) && !self.types.is_dummy(control) {
                        self.flag(ErrorCode::IncompatibleTypes)?;
                    }
                    self.emit_current()?;
                    self.builder.put_node(id)?;
                    self.get_token()?;
                }
                None => {
                    self.flag(ErrorCode::UndefinedIdentifier)?;
                    let table = self.scopes.local_table();
                    let level = self.scopes.level();
                    let name = self.token_text().to_string();
                    let id = self.symtab.enter(table, &name, level);
                    self.symtab.node_mut(id).type_id = Some(self.types.dummy);
                    self.emit_current()?;
                    self.builder.put_node(id)?;
                    self.get_token()?;
                }
            }
        } else {
            self.flag(ErrorCode::MissingIdentifier)?;
        }

        self.emit_expect(TokenCode::ColonEqual, ErrorCode::MissingColonEqual)?;
        let initial = self.parse_expression()?;
        if !self.types.is_assignment_compatible(control, initial) {
            self.flag(ErrorCode::IncompatibleTypes)?;
        }

        if matches!(self.token_code(), TokenCode::To | TokenCode::Downto) {
            self.emit_current()?;
            self.get_token()?;
        } else {
            self.flag(ErrorCode::MissingToOrDownto)?;
        }

        let limit = self.parse_expression()?;
        if !self.types.are_comparison_compatible(control, limit) {
            self.flag(ErrorCode::IncompatibleTypes)?;
        }

        self.emit_expect(TokenCode::Do, ErrorCode::MissingDo)?;
        self.parse_statement()?;

        self.builder.fixup_location_marker(follow);
        Ok(())
    }

    /// `case expr of labels: stmt; ... end`
    ///
    /// Branch label values and their statement positions accumulate into the
    /// jump table appended after END; the leading marker is fixed up to the
    /// table's position.
    fn parse_case(&mut self) -> Result<(), Abort> {
        self.open_statement()?;
        let table_marker = self.builder.put_location_marker()?;
        self.get_token()?;

        let selector = self.parse_expression()?;
        if !self.types.is_ordinal(selector) && !self.types.is_dummy(selector) {
            self.flag(ErrorCode::IncompatibleTypes)?;
        }
        self.emit_expect(TokenCode::Of, ErrorCode::MissingOf)?;

        let mut table: FxHashMap<i32, usize> = FxHashMap::default();
        loop {
            while self.token_code() == TokenCode::Semicolon {
                self.emit_current()?;
                self.get_token()?;
            }
            if matches!(self.token_code(), TokenCode::End | TokenCode::EndOfFile) {
                break;
            }
            if !CASE_LABEL_START.contains(&self.token_code()) {
                self.sync(&[CASE_LABEL_START, &[TokenCode::Semicolon, TokenCode::End]])?;
                continue;
            }

            let mut labels = Vec::new();
            loop {
                labels.push(self.parse_case_label(selector)?);
                if self.token_code() == TokenCode::Comma {
                    self.emit_current()?;
                    self.get_token()?;
                } else {
                    break;
                }
            }
            self.emit_expect(TokenCode::Colon, ErrorCode::MissingColon)?;

            let branch = self.builder.current_position();
            for value in labels.into_iter().flatten() {
                table.entry(value).or_insert(branch);
            }

            self.parse_statement()?;

            let code = self.token_code();
            if matches!(code, TokenCode::Semicolon | TokenCode::End | TokenCode::EndOfFile) {
                continue;
            }
            if CASE_LABEL_START.contains(&code) {
                self.flag(ErrorCode::MissingSemicolon)?;
            } else {
                self.sync(&[CASE_LABEL_START, &[TokenCode::Semicolon, TokenCode::End]])?;
            }
        }

        self.emit_expect(TokenCode::End, ErrorCode::MissingEnd)?;
        self.builder.fixup_location_marker(table_marker);
        self.builder.put_case_table(table)?;
        Ok(())
    }

    /// One CASE label constant; returns its ordinal value when usable.
    fn parse_case_label(&mut self, selector: TypeId) -> Result<Option<i32>, Abort> {
        let mut sign = 1i32;
        let mut signed = false;
        if matches!(self.token_code(), TokenCode::Plus | TokenCode::Minus) {
            signed = true;
            if self.token_code() == TokenCode::Minus {
                sign = -1;
            }
            self.emit_current()?;
            self.get_token()?;
        }

        match self.token_code() {
            TokenCode::IntegerLiteral => {
                let value = match self.token.value {
                    TokenValue::Integer(v) => v,
                    _ => 0,
                };
                let (id, type_id) = self.literal_node()?;
                self.emit_current()?;
                self.builder.put_node(id)?;
                self.get_token()?;
                if !self.types.are_comparison_compatible(selector, type_id) {
                    self.flag(ErrorCode::IncompatibleTypes)?;
                }
                Ok(Some(value.wrapping_mul(sign)))
            }
            TokenCode::StringLiteral => {
                let (id, type_id) = self.literal_node()?;
                let value = match &self.symtab.node(id).defn {
                    crate::symtab::Definition::Constant(ConstantValue::Character(ch)) => {
                        Some(*ch as i32)
                    }
                    _ => None,
                };
                self.emit_current()?;
                self.builder.put_node(id)?;
                self.get_token()?;
                if signed || value.is_none() {
                    self.flag(ErrorCode::InvalidConstant)?;
                    return Ok(None);
                }
                if !self.types.are_comparison_compatible(selector, type_id) {
                    self.flag(ErrorCode::IncompatibleTypes)?;
                }
                Ok(value)
            }
            TokenCode::Identifier => {
                match self.scopes.search_all(&self.symtab, self.token_text()) {
                    Some(id) => {
                        let (value, type_id) = {
                            let node = self.symtab.node(id);
                            match &node.defn {
                                crate::symtab::Definition::Constant(value) => (
                                    Some(value.clone()),
                                    node.type_id.unwrap_or(self.types.dummy),
                                ),
                                _ => (None, self.types.dummy),
                            }
                        };
                        match value {
                            Some(value) => {
                                self.emit_current()?;
                                self.builder.put_node(id)?;
                                self.get_token()?;
                                if !self.types.are_comparison_compatible(selector, type_id) {
                                    self.flag(ErrorCode::IncompatibleTypes)?;
                                }
                                let ordinal = match value {
                                    ConstantValue::Integer(v) => Some(v.wrapping_mul(sign)),
                                    ConstantValue::Character(ch) if !signed => {
                                        Some(ch as i32)
                                    }
                                    _ => None,
                                };
                                if ordinal.is_none() {
                                    self.flag(ErrorCode::InvalidConstant)?;
                                }
                                Ok(ordinal)
                            }
                            None => {
                                self.flag(ErrorCode::NotAConstantIdentifier)?;
                                self.get_token()?;
                                Ok(None)
                            }
                        }
                    }
                    None => {
                        self.flag(ErrorCode::UndefinedIdentifier)?;
                        self.get_token()?;
                        Ok(None)
                    }
                }
            }
            _ => {
                self.flag(ErrorCode::InvalidConstant)?;
                Ok(None)
            }
        }
    }
}
