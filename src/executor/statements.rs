//! Statement execution.
//!
//! Each method consumes exactly the tokens its parser counterpart emitted,
//! so on entry the current token is the statement's first token and on exit
//! it is the first token past the statement. Control flow repositions the
//! cursor through the location markers described in
//! [`crate::parser::statements`].

use crate::executor::errors::RuntimeError;
use crate::executor::Executor;
use crate::scanner::token::TokenCode;
use crate::symtab::DefnKind;

impl Executor<'_> {
    /// Dispatch on the statement's leading token.
    pub(crate) fn execute_statement(&mut self) -> Result<(), RuntimeError> {
        self.bump_statement_count();
        match self.token {
            TokenCode::Begin => self.execute_compound(),
            TokenCode::Identifier => {
                let id = self.expect_node()?;
                match self.symtab.node(id).defn.kind() {
                    DefnKind::Procedure => {
                        self.execute_call(id)?;
                        Ok(())
                    }
                    _ => self.execute_assignment(id),
                }
            }
            TokenCode::Repeat => self.execute_repeat(),
            TokenCode::While => self.execute_while(),
            TokenCode::If => self.execute_if(),
            TokenCode::For => self.execute_for(),
            TokenCode::Case => self.execute_case(),
            _ => Err(RuntimeError::UnimplementedFeature {
                what: "statement",
                line: self.current_line(),
            }),
        }
    }

    /// `begin stmt-list end`
    fn execute_compound(&mut self) -> Result<(), RuntimeError> {
        self.get_token()?;
        loop {
            while self.token == TokenCode::Semicolon {
                self.get_token()?;
            }
            if self.token == TokenCode::End {
                self.get_token()?;
                return Ok(());
            }
            if self.token == TokenCode::EndOfFile {
                return Ok(());
            }
            self.execute_statement()?;
        }
    }

    /// `target := expression`
    fn execute_assignment(&mut self, id: crate::symtab::NodeId) -> Result<(), RuntimeError> {
        let (address, target_type) = self.resolve_variable(id)?;
        if self.token != TokenCode::ColonEqual {
            return Err(self.kind_error("':='", "other token"));
        }
        self.get_token()?;
        let value = self.execute_expression()?;
        self.store(&address, value, target_type)
    }

    /// `repeat stmt-list until expr` — the loop restarts by rewinding to the
    /// position just past the REPEAT token.
    fn execute_repeat(&mut self) -> Result<(), RuntimeError> {
        let loop_start = self.cursor_position();
        self.get_token()?;
        loop {
            loop {
                while self.token == TokenCode::Semicolon {
                    self.get_token()?;
                }
                if self.token == TokenCode::Until {
                    break;
                }
                self.execute_statement()?;
            }
            self.get_token()?; // past UNTIL
            let condition = self.execute_expression()?;
            if self.truthy(&condition)? {
                return Ok(());
            }
            self.go_to(loop_start)?;
        }
    }

    /// `while expr do stmt`
    fn execute_while(&mut self) -> Result<(), RuntimeError> {
        let follow = self.get_location()?;
        let test = self.cursor_position();
        self.get_token()?;
        loop {
            let condition = self.execute_expression()?;
            if !self.truthy(&condition)? {
                self.go_to(follow)?;
                return Ok(());
            }
            self.get_token()?; // past DO
            self.execute_statement()?;
            self.go_to(test)?;
        }
    }

    /// `if expr then stmt [else stmt]` — the first marker points at the ELSE
    /// token when present, at the follow position otherwise.
    fn execute_if(&mut self) -> Result<(), RuntimeError> {
        let else_or_follow = self.get_location()?;
        self.get_token()?;
        let condition = self.execute_expression()?;
        let condition = self.truthy(&condition)?;
        self.get_token()?; // past THEN

        if condition {
            self.execute_statement()?;
            if self.token == TokenCode::Else {
                // Cursor sits on the ELSE branch's location marker.
                let follow = self.get_location()?;
                self.go_to(follow)?;
            }
        } else {
            self.go_to(else_or_follow)?;
            if self.token == TokenCode::Else {
                let _follow = self.get_location()?;
                self.get_token()?;
                self.execute_statement()?;
            }
        }
        Ok(())
    }

    /// `for var := expr to|downto expr do stmt` — the limit expression is
    /// re-evaluated on every iteration, as replaying the icode implies.
    fn execute_for(&mut self) -> Result<(), RuntimeError> {
        use crate::memory::value::Value;

        let follow = self.get_location()?;
        self.get_token()?; // control variable identifier

        let control = self.expect_node()?;
        let (address, control_type) = self.resolve_variable(control)?;
        self.get_token()?; // past :=

        let initial = self.execute_expression()?;
        self.store(&address, initial, control_type)?;

        let downto = self.token == TokenCode::Downto;
        let limit_position = self.cursor_position();
        self.get_token()?;

        loop {
            let limit = self.execute_expression()?;
            let limit = self.as_ordinal(&limit)?;
            let current_value = self.load(&address)?;
            let current = self.as_ordinal(&current_value)?;

            let continuing = if downto {
                current >= limit
            } else {
                current <= limit
            };
            if !continuing {
                self.go_to(follow)?;
                return Ok(());
            }

            self.get_token()?; // past DO
            self.execute_statement()?;

            let stepped = if downto {
                current.wrapping_sub(1)
            } else {
                current.wrapping_add(1)
            };
            let stepped = match current_value {
                Value::Character(_) => match char::from_u32(stepped.clamp(0, 0x10ffff) as u32)
                {
                    Some(ch) => Value::Character(ch),
                    None => return Err(self.kind_error("character", "ordinal")),
                },
                _ => Value::Integer(stepped),
            };
            // Unchecked write: the final overshooting step may leave a
            // subrange control variable one past its bound.
            self.write(&address, stepped)?;
            self.go_to(limit_position)?;
        }
    }

    /// `case expr of labels: stmt; ... end <table>` — the selector indexes
    /// the jump table the parser appended after END; no match is a runtime
    /// error, never a silent fall-through.
    fn execute_case(&mut self) -> Result<(), RuntimeError> {
        let table_position = self.get_location()?;
        self.get_token()?;
        let selector = self.execute_expression()?;
        let selector = self.as_ordinal(&selector)?;

        let (branch, follow) = self.case_branch(table_position, selector)?;
        match branch {
            Some(branch) => {
                self.go_to(branch)?;
                self.execute_statement()?;
                self.go_to(follow)?;
                Ok(())
            }
            None => Err(RuntimeError::InvalidCaseValue {
                value: selector,
                line: self.current_line(),
            }),
        }
    }
}
