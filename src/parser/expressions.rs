//! Expression parsing with on-the-fly type checking.
//!
//! Classic stratified grammar: `expression` (one optional relational
//! operator) over `simple_expression` (unary sign, `+ - OR`) over `term`
//! (`* / DIV MOD AND`) over `factor`. Each level consumes exactly the tokens
//! of its own precedence, so no operator-precedence table exists anywhere.
//!
//! Every consumed token is appended to the current icode buffer; identifier
//! and literal tokens are followed by their symbol-table node reference.

use crate::errors::{Abort, ErrorCode};
use crate::parser::Parser;
use crate::scanner::token::TokenCode;
use crate::symtab::types::{TypeForm, TypeId};
use crate::symtab::{DefnKind, NodeId, RoutineCode, StandardRoutine};

const REL_OPS: &[TokenCode] = &[
    TokenCode::Equal,
    TokenCode::Ne,
    TokenCode::Lt,
    TokenCode::Le,
    TokenCode::Gt,
    TokenCode::Ge,
];

impl Parser {
    /// expression := simple-expression [ relop simple-expression ]
    pub(crate) fn parse_expression(&mut self) -> Result<TypeId, Abort> {
        let left = self.parse_simple_expression()?;
        if REL_OPS.contains(&self.token_code()) {
            self.emit_current()?;
            self.get_token()?;
            let right = self.parse_simple_expression()?;
            if !self.types.are_comparison_compatible(left, right) {
                self.flag(ErrorCode::IncompatibleTypes)?;
            }
            return Ok(self.types.boolean);
        }
        Ok(left)
    }

    /// simple-expression := [ + | - ] term { ( + | - | OR ) term }
    fn parse_simple_expression(&mut self) -> Result<TypeId, Abort> {
        let signed = matches!(self.token_code(), TokenCode::Plus | TokenCode::Minus);
        if signed {
            self.emit_current()?;
            self.get_token()?;
        }

        let mut result = self.parse_term()?;
        if signed && !self.is_numeric(result) && !self.types.is_dummy(result) {
            self.flag(ErrorCode::IncompatibleTypes)?;
        }

        loop {
            match self.token_code() {
                TokenCode::Plus | TokenCode::Minus => {
                    self.emit_current()?;
                    self.get_token()?;
                    let operand = self.parse_term()?;
                    result = self.arithmetic_result(result, operand)?;
                }
                TokenCode::Or => {
                    self.emit_current()?;
                    self.get_token()?;
                    let operand = self.parse_term()?;
                    self.check_boolean(result)?;
                    self.check_boolean(operand)?;
                    result = self.types.boolean;
                }
                _ => break,
            }
        }
        Ok(result)
    }

    /// term := factor { ( * | / | DIV | MOD | AND ) factor }
    fn parse_term(&mut self) -> Result<TypeId, Abort> {
        let mut result = self.parse_factor()?;
        loop {
            match self.token_code() {
                TokenCode::Star => {
                    self.emit_current()?;
                    self.get_token()?;
                    let operand = self.parse_factor()?;
                    result = self.arithmetic_result(result, operand)?;
                }
                TokenCode::Slash => {
                    self.emit_current()?;
                    self.get_token()?;
                    let operand = self.parse_factor()?;
                    if !(self.is_numeric_or_dummy(result) && self.is_numeric_or_dummy(operand))
                    {
                        self.flag(ErrorCode::IncompatibleTypes)?;
                    }
                    result = self.types.real;
                }
                TokenCode::Div | TokenCode::Mod => {
                    self.emit_current()?;
                    self.get_token()?;
                    let operand = self.parse_factor()?;
                    if !(self.is_integer_or_dummy(result)
                        && self.is_integer_or_dummy(operand))
                    {
                        self.flag(ErrorCode::IncompatibleTypes)?;
                    }
                    result = self.types.integer;
                }
                TokenCode::And => {
                    self.emit_current()?;
                    self.get_token()?;
                    let operand = self.parse_factor()?;
                    self.check_boolean(result)?;
                    self.check_boolean(operand)?;
                    result = self.types.boolean;
                }
                _ => break,
            }
        }
        Ok(result)
    }

    /// factor := literal | identifier | NOT factor | ( expression )
    fn parse_factor(&mut self) -> Result<TypeId, Abort> {
        match self.token_code() {
            TokenCode::IntegerLiteral
            | TokenCode::RealLiteral
            | TokenCode::StringLiteral => {
                let (id, type_id) = self.literal_node()?;
                self.emit_current()?;
                self.builder.put_node(id)?;
                self.get_token()?;
                Ok(type_id)
            }
            TokenCode::Identifier => self.parse_identifier_factor(),
            TokenCode::Not => {
                self.emit_current()?;
                self.get_token()?;
                let operand = self.parse_factor()?;
                self.check_boolean(operand)?;
                Ok(self.types.boolean)
            }
            TokenCode::LParen => {
                self.emit_current()?;
                self.get_token()?;
                let inner = self.parse_expression()?;
                self.emit_expect(TokenCode::RParen, ErrorCode::MissingRightParen)?;
                Ok(inner)
            }
            TokenCode::Nil => {
                self.flag(ErrorCode::UnimplementedFeature)?;
                self.get_token()?;
                Ok(self.types.dummy)
            }
            _ => {
                self.flag(ErrorCode::InvalidExpression)?;
                Ok(self.types.dummy)
            }
        }
    }

    fn parse_identifier_factor(&mut self) -> Result<TypeId, Abort> {
        let found = self.scopes.search_all(&self.symtab, self.token_text());
        let id = match found {
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

        match self.symtab.node(id).defn.kind() {
            DefnKind::Constant => {
                let type_id = self.symtab.node(id).type_id.unwrap_or(self.types.dummy);
                self.emit_current()?;
                self.builder.put_node(id)?;
                self.get_token()?;
                Ok(type_id)
            }
            DefnKind::Function => {
                self.emit_current()?;
                self.builder.put_node(id)?;
                self.get_token()?;
                self.parse_call(id)
            }
            DefnKind::Procedure => {
                self.flag(ErrorCode::InvalidExpression)?;
                self.get_token()?;
                let _ = self.parse_call(id)?;
                Ok(self.types.dummy)
            }
            DefnKind::Type | DefnKind::Program => {
                self.flag(ErrorCode::InvalidExpression)?;
                self.get_token()?;
                Ok(self.types.dummy)
            }
            _ => {
                self.emit_current()?;
                self.builder.put_node(id)?;
                self.get_token()?;
                self.parse_variable_suffix(id)
            }
        }
    }

    /// Subscripts and field designators after a variable identifier. The
    /// identifier itself has already been emitted and consumed.
    pub(crate) fn parse_variable_suffix(&mut self, id: NodeId) -> Result<TypeId, Abort> {
        let mut result = self.symtab.node(id).type_id.unwrap_or(self.types.dummy);
        loop {
            match self.token_code() {
                TokenCode::LBracket => {
                    self.emit_current()?;
                    self.get_token()?;
                    loop {
                        let index_type = self.parse_expression()?;
                        let base = self.types.base_type(result);
                        result = match &self.types.get(base).form {
                            TypeForm::Array { index, element, .. } => {
                                let (index, element) = (*index, *element);
                                if !self.types.are_comparison_compatible(index, index_type) {
                                    self.flag(ErrorCode::IncompatibleTypes)?;
                                }
                                element
                            }
                            TypeForm::Dummy => self.types.dummy,
                            _ => {
                                self.flag(ErrorCode::TooManySubscripts)?;
                                self.types.dummy
                            }
                        };
                        if self.token_code() == TokenCode::Comma {
                            self.emit_current()?;
                            self.get_token()?;
                        } else {
                            break;
                        }
                    }
                    self.emit_expect(TokenCode::RBracket, ErrorCode::MissingRightBracket)?;
                }
                TokenCode::Period => {
                    let base = self.types.base_type(result);
                    match &self.types.get(base).form {
                        TypeForm::Record { fields, .. } => {
                            let fields = *fields;
                            self.emit_current()?;
                            self.get_token()?;
                            if self.token_code() == TokenCode::Identifier {
                                match self.symtab.search(fields, self.token_text()) {
                                    Some(field) => {
                                        self.emit_current()?;
                                        self.builder.put_node(field)?;
                                        result = self
                                            .symtab
                                            .node(field)
                                            .type_id
                                            .unwrap_or(self.types.dummy);
                                        self.get_token()?;
                                    }
                                    None => {
                                        self.flag(ErrorCode::InvalidField)?;
                                        self.get_token()?;
                                        result = self.types.dummy;
                                    }
                                }
                            } else {
                                self.flag(ErrorCode::MissingIdentifier)?;
                                result = self.types.dummy;
                            }
                        }
                        TypeForm::Dummy => {
                            self.get_token()?;
                            if self.token_code() == TokenCode::Identifier {
                                self.get_token()?;
                            }
                        }
                        _ => {
                            self.flag(ErrorCode::NotARecordVariable)?;
                            self.get_token()?;
                            if self.token_code() == TokenCode::Identifier {
                                self.get_token()?;
                            }
                            result = self.types.dummy;
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(result)
    }

    /// An actual-parameter list (possibly absent) for a declared or standard
    /// routine. The routine identifier has already been emitted and consumed.
    /// Returns the call's result type (dummy for procedures).
    pub(crate) fn parse_call(&mut self, routine_id: NodeId) -> Result<TypeId, Abort> {
        let (code, first_param, param_count, result_type) = {
            let node = self.symtab.node(routine_id);
            match node.defn.routine() {
                Some(info) => (
                    info.code,
                    info.first_param,
                    info.param_count,
                    node.type_id,
                ),
                None => (RoutineCode::Declared, None, 0, None),
            }
        };

        if let RoutineCode::Standard(routine) = code {
            return self.parse_standard_call(routine);
        }

        let formals: Vec<NodeId> = self.symtab.chain(first_param).collect();
        let mut supplied = 0usize;

        if self.token_code() == TokenCode::LParen {
            self.emit_current()?;
            self.get_token()?;
            loop {
                match formals.get(supplied).copied() {
                    Some(formal) => {
                        let (kind, formal_type) = {
                            let node = self.symtab.node(formal);
                            (node.defn.kind(), node.type_id)
                        };
                        if kind == DefnKind::VarParam {
                            self.parse_var_actual(formal_type)?;
                        } else {
                            let actual = self.parse_expression()?;
                            if let Some(formal_type) = formal_type {
                                if !self.types.is_assignment_compatible(formal_type, actual)
                                {
                                    self.flag(ErrorCode::IncompatibleTypes)?;
                                }
                            }
                        }
                    }
                    None => {
                        // Extra actuals: parse for recovery, count mismatch
                        // flagged below.
                        let _ = self.parse_expression()?;
                    }
                }
                supplied += 1;
                if self.token_code() == TokenCode::Comma {
                    self.emit_current()?;
                    self.get_token()?;
                } else {
                    break;
                }
            }
            self.emit_expect(TokenCode::RParen, ErrorCode::MissingRightParen)?;
        }

        if supplied != param_count {
            self.flag(ErrorCode::WrongNumberOfArguments)?;
        }
        Ok(result_type.unwrap_or(self.types.dummy))
    }

    /// A VAR actual must be a variable of the identical type.
    fn parse_var_actual(&mut self, formal_type: Option<TypeId>) -> Result<(), Abort> {
        if self.token_code() != TokenCode::Identifier {
            self.flag(ErrorCode::InvalidVarParm)?;
            let _ = self.parse_expression()?;
            return Ok(());
        }
        match self.scopes.search_all(&self.symtab, self.token_text()) {
            Some(id) if self.symtab.node(id).defn.kind().is_data() => {
                self.emit_current()?;
                self.builder.put_node(id)?;
                self.get_token()?;
                let actual = self.parse_variable_suffix(id)?;
                if let Some(formal_type) = formal_type {
                    if formal_type != actual
                        && !self.types.is_dummy(formal_type)
                        && !self.types.is_dummy(actual)
                    {
                        self.flag(ErrorCode::IncompatibleTypes)?;
                    }
                }
            }
            Some(_) => {
                self.flag(ErrorCode::InvalidVarParm)?;
                self.get_token()?;
            }
            None => {
                self.flag(ErrorCode::UndefinedIdentifier)?;
                let table = self.scopes.local_table();
                let level = self.scopes.level();
                let name = self.token_text().to_string();
                let id = self.symtab.enter(table, &name, level);
                self.symtab.node_mut(id).type_id = Some(self.types.dummy);
                self.get_token()?;
            }
        }
        Ok(())
    }

    /// Argument rules for the predefined routines.
    fn parse_standard_call(&mut self, routine: StandardRoutine) -> Result<TypeId, Abort> {
        use StandardRoutine::*;
        match routine {
            Write | Writeln => {
                if self.token_code() == TokenCode::LParen {
                    self.emit_current()?;
                    self.get_token()?;
                    loop {
                        let arg = self.parse_expression()?;
                        if !self.is_writable(arg) {
                            self.flag(ErrorCode::IncompatibleTypes)?;
                        }
                        if self.token_code() == TokenCode::Comma {
                            self.emit_current()?;
                            self.get_token()?;
                        } else {
                            break;
                        }
                    }
                    self.emit_expect(TokenCode::RParen, ErrorCode::MissingRightParen)?;
                }
                Ok(self.types.dummy)
            }
            Read | Readln => {
                if self.token_code() == TokenCode::LParen {
                    self.emit_current()?;
                    self.get_token()?;
                    loop {
                        self.parse_read_target()?;
                        if self.token_code() == TokenCode::Comma {
                            self.emit_current()?;
                            self.get_token()?;
                        } else {
                            break;
                        }
                    }
                    self.emit_expect(TokenCode::RParen, ErrorCode::MissingRightParen)?;
                }
                Ok(self.types.dummy)
            }
            _ => self.parse_standard_function(routine),
        }
    }

    fn parse_read_target(&mut self) -> Result<(), Abort> {
        if self.token_code() != TokenCode::Identifier {
            self.flag(ErrorCode::InvalidTarget)?;
            return Ok(());
        }
        match self.scopes.search_all(&self.symtab, self.token_text()) {
            Some(id) if self.symtab.node(id).defn.kind().is_data() => {
                self.emit_current()?;
                self.builder.put_node(id)?;
                self.get_token()?;
                let target = self.parse_variable_suffix(id)?;
                let readable = self.types.is_integer(target)
                    || self.types.is_real(target)
                    || self.types.is_char(target)
                    || self.types.is_dummy(target);
                if !readable {
                    self.flag(ErrorCode::IncompatibleTypes)?;
                }
            }
            Some(_) => {
                self.flag(ErrorCode::InvalidTarget)?;
                self.get_token()?;
            }
            None => {
                self.flag(ErrorCode::UndefinedIdentifier)?;
                let table = self.scopes.local_table();
                let level = self.scopes.level();
                let name = self.token_text().to_string();
                let id = self.symtab.enter(table, &name, level);
                self.symtab.node_mut(id).type_id = Some(self.types.dummy);
                self.get_token()?;
            }
        }
        Ok(())
    }

    /// One-argument standard functions; checks the argument type and yields
    /// the function's result type.
    fn parse_standard_function(&mut self, routine: StandardRoutine) -> Result<TypeId, Abort> {
        use StandardRoutine::*;

        let mut arg = self.types.dummy;
        let mut count = 0usize;
        if self.token_code() == TokenCode::LParen {
            self.emit_current()?;
            self.get_token()?;
            loop {
                let parsed = self.parse_expression()?;
                if count == 0 {
                    arg = parsed;
                }
                count += 1;
                if self.token_code() == TokenCode::Comma {
                    self.emit_current()?;
                    self.get_token()?;
                } else {
                    break;
                }
            }
            self.emit_expect(TokenCode::RParen, ErrorCode::MissingRightParen)?;
        }
        if count != 1 {
            self.flag(ErrorCode::WrongNumberOfArguments)?;
        }

        let dummy = self.types.is_dummy(arg);
        match routine {
            Abs | Sqr => {
                if dummy {
                    Ok(self.types.dummy)
                } else if self.types.is_integer(arg) {
                    Ok(self.types.integer)
                } else if self.types.is_real(arg) {
                    Ok(self.types.real)
                } else {
                    self.flag(ErrorCode::IncompatibleTypes)?;
                    Ok(self.types.dummy)
                }
            }
            ArcTan | Cos | Exp | Ln | Sin | Sqrt => {
                if !self.is_numeric_or_dummy(arg) {
                    self.flag(ErrorCode::IncompatibleTypes)?;
                }
                Ok(self.types.real)
            }
            Odd => {
                if !self.is_integer_or_dummy(arg) {
                    self.flag(ErrorCode::IncompatibleTypes)?;
                }
                Ok(self.types.boolean)
            }
            Ord => {
                if !self.types.is_ordinal(arg) && !dummy {
                    self.flag(ErrorCode::IncompatibleTypes)?;
                }
                Ok(self.types.integer)
            }
            Chr => {
                if !self.is_integer_or_dummy(arg) {
                    self.flag(ErrorCode::IncompatibleTypes)?;
                }
                Ok(self.types.character)
            }
            Pred | Succ => {
                if !self.types.is_ordinal(arg) && !dummy {
                    self.flag(ErrorCode::IncompatibleTypes)?;
                    Ok(self.types.dummy)
                } else {
                    Ok(arg)
                }
            }
            Round | Trunc => {
                if !self.types.is_real(arg) && !dummy {
                    self.flag(ErrorCode::IncompatibleTypes)?;
                }
                Ok(self.types.integer)
            }
            Read | Readln | Write | Writeln => unreachable!("handled by parse_standard_call"),
        }
    }

    // ===== Small type predicates =====

    fn is_numeric(&self, type_id: TypeId) -> bool {
        self.types.is_integer(type_id) || self.types.is_real(type_id)
    }

    fn is_numeric_or_dummy(&self, type_id: TypeId) -> bool {
        self.is_numeric(type_id) || self.types.is_dummy(type_id)
    }

    fn is_integer_or_dummy(&self, type_id: TypeId) -> bool {
        self.types.is_integer(type_id) || self.types.is_dummy(type_id)
    }

    fn is_writable(&self, type_id: TypeId) -> bool {
        self.is_numeric(type_id)
            || self.types.is_char(type_id)
            || self.types.is_boolean(type_id)
            || self.types.char_array_length(self.types.base_type(type_id)).is_some()
            || self.types.is_dummy(type_id)
    }

    /// Integer-or-real pair rules for `+ - *`.
    fn arithmetic_result(&mut self, left: TypeId, right: TypeId) -> Result<TypeId, Abort> {
        if self.types.is_dummy(left) || self.types.is_dummy(right) {
            return Ok(self.types.dummy);
        }
        if self.types.is_integer(left) && self.types.is_integer(right) {
            return Ok(self.types.integer);
        }
        if self.is_numeric(left) && self.is_numeric(right) {
            return Ok(self.types.real);
        }
        self.flag(ErrorCode::IncompatibleTypes)?;
        Ok(self.types.dummy)
    }
}
