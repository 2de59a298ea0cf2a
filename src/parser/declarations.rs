//! Declaration parsing: CONST, TYPE, VAR, and routine headers.
//!
//! Declarations are not emitted to the intermediate code; their entire effect
//! is on the symbol table and the type arena. Variables and parameters are
//! assigned frame slot offsets here, against the shared layout in
//! [`crate::memory::frame`], which the executor reads back verbatim.

use crate::errors::{Abort, ErrorCode};
use crate::memory::frame;
use crate::parser::Parser;
use crate::scanner::token::{TokenCode, TokenValue};
use crate::symtab::types::{TypeDesc, TypeForm, TypeId, ENUM_SIZE};
use crate::symtab::{ConstantValue, DefnKind, Definition, NodeId, RoutineInfo};

impl Parser {
    /// Parse the declaration part of a block, in the fixed CONST, TYPE, VAR,
    /// routines order. Returns the declared variables in declaration order.
    pub(crate) fn parse_declarations(&mut self) -> Result<Vec<NodeId>, Abort> {
        let mut locals = Vec::new();
        loop {
            match self.token_code() {
                TokenCode::Const => {
                    self.get_token()?;
                    self.parse_const_definitions()?;
                }
                TokenCode::Type => {
                    self.get_token()?;
                    self.parse_type_definitions()?;
                }
                TokenCode::Var => {
                    self.get_token()?;
                    self.parse_var_declarations(&mut locals)?;
                }
                TokenCode::Procedure | TokenCode::Function => {
                    self.parse_routine_declaration()?;
                }
                TokenCode::Label => {
                    self.flag(ErrorCode::UnimplementedFeature)?;
                    self.skip_past_semicolon()?;
                }
                _ => break,
            }
        }
        Ok(locals)
    }

    fn skip_past_semicolon(&mut self) -> Result<(), Abort> {
        while !matches!(
            self.token_code(),
            TokenCode::Semicolon | TokenCode::EndOfFile
        ) {
            self.get_token()?;
        }
        if self.token_code() == TokenCode::Semicolon {
            self.get_token()?;
        }
        Ok(())
    }

    // ===== CONST =====

    fn parse_const_definitions(&mut self) -> Result<(), Abort> {
        while self.token_code() == TokenCode::Identifier {
            let entered = self.enter_declaration()?;
            self.expect(TokenCode::Equal, ErrorCode::MissingEqual)?;
            let (value, type_id) = self.parse_constant()?;
            if let Some(id) = entered {
                let node = self.symtab.node_mut(id);
                node.defn = Definition::Constant(value);
                node.type_id = Some(type_id);
            }
            self.expect(TokenCode::Semicolon, ErrorCode::MissingSemicolon)?;
        }
        Ok(())
    }

    /// Enter the current identifier token into the local scope, flagging a
    /// redefinition. Consumes the identifier either way.
    fn enter_declaration(&mut self) -> Result<Option<NodeId>, Abort> {
        let name = self.token_text().to_string();
        let table = self.scopes.local_table();
        let level = self.scopes.level();
        let entered = match self.symtab.enter_new(table, &name, level) {
            Ok(id) => Some(id),
            Err(_) => {
                self.flag(ErrorCode::IdentifierRedefined)?;
                None
            }
        };
        self.get_token()?;
        Ok(entered)
    }

    /// Parse a constant: optionally signed number, character or string
    /// literal, or a previously declared constant identifier.
    pub(crate) fn parse_constant(&mut self) -> Result<(ConstantValue, TypeId), Abort> {
        let mut sign = 1i32;
        let mut signed = false;
        if matches!(self.token_code(), TokenCode::Plus | TokenCode::Minus) {
            signed = true;
            if self.token_code() == TokenCode::Minus {
                sign = -1;
            }
            self.get_token()?;
        }

        match self.token_code() {
            TokenCode::IntegerLiteral => {
                let value = match self.token.value {
                    TokenValue::Integer(v) => v,
                    _ => 0,
                };
                self.get_token()?;
                Ok((
                    ConstantValue::Integer(value.wrapping_mul(sign)),
                    self.types.integer,
                ))
            }
            TokenCode::RealLiteral => {
                let value = match self.token.value {
                    TokenValue::Real(v) => v,
                    _ => 0.0,
                };
                self.get_token()?;
                Ok((ConstantValue::Real(value * sign as f32), self.types.real))
            }
            TokenCode::StringLiteral => {
                if signed {
                    self.flag(ErrorCode::InvalidConstant)?;
                }
                let text = match &self.token.value {
                    TokenValue::Str(s) => s.clone(),
                    _ => String::new(),
                };
                self.get_token()?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => {
                        Ok((ConstantValue::Character(ch), self.types.character))
                    }
                    _ => {
                        let type_id = self.string_type(text.chars().count());
                        Ok((ConstantValue::Str(text), type_id))
                    }
                }
            }
            TokenCode::Identifier => {
                match self.scopes.search_all(&self.symtab, self.token_text()) {
                    Some(id) => {
                        let (value, type_id) = {
                            let node = self.symtab.node(id);
                            match &node.defn {
                                Definition::Constant(value) => (
                                    Some(value.clone()),
                                    node.type_id.unwrap_or(self.types.dummy),
                                ),
                                _ => (None, self.types.dummy),
                            }
                        };
                        self.get_token()?;
                        match value {
                            Some(ConstantValue::Integer(v)) => {
                                Ok((ConstantValue::Integer(v.wrapping_mul(sign)), type_id))
                            }
                            Some(ConstantValue::Real(v)) => {
                                Ok((ConstantValue::Real(v * sign as f32), type_id))
                            }
                            Some(value) => {
                                if signed {
                                    self.flag(ErrorCode::InvalidConstant)?;
                                }
                                Ok((value, type_id))
                            }
                            None => {
                                self.flag(ErrorCode::NotAConstantIdentifier)?;
                                Ok((ConstantValue::Integer(0), self.types.dummy))
                            }
                        }
                    }
                    None => {
                        self.flag(ErrorCode::UndefinedIdentifier)?;
                        self.get_token()?;
                        Ok((ConstantValue::Integer(0), self.types.dummy))
                    }
                }
            }
            _ => {
                self.flag(ErrorCode::InvalidConstant)?;
                Ok((ConstantValue::Integer(0), self.types.dummy))
            }
        }
    }

    // ===== TYPE =====

    fn parse_type_definitions(&mut self) -> Result<(), Abort> {
        while self.token_code() == TokenCode::Identifier {
            let entered = self.enter_declaration()?;
            self.expect(TokenCode::Equal, ErrorCode::MissingEqual)?;
            let type_id = self.parse_type_spec()?;
            if let Some(id) = entered {
                let node = self.symtab.node_mut(id);
                node.defn = Definition::Type;
                node.type_id = Some(type_id);
                if !self.types.is_dummy(type_id) && self.types.get(type_id).ident.is_none() {
                    self.types.get_mut(type_id).ident = Some(id);
                }
            }
            self.expect(TokenCode::Semicolon, ErrorCode::MissingSemicolon)?;
        }
        Ok(())
    }

    /// Parse a type specification: a type identifier, an enumeration, a
    /// subrange, an array, or a record.
    pub(crate) fn parse_type_spec(&mut self) -> Result<TypeId, Abort> {
        match self.token_code() {
            TokenCode::Identifier => {
                match self.scopes.search_all(&self.symtab, self.token_text()) {
                    Some(id) => match self.symtab.node(id).defn.kind() {
                        DefnKind::Type => {
                            let type_id =
                                self.symtab.node(id).type_id.unwrap_or(self.types.dummy);
                            self.get_token()?;
                            Ok(type_id)
                        }
                        DefnKind::Constant => self.parse_subrange_type(),
                        _ => {
                            self.flag(ErrorCode::NotATypeIdentifier)?;
                            self.get_token()?;
                            Ok(self.types.dummy)
                        }
                    },
                    None => {
                        self.flag(ErrorCode::UndefinedIdentifier)?;
                        self.get_token()?;
                        Ok(self.types.dummy)
                    }
                }
            }
            TokenCode::LParen => self.parse_enumeration_type(),
            TokenCode::IntegerLiteral
            | TokenCode::RealLiteral
            | TokenCode::StringLiteral
            | TokenCode::Plus
            | TokenCode::Minus => self.parse_subrange_type(),
            TokenCode::Array => self.parse_array_type(),
            TokenCode::Record => self.parse_record_type(),
            TokenCode::Set | TokenCode::File | TokenCode::Packed | TokenCode::UpArrow => {
                self.flag(ErrorCode::UnimplementedFeature)?;
                self.get_token()?;
                Ok(self.types.dummy)
            }
            _ => {
                self.flag(ErrorCode::InvalidType)?;
                Ok(self.types.dummy)
            }
        }
    }

    /// `( first, second, ... )` — constants get consecutive ordinals and are
    /// threaded in declaration order.
    fn parse_enumeration_type(&mut self) -> Result<TypeId, Abort> {
        let type_id = self.types.add(TypeDesc {
            form: TypeForm::Enumeration {
                constants: Vec::new(),
                max: -1,
            },
            size: ENUM_SIZE,
            ident: None,
        });
        self.get_token()?;

        let mut constants = Vec::new();
        let mut previous: Option<NodeId> = None;
        let mut ordinal = 0i32;
        loop {
            if self.token_code() == TokenCode::Identifier {
                let entered = self.enter_declaration()?;
                if let Some(id) = entered {
                    {
                        let node = self.symtab.node_mut(id);
                        node.defn = Definition::Constant(ConstantValue::Integer(ordinal));
                        node.type_id = Some(type_id);
                    }
                    if let Some(prev) = previous {
                        self.symtab.node_mut(prev).next = Some(id);
                    }
                    previous = Some(id);
                    constants.push(id);
                }
                ordinal += 1;
            } else {
                self.flag(ErrorCode::MissingIdentifier)?;
            }
            if self.token_code() == TokenCode::Comma {
                self.get_token()?;
            } else {
                break;
            }
        }
        self.expect(TokenCode::RParen, ErrorCode::MissingRightParen)?;

        if let TypeForm::Enumeration {
            constants: slot,
            max,
        } = &mut self.types.get_mut(type_id).form
        {
            *slot = constants;
            *max = ordinal - 1;
        }
        Ok(type_id)
    }

    /// `min .. max` over integer, character, or enumeration constants.
    fn parse_subrange_type(&mut self) -> Result<TypeId, Abort> {
        let (min_value, min_type) = self.parse_constant()?;
        self.expect(TokenCode::DotDot, ErrorCode::MissingDotDot)?;
        let (max_value, max_type) = self.parse_constant()?;

        if self.types.is_dummy(min_type) || self.types.is_dummy(max_type) {
            return Ok(self.types.dummy);
        }

        let min = constant_ordinal(&min_value);
        let max = constant_ordinal(&max_value);
        let base = self.types.base_type(min_type);
        let same_base = base == self.types.base_type(max_type);

        match (min, max) {
            (Some(min), Some(max)) if same_base && self.types.is_ordinal(base) => {
                let max = if min > max {
                    self.flag(ErrorCode::MinGtMax)?;
                    min
                } else {
                    max
                };
                let size = self.types.size(base);
                Ok(self.types.add(TypeDesc {
                    form: TypeForm::Subrange { base, min, max },
                    size,
                    ident: None,
                }))
            }
            _ => {
                self.flag(ErrorCode::InvalidSubrangeType)?;
                Ok(self.types.dummy)
            }
        }
    }

    /// `array [ index {, index} ] of element`; multiple index types nest
    /// right-to-left into arrays of arrays.
    fn parse_array_type(&mut self) -> Result<TypeId, Abort> {
        self.get_token()?;
        self.expect(TokenCode::LBracket, ErrorCode::MissingLeftBracket)?;

        let mut index_types = vec![self.parse_type_spec()?];
        while self.token_code() == TokenCode::Comma {
            self.get_token()?;
            index_types.push(self.parse_type_spec()?);
        }

        self.expect(TokenCode::RBracket, ErrorCode::MissingRightBracket)?;
        self.expect(TokenCode::Of, ErrorCode::MissingOf)?;

        let mut element = self.parse_type_spec()?;
        for index in index_types.into_iter().rev() {
            let (min_index, max_index, count) = match self.index_bounds(index) {
                Some(bounds) => bounds,
                None => {
                    if !self.types.is_dummy(index) {
                        self.flag(ErrorCode::InvalidIndexType)?;
                    }
                    (0, -1, 0)
                }
            };
            let size = count * self.types.size(element);
            element = self.types.add(TypeDesc {
                form: TypeForm::Array {
                    index,
                    element,
                    count,
                    min_index,
                    max_index,
                },
                size,
                ident: None,
            });
        }
        Ok(element)
    }

    /// Index bounds of a bounded ordinal type. Plain `integer` is unbounded
    /// and therefore not a valid index type.
    fn index_bounds(&self, index: TypeId) -> Option<(i32, i32, usize)> {
        use crate::symtab::types::ScalarKind;
        match &self.types.get(index).form {
            TypeForm::Subrange { min, max, .. } => {
                Some((*min, *max, (*max - *min + 1).max(0) as usize))
            }
            TypeForm::Enumeration { max, .. } => Some((0, *max, (*max + 1).max(0) as usize)),
            TypeForm::Scalar(ScalarKind::Character) => Some((0, 255, 256)),
            _ => None,
        }
    }

    /// `record field-groups end`; fields live in their own scope table and
    /// get record-relative offsets.
    fn parse_record_type(&mut self) -> Result<TypeId, Abort> {
        self.get_token()?;
        let fields = self.symtab.new_table();
        let level = self.scopes.level();

        let mut first_field: Option<NodeId> = None;
        let mut previous: Option<NodeId> = None;
        let mut offset = 0usize;
        let mut total_size = 0usize;

        while self.token_code() == TokenCode::Identifier {
            let mut group = Vec::new();
            loop {
                if self.token_code() == TokenCode::Identifier {
                    let name = self.token_text().to_string();
                    match self.symtab.enter_new(fields, &name, level) {
                        Ok(id) => group.push(id),
                        Err(_) => self.flag(ErrorCode::IdentifierRedefined)?,
                    }
                    self.get_token()?;
                } else {
                    self.flag(ErrorCode::MissingIdentifier)?;
                }
                if self.token_code() == TokenCode::Comma {
                    self.get_token()?;
                } else {
                    break;
                }
            }
            self.expect(TokenCode::Colon, ErrorCode::MissingColon)?;
            let field_type = self.parse_type_spec()?;
            for id in group {
                {
                    let node = self.symtab.node_mut(id);
                    node.defn = Definition::Field { offset };
                    node.type_id = Some(field_type);
                }
                offset += 1;
                total_size += self.types.size(field_type);
                if let Some(prev) = previous {
                    self.symtab.node_mut(prev).next = Some(id);
                }
                if first_field.is_none() {
                    first_field = Some(id);
                }
                previous = Some(id);
            }
            if self.token_code() == TokenCode::Semicolon {
                self.get_token()?;
            } else {
                break;
            }
        }

        self.expect(TokenCode::End, ErrorCode::MissingEnd)?;
        Ok(self.types.add(TypeDesc {
            form: TypeForm::Record {
                fields,
                first_field,
            },
            size: total_size,
            ident: None,
        }))
    }

    // ===== VAR =====

    fn parse_var_declarations(&mut self, locals: &mut Vec<NodeId>) -> Result<(), Abort> {
        while self.token_code() == TokenCode::Identifier {
            let mut group = Vec::new();
            loop {
                if self.token_code() == TokenCode::Identifier {
                    if let Some(id) = self.enter_declaration()? {
                        group.push(id);
                    }
                } else {
                    self.flag(ErrorCode::MissingIdentifier)?;
                }
                if self.token_code() == TokenCode::Comma {
                    self.get_token()?;
                } else {
                    break;
                }
            }
            self.expect(TokenCode::Colon, ErrorCode::MissingColon)?;
            let var_type = self.parse_type_spec()?;
            for id in &group {
                let offset = self.next_offset;
                self.next_offset += 1;
                let node = self.symtab.node_mut(*id);
                node.defn = Definition::Variable { offset };
                node.type_id = Some(var_type);
            }
            locals.extend(group);
            self.expect(TokenCode::Semicolon, ErrorCode::MissingSemicolon)?;
        }
        Ok(())
    }

    // ===== Routines =====

    /// `procedure name (formals); block;` or
    /// `function name (formals): result; block;`
    fn parse_routine_declaration(&mut self) -> Result<(), Abort> {
        let is_function = self.token_code() == TokenCode::Function;
        self.get_token()?;

        let level = self.scopes.level();
        let routine_id = if self.token_code() == TokenCode::Identifier {
            let name = self.token_text().to_string();
            let table = self.scopes.local_table();
            let id = match self.symtab.enter_new(table, &name, level) {
                Ok(id) => id,
                Err(_) => {
                    self.flag(ErrorCode::IdentifierRedefined)?;
                    self.symtab.orphan(&name, level)
                }
            };
            self.get_token()?;
            id
        } else {
            self.flag(ErrorCode::MissingIdentifier)?;
            self.symtab.orphan("anonymous", level)
        };

        let scope = self.symtab.new_table();
        let info = Box::new(RoutineInfo::declared(scope));
        self.symtab.node_mut(routine_id).defn = if is_function {
            Definition::Function(info)
        } else {
            Definition::Procedure(info)
        };

        self.scopes.enter_scope(scope)?;
        let saved_offset = self.next_offset;
        self.next_offset = frame::HEADER_SIZE;

        let mut params = Vec::new();
        if self.token_code() == TokenCode::LParen {
            self.parse_formal_parameters(&mut params)?;
        }
        for window in params.windows(2) {
            self.symtab.node_mut(window[0]).next = Some(window[1]);
        }
        if let Some(info) = self.symtab.node_mut(routine_id).defn.routine_mut() {
            info.first_param = params.first().copied();
            info.param_count = params.len();
        }

        if is_function {
            self.expect(TokenCode::Colon, ErrorCode::MissingColon)?;
            let result_type = self.parse_result_type()?;
            self.symtab.node_mut(routine_id).type_id = Some(result_type);
        }

        self.expect(TokenCode::Semicolon, ErrorCode::MissingSemicolon)?;
        self.parse_block(routine_id)?;
        self.scopes.exit_scope();
        self.next_offset = saved_offset;

        self.expect(TokenCode::Semicolon, ErrorCode::MissingSemicolon)?;
        Ok(())
    }

    /// `( [var] name {, name} : type-identifier {; ...} )`
    fn parse_formal_parameters(&mut self, params: &mut Vec<NodeId>) -> Result<(), Abort> {
        self.get_token()?;
        loop {
            let is_var = if self.token_code() == TokenCode::Var {
                self.get_token()?;
                true
            } else {
                false
            };

            let mut group = Vec::new();
            loop {
                if self.token_code() == TokenCode::Identifier {
                    if let Some(id) = self.enter_declaration()? {
                        group.push(id);
                    }
                } else {
                    self.flag(ErrorCode::MissingIdentifier)?;
                }
                if self.token_code() == TokenCode::Comma {
                    self.get_token()?;
                } else {
                    break;
                }
            }

            self.expect(TokenCode::Colon, ErrorCode::MissingColon)?;
            let param_type = self.parse_result_type()?;

            for id in &group {
                let offset = self.next_offset;
                self.next_offset += 1;
                let node = self.symtab.node_mut(*id);
                node.defn = if is_var {
                    Definition::VarParam { offset }
                } else {
                    Definition::ValueParam { offset }
                };
                node.type_id = Some(param_type);
            }
            params.extend(group);

            if self.token_code() == TokenCode::Semicolon {
                self.get_token()?;
            } else {
                break;
            }
        }
        self.expect(TokenCode::RParen, ErrorCode::MissingRightParen)?;
        Ok(())
    }

    /// Parameter and function result types must be type identifiers.
    fn parse_result_type(&mut self) -> Result<TypeId, Abort> {
        if self.token_code() == TokenCode::Identifier {
            match self.scopes.search_all(&self.symtab, self.token_text()) {
                Some(id) if self.symtab.node(id).defn.kind() == DefnKind::Type => {
                    let type_id = self.symtab.node(id).type_id.unwrap_or(self.types.dummy);
                    self.get_token()?;
                    Ok(type_id)
                }
                Some(_) => {
                    self.flag(ErrorCode::NotATypeIdentifier)?;
                    self.get_token()?;
                    Ok(self.types.dummy)
                }
                None => {
                    self.flag(ErrorCode::UndefinedIdentifier)?;
                    self.get_token()?;
                    Ok(self.types.dummy)
                }
            }
        } else {
            self.flag(ErrorCode::MissingIdentifier)?;
            Ok(self.types.dummy)
        }
    }
}

fn constant_ordinal(value: &ConstantValue) -> Option<i32> {
    match value {
        ConstantValue::Integer(v) => Some(*v),
        ConstantValue::Character(ch) => Some(*ch as i32),
        _ => None,
    }
}
