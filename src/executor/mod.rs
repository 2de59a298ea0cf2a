//! The executor: a second walk over the intermediate code.
//!
//! Execution mirrors the parser's recursive structure — one method per
//! construct, reading the same token stream the parser emitted — but instead
//! of checking, it computes. Control flow repositions the icode cursor
//! through the location markers the parser fixed up; calls push activation
//! frames laid out exactly as [`crate::memory::frame`] describes, with the
//! static link chased through enclosing activations for non-local access.
//!
//! All runtime failures are fatal to the interpreted program and carry the
//! current source line (maintained by the icode line markers); the driver
//! adds the executed-statement count.

pub mod builtins;
pub mod errors;
pub mod expressions;
pub mod io;
pub mod statements;

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::icode::{Icode, IcodeItem};
use crate::memory::frame;
use crate::memory::stack::RuntimeStack;
use crate::memory::value::{AccessStep, Address, Value};
use crate::parser::Translation;
use crate::scanner::token::TokenCode;
use crate::symtab::types::{TypeForm, TypeId, TypeTable};
use crate::symtab::{ConstantValue, DefnKind, NodeId, RoutineCode, Symtab};
use errors::RuntimeError;
use io::RuntimeConsole;

/// Executor context: the translated program, the runtime stack, and the
/// replay cursor into the current routine's intermediate code.
pub struct Executor<'a> {
    symtab: &'a Symtab,
    types: &'a TypeTable,
    program: NodeId,

    stack: RuntimeStack,
    console: RuntimeConsole,

    code: Rc<Icode>,
    cursor: usize,
    token: TokenCode,
    current_node: Option<NodeId>,
    current_line: u32,

    frame_base: usize,
    frame_level: usize,
    statement_count: u64,
}

impl<'a> Executor<'a> {
    pub fn new(translation: &'a Translation, console: RuntimeConsole) -> Self {
        let program = translation.program;
        let code = translation
            .symtab
            .node(program)
            .defn
            .routine()
            .and_then(|info| info.icode.clone())
            .unwrap_or_default();

        Executor {
            symtab: &translation.symtab,
            types: &translation.types,
            program,
            stack: RuntimeStack::new(),
            console,
            code,
            cursor: 0,
            token: TokenCode::EndOfFile,
            current_node: None,
            current_line: 1,
            frame_base: 0,
            frame_level: 1,
            statement_count: 0,
        }
    }

    /// Run the program to completion.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let first_local = self
            .symtab
            .node(self.program)
            .defn
            .routine()
            .and_then(|info| info.first_local);

        // The program's own frame sits at the stack bottom; its links point
        // at itself.
        self.push_value(Value::Uninitialized)?;
        self.push_value(Value::Location(0))?;
        self.push_value(Value::Location(0))?;
        self.push_value(Value::Location(0))?;
        let locals: Vec<NodeId> = self.symtab.chain(first_local).collect();
        for local in locals {
            let local_type = self.node_type(local);
            let value = self.allocate_value(local_type);
            self.push_value(value)?;
        }
        self.frame_base = 0;
        self.frame_level = 1;

        self.cursor = 0;
        self.get_token()?;
        if self.token == TokenCode::Begin {
            self.execute_statement()?;
        }

        self.stack.truncate(0);
        Ok(())
    }

    /// Captured program output.
    pub fn output(&self) -> &str {
        self.console.output()
    }

    /// Statements executed so far, for runtime diagnostics.
    pub fn statement_count(&self) -> u64 {
        self.statement_count
    }

    // ===== Icode replay =====

    /// Fetch the next token from the intermediate code, recording line
    /// markers and the node reference following identifier/literal codes.
    /// Past the end of the buffer this yields an end-of-file pseudo-token.
    pub(crate) fn get_token(&mut self) -> Result<(), RuntimeError> {
        let code = Rc::clone(&self.code);
        loop {
            match code.item(self.cursor) {
                None => {
                    self.token = TokenCode::EndOfFile;
                    self.current_node = None;
                    return Ok(());
                }
                Some(IcodeItem::LineMarker(line)) => {
                    self.current_line = *line;
                    self.cursor += 1;
                }
                Some(IcodeItem::Code(token)) => {
                    self.cursor += 1;
                    if token.has_node() {
                        match code.item(self.cursor) {
                            Some(IcodeItem::Node(id)) => {
                                self.current_node = Some(*id);
                                self.cursor += 1;
                            }
                            _ => self.current_node = None,
                        }
                    }
                    self.token = *token;
                    return Ok(());
                }
                Some(IcodeItem::Location(_))
                | Some(IcodeItem::CaseTable(_))
                | Some(IcodeItem::Node(_)) => {
                    return Err(self.kind_error("token", "marker"));
                }
            }
        }
    }

    /// Read the location marker at the cursor.
    pub(crate) fn get_location(&mut self) -> Result<usize, RuntimeError> {
        let code = Rc::clone(&self.code);
        loop {
            match code.item(self.cursor) {
                Some(IcodeItem::LineMarker(line)) => {
                    self.current_line = *line;
                    self.cursor += 1;
                }
                Some(IcodeItem::Location(target)) => {
                    self.cursor += 1;
                    return Ok(*target);
                }
                _ => return Err(self.kind_error("location marker", "other item")),
            }
        }
    }

    /// Reposition the cursor and fetch the token there.
    pub(crate) fn go_to(&mut self, position: usize) -> Result<(), RuntimeError> {
        self.cursor = position;
        self.get_token()
    }

    /// The current replay position (the next item to be read).
    pub(crate) fn cursor_position(&self) -> usize {
        self.cursor
    }

    /// The CASE jump table at `position`: the matching branch target (if
    /// any) and the follow position just past the table.
    pub(crate) fn case_branch(
        &mut self,
        position: usize,
        selector: i32,
    ) -> Result<(Option<usize>, usize), RuntimeError> {
        let code = Rc::clone(&self.code);
        let mut position = position;
        loop {
            match code.item(position) {
                Some(IcodeItem::LineMarker(_)) => position += 1,
                Some(IcodeItem::CaseTable(table)) => {
                    return Ok((table.get(&selector).copied(), position + 1));
                }
                _ => return Err(self.kind_error("jump table", "other item")),
            }
        }
    }

    /// The node reference attached to the current token.
    pub(crate) fn expect_node(&self) -> Result<NodeId, RuntimeError> {
        self.current_node
            .ok_or_else(|| self.kind_error("node reference", "none"))
    }

    // ===== Frames and addressing =====

    pub(crate) fn push_value(&mut self, value: Value) -> Result<usize, RuntimeError> {
        self.stack.push(value).map_err(|_| RuntimeError::StackOverflow {
            line: self.current_line,
        })
    }

    /// Follow the static-link chain `hops` frames out.
    fn chase_static_links(&self, hops: usize) -> Result<usize, RuntimeError> {
        let mut base = self.frame_base;
        for _ in 0..hops {
            base = self
                .stack
                .get(base + frame::STATIC_LINK)
                .as_location()
                .ok_or_else(|| self.kind_error("location", "non-link slot"))?;
        }
        Ok(base)
    }

    /// Resolve the variable designated by the current identifier token,
    /// consuming its subscript and field tokens. Returns the address and the
    /// designated type.
    pub(crate) fn resolve_variable(
        &mut self,
        id: NodeId,
    ) -> Result<(Address, TypeId), RuntimeError> {
        let node = self.symtab.node(id);
        let kind = node.defn.kind();
        let node_level = node.level;
        let offset = node.defn.offset().unwrap_or(0);
        let mut type_id = node.type_id.unwrap_or(self.types.dummy);

        let mut address = match kind {
            DefnKind::Variable | DefnKind::ValueParam | DefnKind::VarParam => {
                let hops = self
                    .frame_level
                    .checked_sub(node_level)
                    .ok_or_else(|| self.kind_error("visible frame", "deeper level"))?;
                let base = self.chase_static_links(hops)?;
                let address = Address::slot(base + offset);
                if kind == DefnKind::VarParam {
                    match self.stack.get(address.slot) {
                        Value::Address(target) => target.clone(),
                        other => {
                            return Err(self.kind_error("address", other.kind_name()))
                        }
                    }
                } else {
                    address
                }
            }
            DefnKind::Function => {
                // Assignment to the function's own return slot, possibly
                // from a nested routine.
                let hops = self
                    .frame_level
                    .checked_sub(node_level + 1)
                    .ok_or_else(|| self.kind_error("function frame", "outer level"))?;
                let base = self.chase_static_links(hops)?;
                Address::slot(base + frame::FUNCTION_VALUE)
            }
            _ => return Err(self.kind_error("variable", "other definition")),
        };

        self.get_token()?;

        loop {
            match self.token {
                TokenCode::LBracket => {
                    self.get_token()?;
                    loop {
                        let index_value = self.execute_expression()?;
                        let index = self.as_ordinal(&index_value)?;
                        let base_type = self.types.base_type(type_id);
                        match self.types.get(base_type).form {
                            TypeForm::Array {
                                element,
                                min_index,
                                max_index,
                                ..
                            } => {
                                if index < min_index || index > max_index {
                                    return Err(RuntimeError::ValueOutOfRange {
                                        value: index,
                                        min: min_index,
                                        max: max_index,
                                        line: self.current_line,
                                    });
                                }
                                address
                                    .path
                                    .push(AccessStep::Index((index - min_index) as usize));
                                type_id = element;
                            }
                            _ => return Err(self.kind_error("array", "scalar")),
                        }
                        if self.token == TokenCode::Comma {
                            self.get_token()?;
                        } else {
                            break;
                        }
                    }
                    // past the closing bracket
                    self.get_token()?;
                }
                TokenCode::Period => {
                    self.get_token()?;
                    let field = self.expect_node()?;
                    let field_node = self.symtab.node(field);
                    address.path.push(AccessStep::Field(field_node.name.clone()));
                    type_id = field_node.type_id.unwrap_or(self.types.dummy);
                    self.get_token()?;
                }
                _ => break,
            }
        }

        Ok((address, type_id))
    }

    /// Read the value at an address; the leaf must be initialized.
    pub(crate) fn load(&self, address: &Address) -> Result<Value, RuntimeError> {
        let mut value = self.stack.get(address.slot);
        for step in &address.path {
            value = match (step, value) {
                (AccessStep::Index(index), Value::Array(items)) => items
                    .get(*index)
                    .ok_or_else(|| self.kind_error("array element", "out of bounds"))?,
                (AccessStep::Field(name), Value::Record(fields)) => fields
                    .get(name)
                    .ok_or_else(|| self.kind_error("record field", "missing"))?,
                (_, other) => return Err(self.kind_error("aggregate", other.kind_name())),
            };
        }
        if !value.is_initialized() {
            return Err(RuntimeError::UninitializedValue {
                line: self.current_line,
            });
        }
        Ok(value.clone())
    }

    /// Type-directed store: subrange range check, integer-to-real promotion,
    /// aggregate deep copy, and a tag check on everything else.
    pub(crate) fn store(
        &mut self,
        address: &Address,
        value: Value,
        target: TypeId,
    ) -> Result<(), RuntimeError> {
        let value = self.coerce(value, target)?;
        self.write(address, value)
    }

    /// Store without the type-directed checks; used for the FOR control
    /// variable's step, which may transiently overshoot a subrange.
    pub(crate) fn write(
        &mut self,
        address: &Address,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let line = self.current_line;
        let mut slot = self.stack.get_mut(address.slot);
        for step in &address.path {
            slot = match (step, slot) {
                (AccessStep::Index(index), Value::Array(items)) => {
                    match items.get_mut(*index) {
                        Some(item) => item,
                        None => {
                            return Err(RuntimeError::WrongValueKind {
                                expected: "array element",
                                found: "out of bounds",
                                line,
                            })
                        }
                    }
                }
                (AccessStep::Field(name), Value::Record(fields)) => {
                    match fields.get_mut(name) {
                        Some(field) => field,
                        None => {
                            return Err(RuntimeError::WrongValueKind {
                                expected: "record field",
                                found: "missing",
                                line,
                            })
                        }
                    }
                }
                (_, other) => {
                    return Err(RuntimeError::WrongValueKind {
                        expected: "aggregate",
                        found: other.kind_name(),
                        line,
                    })
                }
            };
        }
        *slot = value;
        Ok(())
    }

    /// Convert and check a value against the target type it is being stored
    /// into.
    pub(crate) fn coerce(&self, value: Value, target: TypeId) -> Result<Value, RuntimeError> {
        use crate::symtab::types::ScalarKind;

        if let Some((min, max)) = self.types.subrange_bounds(target) {
            let ordinal = self.as_ordinal(&value)?;
            if ordinal < min || ordinal > max {
                return Err(RuntimeError::ValueOutOfRange {
                    value: ordinal,
                    min,
                    max,
                    line: self.current_line,
                });
            }
            return Ok(value);
        }

        let base = self.types.base_type(target);
        match &self.types.get(base).form {
            TypeForm::Scalar(ScalarKind::Real) => match value {
                Value::Integer(v) => Ok(Value::Real(v as f32)),
                Value::Real(_) => Ok(value),
                other => Err(self.kind_error("real", other.kind_name())),
            },
            TypeForm::Scalar(ScalarKind::Integer) | TypeForm::Enumeration { .. } => {
                match value {
                    Value::Integer(_) => Ok(value),
                    other => Err(self.kind_error("integer", other.kind_name())),
                }
            }
            TypeForm::Scalar(ScalarKind::Character) => match value {
                Value::Character(_) => Ok(value),
                other => Err(self.kind_error("character", other.kind_name())),
            },
            TypeForm::Array { .. } => match value {
                Value::Array(_) => Ok(value),
                other => Err(self.kind_error("array", other.kind_name())),
            },
            TypeForm::Record { .. } => match value {
                Value::Record(_) => Ok(value),
                other => Err(self.kind_error("record", other.kind_name())),
            },
            _ => Ok(value),
        }
    }

    /// Default-initialized storage for a type: scalars start uninitialized,
    /// aggregates are pre-shaped recursively.
    pub(crate) fn allocate_value(&self, type_id: TypeId) -> Value {
        let base = self.types.base_type(type_id);
        match &self.types.get(base).form {
            TypeForm::Array { element, count, .. } => {
                let element = self.allocate_value(*element);
                Value::Array(vec![element; *count])
            }
            TypeForm::Record { first_field, .. } => {
                let mut fields = FxHashMap::default();
                for field in self.symtab.chain(*first_field) {
                    let node = self.symtab.node(field);
                    let value =
                        self.allocate_value(node.type_id.unwrap_or(self.types.dummy));
                    fields.insert(node.name.clone(), value);
                }
                Value::Record(fields)
            }
            _ => Value::Uninitialized,
        }
    }

    // ===== Calls =====

    /// Call protocol: push the frame header (static link chased from the
    /// caller), evaluate actuals into the parameter slots, allocate locals,
    /// switch to the callee's icode, run its body, then pop the whole frame
    /// and restore the caller, taking the resume cursor from the header's
    /// return-location slot.
    pub(crate) fn execute_call(&mut self, routine_id: NodeId) -> Result<Value, RuntimeError> {
        let (routine_code, declared_level, first_param, first_local, icode) = {
            let node = self.symtab.node(routine_id);
            let info = node
                .defn
                .routine()
                .ok_or_else(|| self.kind_error("routine", "other definition"))?;
            (
                info.code,
                node.level,
                info.first_param,
                info.first_local,
                info.icode.clone(),
            )
        };

        self.get_token()?;

        if let RoutineCode::Standard(routine) = routine_code {
            return self.execute_standard(routine);
        }

        let callee_level = declared_level + 1;
        let hops = self
            .frame_level
            .checked_sub(declared_level)
            .ok_or_else(|| self.kind_error("visible routine", "deeper level"))?;
        let static_link = self.chase_static_links(hops)?;

        let new_base = self.stack.len();
        self.push_value(Value::Uninitialized)?;
        self.push_value(Value::Location(static_link))?;
        self.push_value(Value::Location(self.frame_base))?;
        self.push_value(Value::Location(0))?;

        let formals: Vec<NodeId> = self.symtab.chain(first_param).collect();
        if self.token == TokenCode::LParen {
            self.get_token()?;
            let mut index = 0usize;
            loop {
                match formals.get(index).copied() {
                    Some(formal) => {
                        let (kind, formal_type) = {
                            let node = self.symtab.node(formal);
                            (
                                node.defn.kind(),
                                node.type_id.unwrap_or(self.types.dummy),
                            )
                        };
                        if kind == DefnKind::VarParam {
                            let actual = self.expect_node()?;
                            let (target, _) = self.resolve_variable(actual)?;
                            self.push_value(Value::Address(target))?;
                        } else {
                            let value = self.execute_expression()?;
                            let value = self.coerce(value, formal_type)?;
                            self.push_value(value)?;
                        }
                    }
                    None => return Err(self.kind_error("formal parameter", "extra actual")),
                }
                index += 1;
                if self.token == TokenCode::Comma {
                    self.get_token()?;
                } else {
                    break;
                }
            }
            // past the closing parenthesis
            self.get_token()?;
        }

        self.stack
            .set(new_base + frame::RETURN_LOCATION, Value::Location(self.cursor));

        let locals: Vec<NodeId> = self.symtab.chain(first_local).collect();
        for local in locals {
            let local_type = self.node_type(local);
            let value = self.allocate_value(local_type);
            self.push_value(value)?;
        }

        let body = icode.ok_or_else(|| self.kind_error("routine body", "none"))?;
        let saved_code = std::mem::replace(&mut self.code, body);
        let saved = (
            self.token,
            self.current_node,
            self.frame_base,
            self.frame_level,
            self.current_line,
        );

        self.frame_base = new_base;
        self.frame_level = callee_level;
        self.cursor = 0;
        self.get_token()?;
        if self.token == TokenCode::Begin {
            self.execute_statement()?;
        }

        let result = self.stack.get(new_base + frame::FUNCTION_VALUE).clone();
        let return_location = self
            .stack
            .get(new_base + frame::RETURN_LOCATION)
            .as_location()
            .ok_or_else(|| self.kind_error("return location", "other slot"))?;
        self.stack.truncate(new_base);

        self.code = saved_code;
        let (token, node, base, level, line) = saved;
        self.cursor = return_location;
        self.token = token;
        self.current_node = node;
        self.frame_base = base;
        self.frame_level = level;
        self.current_line = line;

        Ok(result)
    }

    // ===== Value helpers =====

    pub(crate) fn node_type(&self, id: NodeId) -> TypeId {
        self.symtab.node(id).type_id.unwrap_or(self.types.dummy)
    }

    /// Constant node payload as a runtime value.
    pub(crate) fn constant_value(&self, value: &ConstantValue) -> Value {
        match value {
            ConstantValue::Integer(v) => Value::Integer(*v),
            ConstantValue::Real(v) => Value::Real(*v),
            ConstantValue::Character(ch) => Value::Character(*ch),
            ConstantValue::Str(s) => {
                Value::Array(s.chars().map(Value::Character).collect())
            }
        }
    }

    pub(crate) fn as_ordinal(&self, value: &Value) -> Result<i32, RuntimeError> {
        match value {
            Value::Integer(v) => Ok(*v),
            Value::Character(ch) => Ok(*ch as i32),
            other => Err(self.kind_error("ordinal", other.kind_name())),
        }
    }

    /// Boolean values are their enumeration ordinals at run time.
    pub(crate) fn truthy(&self, value: &Value) -> Result<bool, RuntimeError> {
        match value {
            Value::Integer(v) => Ok(*v != 0),
            other => Err(self.kind_error("boolean", other.kind_name())),
        }
    }

    pub(crate) fn as_f32(&self, value: &Value) -> Result<f32, RuntimeError> {
        match value {
            Value::Integer(v) => Ok(*v as f32),
            Value::Real(v) => Ok(*v),
            other => Err(self.kind_error("number", other.kind_name())),
        }
    }

    pub(crate) fn kind_error(
        &self,
        expected: &'static str,
        found: &'static str,
    ) -> RuntimeError {
        RuntimeError::WrongValueKind {
            expected,
            found,
            line: self.current_line,
        }
    }

    pub(crate) fn current_line(&self) -> u32 {
        self.current_line
    }

    pub(crate) fn bump_statement_count(&mut self) {
        self.statement_count += 1;
    }
}
