//! Expression evaluation.
//!
//! The same stratified walk as the parser's expression grammar, computing
//! tagged values instead of types. Integer arithmetic wraps at the 32-bit
//! boundary; `/` always divides as real; relational and boolean results are
//! the `boolean` enumeration's ordinals.

use crate::executor::errors::RuntimeError;
use crate::executor::Executor;
use crate::memory::value::Value;
use crate::scanner::token::TokenCode;
use crate::symtab::{DefnKind, Definition};

const REL_OPS: &[TokenCode] = &[
    TokenCode::Equal,
    TokenCode::Ne,
    TokenCode::Lt,
    TokenCode::Le,
    TokenCode::Gt,
    TokenCode::Ge,
];

impl Executor<'_> {
    /// expression := simple-expression [ relop simple-expression ]
    pub(crate) fn execute_expression(&mut self) -> Result<Value, RuntimeError> {
        let left = self.execute_simple_expression()?;
        if REL_OPS.contains(&self.token) {
            let operator = self.token;
            self.get_token()?;
            let right = self.execute_simple_expression()?;
            return self.compare(operator, &left, &right);
        }
        Ok(left)
    }

    /// simple-expression := [ + | - ] term { ( + | - | OR ) term }
    fn execute_simple_expression(&mut self) -> Result<Value, RuntimeError> {
        let mut negate = false;
        if matches!(self.token, TokenCode::Plus | TokenCode::Minus) {
            negate = self.token == TokenCode::Minus;
            self.get_token()?;
        }

        let mut result = self.execute_term()?;
        if negate {
            result = match result {
                Value::Integer(v) => Value::Integer(v.wrapping_neg()),
                Value::Real(v) => Value::Real(-v),
                other => return Err(self.kind_error("number", other.kind_name())),
            };
        }

        loop {
            match self.token {
                TokenCode::Plus => {
                    self.get_token()?;
                    let operand = self.execute_term()?;
                    result = self.numeric_binary(&result, &operand, |a, b| a.wrapping_add(b), |a, b| a + b)?;
                }
                TokenCode::Minus => {
                    self.get_token()?;
                    let operand = self.execute_term()?;
                    result = self.numeric_binary(&result, &operand, |a, b| a.wrapping_sub(b), |a, b| a - b)?;
                }
                TokenCode::Or => {
                    self.get_token()?;
                    let operand = self.execute_term()?;
                    let value = self.truthy(&result)? || self.truthy(&operand)?;
                    result = Value::Integer(value as i32);
                }
                _ => break,
            }
        }
        Ok(result)
    }

    /// term := factor { ( * | / | DIV | MOD | AND ) factor }
    fn execute_term(&mut self) -> Result<Value, RuntimeError> {
        let mut result = self.execute_factor()?;
        loop {
            match self.token {
                TokenCode::Star => {
                    self.get_token()?;
                    let operand = self.execute_factor()?;
                    result = self.numeric_binary(&result, &operand, |a, b| a.wrapping_mul(b), |a, b| a * b)?;
                }
                TokenCode::Slash => {
                    self.get_token()?;
                    let operand = self.execute_factor()?;
                    let divisor = self.as_f32(&operand)?;
                    if divisor == 0.0 {
                        return Err(RuntimeError::DivisionByZero {
                            line: self.current_line(),
                        });
                    }
                    let dividend = self.as_f32(&result)?;
                    result = Value::Real(dividend / divisor);
                }
                TokenCode::Div | TokenCode::Mod => {
                    let is_div = self.token == TokenCode::Div;
                    self.get_token()?;
                    let operand = self.execute_factor()?;
                    let divisor = self.as_ordinal(&operand)?;
                    if divisor == 0 {
                        return Err(RuntimeError::DivisionByZero {
                            line: self.current_line(),
                        });
                    }
                    let dividend = self.as_ordinal(&result)?;
                    result = Value::Integer(if is_div {
                        dividend.wrapping_div(divisor)
                    } else {
                        dividend.wrapping_rem(divisor)
                    });
                }
                TokenCode::And => {
                    self.get_token()?;
                    let operand = self.execute_factor()?;
                    let value = self.truthy(&result)? && self.truthy(&operand)?;
                    result = Value::Integer(value as i32);
                }
                _ => break,
            }
        }
        Ok(result)
    }

    /// factor := literal | constant | variable | function-call
    ///         | NOT factor | ( expression )
    fn execute_factor(&mut self) -> Result<Value, RuntimeError> {
        match self.token {
            TokenCode::IntegerLiteral
            | TokenCode::RealLiteral
            | TokenCode::StringLiteral => {
                let id = self.expect_node()?;
                let value = match &self.symtab.node(id).defn {
                    Definition::Constant(constant) => self.constant_value(constant),
                    _ => return Err(self.kind_error("constant", "other definition")),
                };
                self.get_token()?;
                Ok(value)
            }
            TokenCode::Identifier => {
                let id = self.expect_node()?;
                match self.symtab.node(id).defn.kind() {
                    DefnKind::Constant => {
                        let value = match &self.symtab.node(id).defn {
                            Definition::Constant(constant) => self.constant_value(constant),
                            _ => unreachable!("kind checked above"),
                        };
                        self.get_token()?;
                        Ok(value)
                    }
                    DefnKind::Function => {
                        let result = self.execute_call(id)?;
                        if !result.is_initialized() {
                            return Err(RuntimeError::UninitializedValue {
                                line: self.current_line(),
                            });
                        }
                        Ok(result)
                    }
                    _ => {
                        let (address, _) = self.resolve_variable(id)?;
                        self.load(&address)
                    }
                }
            }
            TokenCode::Not => {
                self.get_token()?;
                let operand = self.execute_factor()?;
                let value = !self.truthy(&operand)?;
                Ok(Value::Integer(value as i32))
            }
            TokenCode::LParen => {
                self.get_token()?;
                let inner = self.execute_expression()?;
                // past the closing parenthesis
                self.get_token()?;
                Ok(inner)
            }
            _ => Err(self.kind_error("factor", "other token")),
        }
    }

    /// `+ - *`: integer x integer stays integer (wrapping), any real operand
    /// promotes both sides to real.
    fn numeric_binary(
        &self,
        left: &Value,
        right: &Value,
        int_op: fn(i32, i32) -> i32,
        real_op: fn(f32, f32) -> f32,
    ) -> Result<Value, RuntimeError> {
        match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(int_op(*a, *b))),
            _ => {
                let a = self.as_f32(left)?;
                let b = self.as_f32(right)?;
                Ok(Value::Real(real_op(a, b)))
            }
        }
    }

    /// Relational operators over numbers, characters, and equal-length
    /// character arrays; the result is a boolean ordinal.
    fn compare(
        &self,
        operator: TokenCode,
        left: &Value,
        right: &Value,
    ) -> Result<Value, RuntimeError> {
        use std::cmp::Ordering;

        let ordering = match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Character(a), Value::Character(b)) => a.cmp(b),
            (Value::Array(_), Value::Array(_)) => {
                let a = self
                    .chars_of(left)
                    .ok_or_else(|| self.kind_error("string", left.kind_name()))?;
                let b = self
                    .chars_of(right)
                    .ok_or_else(|| self.kind_error("string", right.kind_name()))?;
                a.cmp(&b)
            }
            _ => {
                let a = self.as_f32(left)?;
                let b = self.as_f32(right)?;
                a.partial_cmp(&b).unwrap_or(Ordering::Greater)
            }
        };

        let result = match operator {
            TokenCode::Equal => ordering == Ordering::Equal,
            TokenCode::Ne => ordering != Ordering::Equal,
            TokenCode::Lt => ordering == Ordering::Less,
            TokenCode::Le => ordering != Ordering::Greater,
            TokenCode::Gt => ordering == Ordering::Greater,
            TokenCode::Ge => ordering != Ordering::Less,
            _ => return Err(self.kind_error("relational operator", "other token")),
        };
        Ok(Value::Integer(result as i32))
    }

    /// The character content of a char-array value.
    pub(crate) fn chars_of(&self, value: &Value) -> Option<String> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_character())
                .collect::<Option<String>>(),
            _ => None,
        }
    }
}
