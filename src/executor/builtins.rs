//! Standard routine execution.
//!
//! `write`/`writeln` append to the runtime console, `read`/`readln` consume
//! its scripted input, and the standard functions compute directly on the
//! evaluated argument. Domain violations (negative `sqrt`, `chr` outside the
//! character range, exhausted input) raise `InvalidFunctionArgument`.

use crate::executor::errors::RuntimeError;
use crate::executor::Executor;
use crate::memory::value::Value;
use crate::scanner::token::TokenCode;
use crate::symtab::types::{ScalarKind, TypeForm, TypeId};
use crate::symtab::StandardRoutine;

impl Executor<'_> {
    /// Execute a standard routine call; the routine identifier has been
    /// consumed and the current token is its argument list (if any).
    pub(crate) fn execute_standard(
        &mut self,
        routine: StandardRoutine,
    ) -> Result<Value, RuntimeError> {
        use StandardRoutine::*;
        match routine {
            Write | Writeln => {
                if self.token == TokenCode::LParen {
                    self.get_token()?;
                    loop {
                        let value = self.execute_expression()?;
                        self.write_value(&value)?;
                        if self.token == TokenCode::Comma {
                            self.get_token()?;
                        } else {
                            break;
                        }
                    }
                    // past the closing parenthesis
                    self.get_token()?;
                }
                if routine == Writeln {
                    self.console.newline();
                }
                Ok(Value::Uninitialized)
            }
            Read | Readln => {
                if self.token == TokenCode::LParen {
                    self.get_token()?;
                    loop {
                        let target = self.expect_node()?;
                        let (address, target_type) = self.resolve_variable(target)?;
                        let value = self.read_value(target_type)?;
                        self.store(&address, value, target_type)?;
                        if self.token == TokenCode::Comma {
                            self.get_token()?;
                        } else {
                            break;
                        }
                    }
                    self.get_token()?;
                }
                if routine == Readln {
                    self.console.skip_line();
                }
                Ok(Value::Uninitialized)
            }
            _ => {
                if self.token != TokenCode::LParen {
                    return Err(self.kind_error("argument list", "other token"));
                }
                self.get_token()?;
                let argument = self.execute_expression()?;
                // past the closing parenthesis
                self.get_token()?;
                self.apply_function(routine, argument)
            }
        }
    }

    fn write_value(&mut self, value: &Value) -> Result<(), RuntimeError> {
        let text = match value {
            Value::Integer(v) => v.to_string(),
            Value::Real(v) => format!("{:?}", v),
            Value::Character(ch) => ch.to_string(),
            Value::Array(_) => self
                .chars_of(value)
                .ok_or_else(|| self.kind_error("string", value.kind_name()))?,
            other => return Err(self.kind_error("writable value", other.kind_name())),
        };
        self.console.print(&text);
        Ok(())
    }

    /// Read one value for the target's base type.
    fn read_value(&mut self, target: TypeId) -> Result<Value, RuntimeError> {
        let line = self.current_line();
        let base = self.types.base_type(target);
        match &self.types.get(base).form {
            TypeForm::Scalar(ScalarKind::Integer) => self
                .console
                .read_integer()
                .map(Value::Integer)
                .ok_or(RuntimeError::InvalidFunctionArgument { name: "read", line }),
            TypeForm::Scalar(ScalarKind::Real) => self
                .console
                .read_real()
                .map(Value::Real)
                .ok_or(RuntimeError::InvalidFunctionArgument { name: "read", line }),
            TypeForm::Scalar(ScalarKind::Character) => self
                .console
                .read_char()
                .map(Value::Character)
                .ok_or(RuntimeError::InvalidFunctionArgument { name: "read", line }),
            _ => Err(self.kind_error("readable target", "other type")),
        }
    }

    fn apply_function(
        &self,
        routine: StandardRoutine,
        argument: Value,
    ) -> Result<Value, RuntimeError> {
        use StandardRoutine::*;
        let line = self.current_line();

        match routine {
            Abs => match argument {
                Value::Integer(v) => Ok(Value::Integer(v.wrapping_abs())),
                Value::Real(v) => Ok(Value::Real(v.abs())),
                other => Err(self.kind_error("number", other.kind_name())),
            },
            Sqr => match argument {
                Value::Integer(v) => Ok(Value::Integer(v.wrapping_mul(v))),
                Value::Real(v) => Ok(Value::Real(v * v)),
                other => Err(self.kind_error("number", other.kind_name())),
            },
            Sqrt => {
                let v = self.as_f32(&argument)?;
                if v < 0.0 {
                    return Err(RuntimeError::InvalidFunctionArgument { name: "sqrt", line });
                }
                Ok(Value::Real(v.sqrt()))
            }
            Ln => {
                let v = self.as_f32(&argument)?;
                if v <= 0.0 {
                    return Err(RuntimeError::InvalidFunctionArgument { name: "ln", line });
                }
                Ok(Value::Real(v.ln()))
            }
            Exp => Ok(Value::Real(self.as_f32(&argument)?.exp())),
            Sin => Ok(Value::Real(self.as_f32(&argument)?.sin())),
            Cos => Ok(Value::Real(self.as_f32(&argument)?.cos())),
            ArcTan => Ok(Value::Real(self.as_f32(&argument)?.atan())),
            Odd => {
                let v = self.as_ordinal(&argument)?;
                Ok(Value::Integer((v & 1 != 0) as i32))
            }
            Ord => Ok(Value::Integer(self.as_ordinal(&argument)?)),
            Chr => {
                let v = self.as_ordinal(&argument)?;
                if !(0..=255).contains(&v) {
                    return Err(RuntimeError::InvalidFunctionArgument { name: "chr", line });
                }
                match char::from_u32(v as u32) {
                    Some(ch) => Ok(Value::Character(ch)),
                    None => Err(RuntimeError::InvalidFunctionArgument { name: "chr", line }),
                }
            }
            Pred => match argument {
                Value::Integer(v) => Ok(Value::Integer(v.wrapping_sub(1))),
                Value::Character(ch) => {
                    let v = ch as i32 - 1;
                    if v < 0 {
                        return Err(RuntimeError::InvalidFunctionArgument {
                            name: "pred",
                            line,
                        });
                    }
                    Ok(Value::Character(char::from_u32(v as u32).unwrap_or('\0')))
                }
                other => Err(self.kind_error("ordinal", other.kind_name())),
            },
            Succ => match argument {
                Value::Integer(v) => Ok(Value::Integer(v.wrapping_add(1))),
                Value::Character(ch) => {
                    let v = ch as i32 + 1;
                    if v > 255 {
                        return Err(RuntimeError::InvalidFunctionArgument {
                            name: "succ",
                            line,
                        });
                    }
                    Ok(Value::Character(char::from_u32(v as u32).unwrap_or('\0')))
                }
                other => Err(self.kind_error("ordinal", other.kind_name())),
            },
            Round => Ok(Value::Integer(self.as_f32(&argument)?.round() as i32)),
            Trunc => Ok(Value::Integer(self.as_f32(&argument)?.trunc() as i32)),
            Read | Readln | Write | Writeln => {
                unreachable!("dispatched in execute_standard")
            }
        }
    }
}
