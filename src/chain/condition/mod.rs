//! Conditions attached to conditional chain steps.
//!
//! A condition is a small boolean expression evaluated against the conditional's input:
//!
//! ```text
//! input.width < target.width && !hdr
//! ```
//!
//! Names resolve to `input.width`, `input.height`, `target.width`, `target.height`, or to a host
//! flag set with [`ExprEvaluator::set_flag`].

mod ast;
mod lexer;
mod parser;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::foundation::core::{TextureDesc, TextureSize};
use crate::foundation::error::{ChainError, ChainResult};

use ast::{BinaryOp, Expr, UnaryOp};

/// What a condition may look at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterInfo {
    /// Description of the conditional's input.
    pub input: TextureDesc,
    /// Size of the host's output target.
    pub target: TextureSize,
}

/// Decides conditional chain steps.
pub trait ConditionEvaluator {
    /// Check `condition` without evaluating it.
    fn validate(&self, condition: &str) -> ChainResult<()>;

    /// Evaluate `condition` for a conditional whose input is described by `info`.
    fn evaluate(&self, info: &FilterInfo, condition: &str) -> ChainResult<bool>;
}

/// Syntax error in a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionError {
    pub offset: usize,
    pub message: String,
}

impl ConditionError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "condition error at byte {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for ConditionError {}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Value {
    Num(f64),
    Bool(bool),
}

impl Value {
    fn num(self, condition: &str) -> ChainResult<f64> {
        match self {
            Self::Num(v) => Ok(v),
            Self::Bool(_) => Err(type_error(condition, "number", "boolean")),
        }
    }

    fn bool(self, condition: &str) -> ChainResult<bool> {
        match self {
            Self::Bool(v) => Ok(v),
            Self::Num(_) => Err(type_error(condition, "boolean", "number")),
        }
    }
}

fn type_error(condition: &str, want: &str, got: &str) -> ChainError {
    ChainError::configuration(format!(
        "condition '{condition}': expected a {want}, found a {got}"
    ))
}

/// Expression-based [`ConditionEvaluator`] with host-controlled boolean flags.
///
/// Parsed conditions are cached by source text.
#[derive(Default)]
pub struct ExprEvaluator {
    flags: RefCell<BTreeMap<String, bool>>,
    parsed: RefCell<HashMap<String, Rc<Expr>>>,
}

impl ExprEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ExprEvaluator::set_flag`].
    pub fn with_flag(self, name: impl Into<String>, value: bool) -> Self {
        self.set_flag(name, value);
        self
    }

    /// Set a flag that conditions may refer to by name.
    pub fn set_flag(&self, name: impl Into<String>, value: bool) {
        self.flags.borrow_mut().insert(name.into(), value);
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.borrow().get(name).copied()
    }

    fn parse(&self, condition: &str) -> ChainResult<Rc<Expr>> {
        if let Some(expr) = self.parsed.borrow().get(condition) {
            return Ok(Rc::clone(expr));
        }
        let expr = parser::parse_condition(condition).map_err(|e| {
            ChainError::configuration(format!("invalid condition '{condition}': {e}"))
        })?;
        let expr = Rc::new(expr);
        self.parsed
            .borrow_mut()
            .insert(condition.to_owned(), Rc::clone(&expr));
        Ok(expr)
    }

    fn resolve(&self, info: &FilterInfo, path: &[String], condition: &str) -> ChainResult<Value> {
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        let v = match segments.as_slice() {
            ["input", "width"] => Value::Num(f64::from(info.input.size.width)),
            ["input", "height"] => Value::Num(f64::from(info.input.size.height)),
            ["target", "width"] => Value::Num(f64::from(info.target.width)),
            ["target", "height"] => Value::Num(f64::from(info.target.height)),
            [flag] => match self.flag(flag) {
                Some(v) => Value::Bool(v),
                None => {
                    return Err(ChainError::configuration(format!(
                        "condition '{condition}': unknown flag '{flag}'"
                    )));
                }
            },
            _ => {
                return Err(ChainError::configuration(format!(
                    "condition '{condition}': unknown name '{}'",
                    path.join(".")
                )));
            }
        };
        Ok(v)
    }

    fn eval(&self, expr: &Expr, info: &FilterInfo, condition: &str) -> ChainResult<Value> {
        match expr {
            Expr::Num(v) => Ok(Value::Num(*v)),
            Expr::Bool(v) => Ok(Value::Bool(*v)),
            Expr::Path(path) => self.resolve(info, path, condition),
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, info, condition)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Num(-v.num(condition)?),
                    UnaryOp::Not => Value::Bool(!v.bool(condition)?),
                })
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, info, condition)?;
                // Short-circuit logical operators.
                match op {
                    BinaryOp::And if !l.bool(condition)? => return Ok(Value::Bool(false)),
                    BinaryOp::Or if l.bool(condition)? => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let r = self.eval(right, info, condition)?;
                binary(*op, l, r, condition)
            }
            Expr::Call { func, args } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a, info, condition)?.num(condition))
                    .collect::<ChainResult<Vec<f64>>>()?;
                call(func, &args, condition).map(Value::Num)
            }
        }
    }
}

fn binary(op: BinaryOp, l: Value, r: Value, condition: &str) -> ChainResult<Value> {
    let v = match op {
        BinaryOp::And | BinaryOp::Or => Value::Bool(r.bool(condition)?),
        BinaryOp::Eq => Value::Bool(l == r),
        BinaryOp::Ne => Value::Bool(l != r),
        BinaryOp::Add => Value::Num(l.num(condition)? + r.num(condition)?),
        BinaryOp::Sub => Value::Num(l.num(condition)? - r.num(condition)?),
        BinaryOp::Mul => Value::Num(l.num(condition)? * r.num(condition)?),
        BinaryOp::Div => Value::Num(l.num(condition)? / r.num(condition)?),
        BinaryOp::Lt => Value::Bool(l.num(condition)? < r.num(condition)?),
        BinaryOp::Le => Value::Bool(l.num(condition)? <= r.num(condition)?),
        BinaryOp::Gt => Value::Bool(l.num(condition)? > r.num(condition)?),
        BinaryOp::Ge => Value::Bool(l.num(condition)? >= r.num(condition)?),
    };
    Ok(v)
}

fn call(func: &str, args: &[f64], condition: &str) -> ChainResult<f64> {
    match (func, args) {
        ("min", [a, b]) => Ok(a.min(*b)),
        ("max", [a, b]) => Ok(a.max(*b)),
        ("abs", [a]) => Ok(a.abs()),
        _ => Err(ChainError::configuration(format!(
            "condition '{condition}': unknown function {func}/{}",
            args.len()
        ))),
    }
}

impl ConditionEvaluator for ExprEvaluator {
    fn validate(&self, condition: &str) -> ChainResult<()> {
        self.parse(condition).map(|_| ())
    }

    fn evaluate(&self, info: &FilterInfo, condition: &str) -> ChainResult<bool> {
        let expr = self.parse(condition)?;
        let v = self.eval(&expr, info, condition)?.bool(condition)?;
        tracing::trace!(condition, result = v, "condition evaluated");
        Ok(v)
    }
}

impl fmt::Debug for ExprEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExprEvaluator")
            .field("flags", &*self.flags.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/chain/condition.rs"]
mod tests;
