use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::trace;

use crate::{
    ast::{BinOp, Expr, UnaryOp},
    parser::{ParseError, parse_expr},
    value::{
        ValueExt, compare, from_decimal, loose_equals, loose_number, number_value,
        strict_equals, to_decimal,
    },
};

/// Name the resolved field value is bound under inside `@transform`.
pub const VALUE_BINDING: &str = "value";

static ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\(\s*([A-Za-z_$][\w$]*)\s*\)|([A-Za-z_$][\w$]*))\s*=>\s*([\s\S]*)$")
        .expect("arrow pattern is valid")
});

/// Errors that can occur during expression evaluation.
///
/// The shaping engine never surfaces these: a failed expression contributes
/// `null` (or, for a transform, the untransformed value).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The expression text could not be parsed
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    /// Identifier not present in the scope
    #[error("{0} is not defined")]
    UndefinedIdentifier(String),

    /// Type mismatch or invalid operation for the given type
    #[error("type error: {0}")]
    TypeError(String),

    /// Method outside the built-in allow-list
    #[error("{receiver}.{method} is not a supported method")]
    UnknownMethod {
        receiver: &'static str,
        method: String,
    },

    #[error("division by zero")]
    DivisionByZero,
}

/// Non-local exits while walking an expression.
enum Halt {
    /// `?.` met `null`; unwinds to the enclosing [`Expr::OptionalChain`]
    ShortCircuit,
    Error(EvalError),
}

impl From<EvalError> for Halt {
    fn from(e: EvalError) -> Self {
        Halt::Error(e)
    }
}

type Eval<'c> = Result<Cow<'c, Value>, Halt>;

/// Layered scope identifiers are resolved against.
///
/// Lookup order: explicit bindings (latest first), the parent key alias,
/// keys of the current data, keys of the root data.
#[derive(Debug, Clone)]
pub struct EvalContext<'c> {
    /// Outermost data of the shaping pass
    pub root: &'c Value,
    /// Data at the current nesting level
    pub current: &'c Value,
    /// Output key that introduced the current level; resolves to `current`
    pub parent_key: Option<&'c str>,
    bindings: Vec<(&'c str, &'c Value)>,
}

impl<'c> EvalContext<'c> {
    pub fn new(root: &'c Value, current: &'c Value) -> Self {
        EvalContext {
            root,
            current,
            parent_key: None,
            bindings: Vec::new(),
        }
    }

    pub fn with_parent_key(mut self, parent_key: Option<&'c str>) -> Self {
        self.parent_key = parent_key;
        self
    }

    /// Create a new context with an extra name bound on top.
    pub fn bind(&self, name: &'c str, value: &'c Value) -> Self {
        let mut ctx = self.clone();
        ctx.bindings.push((name, value));
        ctx
    }

    pub fn lookup(&self, name: &str) -> Option<&'c Value> {
        if let Some((_, value)) = self.bindings.iter().rev().find(|(n, _)| *n == name) {
            return Some(*value);
        }
        if self.parent_key == Some(name) {
            return Some(self.current);
        }
        [self.current, self.root]
            .into_iter()
            .find_map(|layer| layer.as_object().and_then(|map| map.get(name)))
    }
}

/// The expression evaluator.
///
/// Stateless; every call receives the scope it runs against.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    /// Parses and evaluates `source` against `ctx`.
    ///
    /// # Examples
    ///
    /// ```
    /// use serde_json::json;
    /// use shapeql::{EvalContext, Evaluator};
    ///
    /// let data = json!({"first": "Ada", "last": "Lovelace"});
    /// let ctx = EvalContext::new(&data, &data);
    /// let full = Evaluator::new().eval_str("first + ' ' + last", &ctx).unwrap();
    /// assert_eq!(full, json!("Ada Lovelace"));
    /// ```
    pub fn eval_str(&self, source: &str, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        let expr = parse_expr(source)?;
        self.eval_expression(&expr, ctx)
    }

    /// Evaluates an already parsed expression.
    pub fn eval_expression(&self, expr: &Expr, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        match self.eval_expr(expr, ctx) {
            Ok(value) => Ok(value.into_owned()),
            Err(Halt::ShortCircuit) => Ok(Value::Null),
            Err(Halt::Error(e)) => Err(e),
        }
    }

    /// Evaluates a transform body with `value` bound to the field value.
    ///
    /// The body may also be a one-parameter arrow (`v => v * 2`), in which
    /// case the parameter is bound as well.
    pub fn eval_transform(
        &self,
        source: &str,
        ctx: &EvalContext<'_>,
        value: &Value,
    ) -> Result<Value, EvalError> {
        let ctx = ctx.bind(VALUE_BINDING, value);
        match ARROW.captures(source) {
            Some(caps) => {
                let param = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                let body = caps.get(3).map_or("", |m| m.as_str());
                self.eval_str(body, &ctx.bind(param, value))
            }
            None => self.eval_str(source, &ctx),
        }
    }

    fn eval_expr<'c>(&self, expr: &Expr, ctx: &EvalContext<'c>) -> Eval<'c> {
        let value = match expr {
            Expr::Float(n) => number_value(*n),
            Expr::Integer(n) => Value::Number(Number::from(*n)),
            Expr::String(s) => Value::String(s.clone()),
            Expr::Boolean(b) => Value::Bool(*b),
            Expr::Null => Value::Null,
            Expr::Array(exprs) => {
                let mut arr = Vec::with_capacity(exprs.len());
                for expr in exprs {
                    arr.push(self.eval_expr(expr, ctx)?.into_owned());
                }
                Value::Array(arr)
            }
            Expr::Identifier(name) => {
                return ctx
                    .lookup(name)
                    .map(Cow::Borrowed)
                    .ok_or_else(|| EvalError::UndefinedIdentifier(name.clone()).into());
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let object = self.eval_expr(object, ctx)?;
                if *optional && object.is_null() {
                    return Err(Halt::ShortCircuit);
                }
                return Ok(project(object, |v| get_property(v, property))?);
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                let object = self.eval_expr(object, ctx)?;
                if *optional && object.is_null() {
                    return Err(Halt::ShortCircuit);
                }
                let index = self.eval_expr(index, ctx)?;
                return Ok(project(object, |v| get_index(v, &index))?);
            }
            Expr::MethodCall {
                object,
                method,
                args,
                optional,
            } => {
                let receiver = self.eval_expr(object, ctx)?;
                if *optional && receiver.is_null() {
                    return Err(Halt::ShortCircuit);
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg, ctx)?.into_owned());
                }
                self.eval_method_call(&receiver, method, &values)?
            }
            Expr::OptionalChain(inner) => {
                return match self.eval_expr(inner, ctx) {
                    Err(Halt::ShortCircuit) => Ok(Cow::Owned(Value::Null)),
                    other => other,
                };
            }
            Expr::UnaryOp { op, operand } => {
                let operand = self.eval_expr(operand, ctx)?;
                apply_unary(*op, &operand)?
            }
            Expr::Conditional {
                condition,
                consequent,
                alternate,
            } => {
                let branch = if self.eval_expr(condition, ctx)?.is_truthy() {
                    consequent
                } else {
                    alternate
                };
                return self.eval_expr(branch, ctx);
            }
            Expr::BinaryOp { op, left, right } => {
                let left_val = self.eval_expr(left, ctx)?;
                // Logical operators yield an operand and short-circuit
                match op {
                    BinOp::And if !left_val.is_truthy() => return Ok(left_val),
                    BinOp::Or if left_val.is_truthy() => return Ok(left_val),
                    BinOp::NullCoalesce if !left_val.is_null() => return Ok(left_val),
                    BinOp::And | BinOp::Or | BinOp::NullCoalesce => {
                        return self.eval_expr(right, ctx);
                    }
                    _ => {}
                }
                let right_val = self.eval_expr(right, ctx)?;
                apply_binop(*op, &left_val, &right_val)?
            }
        };
        Ok(Cow::Owned(value))
    }

    /// Dispatch method calls to the built-in allow-list
    fn eval_method_call(
        &self,
        receiver: &Value,
        method: &str,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        match receiver {
            Value::String(s) => self.string_method(s, method, args),
            Value::Array(items) => self.array_method(items, method, args),
            Value::Number(n) => self.number_method(n, method, args),
            Value::Bool(b) if method == "toString" => Ok(Value::String(b.to_string())),
            Value::Null => Err(EvalError::TypeError(format!(
                "cannot read properties of null (reading '{}')",
                method
            ))),
            other => Err(EvalError::UnknownMethod {
                receiver: other.type_name(),
                method: method.to_string(),
            }),
        }
    }

    fn string_method(&self, s: &str, method: &str, args: &[Value]) -> Result<Value, EvalError> {
        let value = match method {
            "toUpperCase" => Value::String(s.to_uppercase()),
            "toLowerCase" => Value::String(s.to_lowercase()),
            "trim" => Value::String(s.trim().to_string()),
            "toString" => Value::String(s.to_string()),
            "split" => {
                let parts: Vec<Value> = match args.first() {
                    None | Some(Value::Null) => vec![Value::String(s.to_string())],
                    Some(sep) => {
                        let sep = sep.to_display_string();
                        if sep.is_empty() {
                            s.chars().map(|c| Value::String(c.to_string())).collect()
                        } else {
                            s.split(sep.as_str())
                                .map(|part| Value::String(part.to_string()))
                                .collect()
                        }
                    }
                };
                Value::Array(parts)
            }
            "includes" => Value::Bool(s.contains(string_arg(args, 0, method)?.as_str())),
            "startsWith" => Value::Bool(s.starts_with(string_arg(args, 0, method)?.as_str())),
            "endsWith" => Value::Bool(s.ends_with(string_arg(args, 0, method)?.as_str())),
            "replace" => {
                let from = string_arg(args, 0, method)?;
                let to = string_arg(args, 1, method)?;
                Value::String(s.replacen(from.as_str(), &to, 1))
            }
            "charAt" => {
                let index = args.first().and_then(|v| v.as_i64()).unwrap_or(0);
                let ch = usize::try_from(index)
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(String::from)
                    .unwrap_or_default();
                Value::String(ch)
            }
            "slice" => {
                let chars: Vec<char> = s.chars().collect();
                let (start, end) = slice_bounds(chars.len(), args);
                Value::String(chars[start..end].iter().collect())
            }
            _ => {
                return Err(EvalError::UnknownMethod {
                    receiver: "string",
                    method: method.to_string(),
                });
            }
        };
        Ok(value)
    }

    fn array_method(
        &self,
        items: &[Value],
        method: &str,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        let value = match method {
            "join" => {
                let sep = match args.first() {
                    None | Some(Value::Null) => ",".to_string(),
                    Some(sep) => sep.to_display_string(),
                };
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Value::Null => String::new(),
                        other => other.to_display_string(),
                    })
                    .collect();
                Value::String(parts.join(&sep))
            }
            "includes" => {
                let needle = args.first().unwrap_or(&Value::Null);
                Value::Bool(items.iter().any(|item| strict_equals(item, needle)))
            }
            "indexOf" => {
                let needle = args.first().unwrap_or(&Value::Null);
                let index = items
                    .iter()
                    .position(|item| strict_equals(item, needle))
                    .map_or(-1, |i| i as i64);
                Value::Number(Number::from(index))
            }
            "at" => {
                let index = args.first().and_then(|v| v.as_i64()).unwrap_or(0);
                let len = items.len() as i64;
                let index = if index < 0 { len + index } else { index };
                usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            "slice" => {
                let (start, end) = slice_bounds(items.len(), args);
                Value::Array(items[start..end].to_vec())
            }
            "reverse" => Value::Array(items.iter().rev().cloned().collect()),
            "toString" => Value::String(Value::Array(items.to_vec()).to_display_string()),
            _ => {
                return Err(EvalError::UnknownMethod {
                    receiver: "array",
                    method: method.to_string(),
                });
            }
        };
        Ok(value)
    }

    fn number_method(&self, n: &Number, method: &str, args: &[Value]) -> Result<Value, EvalError> {
        match method {
            "toString" => Ok(Value::String(n.to_string())),
            "toFixed" => {
                let digits = args.first().and_then(|v| v.as_u64()).unwrap_or(0).min(100) as usize;
                let f = n.as_f64().unwrap_or_default();
                Ok(Value::String(format!("{:.*}", digits, f)))
            }
            _ => Err(EvalError::UnknownMethod {
                receiver: "number",
                method: method.to_string(),
            }),
        }
    }
}

/// Apply an accessor to a value, borrowing through when the value is
/// itself borrowed.
fn project<'c>(
    object: Cow<'c, Value>,
    access: impl for<'v> Fn(&'v Value) -> Result<Cow<'v, Value>, EvalError>,
) -> Result<Cow<'c, Value>, EvalError> {
    match object {
        Cow::Borrowed(v) => access(v),
        Cow::Owned(v) => access(&v).map(|child| Cow::Owned(child.into_owned())),
    }
}

fn get_property<'v>(value: &'v Value, name: &str) -> Result<Cow<'v, Value>, EvalError> {
    match value {
        Value::Object(map) => Ok(map.get(name).map_or(Cow::Owned(Value::Null), Cow::Borrowed)),
        Value::Array(items) if name == "length" => Ok(Cow::Owned(Value::from(items.len()))),
        Value::String(s) if name == "length" => Ok(Cow::Owned(Value::from(s.chars().count()))),
        Value::Array(items) => Ok(name
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .map_or(Cow::Owned(Value::Null), Cow::Borrowed)),
        Value::Null => Err(EvalError::TypeError(format!(
            "cannot read properties of null (reading '{}')",
            name
        ))),
        _ => Ok(Cow::Owned(Value::Null)),
    }
}

fn get_index<'v>(value: &'v Value, index: &Value) -> Result<Cow<'v, Value>, EvalError> {
    match (value, index) {
        (Value::Array(items), Value::Number(n)) => Ok(n
            .as_u64()
            .and_then(|i| items.get(i as usize))
            .map_or(Cow::Owned(Value::Null), Cow::Borrowed)),
        (Value::String(s), Value::Number(n)) => Ok(Cow::Owned(
            n.as_u64()
                .and_then(|i| s.chars().nth(i as usize))
                .map_or(Value::Null, |c| Value::String(c.to_string())),
        )),
        (_, Value::String(key)) => get_property(value, key),
        (_, other) => get_property(value, &other.to_display_string()),
    }
}

fn string_arg(args: &[Value], position: usize, method: &str) -> Result<String, EvalError> {
    match args.get(position) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(EvalError::TypeError(format!(
            "{}() requires argument {}",
            method,
            position + 1
        ))),
        Some(other) => Ok(other.to_display_string()),
    }
}

/// Resolve `slice(start, end)` arguments against a length, negative
/// offsets counting from the end.
fn slice_bounds(len: usize, args: &[Value]) -> (usize, usize) {
    let resolve = |arg: Option<&Value>, default: usize| -> usize {
        match arg.and_then(|v| v.as_i64()) {
            None => default,
            Some(i) if i < 0 => len.saturating_sub(i.unsigned_abs() as usize),
            Some(i) => (i as usize).min(len),
        }
    };
    let start = resolve(args.first(), 0);
    let end = resolve(args.get(1), len);
    (start, end.max(start))
}

fn apply_unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Negate => match operand {
            Value::Number(n) => match n.as_i64().and_then(i64::checked_neg) {
                Some(i) => Ok(Value::Number(Number::from(i))),
                None => Ok(number_value(-n.as_f64().unwrap_or_default())),
            },
            other => loose_number(other)
                .map(|n| number_value(-n))
                .ok_or_else(|| EvalError::TypeError(format!("cannot negate {}", other.type_name()))),
        },
    }
}

fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let value = match op {
        BinOp::Equal => Value::Bool(loose_equals(left, right)),
        BinOp::NotEqual => Value::Bool(!loose_equals(left, right)),
        BinOp::StrictEqual => Value::Bool(strict_equals(left, right)),
        BinOp::StrictNotEqual => Value::Bool(!strict_equals(left, right)),
        BinOp::LessThan => Value::Bool(compare(left, right).is_some_and(|o| o.is_lt())),
        BinOp::GreaterThan => Value::Bool(compare(left, right).is_some_and(|o| o.is_gt())),
        BinOp::LessEqual => Value::Bool(compare(left, right).is_some_and(|o| o.is_le())),
        BinOp::GreaterEqual => Value::Bool(compare(left, right).is_some_and(|o| o.is_ge())),
        BinOp::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => Value::String(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            )),
            (Value::Number(a), Value::Number(b)) => arithmetic(op, a, b)?,
            (a, b) => {
                return Err(EvalError::TypeError(format!(
                    "cannot add {} and {}",
                    a.type_name(),
                    b.type_name()
                )));
            }
        },
        BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulo => {
            match (left, right) {
                (Value::Number(a), Value::Number(b)) => arithmetic(op, a, b)?,
                (a, b) => {
                    return Err(EvalError::TypeError(format!(
                        "cannot apply {:?} to {} and {}",
                        op,
                        a.type_name(),
                        b.type_name()
                    )));
                }
            }
        }
        // Short-circuiting operators are handled before both sides are evaluated
        BinOp::And | BinOp::Or | BinOp::NullCoalesce => {
            return Err(EvalError::TypeError(format!("{:?} is not a value operator", op)));
        }
    };
    Ok(value)
}

/// Numeric arithmetic through `Decimal`, so `0.1 + 0.2 == 0.3` and whole
/// results stay integers. Falls back to `f64` outside `Decimal` range.
fn arithmetic(op: BinOp, a: &Number, b: &Number) -> Result<Value, EvalError> {
    if let (Some(x), Some(y)) = (to_decimal(a), to_decimal(b)) {
        let result = match op {
            BinOp::Add => x.checked_add(y),
            BinOp::Subtract => x.checked_sub(y),
            BinOp::Multiply => x.checked_mul(y),
            BinOp::Divide if y.is_zero() => return Err(EvalError::DivisionByZero),
            BinOp::Divide => x.checked_div(y),
            BinOp::Modulo if y.is_zero() => return Err(EvalError::DivisionByZero),
            BinOp::Modulo => x.checked_rem(y),
            _ => None,
        };
        if let Some(value) = result.and_then(from_decimal) {
            return Ok(value);
        }
    }

    let x = a.as_f64().unwrap_or_default();
    let y = b.as_f64().unwrap_or_default();
    let result = match op {
        BinOp::Add => x + y,
        BinOp::Subtract => x - y,
        BinOp::Multiply => x * y,
        BinOp::Divide | BinOp::Modulo if y == 0.0 => return Err(EvalError::DivisionByZero),
        BinOp::Divide => x / y,
        BinOp::Modulo => x % y,
        _ => return Err(EvalError::TypeError(format!("{:?} is not arithmetic", op))),
    };
    Ok(number_value(result))
}

/// Evaluates `expr` with `scope` as both root and current data.
///
/// Returns `null` on any failure; use [`try_evaluate`] to see why.
///
/// # Examples
///
/// ```
/// use serde_json::json;
///
/// let scope = json!({"price": 10, "qty": 3});
/// let total = shapeql::evaluate("price * qty", scope.as_object().unwrap());
/// assert_eq!(total, json!(30));
///
/// let missing = shapeql::evaluate("nope.deeper", scope.as_object().unwrap());
/// assert_eq!(missing, json!(null));
/// ```
pub fn evaluate(expr: &str, scope: &Map<String, Value>) -> Value {
    try_evaluate(expr, scope).unwrap_or_else(|e| {
        trace!(expr, error = %e, "expression failed");
        Value::Null
    })
}

/// Like [`evaluate`], but reports the failure.
pub fn try_evaluate(expr: &str, scope: &Map<String, Value>) -> Result<Value, EvalError> {
    let data = Value::Object(scope.clone());
    let ctx = EvalContext::new(&data, &data);
    Evaluator::new().eval_str(expr, &ctx)
}
