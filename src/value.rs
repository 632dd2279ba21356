//! Helpers giving `serde_json::Value` the coercion rules of the expression
//! language.
//!
//! Data flowing through the engine is plain `serde_json::Value` (built with
//! `preserve_order`, so object keys enumerate in insertion order). The
//! [`ValueExt`] trait adds truthiness, display conversion and type naming;
//! the free functions implement number handling and equality.

use std::cmp::Ordering;

use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde_json::{Number, Value};

pub trait ValueExt {
    /// Check if the value is truthy (for conditions).
    ///
    /// `null`, `false`, `0`, `NaN` and `""` are falsy. Empty arrays and
    /// objects are truthy.
    fn is_truthy(&self) -> bool;

    /// Human-readable type name, used in error messages.
    fn type_name(&self) -> &'static str;

    /// String form used by `+` concatenation and `toString()`.
    fn to_display_string(&self) -> String;
}

impl ValueExt for Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
        }
    }
}

/// Build a JSON number from an `f64`, keeping whole numbers integral.
///
/// Non-finite numbers have no JSON form and become `null`.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Convert a JSON number into a `Decimal` for exact arithmetic.
pub fn to_decimal(n: &Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        Decimal::from_i64(i)
    } else if let Some(u) = n.as_u64() {
        Decimal::from_u64(u)
    } else {
        n.as_f64().and_then(Decimal::from_f64)
    }
}

/// Convert a `Decimal` result back, integral when the value is whole.
pub fn from_decimal(d: Decimal) -> Option<Value> {
    if d.is_integer()
        && let Some(i) = d.to_i64()
    {
        return Some(Value::Number(Number::from(i)));
    }
    d.to_f64().and_then(Number::from_f64).map(Value::Number)
}

/// Numeric view of a value for loose comparisons.
///
/// Numbers are themselves, booleans are 0/1, numeric strings parse, `null`
/// is 0. Anything else has no numeric view.
pub fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Strict equality (`===`): same type and value.
///
/// Numbers compare by magnitude, so `1 === 1.0`. Arrays and objects compare
/// structurally since values are detached copies rather than references.
pub fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}

/// Loose equality (`==`).
pub fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::String(_) | Value::Bool(_))
        | (Value::String(_) | Value::Bool(_), Value::Number(_))
        | (Value::Bool(_), Value::String(_))
        | (Value::String(_), Value::Bool(_)) => {
            match (loose_number(left), loose_number(right)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => strict_equals(left, right),
    }
}

/// Ordering for relational operators.
///
/// Two strings compare lexicographically; otherwise both sides must have a
/// numeric view. `None` means the comparison is false whichever operator
/// asked.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => None,
        _ => loose_number(left)?.partial_cmp(&loose_number(right)?),
    }
}
