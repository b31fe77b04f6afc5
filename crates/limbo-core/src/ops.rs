use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::{Value, Vector2, Vector3};

/// Comparison used by condition tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CheckType {
    #[default]
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    NotEqual,
}

impl CheckType {
    pub fn symbol(self) -> &'static str {
        match self {
            CheckType::Equal => "==",
            CheckType::LessThan => "<",
            CheckType::LessThanOrEqual => "<=",
            CheckType::GreaterThan => ">",
            CheckType::GreaterThanOrEqual => ">=",
            CheckType::NotEqual => "!=",
        }
    }

    /// Ints and floats compare numerically; strings compare lexically. Ordering checks between
    /// unordered values are false.
    pub fn evaluate(self, left: &Value, right: &Value) -> bool {
        let ordering = compare(left, right);
        match self {
            CheckType::Equal => values_equal(left, right),
            CheckType::NotEqual => !values_equal(left, right),
            CheckType::LessThan => ordering == Some(Ordering::Less),
            CheckType::LessThanOrEqual => {
                matches!(ordering, Some(Ordering::Less | Ordering::Equal))
            }
            CheckType::GreaterThan => ordering == Some(Ordering::Greater),
            CheckType::GreaterThanOrEqual => {
                matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
            }
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) if left.is_numeric() && right.is_numeric() => a == b,
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        _ if left.is_numeric() && right.is_numeric() => {
            left.as_float()?.partial_cmp(&right.as_float()?)
        }
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => match (left.as_str(), right.as_str()) {
            (Some(a), Some(b)) => Some(a.cmp(b)),
            _ => None,
        },
    }
}

/// Arithmetic/bitwise operation applied when writing a variable or property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Operation {
    /// Plain assignment of the right-hand value.
    #[default]
    None,
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Modulo,
    Power,
    BitShiftLeft,
    BitShiftRight,
    BitAnd,
    BitOr,
    BitXor,
}

impl Operation {
    pub fn symbol(self) -> &'static str {
        match self {
            Operation::None => "=",
            Operation::Addition => "+=",
            Operation::Subtraction => "-=",
            Operation::Multiplication => "*=",
            Operation::Division => "/=",
            Operation::Modulo => "%=",
            Operation::Power => "**=",
            Operation::BitShiftLeft => "<<=",
            Operation::BitShiftRight => ">>=",
            Operation::BitAnd => "&=",
            Operation::BitOr => "|=",
            Operation::BitXor => "^=",
        }
    }

    /// Computes `left <op> right`. Returns `None` for unsupported operand types and for
    /// integer division by zero or overflow.
    pub fn apply(self, left: &Value, right: &Value) -> Option<Value> {
        match self {
            Operation::None => Some(right.clone()),
            Operation::Addition => add(left, right),
            Operation::Subtraction => sub(left, right),
            Operation::Multiplication => mul(left, right),
            Operation::Division => div(left, right),
            Operation::Modulo => match (left, right) {
                (Value::Int(a), Value::Int(b)) => a.checked_rem(*b).map(Value::Int),
                _ => float_op(left, right, |a, b| a % b),
            },
            Operation::Power => match (left, right) {
                (Value::Int(a), Value::Int(b)) if *b >= 0 => {
                    let exp = u32::try_from(*b).ok()?;
                    a.checked_pow(exp).map(Value::Int)
                }
                _ => float_op(left, right, f64::powf),
            },
            Operation::BitShiftLeft => int_op(left, right, |a, b| {
                u32::try_from(b).ok().and_then(|s| a.checked_shl(s))
            }),
            Operation::BitShiftRight => int_op(left, right, |a, b| {
                u32::try_from(b).ok().and_then(|s| a.checked_shr(s))
            }),
            Operation::BitAnd => int_op(left, right, |a, b| Some(a & b)),
            Operation::BitOr => int_op(left, right, |a, b| Some(a | b)),
            Operation::BitXor => int_op(left, right, |a, b| Some(a ^ b)),
        }
    }
}

fn int_op(left: &Value, right: &Value, f: impl Fn(i64, i64) -> Option<i64>) -> Option<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => f(*a, *b).map(Value::Int),
        _ => None,
    }
}

fn float_op(left: &Value, right: &Value, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
    if !left.is_numeric() || !right.is_numeric() {
        return None;
    }
    Some(Value::Float(f(left.as_float()?, right.as_float()?)))
}

fn add(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int),
        (Value::String(a), Value::String(b)) => Some(Value::String(format!("{a}{b}"))),
        (Value::StringName(a), Value::StringName(b)) => {
            Some(Value::StringName(format!("{a}{b}")))
        }
        (Value::Vector2(a), Value::Vector2(b)) => {
            Some(Value::Vector2(Vector2::new(a.x + b.x, a.y + b.y)))
        }
        (Value::Vector3(a), Value::Vector3(b)) => Some(Value::Vector3(Vector3::new(
            a.x + b.x,
            a.y + b.y,
            a.z + b.z,
        ))),
        (Value::Array(a), Value::Array(b)) => {
            let mut joined = a.clone();
            joined.extend(b.iter().cloned());
            Some(Value::Array(joined))
        }
        _ => float_op(left, right, |a, b| a + b),
    }
}

fn sub(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int),
        (Value::Vector2(a), Value::Vector2(b)) => {
            Some(Value::Vector2(Vector2::new(a.x - b.x, a.y - b.y)))
        }
        (Value::Vector3(a), Value::Vector3(b)) => Some(Value::Vector3(Vector3::new(
            a.x - b.x,
            a.y - b.y,
            a.z - b.z,
        ))),
        _ => float_op(left, right, |a, b| a - b),
    }
}

fn mul(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int),
        (Value::Vector2(v), s) if s.is_numeric() => {
            let s = s.as_float()?;
            Some(Value::Vector2(Vector2::new(v.x * s, v.y * s)))
        }
        (Value::Vector3(v), s) if s.is_numeric() => {
            let s = s.as_float()?;
            Some(Value::Vector3(Vector3::new(v.x * s, v.y * s, v.z * s)))
        }
        _ => float_op(left, right, |a, b| a * b),
    }
}

fn div(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.checked_div(*b).map(Value::Int),
        (Value::Vector2(v), s) if s.is_numeric() => {
            let s = s.as_float()?;
            Some(Value::Vector2(Vector2::new(v.x / s, v.y / s)))
        }
        (Value::Vector3(v), s) if s.is_numeric() => {
            let s = s.as_float()?;
            Some(Value::Vector3(Vector3::new(v.x / s, v.y / s, v.z / s)))
        }
        _ => float_op(left, right, |a, b| a / b),
    }
}
