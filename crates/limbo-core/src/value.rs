use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::object::ObjectRef;
use crate::path::NodePath;

/// Tolerance used when matching float facts and parameters.
pub const FLOAT_EPSILON: f64 = 0.001;

/// Runtime type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VariantType {
    #[default]
    Nil,
    Bool,
    Int,
    Float,
    String,
    StringName,
    Vector2,
    Vector3,
    NodePath,
    Object,
    Array,
    Dictionary,
}

impl VariantType {
    pub const ALL: [VariantType; 12] = [
        VariantType::Nil,
        VariantType::Bool,
        VariantType::Int,
        VariantType::Float,
        VariantType::String,
        VariantType::StringName,
        VariantType::Vector2,
        VariantType::Vector3,
        VariantType::NodePath,
        VariantType::Object,
        VariantType::Array,
        VariantType::Dictionary,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VariantType::Nil => "Nil",
            VariantType::Bool => "bool",
            VariantType::Int => "int",
            VariantType::Float => "float",
            VariantType::String => "String",
            VariantType::StringName => "StringName",
            VariantType::Vector2 => "Vector2",
            VariantType::Vector3 => "Vector3",
            VariantType::NodePath => "NodePath",
            VariantType::Object => "Object",
            VariantType::Array => "Array",
            VariantType::Dictionary => "Dictionary",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    pub fn index(self) -> i64 {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0) as i64
    }

    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Zero value of the type. Objects have no zero value and map to `Nil`.
    pub fn default_value(self) -> Value {
        match self {
            VariantType::Nil | VariantType::Object => Value::Nil,
            VariantType::Bool => Value::Bool(false),
            VariantType::Int => Value::Int(0),
            VariantType::Float => Value::Float(0.0),
            VariantType::String => Value::String(String::new()),
            VariantType::StringName => Value::StringName(String::new()),
            VariantType::Vector2 => Value::Vector2(Vector2::ZERO),
            VariantType::Vector3 => Value::Vector3(Vector3::ZERO),
            VariantType::NodePath => Value::NodePath(NodePath::default()),
            VariantType::Array => Value::Array(Vec::new()),
            VariantType::Dictionary => Value::Dictionary(BTreeMap::new()),
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Dynamically typed value stored in blackboards, parameters and world states.
///
/// `Object` holds a shared handle to a host object and is compared by identity. It is never
/// serialized.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    StringName(String),
    Vector2(Vector2),
    Vector3(Vector3),
    NodePath(NodePath),
    #[cfg_attr(feature = "serde", serde(skip))]
    Object(ObjectRef),
    Array(Vec<Value>),
    Dictionary(BTreeMap<String, Value>),
}

impl Value {
    pub fn get_type(&self) -> VariantType {
        match self {
            Value::Nil => VariantType::Nil,
            Value::Bool(_) => VariantType::Bool,
            Value::Int(_) => VariantType::Int,
            Value::Float(_) => VariantType::Float,
            Value::String(_) => VariantType::String,
            Value::StringName(_) => VariantType::StringName,
            Value::Vector2(_) => VariantType::Vector2,
            Value::Vector3(_) => VariantType::Vector3,
            Value::NodePath(_) => VariantType::NodePath,
            Value::Object(_) => VariantType::Object,
            Value::Array(_) => VariantType::Array,
            Value::Dictionary(_) => VariantType::Dictionary,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of ints and floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::StringName(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node_path(&self) -> Option<&NodePath> {
        match self {
            Value::NodePath(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Boolean interpretation: zero, empty and `Nil` values are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) | Value::StringName(s) => !s.is_empty(),
            Value::Vector2(v) => *v != Vector2::ZERO,
            Value::Vector3(v) => *v != Vector3::ZERO,
            Value::NodePath(p) => !p.is_empty(),
            Value::Object(_) => true,
            Value::Array(a) => !a.is_empty(),
            Value::Dictionary(d) => !d.is_empty(),
        }
    }

    /// Converts to `target`, returning `None` when no sensible conversion exists.
    ///
    /// `Nil` converts to the zero value of any type, and `VariantType::Nil` accepts anything.
    pub fn convert(&self, target: VariantType) -> Option<Value> {
        if target == VariantType::Nil || self.get_type() == target {
            return Some(self.clone());
        }
        if self.is_nil() {
            return Some(target.default_value());
        }
        let converted = match (self, target) {
            (Value::Bool(b), VariantType::Int) => Value::Int(i64::from(*b)),
            (Value::Bool(b), VariantType::Float) => Value::Float(if *b { 1.0 } else { 0.0 }),
            (Value::Int(i), VariantType::Bool) => Value::Bool(*i != 0),
            (Value::Int(i), VariantType::Float) => Value::Float(*i as f64),
            (Value::Float(f), VariantType::Bool) => Value::Bool(*f != 0.0),
            (Value::Float(f), VariantType::Int) => Value::Int(f.trunc() as i64),
            (Value::String(s), VariantType::StringName) => Value::StringName(s.clone()),
            (Value::StringName(s), VariantType::String) => Value::String(s.clone()),
            (Value::String(s) | Value::StringName(s), VariantType::NodePath) => {
                Value::NodePath(NodePath::new(s.as_str()))
            }
            (Value::String(s) | Value::StringName(s), VariantType::Int) => {
                Value::Int(s.trim().parse().ok()?)
            }
            (Value::String(s) | Value::StringName(s), VariantType::Float) => {
                Value::Float(s.trim().parse().ok()?)
            }
            (Value::String(s) | Value::StringName(s), VariantType::Bool) => {
                Value::Bool(!s.is_empty())
            }
            (Value::NodePath(p), VariantType::String) => Value::String(p.as_str().to_string()),
            (Value::NodePath(p), VariantType::StringName) => {
                Value::StringName(p.as_str().to_string())
            }
            (Value::Vector2(v), VariantType::Vector3) => Value::Vector3(Vector3::new(v.x, v.y, 0.0)),
            (Value::Vector3(v), VariantType::Vector2) => Value::Vector2(Vector2::new(v.x, v.y)),
            (other, VariantType::String) => Value::String(other.to_string()),
            _ => return None,
        };
        Some(converted)
    }

    /// Fact matching: types must agree exactly, floats match within [`FLOAT_EPSILON`].
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => (a - b).abs() < FLOAT_EPSILON,
            (Value::Vector2(a), Value::Vector2(b)) => {
                (a.x - b.x).abs() < FLOAT_EPSILON && (a.y - b.y).abs() < FLOAT_EPSILON
            }
            (Value::Vector3(a), Value::Vector3(b)) => {
                (a.x - b.x).abs() < FLOAT_EPSILON
                    && (a.y - b.y).abs() < FLOAT_EPSILON
                    && (a.z - b.z).abs() < FLOAT_EPSILON
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
            }
            (Value::Dictionary(a), Value::Dictionary(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.matches(other)))
            }
            _ => self == other,
        }
    }

    /// Stable hash of the value. Objects hash by identity.
    pub fn hash_value(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_into(&mut hasher, true);
        hasher.finish()
    }

    /// Hash that agrees with [`Value::matches`]: values that match hash equal. Float components
    /// contribute only their type, since epsilon matching cannot be bucketed exactly.
    pub fn match_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_into(&mut hasher, false);
        hasher.finish()
    }

    fn hash_into<H: Hasher>(&self, state: &mut H, exact_floats: bool) {
        self.get_type().hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => {
                if exact_floats {
                    f.to_bits().hash(state);
                }
            }
            Value::String(s) | Value::StringName(s) => s.hash(state),
            Value::Vector2(v) => {
                if exact_floats {
                    v.x.to_bits().hash(state);
                    v.y.to_bits().hash(state);
                }
            }
            Value::Vector3(v) => {
                if exact_floats {
                    v.x.to_bits().hash(state);
                    v.y.to_bits().hash(state);
                    v.z.to_bits().hash(state);
                }
            }
            Value::NodePath(p) => p.as_str().hash(state),
            Value::Object(o) => (Rc::as_ptr(o) as *const () as usize).hash(state),
            Value::Array(a) => {
                a.len().hash(state);
                for v in a {
                    v.hash_into(state, exact_floats);
                }
            }
            Value::Dictionary(d) => {
                d.len().hash(state);
                for (k, v) in d {
                    k.hash(state);
                    v.hash_into(state, exact_floats);
                }
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::StringName(a), Value::StringName(b)) => a == b,
            (Value::Vector2(a), Value::Vector2(b)) => a == b,
            (Value::Vector3(a), Value::Vector3(b)) => a == b,
            (Value::NodePath(a), Value::NodePath(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Dictionary(a), Value::Dictionary(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x:?})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::StringName(s) => write!(f, "StringName({s:?})"),
            Value::Vector2(v) => write!(f, "Vector2({:?}, {:?})", v.x, v.y),
            Value::Vector3(v) => write!(f, "Vector3({:?}, {:?}, {:?})", v.x, v.y, v.z),
            Value::NodePath(p) => write!(f, "NodePath({:?})", p.as_str()),
            Value::Object(o) => write!(f, "Object({})", o.object_name()),
            Value::Array(a) => f.debug_list().entries(a).finish(),
            Value::Dictionary(d) => f.debug_map().entries(d).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("<null>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) | Value::StringName(s) => f.write_str(s),
            Value::Vector2(v) => write!(f, "({:?}, {:?})", v.x, v.y),
            Value::Vector3(v) => write!(f, "({:?}, {:?}, {:?})", v.x, v.y, v.z),
            Value::NodePath(p) => f.write_str(p.as_str()),
            Value::Object(o) => write!(f, "<{}>", o.object_name()),
            Value::Array(a) => {
                f.write_str("[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Dictionary(d) => {
                f.write_str("{ ")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                f.write_str(" }")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vector2> for Value {
    fn from(v: Vector2) -> Self {
        Value::Vector2(v)
    }
}

impl From<Vector3> for Value {
    fn from(v: Vector3) -> Self {
        Value::Vector3(v)
    }
}

impl From<NodePath> for Value {
    fn from(v: NodePath) -> Self {
        Value::NodePath(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Dictionary(v)
    }
}
