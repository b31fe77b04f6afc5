use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::blackboard::Blackboard;
use crate::object::ObjectRef;
use crate::path::NodePath;
use crate::value::{Value, VariantType};

/// Where a [`BbParam`] takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueSource {
    #[default]
    SavedValue,
    BlackboardVar,
}

#[derive(Debug, Clone)]
struct ParamData {
    source: ValueSource,
    saved_value: Value,
    variable: String,
    expected: VariantType,
}

/// Task parameter that is either a literal or a reference to a blackboard variable.
///
/// Like [`crate::BbVariable`], clones are handles to the same parameter. Tasks that get cloned
/// per agent duplicate their parameters through [`ParamDuplicates`].
#[derive(Clone)]
pub struct BbParam {
    data: Rc<RefCell<ParamData>>,
}

impl BbParam {
    /// Parameter of `expected` type holding the type's zero value.
    pub fn new(expected: VariantType) -> Self {
        Self {
            data: Rc::new(RefCell::new(ParamData {
                source: ValueSource::SavedValue,
                saved_value: expected.default_value(),
                variable: String::new(),
                expected,
            })),
        }
    }

    /// Literal parameter. The expected type follows the value unless it is nil.
    pub fn saved(expected: VariantType, value: impl Into<Value>) -> Self {
        let param = Self::new(expected);
        param.set_saved_value(value);
        param
    }

    /// Parameter that reads blackboard variable `name`.
    pub fn var(expected: VariantType, name: impl Into<String>) -> Self {
        let param = Self::new(expected);
        param.set_variable(name);
        param
    }

    /// Literal of any type.
    pub fn variant(value: impl Into<Value>) -> Self {
        Self::saved(VariantType::Nil, value)
    }

    pub fn bool(value: bool) -> Self {
        Self::saved(VariantType::Bool, value)
    }

    pub fn int(value: i64) -> Self {
        Self::saved(VariantType::Int, value)
    }

    pub fn float(value: f64) -> Self {
        Self::saved(VariantType::Float, value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::saved(VariantType::String, Value::String(value.into()))
    }

    pub fn string_name(value: impl Into<String>) -> Self {
        Self::saved(VariantType::StringName, Value::StringName(value.into()))
    }

    pub fn vector2(value: crate::Vector2) -> Self {
        Self::saved(VariantType::Vector2, value)
    }

    pub fn vector3(value: crate::Vector3) -> Self {
        Self::saved(VariantType::Vector3, value)
    }

    pub fn array(value: Vec<Value>) -> Self {
        Self::saved(VariantType::Array, value)
    }

    pub fn dictionary(value: std::collections::BTreeMap<String, Value>) -> Self {
        Self::saved(VariantType::Dictionary, value)
    }

    /// Node parameter: a path resolved against the scene root, or an object held directly.
    pub fn node(path: impl Into<NodePath>) -> Self {
        Self::saved(VariantType::NodePath, Value::NodePath(path.into()))
    }

    pub fn source(&self) -> ValueSource {
        self.data.borrow().source
    }

    pub fn set_source(&self, source: ValueSource) {
        self.data.borrow_mut().source = source;
    }

    pub fn expected_type(&self) -> VariantType {
        self.data.borrow().expected
    }

    pub fn saved_value(&self) -> Value {
        self.data.borrow().saved_value.clone()
    }

    /// Stores a literal, converted to the expected type when one is set, and switches the
    /// source to [`ValueSource::SavedValue`].
    pub fn set_saved_value(&self, value: impl Into<Value>) {
        let value = value.into();
        let mut data = self.data.borrow_mut();
        let stored = match data.expected {
            VariantType::Nil => value,
            VariantType::NodePath if matches!(value, Value::Object(_)) => value,
            expected => match value.convert(expected) {
                Some(converted) => converted,
                None => {
                    tracing::warn!(
                        expected = %expected,
                        got = %value.get_type(),
                        "BbParam: saved value can't be converted to the expected type"
                    );
                    expected.default_value()
                }
            },
        };
        data.saved_value = stored;
        data.source = ValueSource::SavedValue;
    }

    pub fn variable(&self) -> String {
        self.data.borrow().variable.clone()
    }

    /// Points the parameter at blackboard variable `name`.
    pub fn set_variable(&self, name: impl Into<String>) {
        let mut data = self.data.borrow_mut();
        data.variable = name.into();
        data.source = ValueSource::BlackboardVar;
    }

    /// Resolves the parameter against `bb`. Node parameters additionally resolve paths through
    /// `scene_root`.
    pub fn get_value(
        &self,
        scene_root: Option<&ObjectRef>,
        bb: &Blackboard,
        default: Value,
    ) -> Value {
        let (source, saved, variable, expected) = {
            let d = self.data.borrow();
            (d.source, d.saved_value.clone(), d.variable.clone(), d.expected)
        };
        let raw = match source {
            ValueSource::SavedValue => saved,
            ValueSource::BlackboardVar => {
                if variable.is_empty() {
                    return default;
                }
                bb.get_var(&variable, default.clone(), true)
            }
        };
        if expected != VariantType::NodePath {
            return raw;
        }
        match raw {
            Value::NodePath(path) => {
                let Some(root) = scene_root else {
                    tracing::error!(path = %path, "BbParam: can't resolve node without a scene root");
                    return default;
                };
                let resolved = if path.names().next().is_none() {
                    Some(root.clone())
                } else {
                    root.get_node(&path)
                };
                match resolved {
                    Some(node) => Value::Object(node),
                    None => {
                        tracing::error!(path = %path, "BbParam: node not found");
                        default
                    }
                }
            }
            other => other,
        }
    }

    /// Independent copy.
    pub fn duplicate(&self) -> Self {
        Self {
            data: Rc::new(RefCell::new(self.data.borrow().clone())),
        }
    }

    pub fn ptr_eq(&self, other: &BbParam) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl Default for BbParam {
    fn default() -> Self {
        Self::new(VariantType::Nil)
    }
}

impl fmt::Display for BbParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.borrow();
        match data.source {
            ValueSource::BlackboardVar => write!(f, "${}", data.variable),
            ValueSource::SavedValue => match &data.saved_value {
                Value::String(s) | Value::StringName(s) => write!(f, "\"{s}\""),
                Value::NodePath(p) => write!(f, "^{p}"),
                other => write!(f, "{other}"),
            },
        }
    }
}

impl fmt::Debug for BbParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BbParam({self})")
    }
}

/// Per-node duplication table used while cloning tasks.
///
/// Asking twice for the same source parameter returns the same copy, so parameters shared
/// between properties of one node stay shared in the clone.
#[derive(Default)]
pub struct ParamDuplicates {
    copies: Vec<(BbParam, BbParam)>,
}

impl ParamDuplicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duplicate(&mut self, param: &BbParam) -> BbParam {
        if let Some((_, copy)) = self.copies.iter().find(|(orig, _)| orig.ptr_eq(param)) {
            return copy.clone();
        }
        let copy = param.duplicate();
        self.copies.push((param.clone(), copy.clone()));
        copy
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}
