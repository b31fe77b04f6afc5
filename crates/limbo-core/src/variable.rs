use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::object::{HostObject, ObjectRef};
use crate::value::{Value, VariantType};

/// Editor hint attached to a variable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PropertyHint {
    #[default]
    None,
    Range,
    Enum,
    Flags,
    File,
    Dir,
    MultilineText,
    PlaceholderText,
    NodePathValidTypes,
    ResourceType,
}

struct PropertyBinding {
    object: Weak<dyn HostObject>,
    property: String,
}

struct VarCell {
    value: Value,
    var_type: VariantType,
    hint: PropertyHint,
    hint_string: String,
    value_changed: bool,
    binding: Option<PropertyBinding>,
}

/// Shared, typed variable cell.
///
/// Cloning a `BbVariable` yields another handle to the same cell; writes through either handle
/// are visible through both. Use [`BbVariable::duplicate`] for an independent copy.
#[derive(Clone)]
pub struct BbVariable {
    cell: Rc<RefCell<VarCell>>,
}

impl BbVariable {
    pub fn new(var_type: VariantType, hint: PropertyHint, hint_string: impl Into<String>) -> Self {
        Self {
            cell: Rc::new(RefCell::new(VarCell {
                value: var_type.default_value(),
                var_type,
                hint,
                hint_string: hint_string.into(),
                value_changed: false,
                binding: None,
            })),
        }
    }

    /// A variable typed after `value`.
    pub fn with_value(value: impl Into<Value>) -> Self {
        let value = value.into();
        let var = Self::new(value.get_type(), PropertyHint::None, "");
        var.cell.borrow_mut().value = value;
        var
    }

    /// Current value. Bound variables read through to the bound property.
    pub fn value(&self) -> Value {
        let binding = self
            .cell
            .borrow()
            .binding
            .as_ref()
            .and_then(|b| Some((b.object.upgrade()?, b.property.clone())));
        let bound = binding.and_then(|(object, property)| object.get_property(&property));
        let mut cell = self.cell.borrow_mut();
        if let Some(v) = bound {
            cell.value = v;
        }
        cell.value.clone()
    }

    pub fn set_value(&self, value: impl Into<Value>) {
        let value = value.into();
        let binding = {
            let mut cell = self.cell.borrow_mut();
            cell.value = value.clone();
            cell.value_changed = true;
            cell.binding
                .as_ref()
                .and_then(|b| Some((b.object.upgrade()?, b.property.clone())))
        };
        if let Some((object, property)) = binding {
            if !object.set_property(&property, value) {
                tracing::warn!(property = %property, "BbVariable: bound property rejected value");
            }
        }
    }

    pub fn var_type(&self) -> VariantType {
        self.cell.borrow().var_type
    }

    /// Changing the type resets the value to the type's zero value.
    pub fn set_type(&self, var_type: VariantType) {
        let mut cell = self.cell.borrow_mut();
        if cell.var_type != var_type {
            cell.var_type = var_type;
            cell.value = var_type.default_value();
        }
    }

    pub fn hint(&self) -> PropertyHint {
        self.cell.borrow().hint
    }

    pub fn set_hint(&self, hint: PropertyHint) {
        self.cell.borrow_mut().hint = hint;
    }

    pub fn hint_string(&self) -> String {
        self.cell.borrow().hint_string.clone()
    }

    pub fn set_hint_string(&self, hint_string: impl Into<String>) {
        self.cell.borrow_mut().hint_string = hint_string.into();
    }

    pub fn is_value_changed(&self) -> bool {
        self.cell.borrow().value_changed
    }

    pub fn reset_value_changed(&self) {
        self.cell.borrow_mut().value_changed = false;
    }

    /// Independent copy of this variable. Property bindings are not carried over.
    pub fn duplicate(&self) -> Self {
        let cell = self.cell.borrow();
        Self {
            cell: Rc::new(RefCell::new(VarCell {
                value: cell.value.clone(),
                var_type: cell.var_type,
                hint: cell.hint,
                hint_string: cell.hint_string.clone(),
                value_changed: cell.value_changed,
                binding: None,
            })),
        }
    }

    /// True if both handles point at the same cell.
    pub fn ptr_eq(&self, other: &BbVariable) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn is_same_prop_info(&self, other: &BbVariable) -> bool {
        let a = self.cell.borrow();
        let b = other.cell.borrow();
        a.var_type == b.var_type && a.hint == b.hint && a.hint_string == b.hint_string
    }

    pub fn copy_prop_info(&self, other: &BbVariable) {
        if self.ptr_eq(other) {
            return;
        }
        let (var_type, hint, hint_string) = {
            let b = other.cell.borrow();
            (b.var_type, b.hint, b.hint_string.clone())
        };
        let mut a = self.cell.borrow_mut();
        a.var_type = var_type;
        a.hint = hint;
        a.hint_string = hint_string;
    }

    /// Mirrors `object.property`: reads and writes go through to the object.
    pub fn bind(&self, object: &ObjectRef, property: impl Into<String>) {
        self.cell.borrow_mut().binding = Some(PropertyBinding {
            object: Rc::downgrade(object),
            property: property.into(),
        });
    }

    pub fn unbind(&self) {
        self.cell.borrow_mut().binding = None;
    }

    pub fn is_bound(&self) -> bool {
        self.cell.borrow().binding.is_some()
    }
}

impl Default for BbVariable {
    fn default() -> Self {
        Self::new(VariantType::Nil, PropertyHint::None, "")
    }
}

impl PartialEq for BbVariable {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.is_same_prop_info(other) && self.value() == other.value()
    }
}

impl fmt::Debug for BbVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.cell.borrow();
        f.debug_struct("BbVariable")
            .field("type", &cell.var_type)
            .field("value", &cell.value)
            .field("hint", &cell.hint)
            .field("hint_string", &cell.hint_string)
            .field("bound", &cell.binding.is_some())
            .finish()
    }
}
