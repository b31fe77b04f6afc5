use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::error::BlackboardError;
use crate::object::ObjectRef;
use crate::value::Value;
use crate::variable::BbVariable;

#[derive(Default)]
struct Scope {
    data: BTreeMap<String, BbVariable>,
    parent: Option<Blackboard>,
}

/// Scoped variable store.
///
/// A `Blackboard` is a shared handle: clones refer to the same scope. Lookups that miss the local
/// scope continue in the parent scope; writes always land in the local scope.
#[derive(Clone, Default)]
pub struct Blackboard {
    scope: Rc<RefCell<Scope>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new empty scope whose lookups fall back to `parent`.
    pub fn with_parent(parent: &Blackboard) -> Self {
        let bb = Self::new();
        bb.scope.borrow_mut().parent = Some(parent.clone());
        bb
    }

    pub fn ptr_eq(&self, other: &Blackboard) -> bool {
        Rc::ptr_eq(&self.scope, &other.scope)
    }

    pub fn parent(&self) -> Option<Blackboard> {
        self.scope.borrow().parent.clone()
    }

    pub fn set_parent(&self, parent: Option<Blackboard>) -> Result<(), BlackboardError> {
        if let Some(p) = &parent {
            let mut cursor = Some(p.clone());
            while let Some(bb) = cursor {
                if bb.ptr_eq(self) {
                    tracing::error!("Blackboard: can't set a descendant scope as parent");
                    return Err(BlackboardError::ScopeCycle);
                }
                cursor = bb.parent();
            }
        }
        self.scope.borrow_mut().parent = parent;
        Ok(())
    }

    /// Root-most scope of the parent chain.
    pub fn top(&self) -> Blackboard {
        let mut bb = self.clone();
        while let Some(parent) = bb.parent() {
            bb = parent;
        }
        bb
    }

    /// Variable cell for `name`, searching the parent chain.
    pub fn get_variable(&self, name: &str) -> Option<BbVariable> {
        let (local, parent) = {
            let scope = self.scope.borrow();
            (scope.data.get(name).cloned(), scope.parent.clone())
        };
        match local {
            Some(var) => Some(var),
            None => parent?.get_variable(name),
        }
    }

    pub fn get_local_variable(&self, name: &str) -> Option<BbVariable> {
        self.scope.borrow().data.get(name).cloned()
    }

    /// Value of `name` in this scope or the nearest ancestor that has it, else `default`.
    pub fn get_var(&self, name: &str, default: Value, complain: bool) -> Value {
        match self.get_variable(name) {
            Some(var) => var.value(),
            None => {
                if complain {
                    tracing::warn!(var = %name, "Blackboard: Variable not found.");
                }
                default
            }
        }
    }

    /// Writes `name` in the local scope. Existing slots keep their declared type; new slots are
    /// typed after `value`.
    pub fn set_var(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let existing = self.get_local_variable(name);
        match existing {
            Some(var) => var.set_value(value),
            None => {
                let var = BbVariable::with_value(value);
                self.scope.borrow_mut().data.insert(name.to_string(), var);
            }
        }
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.get_variable(name).is_some()
    }

    pub fn has_local_var(&self, name: &str) -> bool {
        self.scope.borrow().data.contains_key(name)
    }

    /// Removes `name` from the local scope. Returns `false` if it wasn't there.
    pub fn erase_var(&self, name: &str) -> bool {
        self.scope.borrow_mut().data.remove(name).is_some()
    }

    pub fn clear(&self) {
        self.scope.borrow_mut().data.clear();
    }

    /// Local variable names, sorted.
    pub fn list_vars(&self) -> Vec<String> {
        self.scope.borrow().data.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.scope.borrow().data.is_empty()
    }

    pub fn get_vars_as_map(&self) -> BTreeMap<String, Value> {
        let vars: Vec<(String, BbVariable)> = self
            .scope
            .borrow()
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        vars.into_iter().map(|(k, v)| (k, v.value())).collect()
    }

    pub fn populate_from_map(&self, values: &BTreeMap<String, Value>, overwrite: bool) {
        for (name, value) in values {
            if overwrite || !self.has_local_var(name) {
                self.set_var(name, value.clone());
            }
        }
    }

    /// Inserts `var` as the local slot `name`, sharing the cell.
    pub fn assign_var(&self, name: &str, var: BbVariable) {
        self.scope.borrow_mut().data.insert(name.to_string(), var);
    }

    /// Makes the local slot `name` mirror `object.property`.
    pub fn bind_var_to_property(
        &self,
        name: &str,
        object: &ObjectRef,
        property: &str,
        create: bool,
    ) -> Result<(), BlackboardError> {
        let var = match self.get_local_variable(name) {
            Some(var) => var,
            None if create => {
                let var = BbVariable::default();
                self.assign_var(name, var.clone());
                var
            }
            None => {
                tracing::error!(var = %name, "Blackboard: Can't bind variable that doesn't exist.");
                return Err(BlackboardError::BindMissingVar(name.to_string()));
            }
        };
        var.bind(object, property);
        Ok(())
    }

    pub fn unbind_var(&self, name: &str) -> Result<(), BlackboardError> {
        match self.get_local_variable(name) {
            Some(var) => {
                var.unbind();
                Ok(())
            }
            None => {
                tracing::error!(var = %name, "Blackboard: Can't unbind variable that doesn't exist.");
                Err(BlackboardError::UnbindMissingVar(name.to_string()))
            }
        }
    }

    /// Makes the local slot `name` share the cell of `target_var` in `target`.
    ///
    /// Afterwards writes through either board are visible through both. Nothing changes on
    /// error.
    pub fn link_var(
        &self,
        name: &str,
        target: &Blackboard,
        target_var: &str,
        create: bool,
    ) -> Result<(), BlackboardError> {
        let local = self.get_local_variable(name);
        if local.is_none() && !create {
            tracing::error!(var = %name, "Blackboard: Can't link variable that doesn't exist.");
            return Err(BlackboardError::LinkMissingVar(name.to_string()));
        }
        let Some(target_cell) = target.get_local_variable(target_var) else {
            tracing::error!(
                var = %name,
                target = %target_var,
                "Blackboard: Can't link variable to target that doesn't exist."
            );
            return Err(BlackboardError::LinkMissingTarget(target_var.to_string()));
        };
        if let Some(local) = &local {
            if local.var_type() != target_cell.var_type() {
                tracing::warn!(
                    var = %name,
                    target = %target_var,
                    "Blackboard: Linking variables with different types."
                );
            }
        }
        self.assign_var(name, target_cell);
        Ok(())
    }

    /// Human-readable dump of this scope and its ancestors.
    pub fn print_state(&self) -> String {
        let mut out = String::new();
        let mut cursor = Some(self.clone());
        let mut depth = 0;
        while let Some(bb) = cursor {
            let _ = writeln!(out, "Blackboard (scope {depth}):");
            for (name, value) in bb.get_vars_as_map() {
                let _ = writeln!(out, "  ${name}: {value}");
            }
            cursor = bb.parent();
            depth += 1;
        }
        out
    }
}

impl fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blackboard")
            .field("vars", &self.list_vars())
            .field("has_parent", &self.parent().is_some())
            .finish()
    }
}
