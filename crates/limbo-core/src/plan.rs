use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::blackboard::Blackboard;
use crate::error::PlanError;
use crate::object::ObjectRef;
use crate::path::NodePath;
use crate::value::{Value, VariantType};
use crate::variable::{BbVariable, PropertyHint};

pub type SharedPlan = Rc<RefCell<BlackboardPlan>>;

/// Declared shape of one plan variable, for editors and serializers.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDescriptor {
    pub name: String,
    pub var_type: VariantType,
    pub hint: PropertyHint,
    pub hint_string: String,
    pub value: Value,
}

/// Template of blackboard variables.
///
/// A plan with a base plan is *derived*: its variable set, types and order follow the base (see
/// [`BlackboardPlan::sync_with_base_plan`]), and only values may differ.
pub struct BlackboardPlan {
    vars: Vec<(String, BbVariable)>,
    base: Option<SharedPlan>,
    parent_scope_mapping: BTreeMap<String, String>,
    property_bindings: BTreeMap<String, NodePath>,
    prefetch_nodepath_vars: bool,
}

impl Default for BlackboardPlan {
    fn default() -> Self {
        Self {
            vars: Vec::new(),
            base: None,
            parent_scope_mapping: BTreeMap::new(),
            property_bindings: BTreeMap::new(),
            prefetch_nodepath_vars: true,
        }
    }
}

impl BlackboardPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedPlan {
        Rc::new(RefCell::new(self))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_derived(&self) -> bool {
        self.base.is_some()
    }

    pub fn base_plan(&self) -> Option<SharedPlan> {
        self.base.clone()
    }

    /// Derives this plan from `base` and syncs with it. A plan can't be its own base.
    pub fn set_base_plan(&mut self, base: Option<SharedPlan>) {
        match base {
            Some(b) if std::ptr::eq(b.as_ptr() as *const BlackboardPlan, self) => {
                tracing::warn!("BlackboardPlan: Using same resource for derived blackboard plan is not supported.");
                self.base = None;
            }
            other => self.base = other,
        }
        self.sync_with_base_plan();
    }

    pub fn add_var(&mut self, name: &str, var: BbVariable) -> Result<(), PlanError> {
        let result = if self.is_derived() {
            Err(PlanError::DerivedPlan)
        } else {
            self.insert_var(name, var)
        };
        logged(result, "add", name)
    }

    fn insert_var(&mut self, name: &str, var: BbVariable) -> Result<(), PlanError> {
        if name.is_empty() {
            return Err(PlanError::EmptyName);
        }
        if self.has_var(name) {
            return Err(PlanError::DuplicateVar(name.to_string()));
        }
        self.vars.push((name.to_string(), var));
        Ok(())
    }

    pub fn remove_var(&mut self, name: &str) -> Result<(), PlanError> {
        let result = if self.is_derived() {
            Err(PlanError::DerivedPlan)
        } else {
            self.erase_var(name)
        };
        logged(result, "remove", name)
    }

    fn erase_var(&mut self, name: &str) -> Result<(), PlanError> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| PlanError::VarNotFound(name.to_string()))?;
        self.vars.remove(idx);
        self.parent_scope_mapping.remove(name);
        self.property_bindings.remove(name);
        Ok(())
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|(n, _)| n == name)
    }

    pub fn get_var(&self, name: &str) -> Option<BbVariable> {
        self.index_of(name).map(|i| self.vars[i].1.clone())
    }

    pub fn get_var_by_index(&self, index: usize) -> Option<(String, BbVariable)> {
        self.vars.get(index).cloned()
    }

    pub fn list_vars(&self) -> Vec<String> {
        self.vars.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Name under which this exact cell is stored.
    pub fn get_var_name(&self, var: &BbVariable) -> Option<String> {
        self.vars
            .iter()
            .find(|(_, v)| v.ptr_eq(var))
            .map(|(n, _)| n.clone())
    }

    /// Identifier-like, not reserved, and not taken.
    pub fn is_valid_var_name(&self, name: &str) -> bool {
        if name.starts_with("resource_") {
            return false;
        }
        is_valid_identifier(name) && !self.has_var(name)
    }

    pub fn rename_var(&mut self, name: &str, new_name: &str) -> Result<(), PlanError> {
        let result = self.rename_entry(name, new_name);
        logged(result, "rename", name)
    }

    fn rename_entry(&mut self, name: &str, new_name: &str) -> Result<(), PlanError> {
        if name == new_name {
            return Ok(());
        }
        let idx = self
            .index_of(name)
            .ok_or_else(|| PlanError::VarNotFound(name.to_string()))?;
        if !self.is_valid_var_name(new_name) {
            return Err(PlanError::InvalidName(new_name.to_string()));
        }
        self.vars[idx].0 = new_name.to_string();
        if let Some(mapped) = self.parent_scope_mapping.remove(name) {
            self.parent_scope_mapping.insert(new_name.to_string(), mapped);
        }
        if let Some(path) = self.property_bindings.remove(name) {
            self.property_bindings.insert(new_name.to_string(), path);
        }
        Ok(())
    }

    pub fn move_var(&mut self, index: usize, new_index: usize) -> Result<(), PlanError> {
        let len = self.vars.len();
        for i in [index, new_index] {
            if i >= len {
                let err = PlanError::IndexOutOfRange { index: i, len };
                tracing::error!(error = %err, "BlackboardPlan: can't move variable");
                return Err(err);
            }
        }
        if index != new_index {
            let entry = self.vars.remove(index);
            self.vars.insert(new_index, entry);
        }
        Ok(())
    }

    pub fn set_parent_scope_mapping(&mut self, name: &str, parent_var: &str) {
        if parent_var.is_empty() {
            self.parent_scope_mapping.remove(name);
        } else {
            self.parent_scope_mapping
                .insert(name.to_string(), parent_var.to_string());
        }
    }

    pub fn parent_scope_mapping(&self, name: &str) -> Option<&str> {
        self.parent_scope_mapping.get(name).map(String::as_str)
    }

    /// Binds `name` to a node property; `path` is `node/path:property`.
    pub fn set_property_binding(&mut self, name: &str, path: NodePath) {
        if path.is_empty() {
            self.property_bindings.remove(name);
        } else {
            self.property_bindings.insert(name.to_string(), path);
        }
    }

    pub fn property_binding(&self, name: &str) -> Option<NodePath> {
        if let Some(p) = self.property_bindings.get(name) {
            return Some(p.clone());
        }
        let base = self.base.as_ref()?;
        let binding = base.borrow().property_binding(name);
        binding
    }

    pub fn set_prefetch_nodepath_vars(&mut self, enable: bool) {
        self.prefetch_nodepath_vars = enable;
    }

    /// Derived plans follow the base plan's setting.
    pub fn is_prefetching_nodepath_vars(&self) -> bool {
        match &self.base {
            Some(base) => base.borrow().is_prefetching_nodepath_vars(),
            None => self.prefetch_nodepath_vars,
        }
    }

    /// Brings a derived plan in line with its base: missing variables are added, property info
    /// is copied, values the user never changed follow the base, extra variables are removed and
    /// the order matches the base.
    pub fn sync_with_base_plan(&mut self) {
        let Some(base) = self.base.clone() else {
            return;
        };
        let base_vars: Vec<(String, BbVariable)> = base.borrow().vars.clone();

        for (base_name, base_var) in &base_vars {
            let Some(var) = self.get_var(base_name) else {
                self.vars.push((base_name.clone(), base_var.duplicate()));
                continue;
            };
            if !var.is_same_prop_info(base_var) {
                var.copy_prop_info(base_var);
            }
            let base_value = base_var.value();
            let value = var.value();
            if (!var.is_value_changed() && value != base_value)
                || value.get_type() != base_var.var_type()
            {
                var.set_value(base_value);
                var.reset_value_changed();
            }
        }

        let mut ordered = Vec::with_capacity(base_vars.len());
        for (base_name, _) in &base_vars {
            if let Some(idx) = self.index_of(base_name) {
                ordered.push(self.vars.remove(idx));
            }
        }
        for (name, _) in self.vars.drain(..) {
            self.parent_scope_mapping.remove(&name);
            self.property_bindings.remove(&name);
        }
        self.vars = ordered;
    }

    /// A fresh blackboard scoped under `parent` and filled from this plan.
    pub fn create_blackboard(
        &self,
        prefetch_root: Option<&ObjectRef>,
        parent: Option<&Blackboard>,
    ) -> Blackboard {
        let bb = match parent {
            Some(p) => Blackboard::with_parent(p),
            None => Blackboard::new(),
        };
        self.populate_blackboard(&bb, true, prefetch_root);
        bb
    }

    /// Adds a duplicate of every plan variable to `bb`.
    ///
    /// Existing local variables are kept unless `overwrite` is set. Mapped variables are linked to
    /// the parent scope, bound variables mirror their node property, and NodePath values are
    /// resolved to objects when prefetching is enabled and a root is given.
    pub fn populate_blackboard(
        &self,
        bb: &Blackboard,
        overwrite: bool,
        prefetch_root: Option<&ObjectRef>,
    ) {
        for (name, plan_var) in &self.vars {
            if bb.has_local_var(name) && !overwrite {
                let existing = bb.get_var(name, Value::Nil, false).get_type();
                let planned = plan_var.var_type();
                if existing != planned
                    && existing != VariantType::Nil
                    && planned != VariantType::Nil
                    && !(existing == VariantType::Object && planned == VariantType::NodePath)
                {
                    tracing::warn!(
                        var = %name,
                        existing = %existing,
                        planned = %planned,
                        "BlackboardPlan: Not overwriting variable that has a different type than planned."
                    );
                }
                continue;
            }

            let binding = self.property_binding(name);
            let mapping = self
                .parent_scope_mapping
                .get(name)
                .filter(|m| !m.is_empty());
            let do_prefetch =
                binding.is_none() && mapping.is_none() && self.is_prefetching_nodepath_vars();

            let var = plan_var.duplicate();
            if do_prefetch && plan_var.var_type() == VariantType::NodePath {
                if let Some(root) = prefetch_root {
                    let resolved = var
                        .value()
                        .as_node_path()
                        .and_then(|path| resolve_node(root, path));
                    match resolved {
                        Some(node) => var.set_value(Value::Object(node)),
                        None => {
                            tracing::error!(
                                var = %name,
                                value = %plan_var.value(),
                                "BlackboardPlan: Prefetch failed for variable."
                            );
                            var.set_value(Value::Nil);
                        }
                    }
                }
            }
            bb.assign_var(name, var);

            if let Some(target) = mapping {
                match bb.parent() {
                    Some(parent) => {
                        // Failures are logged by link_var.
                        let _ = bb.link_var(name, &parent, target, false);
                    }
                    None => tracing::error!(
                        var = %name,
                        "BlackboardPlan: Cannot link variable to parent scope because the parent scope is not set."
                    ),
                }
            } else if let Some(path) = binding {
                bind_to_node_property(bb, name, &path, prefetch_root);
            }
        }
    }

    /// Declared variables in order.
    pub fn descriptors(&self) -> Vec<VarDescriptor> {
        self.vars
            .iter()
            .map(|(name, var)| VarDescriptor {
                name: name.clone(),
                var_type: var.var_type(),
                hint: var.hint(),
                hint_string: var.hint_string(),
                value: var.value(),
            })
            .collect()
    }

    /// Reads a storage key: `var/<name>/{name,type,value,hint,hint_string}`,
    /// `mapping/<name>`, `binding/<name>`, or a bare `<name>` for the value.
    pub fn get_property(&self, key: &str) -> Option<Value> {
        match PropertyKey::parse(key) {
            PropertyKey::Var { name, field } => {
                let var = self.get_var(name)?;
                match field {
                    "name" => Some(Value::StringName(name.to_string())),
                    "type" => Some(Value::Int(var.var_type().index())),
                    "value" => Some(var.value()),
                    "hint" => Some(Value::Int(hint_index(var.hint()))),
                    "hint_string" => Some(Value::String(var.hint_string())),
                    _ => None,
                }
            }
            PropertyKey::Mapping(name) => self
                .parent_scope_mapping(name)
                .map(|m| Value::StringName(m.to_string())),
            PropertyKey::Binding(name) => self.property_binding(name).map(Value::NodePath),
            PropertyKey::Plain(name) => self.get_var(name).map(|v| v.value()),
        }
    }

    /// Writes a storage key. Setting `var/<name>/name` on an unknown name declares it.
    pub fn set_property(&mut self, key: &str, value: Value) -> bool {
        match PropertyKey::parse(key) {
            PropertyKey::Var { name, field } => {
                if field == "name" && !self.has_var(name) && !self.is_derived() {
                    return self.insert_var(name, BbVariable::default()).is_ok();
                }
                let Some(var) = self.get_var(name) else {
                    return false;
                };
                match field {
                    "name" => true,
                    "type" => match value.as_int().and_then(VariantType::from_index) {
                        Some(t) => {
                            var.set_type(t);
                            true
                        }
                        None => false,
                    },
                    "value" => {
                        var.set_value(value);
                        true
                    }
                    "hint" => match value.as_int().and_then(hint_from_index) {
                        Some(h) => {
                            var.set_hint(h);
                            true
                        }
                        None => false,
                    },
                    "hint_string" => match value.as_str() {
                        Some(s) => {
                            var.set_hint_string(s);
                            true
                        }
                        None => false,
                    },
                    _ => false,
                }
            }
            PropertyKey::Mapping(name) => {
                let mapped = value.as_str().unwrap_or("").to_string();
                self.set_parent_scope_mapping(name, &mapped);
                true
            }
            PropertyKey::Binding(name) => match value {
                Value::NodePath(p) => {
                    self.set_property_binding(name, p);
                    true
                }
                Value::Nil => {
                    self.set_property_binding(name, NodePath::default());
                    true
                }
                _ => false,
            },
            PropertyKey::Plain(name) => match self.get_var(name) {
                Some(var) => {
                    var.set_value(value);
                    true
                }
                None => false,
            },
        }
    }
}

impl fmt::Debug for BlackboardPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlackboardPlan")
            .field("vars", &self.list_vars())
            .field("derived", &self.is_derived())
            .finish()
    }
}

enum PropertyKey<'a> {
    Var { name: &'a str, field: &'a str },
    Mapping(&'a str),
    Binding(&'a str),
    Plain(&'a str),
}

impl<'a> PropertyKey<'a> {
    fn parse(key: &'a str) -> Self {
        if let Some(rest) = key.strip_prefix("var/") {
            if let Some((name, field)) = rest.split_once('/') {
                return PropertyKey::Var { name, field };
            }
        }
        if let Some(name) = key.strip_prefix("mapping/") {
            return PropertyKey::Mapping(name);
        }
        if let Some(name) = key.strip_prefix("binding/") {
            return PropertyKey::Binding(name);
        }
        PropertyKey::Plain(key)
    }
}

const HINTS: [PropertyHint; 10] = [
    PropertyHint::None,
    PropertyHint::Range,
    PropertyHint::Enum,
    PropertyHint::Flags,
    PropertyHint::File,
    PropertyHint::Dir,
    PropertyHint::MultilineText,
    PropertyHint::PlaceholderText,
    PropertyHint::NodePathValidTypes,
    PropertyHint::ResourceType,
];

fn hint_index(hint: PropertyHint) -> i64 {
    HINTS.iter().position(|h| *h == hint).unwrap_or(0) as i64
}

fn hint_from_index(index: i64) -> Option<PropertyHint> {
    usize::try_from(index).ok().and_then(|i| HINTS.get(i).copied())
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

fn resolve_node(root: &ObjectRef, path: &NodePath) -> Option<ObjectRef> {
    if path.names().next().is_none() {
        return Some(root.clone());
    }
    root.get_node(path)
}

fn bind_to_node_property(
    bb: &Blackboard,
    name: &str,
    path: &NodePath,
    root: Option<&ObjectRef>,
) {
    if path.subname_count() != 1 {
        tracing::error!(
            var = %name,
            path = %path,
            "BlackboardPlan: Can't bind variable using property path that doesn't name exactly one property."
        );
        return;
    }
    let Some(root) = root else {
        tracing::error!(var = %name, "BlackboardPlan: Can't bind variable without a scene root.");
        return;
    };
    let Some(node) = resolve_node(root, &path.concatenated_names()) else {
        tracing::error!(var = %name, path = %path, "BlackboardPlan: Binding failed, node not found.");
        return;
    };
    if let Some(property) = path.subnames().next() {
        // The variable was just assigned, so binding can't fail.
        let _ = bb.bind_var_to_property(name, &node, property, false);
    }
}

fn logged(result: Result<(), PlanError>, action: &str, name: &str) -> Result<(), PlanError> {
    if let Err(err) = &result {
        tracing::error!(var = %name, error = %err, "BlackboardPlan: can't {action} variable");
    }
    result
}
