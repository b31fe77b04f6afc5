use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::path::NodePath;
use crate::value::Value;

/// Host-side object that AI logic can read, write and call into.
///
/// Agents, scene roots and node-typed blackboard values are all host objects. The runtimes never
/// look inside them beyond this surface. Methods take `&self`; hosts use interior mutability.
pub trait HostObject {
    fn object_name(&self) -> String {
        "Object".to_string()
    }

    fn get_property(&self, name: &str) -> Option<Value>;

    /// Returns `false` if the property does not exist or rejects the value.
    fn set_property(&self, name: &str, value: Value) -> bool;

    fn has_method(&self, _method: &str) -> bool {
        false
    }

    /// Returns `None` if the method does not exist.
    fn call_method(&self, _method: &str, _args: &[Value]) -> Option<Value> {
        None
    }

    /// Resolves a relative node path below this object.
    fn get_node(&self, _path: &NodePath) -> Option<ObjectRef> {
        None
    }
}

pub type ObjectRef = Rc<dyn HostObject>;

pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    Rc::ptr_eq(a, b)
}

type Method = Rc<dyn Fn(&[Value]) -> Value>;

/// In-memory [`HostObject`]: named properties, named child objects and closure methods.
///
/// Every method call is recorded, which makes it handy as a test double for agents.
#[derive(Default)]
pub struct PropertyBag {
    name: String,
    properties: RefCell<BTreeMap<String, Value>>,
    children: RefCell<BTreeMap<String, ObjectRef>>,
    methods: RefCell<BTreeMap<String, Method>>,
    calls: RefCell<Vec<(String, Vec<Value>)>>,
}

impl PropertyBag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_property(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .borrow_mut()
            .insert(name.into(), value.into());
        self
    }

    pub fn with_method(
        self,
        name: impl Into<String>,
        method: impl Fn(&[Value]) -> Value + 'static,
    ) -> Self {
        self.methods
            .borrow_mut()
            .insert(name.into(), Rc::new(method));
        self
    }

    pub fn with_child(self, name: impl Into<String>, child: ObjectRef) -> Self {
        self.children.borrow_mut().insert(name.into(), child);
        self
    }

    pub fn into_ref(self) -> ObjectRef {
        Rc::new(self)
    }

    pub fn add_child(&self, name: impl Into<String>, child: ObjectRef) {
        self.children.borrow_mut().insert(name.into(), child);
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.properties.borrow().get(name).cloned()
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.borrow().clone()
    }
}

impl HostObject for PropertyBag {
    fn object_name(&self) -> String {
        self.name.clone()
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        self.property(name)
    }

    fn set_property(&self, name: &str, value: Value) -> bool {
        self.properties.borrow_mut().insert(name.to_string(), value);
        true
    }

    fn has_method(&self, method: &str) -> bool {
        self.methods.borrow().contains_key(method)
    }

    fn call_method(&self, method: &str, args: &[Value]) -> Option<Value> {
        let f = self.methods.borrow().get(method).cloned()?;
        self.calls
            .borrow_mut()
            .push((method.to_string(), args.to_vec()));
        Some(f(args))
    }

    fn get_node(&self, path: &NodePath) -> Option<ObjectRef> {
        let mut names = path.names();
        let first = names.next()?;
        let child = self.children.borrow().get(first).cloned()?;
        let rest: Vec<&str> = names.collect();
        if rest.is_empty() {
            return Some(child);
        }
        child.get_node(&NodePath::new(rest.join("/")))
    }
}
