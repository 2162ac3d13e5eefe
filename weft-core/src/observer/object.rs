//! Reactive Objects
//!
//! An object is an insertion-ordered table from key to [`Property`]. A
//! property is either plain (a bare value slot) or reactive (a value slot
//! plus its own registry). Observation converts every configurable plain
//! property into a reactive one; nothing else about the object changes.
//!
//! # Reads and Writes
//!
//! - [`ReactiveObject::get`] on a reactive property registers the evaluating
//!   watcher with the property's registry, with the registry of the nested
//!   container (if any) and, for arrays, with every nested element's node.
//! - [`ReactiveObject::set`] on a reactive property is a no-op when the new
//!   value is the same value; otherwise it stores the value, observes it and
//!   notifies.
//! - Assigning an unknown key adds a plain property, like a host assignment.
//!   Use [`set`](super::set) to add a reactive one.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::node::ObservedNode;
use super::value::Value;
use super::{depend_array, observe};
use crate::reactive::{Dep, ReactiveContext};

/// Hook invoked on every effective write to a reactive property.
pub type CustomSetter = Rc<dyn Fn()>;

/// One slot of an object.
pub struct Property {
    value: RefCell<Value>,

    /// `None` for plain properties.
    dep: Option<Rc<Dep>>,

    /// Node of the current value when it is an observed container.
    child: RefCell<Option<Rc<ObservedNode>>>,

    custom_setter: Option<CustomSetter>,
    shallow: bool,
    configurable: bool,
}

impl Property {
    pub(crate) fn plain(value: Value, configurable: bool) -> Self {
        Self {
            value: RefCell::new(value),
            dep: None,
            child: RefCell::new(None),
            custom_setter: None,
            shallow: false,
            configurable,
        }
    }

    pub(crate) fn reactive(
        value: Value,
        custom_setter: Option<CustomSetter>,
        shallow: bool,
    ) -> Self {
        Self::with_dep(value, Dep::new(), custom_setter, shallow)
    }

    fn with_dep(
        value: Value,
        dep: Rc<Dep>,
        custom_setter: Option<CustomSetter>,
        shallow: bool,
    ) -> Self {
        let child = if shallow { None } else { observe(&value, false) };
        Self {
            value: RefCell::new(value),
            dep: Some(dep),
            child: RefCell::new(child),
            custom_setter,
            shallow,
            configurable: true,
        }
    }

    /// Replacement for an already reactive property.
    ///
    /// Keeps the registry so existing subscribers stay attached, and keeps
    /// the custom setter unless a new one is given.
    pub(crate) fn redefine(
        &self,
        value: Value,
        custom_setter: Option<CustomSetter>,
        shallow: bool,
    ) -> Self {
        let dep = self.dep.clone().unwrap_or_else(Dep::new);
        let custom_setter = custom_setter.or_else(|| self.custom_setter.clone());
        Self::with_dep(value, dep, custom_setter, shallow)
    }

    /// Whether reads and writes are intercepted.
    pub fn is_reactive(&self) -> bool {
        self.dep.is_some()
    }

    pub fn is_configurable(&self) -> bool {
        self.configurable
    }

    /// The property's own registry.
    pub fn dep(&self) -> Option<&Rc<Dep>> {
        self.dep.as_ref()
    }

    /// Read without registering anything.
    pub fn peek(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Tracked read.
    pub fn get(&self) -> Value {
        let value = self.peek();
        if let Some(dep) = &self.dep {
            if ReactiveContext::is_active() {
                dep.depend();
                let child = self.child.borrow().clone();
                if let Some(child) = child {
                    child.dep().depend();
                    if let Value::Array(array) = &value {
                        depend_array(array);
                    }
                }
            }
        }
        value
    }

    /// Intercepted write.
    pub fn set(&self, new_value: Value) {
        let Some(dep) = &self.dep else {
            *self.value.borrow_mut() = new_value;
            return;
        };

        if self.value.borrow().same_value(&new_value) {
            return;
        }
        if let Some(hook) = &self.custom_setter {
            hook();
        }

        *self.value.borrow_mut() = new_value.clone();
        let child = if self.shallow {
            None
        } else {
            observe(&new_value, false)
        };
        *self.child.borrow_mut() = child;

        dep.notify();
    }
}

pub(crate) struct ObjectData {
    props: RefCell<IndexMap<String, Rc<Property>>>,
    extensible: Cell<bool>,
    instance: Cell<bool>,
    pub(crate) observer: OnceCell<Rc<ObservedNode>>,
}

/// Handle to a shared, possibly observed object.
#[derive(Clone)]
pub struct ReactiveObject(pub(crate) Rc<ObjectData>);

impl ReactiveObject {
    /// Create an empty, extensible, unobserved object.
    pub fn new() -> Self {
        Self(Rc::new(ObjectData {
            props: RefCell::new(IndexMap::new()),
            extensible: Cell::new(true),
            instance: Cell::new(false),
            observer: OnceCell::new(),
        }))
    }

    /// Create an unobserved object holding plain properties.
    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let obj = Self::new();
        {
            let mut props = obj.0.props.borrow_mut();
            for (key, value) in entries {
                props.insert(key.into(), Rc::new(Property::plain(value, true)));
            }
        }
        obj
    }

    /// The node attached by observation, if any.
    pub fn observer(&self) -> Option<Rc<ObservedNode>> {
        self.0.observer.get().cloned()
    }

    /// Tracked read. Missing keys yield `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        match self.property(key) {
            Some(prop) => prop.get(),
            None => Value::Undefined,
        }
    }

    /// Assignment.
    ///
    /// Existing properties go through their setter. Unknown keys are added as
    /// plain properties, or ignored when the object is not extensible.
    pub fn set(&self, key: &str, value: Value) {
        match self.property(key) {
            Some(prop) => prop.set(value),
            None => {
                if self.is_extensible() {
                    self.put_property(key, Property::plain(value, true));
                }
            }
        }
    }

    /// Add a plain property that can never be made reactive or deleted.
    pub fn define_fixed(&self, key: &str, value: Value) {
        self.put_property(key, Property::plain(value, false));
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.props.borrow().contains_key(key)
    }

    /// Keys in insertion order.
    ///
    /// Registers the object's own node so that key additions and deletions
    /// invalidate the reader.
    pub fn keys(&self) -> Vec<String> {
        if let Some(node) = self.observer() {
            node.dep().depend();
        }
        self.0.props.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forbid adding new keys. Non-extensible objects are never observed.
    pub fn prevent_extensions(&self) {
        self.0.extensible.set(false);
    }

    pub fn is_extensible(&self) -> bool {
        self.0.extensible.get()
    }

    /// Flag this object as a component instance. Instances are never observed
    /// and refuse reactive property addition and deletion.
    pub fn mark_instance(&self) {
        self.0.instance.set(true);
    }

    pub fn is_instance(&self) -> bool {
        self.0.instance.get()
    }

    /// Pointer identity.
    pub fn ptr_eq(&self, other: &ReactiveObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn property(&self, key: &str) -> Option<Rc<Property>> {
        self.0.props.borrow().get(key).cloned()
    }

    pub(crate) fn put_property(&self, key: &str, prop: Property) {
        self.0.props.borrow_mut().insert(key.to_owned(), Rc::new(prop));
    }

    pub(crate) fn remove_property(&self, key: &str) -> Option<Rc<Property>> {
        self.0.props.borrow_mut().shift_remove(key)
    }

    /// Untracked snapshot of `(key, value)` pairs.
    pub(crate) fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .props
            .borrow()
            .iter()
            .map(|(key, prop)| (key.clone(), prop.peek()))
            .collect()
    }
}

impl Default for ReactiveObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.0.props.borrow().keys().cloned().collect();
        f.debug_struct("ReactiveObject")
            .field("keys", &keys)
            .field("observed", &self.0.observer.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{define_reactive, observe};

    #[test]
    fn plain_properties_are_not_tracked() {
        let obj = ReactiveObject::from_entries([("a", Value::from(1))]);
        let prop = obj.property("a").unwrap();
        assert!(!prop.is_reactive());
        obj.set("a", Value::from(2));
        assert_eq!(obj.get("a").as_f64(), Some(2.0));
    }

    #[test]
    fn observation_converts_properties() {
        let obj = ReactiveObject::from_entries([("a", Value::from(1)), ("b", Value::from(2))]);
        observe(&Value::Object(obj.clone()), false);
        assert!(obj.property("a").unwrap().is_reactive());
        assert!(obj.property("b").unwrap().is_reactive());
        assert_eq!(obj.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn unknown_keys_on_sealed_objects_are_ignored() {
        let obj = ReactiveObject::new();
        obj.prevent_extensions();
        obj.set("a", Value::from(1));
        assert!(!obj.contains_key("a"));
    }

    #[test]
    fn fixed_properties_stay_plain() {
        let obj = ReactiveObject::new();
        obj.define_fixed("locked", Value::from(1));
        define_reactive(&obj, "locked", Value::from(5), None, false);
        let prop = obj.property("locked").unwrap();
        assert!(!prop.is_reactive());
        assert_eq!(prop.peek().as_f64(), Some(1.0));
    }

    #[test]
    fn custom_setter_fires_only_on_change() {
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        let obj = ReactiveObject::new();
        define_reactive(
            &obj,
            "x",
            Value::from(1),
            Some(Rc::new(move || hits_clone.set(hits_clone.get() + 1))),
            false,
        );

        obj.set("x", Value::from(1));
        assert_eq!(hits.get(), 0);
        obj.set("x", Value::from(2));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn shallow_properties_do_not_observe_values() {
        let inner = Value::object([("deep", Value::from(1))]);
        let obj = ReactiveObject::new();
        define_reactive(&obj, "shallow", inner.clone(), None, true);
        assert!(inner.as_object().unwrap().observer().is_none());
    }
}
