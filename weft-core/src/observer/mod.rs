//! Observation Layer
//!
//! This module makes a plain object/array graph reactive. Observation walks
//! the graph once: every object property becomes a reactive property with its
//! own registry, every container gets an [`ObservedNode`], and arrays route
//! their mutators through the node's identity registry.
//!
//! # Entry points
//!
//! - [`observe`] attaches (or returns the existing) node for a container.
//! - [`define_reactive`] makes one property reactive.
//! - [`set`] / [`del`] add or remove a property and notify the container.
//!
//! # Limitations
//!
//! - Non-extensible objects, objects marked as instances and primitives are
//!   left untouched: `observe` returns `None`.
//! - Non-configurable properties are silently skipped.
//! - Containers marked as some owner's root data refuse `set`/`del` of new
//!   keys with a warning.

mod array;
mod node;
mod object;
mod value;

use std::cell::Cell;
use std::rc::Rc;

pub use array::ReactiveArray;
pub use node::ObservedNode;
pub use object::{CustomSetter, Property, ReactiveObject};
pub use value::{PropKey, Value};

use node::NodeTarget;
use crate::diagnostics::warn;

thread_local! {
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Enable or disable automatic observation on this thread.
///
/// While disabled, [`observe`] creates no new nodes. Existing nodes are still
/// returned.
pub fn toggle_observing(enabled: bool) {
    SHOULD_OBSERVE.with(|flag| flag.set(enabled));
}

/// Whether automatic observation is enabled.
pub fn is_observing() -> bool {
    SHOULD_OBSERVE.with(Cell::get)
}

/// Run `f` with observation disabled, restoring the previous state after.
pub fn without_observing<T>(f: impl FnOnce() -> T) -> T {
    let previous = is_observing();
    toggle_observing(false);
    let result = f();
    toggle_observing(previous);
    result
}

/// Attach an [`ObservedNode`] to `value` if it is an observable container.
///
/// Idempotent: a container that already has a node returns that node and is
/// not walked again. `as_root` marks the container as an owner's root data.
pub fn observe(value: &Value, as_root: bool) -> Option<Rc<ObservedNode>> {
    let node = match value {
        Value::Object(obj) => observe_object(obj),
        Value::Array(array) => observe_array(array),
        _ => None,
    };
    if as_root {
        if let Some(node) = &node {
            node.retain_root();
        }
    }
    node
}

fn observe_object(obj: &ReactiveObject) -> Option<Rc<ObservedNode>> {
    if let Some(node) = obj.observer() {
        return Some(node);
    }
    if !is_observing() || !obj.is_extensible() || obj.is_instance() {
        return None;
    }

    let node = Rc::new(ObservedNode::new(NodeTarget::Object(Rc::downgrade(&obj.0))));
    // Attach before walking so cycles resolve to this node.
    let node = obj.0.observer.get_or_init(|| node).clone();
    for (key, value) in obj.entries() {
        define_reactive(obj, &key, value, None, false);
    }
    Some(node)
}

fn observe_array(array: &ReactiveArray) -> Option<Rc<ObservedNode>> {
    if let Some(node) = array.observer() {
        return Some(node);
    }
    if !is_observing() {
        return None;
    }

    let node = Rc::new(ObservedNode::new(NodeTarget::Array(Rc::downgrade(&array.0))));
    let node = array.0.observer.get_or_init(|| node).clone();
    for item in array.snapshot() {
        observe(&item, false);
    }
    Some(node)
}

/// Make `key` on `obj` a reactive property holding `value`.
///
/// `custom_setter` runs on every effective write. With `shallow`, the value
/// itself is not observed. Non-configurable properties are skipped. A
/// property that is already reactive keeps its registry and, unless a new
/// one is given, its custom setter.
pub fn define_reactive(
    obj: &ReactiveObject,
    key: &str,
    value: Value,
    custom_setter: Option<CustomSetter>,
    shallow: bool,
) {
    let existing = match obj.property(key) {
        Some(existing) if !existing.is_configurable() => return,
        Some(existing) if existing.is_reactive() => existing,
        _ => {
            obj.put_property(key, Property::reactive(value, custom_setter, shallow));
            return;
        }
    };

    let changed = !existing.peek().same_value(&value);
    obj.put_property(key, existing.redefine(value, custom_setter, shallow));
    if changed {
        if let Some(dep) = existing.dep() {
            dep.notify();
        }
    }
}

/// Set a property, adding it reactively and notifying the container when the
/// key is new.
///
/// Array indices go through `splice` (growing the array with `Undefined` when
/// needed). Returns `value`.
pub fn set(target: &Value, key: impl Into<PropKey>, value: Value) -> Value {
    let key = key.into();
    match (target, key) {
        (Value::Array(array), PropKey::Index(index)) => {
            let len = array.snapshot().len();
            if index > len {
                array.push(std::iter::repeat(Value::Undefined).take(index - len));
            }
            array.splice(index, 1, [value.clone()]);
            value
        }
        (Value::Object(obj), key) => {
            let key = key.to_string();
            if obj.contains_key(&key) {
                obj.set(&key, value.clone());
                return value;
            }
            let node = obj.observer();
            if obj.is_instance() || node.as_ref().is_some_and(|n| n.is_root()) {
                warn(
                    "Avoid adding reactive properties to an instance or its root data \
                     at runtime - declare it upfront in the data option.",
                    None,
                );
                return value;
            }
            let Some(node) = node else {
                obj.set(&key, value.clone());
                return value;
            };
            define_reactive(obj, &key, value.clone(), None, false);
            node.dep().notify();
            value
        }
        (Value::Array(_), key) => {
            warn(
                &format!("Cannot set reactive property \"{key}\" on an array: use an index"),
                None,
            );
            value
        }
        (target, key) => {
            warn(
                &format!("Cannot set reactive property \"{key}\" on a primitive value: {target:?}"),
                None,
            );
            value
        }
    }
}

/// Delete a property and notify the container.
pub fn del(target: &Value, key: impl Into<PropKey>) {
    let key = key.into();
    match (target, key) {
        (Value::Array(array), PropKey::Index(index)) => {
            array.splice(index, 1, []);
        }
        (Value::Object(obj), key) => {
            let key = key.to_string();
            let node = obj.observer();
            if obj.is_instance() || node.as_ref().is_some_and(|n| n.is_root()) {
                warn(
                    "Avoid deleting properties on an instance or its root data \
                     - just set it to null.",
                    None,
                );
                return;
            }
            match obj.property(&key) {
                Some(prop) if prop.is_configurable() => {}
                _ => return,
            }
            obj.remove_property(&key);
            if let Some(node) = node {
                node.dep().notify();
            }
        }
        (Value::Array(_), key) => {
            warn(
                &format!("Cannot delete reactive property \"{key}\" on an array: use an index"),
                None,
            );
        }
        (target, key) => {
            warn(
                &format!("Cannot delete reactive property \"{key}\" on a primitive value: {target:?}"),
                None,
            );
        }
    }
}

/// Register the identity registry of every observed element of `array`,
/// recursing into nested arrays.
pub(crate) fn depend_array(array: &ReactiveArray) {
    for item in array.snapshot() {
        match &item {
            Value::Object(obj) => {
                if let Some(node) = obj.observer() {
                    node.dep().depend();
                }
            }
            Value::Array(nested) => {
                if let Some(node) = nested.observer() {
                    node.dep().depend();
                }
                depend_array(nested);
            }
            _ => {}
        }
    }
}
