//! Observed Nodes
//!
//! An `ObservedNode` is attached to every object or array once it becomes
//! reachable from observed data. It owns the registry that represents the
//! container's own identity: array mutations and property additions or
//! deletions notify it, since no single property registry sees them.

use std::cell::Cell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::array::{ArrayData, ReactiveArray};
use super::object::{ObjectData, ReactiveObject};
use super::value::Value;
use crate::reactive::Dep;

/// Back-pointer from a node to the container it wraps.
#[derive(Clone)]
pub(crate) enum NodeTarget {
    Object(Weak<ObjectData>),
    Array(Weak<ArrayData>),
}

/// Reactivity record attached to one container.
pub struct ObservedNode {
    /// Container-identity registry.
    dep: Rc<Dep>,

    /// How many owners use this container as their root data.
    root_count: Cell<usize>,

    /// Weak reference to the wrapped container. The container owns the node,
    /// never the reverse.
    target: NodeTarget,
}

impl ObservedNode {
    pub(crate) fn new(target: NodeTarget) -> Self {
        Self {
            dep: Dep::new(),
            root_count: Cell::new(0),
            target,
        }
    }

    /// The container-identity registry.
    pub fn dep(&self) -> &Rc<Dep> {
        &self.dep
    }

    /// Number of owners using this container as root data.
    pub fn root_count(&self) -> usize {
        self.root_count.get()
    }

    /// Whether any owner uses this container as root data.
    pub fn is_root(&self) -> bool {
        self.root_count.get() > 0
    }

    pub(crate) fn retain_root(&self) {
        self.root_count.set(self.root_count.get() + 1);
    }

    pub(crate) fn release_root(&self) {
        self.root_count.set(self.root_count.get().saturating_sub(1));
    }

    /// The wrapped container, if it is still alive.
    pub fn value(&self) -> Option<Value> {
        match &self.target {
            NodeTarget::Object(weak) => weak.upgrade().map(|data| Value::Object(ReactiveObject(data))),
            NodeTarget::Array(weak) => weak.upgrade().map(|data| Value::Array(ReactiveArray(data))),
        }
    }
}

impl Debug for ObservedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservedNode")
            .field("dep", &self.dep)
            .field("root_count", &self.root_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::observe;

    #[test]
    fn root_count_transitions() {
        let value = Value::object([("a", Value::from(1))]);
        let node = observe(&value, false).unwrap();
        assert!(!node.is_root());

        let again = observe(&value, true).unwrap();
        assert!(Rc::ptr_eq(&node, &again));
        assert_eq!(node.root_count(), 1);

        node.release_root();
        node.release_root();
        assert_eq!(node.root_count(), 0);
    }

    #[test]
    fn node_points_back_without_owning() {
        let node = {
            let value = Value::array([Value::from(1)]);
            let node = observe(&value, false).unwrap();
            assert!(node.value().unwrap().same_value(&value));
            node
        };
        assert!(node.value().is_none());
    }
}
