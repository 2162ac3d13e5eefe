//! Reactive Arrays
//!
//! Element access by index cannot be intercepted per slot, so an array is
//! tracked as a whole through its node's identity registry. Reads register
//! that registry; the seven mutating operations notify it:
//!
//! | Operation   | Inserted values observed |
//! |-------------|--------------------------|
//! | `push`      | yes                      |
//! | `pop`       | no                       |
//! | `shift`     | no                       |
//! | `unshift`   | yes                      |
//! | `splice`    | yes                      |
//! | `sort_by`   | no                       |
//! | `reverse`   | no                       |
//!
//! An array that has not been observed behaves like a plain vector: its
//! mutators neither observe nor notify.

use std::cell::{OnceCell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use super::node::ObservedNode;
use super::observe;
use super::value::Value;

pub(crate) struct ArrayData {
    items: RefCell<Vec<Value>>,
    pub(crate) observer: OnceCell<Rc<ObservedNode>>,
}

/// Handle to a shared, possibly observed array.
#[derive(Clone)]
pub struct ReactiveArray(pub(crate) Rc<ArrayData>);

impl ReactiveArray {
    /// Create an unobserved array.
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self(Rc::new(ArrayData {
            items: RefCell::new(items.into_iter().collect()),
            observer: OnceCell::new(),
        }))
    }

    /// The node attached by observation, if any.
    pub fn observer(&self) -> Option<Rc<ObservedNode>> {
        self.0.observer.get().cloned()
    }

    fn track(&self) {
        if let Some(node) = self.0.observer.get() {
            node.dep().depend();
        }
    }

    /// Tracked length.
    pub fn len(&self) -> usize {
        self.track();
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked element read. Out of range yields `Undefined`.
    pub fn get(&self, index: usize) -> Value {
        self.track();
        self.0.items.borrow().get(index).cloned().unwrap_or_default()
    }

    /// Tracked snapshot of all elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.track();
        self.0.items.borrow().clone()
    }

    /// Tracked iteration over a snapshot of the elements.
    pub fn iter_values(&self) -> std::vec::IntoIter<Value> {
        self.to_vec().into_iter()
    }

    /// Untracked snapshot, for observation and traversal internals.
    pub(crate) fn snapshot(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Append values, returning the new length.
    pub fn push<I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = Value>,
    {
        let inserted: Vec<Value> = values.into_iter().collect();
        let len = {
            let mut items = self.0.items.borrow_mut();
            items.extend(inserted.iter().cloned());
            items.len()
        };
        self.after_mutation(&inserted);
        len
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Option<Value> {
        let popped = self.0.items.borrow_mut().pop();
        self.after_mutation(&[]);
        popped
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Option<Value> {
        let shifted = {
            let mut items = self.0.items.borrow_mut();
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        };
        self.after_mutation(&[]);
        shifted
    }

    /// Prepend values, returning the new length.
    pub fn unshift<I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = Value>,
    {
        let inserted: Vec<Value> = values.into_iter().collect();
        let len = {
            let mut items = self.0.items.borrow_mut();
            items.splice(0..0, inserted.iter().cloned());
            items.len()
        };
        self.after_mutation(&inserted);
        len
    }

    /// Remove `delete_count` elements at `start` and insert `values` there.
    ///
    /// `start` and `delete_count` are clamped to the array bounds. Returns
    /// the removed elements.
    pub fn splice<I>(&self, start: usize, delete_count: usize, values: I) -> Vec<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        let inserted: Vec<Value> = values.into_iter().collect();
        let removed = {
            let mut items = self.0.items.borrow_mut();
            let start = start.min(items.len());
            let end = start + delete_count.min(items.len() - start);
            items.splice(start..end, inserted.iter().cloned()).collect()
        };
        self.after_mutation(&inserted);
        removed
    }

    /// Sort in place with `compare`.
    ///
    /// Elements are sorted outside the internal borrow so the comparator may
    /// read other reactive state.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let mut sorted = self.snapshot();
        sorted.sort_by(compare);
        *self.0.items.borrow_mut() = sorted;
        self.after_mutation(&[]);
    }

    /// Reverse in place.
    pub fn reverse(&self) {
        self.0.items.borrow_mut().reverse();
        self.after_mutation(&[]);
    }

    fn after_mutation(&self, inserted: &[Value]) {
        let Some(node) = self.observer() else {
            return;
        };
        for value in inserted {
            observe(value, false);
        }
        node.dep().notify();
    }

    /// Pointer identity.
    pub fn ptr_eq(&self, other: &ReactiveArray) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ReactiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.items.borrow().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::owner::Owner;
    use crate::reactive::{WatchSource, Watcher, WatcherOptions};

    fn numbers(array: &ReactiveArray) -> Vec<f64> {
        array.snapshot().iter().filter_map(Value::as_f64).collect()
    }

    fn array_of(values: &[i32]) -> ReactiveArray {
        ReactiveArray::new(values.iter().map(|&n| Value::from(n)))
    }

    #[test]
    fn push_and_pop() {
        let array = array_of(&[1, 2]);
        assert_eq!(array.push([Value::from(3)]), 3);
        assert_eq!(array.pop().and_then(|v| v.as_f64()), Some(3.0));
        assert_eq!(numbers(&array), vec![1.0, 2.0]);
    }

    #[test]
    fn shift_and_unshift() {
        let array = array_of(&[2, 3]);
        assert_eq!(array.unshift([Value::from(0), Value::from(1)]), 4);
        assert_eq!(array.shift().and_then(|v| v.as_f64()), Some(0.0));
        assert_eq!(numbers(&array), vec![1.0, 2.0, 3.0]);
        assert!(ReactiveArray::new([]).shift().is_none());
    }

    #[test]
    fn splice_clamps_bounds() {
        let array = array_of(&[1, 2, 3, 4]);
        let removed = array.splice(1, 2, [Value::from(9)]);
        assert_eq!(removed.len(), 2);
        assert_eq!(numbers(&array), vec![1.0, 9.0, 4.0]);

        let removed = array.splice(10, 5, [Value::from(5)]);
        assert!(removed.is_empty());
        assert_eq!(numbers(&array), vec![1.0, 9.0, 4.0, 5.0]);
    }

    #[test]
    fn sort_and_reverse() {
        let array = array_of(&[3, 1, 2]);
        array.sort_by(|a, b| {
            a.as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal)
        });
        assert_eq!(numbers(&array), vec![1.0, 2.0, 3.0]);
        array.reverse();
        assert_eq!(numbers(&array), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn inserted_containers_are_observed_once_array_is_observed() {
        let array = array_of(&[1]);
        let loose = Value::object([("k", Value::from(1))]);
        array.push([loose.clone()]);
        assert!(loose.as_object().unwrap().observer().is_none());

        observe(&Value::Array(array.clone()), false);
        let fresh = Value::object([("k", Value::from(2))]);
        array.push([fresh.clone()]);
        assert!(fresh.as_object().unwrap().observer().is_some());
    }

    #[test]
    fn unshift_and_splice_observe_inserted_containers() {
        let array = array_of(&[1, 2]);
        observe(&Value::Array(array.clone()), false);

        let front = Value::object([("k", Value::from(1))]);
        array.unshift([front.clone()]);
        assert!(front.as_object().unwrap().observer().is_some());

        let middle = Value::array([Value::object([("k", Value::from(2))])]);
        array.splice(1, 1, [middle.clone()]);
        let nested = middle.as_array().unwrap();
        assert!(nested.observer().is_some());
        assert!(nested.snapshot()[0].as_object().unwrap().observer().is_some());
    }

    #[test]
    fn non_inserting_mutators_notify_readers() {
        let owner = Owner::new("array");
        let array = array_of(&[3, 1, 2, 4]);
        observe(&Value::Array(array.clone()), false);

        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let reader = array.clone();
        let _watcher = Watcher::new(
            &owner,
            WatchSource::getter(move |_| {
                runs_clone.set(runs_clone.get() + 1);
                Ok(Value::from(reader.len() as f64))
            }),
            None,
            WatcherOptions {
                sync: true,
                ..WatcherOptions::default()
            },
            false,
        )
        .unwrap();
        assert_eq!(runs.get(), 1);

        array.sort_by(|a, b| {
            a.as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal)
        });
        assert_eq!(runs.get(), 2);
        array.pop();
        assert_eq!(runs.get(), 3);
        array.shift();
        assert_eq!(runs.get(), 4);
        array.reverse();
        assert_eq!(runs.get(), 5);
        assert_eq!(numbers(&array), vec![3.0, 2.0]);
    }
}
