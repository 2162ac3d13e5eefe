//! Deep traversal for `deep` watchers.
//!
//! Reads every property and element reachable from a value through the
//! tracked accessors, so the evaluating watcher subscribes to every nested
//! registry. Containers are visited once per traversal, which also makes
//! self-referencing graphs terminate.

use std::collections::HashSet;

use crate::observer::Value;

/// Touch everything reachable from `value`.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    walk(value, &mut seen);
}

fn walk(value: &Value, seen: &mut HashSet<usize>) {
    match value {
        Value::Object(obj) => {
            if !seen.insert(obj.addr()) {
                return;
            }
            for key in obj.keys() {
                walk(&obj.get(&key), seen);
            }
        }
        Value::Array(array) => {
            if !seen.insert(array.addr()) {
                return;
            }
            for item in array.to_vec() {
                walk(&item, seen);
            }
        }
        _ => {}
    }
}
