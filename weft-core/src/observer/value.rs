//! Dynamic values stored in an observed graph.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Number};

use super::array::ReactiveArray;
use super::object::ReactiveObject;
use crate::error::ReactiveError;
use crate::reactive::untracked;

/// A value stored in a reactive property or array slot.
///
/// Containers are reference-counted handles: cloning a `Value::Object` or
/// `Value::Array` aliases the same container.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ReactiveObject),
    Array(ReactiveArray),
}

impl Value {
    /// Build a plain object from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(ReactiveObject::from_entries(entries))
    }

    /// Build a plain array.
    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Array(ReactiveArray::new(items))
    }

    /// Identity comparison used by the no-op write rule.
    ///
    /// Primitives compare by value, containers by pointer, and `NaN` is
    /// considered equal to `NaN`.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Objects and arrays.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ReactiveArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Tracked member access.
    ///
    /// Objects resolve keys, arrays resolve numeric indices and `length`.
    /// Anything else yields `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(o) => o.get(key),
            Value::Array(a) => {
                if key == "length" {
                    Value::Number(a.len() as f64)
                } else {
                    key.parse::<usize>()
                        .map(|index| a.get(index))
                        .unwrap_or(Value::Undefined)
                }
            }
            _ => Value::Undefined,
        }
    }

    /// Build a plain graph from JSON. The result is not observed.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from_json))
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from_json(v))))
            }
        }
    }

    /// Untracked JSON snapshot.
    ///
    /// `Undefined` and non-finite numbers become `null`. Fails on cycles.
    pub fn to_json(&self) -> Result<serde_json::Value, ReactiveError> {
        untracked(|| self.to_json_inner(&mut HashSet::new()))
    }

    fn to_json_inner(&self, path: &mut HashSet<usize>) -> Result<serde_json::Value, ReactiveError> {
        Ok(match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Object(o) => {
                if !path.insert(o.addr()) {
                    return Err(ReactiveError::CyclicValue);
                }
                let mut map = Map::new();
                for key in o.keys() {
                    map.insert(key.clone(), o.get(&key).to_json_inner(path)?);
                }
                path.remove(&o.addr());
                serde_json::Value::Object(map)
            }
            Value::Array(a) => {
                if !path.insert(a.addr()) {
                    return Err(ReactiveError::CyclicValue);
                }
                let items = a
                    .to_vec()
                    .iter()
                    .map(|item| item.to_json_inner(path))
                    .collect::<Result<Vec<_>, _>>()?;
                path.remove(&a.addr());
                serde_json::Value::Array(items)
            }
        })
    }
}

/// Integral numbers within the exact `f64` range serialize as integers.
fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT {
        serde_json::Value::from(n as i64)
    } else {
        Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(o) => write!(f, "{o:?}"),
            Value::Array(a) => write!(f, "{a:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<ReactiveObject> for Value {
    fn from(o: ReactiveObject) -> Self {
        Value::Object(o)
    }
}

impl From<ReactiveArray> for Value {
    fn from(a: ReactiveArray) -> Self {
        Value::Array(a)
    }
}

/// Key accepted by [`set`](super::set) and [`del`](super::del).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropKey {
    Index(usize),
    Name(String),
}

impl From<usize> for PropKey {
    fn from(index: usize) -> Self {
        PropKey::Index(index)
    }
}

impl From<&str> for PropKey {
    fn from(name: &str) -> Self {
        PropKey::Name(name.to_owned())
    }
}

impl From<String> for PropKey {
    fn from(name: String) -> Self {
        PropKey::Name(name)
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Index(i) => write!(f, "{i}"),
            PropKey::Name(name) => f.write_str(name),
        }
    }
}
