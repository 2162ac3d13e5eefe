//! Computed Values
//!
//! A computed value is a lazy watcher read through [`Computed::get`]. It
//! recomputes only when read while dirty, and forwards its own dependencies
//! to whichever watcher is reading it, so that watcher is invalidated
//! directly by the underlying state rather than by the computed value.

use std::fmt::Debug;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::watcher::Watcher;
use crate::error::ReactiveError;
use crate::observer::Value;

/// Handle to a cached derived value.
#[derive(Clone)]
pub struct Computed {
    name: Rc<str>,
    watcher: Rc<Watcher>,
}

impl Computed {
    pub(crate) fn new(name: &str, watcher: Rc<Watcher>) -> Self {
        Self {
            name: name.into(),
            watcher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the value, recomputing first if a dependency changed.
    pub fn get(&self) -> Result<Value, ReactiveError> {
        if self.watcher.is_dirty() {
            self.watcher.evaluate()?;
        }
        if ReactiveContext::is_active() {
            self.watcher.depend();
        }
        Ok(self.watcher.value())
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.watcher.is_dirty()
    }

    /// The underlying lazy watcher.
    pub fn watcher(&self) -> &Rc<Watcher> {
        &self.watcher
    }
}

impl Debug for Computed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.name)
            .field("watcher", &self.watcher)
            .finish()
    }
}
