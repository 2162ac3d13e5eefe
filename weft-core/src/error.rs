//! Error types for the reactive engine.
//!
//! Only evaluation functions and callbacks can fail. Dependency bookkeeping
//! and registry notification never return errors.

use thiserror::Error;

use crate::reactive::WatcherId;

/// Errors surfaced by computations and the scheduler.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// Raised by user code inside a getter, callback or hook.
    #[error("{0}")]
    Thrown(String),

    /// A watcher kept re-queueing itself inside a single flush.
    #[error("you may have an infinite update loop in {expression} (watcher {watcher:?})")]
    RunawayUpdateCycle {
        watcher: WatcherId,
        expression: String,
    },

    /// A snapshot was requested for a graph that refers back to itself.
    #[error("cannot snapshot a cyclic value")]
    CyclicValue,

    /// Settings could not be parsed.
    #[error("invalid reactivity settings: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

impl ReactiveError {
    /// Build a [`ReactiveError::Thrown`] from any message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Thrown(message.into())
    }
}
