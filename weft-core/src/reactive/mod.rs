//! Reactive Primitives
//!
//! This module implements dependency tracking: registries ([`Dep`]),
//! computations ([`Watcher`]) and the context that connects them while a
//! computation evaluates.
//!
//! # Concepts
//!
//! ## Registries
//!
//! A `Dep` is the subscriber list of one piece of observable state: a single
//! property, or the identity of a container. Reading the state while a
//! watcher evaluates subscribes that watcher; writing it notifies every
//! subscriber.
//!
//! ## Watchers
//!
//! A `Watcher` runs a getter, remembers which registries it read, and re-runs
//! when one of them notifies. Render watchers, computed values and explicit
//! watches are all watchers with different mode flags.
//!
//! ## Computed values
//!
//! A [`Computed`] is a lazy watcher whose value is cached until one of its
//! dependencies changes.
//!
//! # Implementation Notes
//!
//! Tracking is automatic: a thread-local stack holds the watcher currently
//! evaluating, and registries consult it on every read. Nothing is shared
//! across threads; the whole engine assumes one mutator per thread.

mod computed;
mod context;
mod dep;
mod path;
mod subscriber;
mod traverse;
mod watcher;

pub use computed::Computed;
pub use context::{untracked, ReactiveContext};
pub use dep::Dep;
pub use path::parse_path;
pub use subscriber::{DepId, WatcherId};
pub use traverse::traverse;
pub use watcher::{BeforeHook, Callback, Getter, WatchSource, Watcher, WatcherOptions};
