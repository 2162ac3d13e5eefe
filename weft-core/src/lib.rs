//! Weft Core
//!
//! This crate provides the reactivity engine for the Weft UI runtime. It
//! implements:
//!
//! - Transparent observation of mutable object/array graphs
//! - Per-property dependency registries
//! - Re-runnable computations (render, computed, watch) with automatic
//!   dependency collection and stale-edge pruning
//! - A batching, ordered update scheduler with runaway-cycle protection
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `observer`: reactive values, objects and arrays, and the observation
//!   entry points (`observe`, `set`, `del`)
//! - `reactive`: registries, watchers, computed values and tracking context
//! - `scheduler`: the flush queue and the next-tick queue
//! - `owner`: owner contexts that computations are created against
//! - `config`: per-thread settings and handlers
//!
//! The engine is single-mutator: state, tracking and scheduling are all
//! per-thread and built on `Rc`/`RefCell`.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::{config, Owner, Value, WatchOptions, WatchSource};
//!
//! let owner = Owner::new("counter");
//! owner.init_data(Value::object([("count", Value::from(0))]));
//!
//! // Derived value
//! let doubled = owner.define_computed("doubled", |owner| {
//!     let n = owner.get("count")?.as_f64().unwrap_or(0.0);
//!     Ok(Value::from(n * 2.0))
//! });
//!
//! // Explicit watch
//! owner.watch(
//!     WatchSource::path("count"),
//!     |_, new, old| {
//!         println!("count: {old:?} -> {new:?}");
//!         Ok(())
//!     },
//!     WatchOptions::default(),
//! )?;
//!
//! owner.set("count", Value::from(5));
//! // Nothing has run yet; the flush waits for the next tick.
//! weft_core::run_pending_ticks();
//! // prints: "count: 0 -> 5"
//! assert_eq!(doubled.get()?.as_f64(), Some(10.0));
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod observer;
pub mod owner;
pub mod reactive;
pub mod scheduler;

pub use config::{Config, Settings};
pub use error::ReactiveError;
pub use observer::{del, observe, set, ReactiveArray, ReactiveObject, Value};
pub use owner::{Hook, Owner, WatchOptions};
pub use reactive::{Computed, Dep, WatchSource, Watcher, WatcherId, WatcherOptions};
pub use scheduler::{
    flush_now, has_pending_ticks, next_tick, next_tick_async, run_pending_ticks, FlushReport,
};
