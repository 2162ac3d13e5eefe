//! Watcher Implementation
//!
//! A Watcher is one re-runnable unit of work: a render, a computed getter or
//! an explicit watch. It evaluates a getter while collecting the registries
//! the getter reads, and re-runs when any of them notifies.
//!
//! # Modes
//!
//! - **lazy** (computed values): invalidation only marks the watcher dirty;
//!   the value is recomputed on the next read.
//! - **sync**: invalidation re-runs the watcher immediately.
//! - default: invalidation queues the watcher with the scheduler.
//! - **deep**: after evaluation every container reachable from the value is
//!   traversed so the watcher also subscribes to nested identity registries.
//! - **user**: getter and callback failures are reported through the error
//!   channel instead of propagating.
//!
//! # Dependency Generations
//!
//! Each evaluation collects registries into `new_deps`. Afterwards, any
//! registry from the previous generation that was not touched again is
//! unsubscribed, so conditional reads never leave stale edges behind.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::trace;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::path::parse_path;
use super::traverse::traverse;
use super::{DepId, WatcherId};
use crate::diagnostics::{handle_error, warn};
use crate::error::ReactiveError;
use crate::observer::Value;
use crate::owner::{Owner, OwnerInner};
use crate::scheduler::queue_watcher;

/// Evaluation function. Receives the owning context.
pub type Getter = Rc<dyn Fn(&Owner) -> Result<Value, ReactiveError>>;

/// Change callback: `(owner, new_value, old_value)`.
pub type Callback = Rc<dyn Fn(&Owner, &Value, &Value) -> Result<(), ReactiveError>>;

/// Hook run by the scheduler right before the watcher runs in a flush.
pub type BeforeHook = Rc<dyn Fn(&Owner)>;

/// What a watcher evaluates.
#[derive(Clone)]
pub enum WatchSource {
    /// An arbitrary getter.
    Getter(Getter),

    /// A dot-delimited path resolved from the owner, e.g. `"user.name"`.
    Path(String),
}

impl WatchSource {
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn(&Owner) -> Result<Value, ReactiveError> + 'static,
    {
        WatchSource::Getter(Rc::new(f))
    }

    pub fn path(path: impl Into<String>) -> Self {
        WatchSource::Path(path.into())
    }
}

/// Watcher mode flags.
#[derive(Clone, Default)]
pub struct WatcherOptions {
    pub deep: bool,
    pub user: bool,
    pub lazy: bool,
    pub sync: bool,
    pub before: Option<BeforeHook>,

    /// Human-readable description used in diagnostics. Defaults to the
    /// watched path, or `<getter>`.
    pub label: Option<String>,
}

impl WatcherOptions {
    pub fn lazy() -> Self {
        Self {
            lazy: true,
            ..Self::default()
        }
    }

    pub fn user() -> Self {
        Self {
            user: true,
            ..Self::default()
        }
    }
}

/// A re-runnable computation with tracked dependencies.
pub struct Watcher {
    /// Creation-ordered id; the flush order.
    id: WatcherId,

    owner: Weak<OwnerInner>,
    getter: Getter,
    callback: Option<Callback>,
    options: WatcherOptions,
    expression: String,
    is_render: bool,

    /// Last evaluated value.
    value: RefCell<Value>,

    /// Lazy watchers only: a dependency changed since the last evaluation.
    dirty: Cell<bool>,

    /// Cleared by teardown.
    active: Cell<bool>,

    deps: RefCell<IndexMap<DepId, Rc<Dep>>>,
    new_deps: RefCell<IndexMap<DepId, Rc<Dep>>>,

    this: Weak<Watcher>,
}

impl Watcher {
    /// Create a watcher owned by `owner`.
    ///
    /// Non-lazy watchers evaluate immediately; a failing internal getter is
    /// returned as an error. `is_render` marks the owner's primary render
    /// watcher.
    pub fn new(
        owner: &Owner,
        source: WatchSource,
        callback: Option<Callback>,
        options: WatcherOptions,
        is_render: bool,
    ) -> Result<Rc<Self>, ReactiveError> {
        let watcher = Self::build(owner, source, callback, options, is_render);
        if !watcher.options.lazy {
            if let Some(value) = watcher.get()? {
                *watcher.value.borrow_mut() = value;
            }
        }
        Ok(watcher)
    }

    /// Create and register a watcher without evaluating it.
    pub(crate) fn build(
        owner: &Owner,
        source: WatchSource,
        callback: Option<Callback>,
        options: WatcherOptions,
        is_render: bool,
    ) -> Rc<Self> {
        let (getter, expression) = match source {
            WatchSource::Getter(getter) => (getter, "<getter>".to_string()),
            WatchSource::Path(path) => {
                let getter = parse_path(&path).unwrap_or_else(|| {
                    warn(
                        &format!(
                            "Failed watching path: \"{path}\". Watcher only accepts simple \
                             dot-delimited paths. For full control, use a getter instead."
                        ),
                        Some(owner),
                    );
                    Rc::new(|_: &Owner| -> Result<Value, ReactiveError> { Ok(Value::Undefined) })
                });
                (getter, path)
            }
        };
        let expression = options.label.clone().unwrap_or(expression);
        let lazy = options.lazy;

        let watcher = Rc::new_cyclic(|this| Self {
            id: WatcherId::next(),
            owner: owner.downgrade(),
            getter,
            callback,
            options,
            expression,
            is_render,
            value: RefCell::new(Value::Undefined),
            dirty: Cell::new(lazy),
            active: Cell::new(true),
            deps: RefCell::new(IndexMap::new()),
            new_deps: RefCell::new(IndexMap::new()),
            this: this.clone(),
        });

        if is_render {
            owner.set_render_watcher(watcher.clone());
        }
        owner.register_watcher(watcher.clone());
        watcher
    }

    /// Get the watcher's unique ID.
    pub fn id(&self) -> WatcherId {
        self.id
    }

    /// Description used in diagnostics.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_user(&self) -> bool {
        self.options.user
    }

    pub fn is_lazy(&self) -> bool {
        self.options.lazy
    }

    pub fn is_render(&self) -> bool {
        self.is_render
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Last evaluated value.
    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    /// The owning context, if it is still alive.
    pub fn owner(&self) -> Option<Owner> {
        Owner::upgrade(&self.owner)
    }

    /// Get the number of registries read by the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.deps.borrow().len()
    }

    /// Whether the last evaluation read `dep`.
    pub fn depends_on(&self, dep: &Dep) -> bool {
        self.deps.borrow().contains_key(&dep.id())
    }

    /// Evaluate the getter and re-collect dependencies.
    ///
    /// `Ok(None)` means the evaluation was skipped (owner gone) or a user
    /// getter failed and the failure was reported.
    fn get(&self) -> Result<Option<Value>, ReactiveError> {
        let (Some(this), Some(owner)) = (self.this.upgrade(), self.owner()) else {
            return Ok(None);
        };

        let outcome = {
            let _ctx = ReactiveContext::enter(this);
            let result = (self.getter)(&owner);
            if self.options.deep {
                if let Ok(value) = &result {
                    traverse(value);
                }
            }
            result
        };
        self.cleanup_deps();

        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(err) if self.options.user => {
                let info = format!("getter for watcher \"{}\"", self.expression);
                handle_error(&err, Some(&owner), &info);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Record that the current evaluation read `dep`.
    pub(crate) fn add_dep(&self, dep: &Rc<Dep>) {
        let id = dep.id();
        {
            let mut new_deps = self.new_deps.borrow_mut();
            if new_deps.contains_key(&id) {
                return;
            }
            new_deps.insert(id, dep.clone());
        }
        if !self.deps.borrow().contains_key(&id) {
            if let Some(this) = self.this.upgrade() {
                dep.subscribe(&this);
            }
        }
    }

    /// Drop registries not read by the latest evaluation and promote the new
    /// generation.
    fn cleanup_deps(&self) {
        let new_deps = std::mem::take(&mut *self.new_deps.borrow_mut());
        let old_deps = std::mem::replace(&mut *self.deps.borrow_mut(), new_deps);
        let deps = self.deps.borrow();
        for (id, dep) in old_deps {
            if !deps.contains_key(&id) {
                dep.unsubscribe(self.id);
            }
        }
    }

    /// Invalidation hook, called by registries.
    pub fn update(&self) {
        if self.options.lazy {
            self.dirty.set(true);
        } else if self.options.sync {
            if let Err(err) = self.run() {
                handle_error(&err, self.owner().as_ref(), "sync watcher");
            }
        } else if let Some(this) = self.this.upgrade() {
            trace!(watcher = %self.id, "queue watcher");
            queue_watcher(&this);
        }
    }

    /// Re-evaluate and fire the callback if the value changed.
    ///
    /// Containers always count as changed because in-place mutation cannot be
    /// detected by identity. Deep watchers always fire.
    pub fn run(&self) -> Result<(), ReactiveError> {
        if !self.active.get() {
            return Ok(());
        }
        let Some(value) = self.get()? else {
            return Ok(());
        };

        let changed = {
            let old = self.value.borrow();
            !value.same_value(&old) || value.is_container() || self.options.deep
        };
        if !changed {
            return Ok(());
        }

        let old_value = self.value.replace(value.clone());
        let (Some(callback), Some(owner)) = (&self.callback, self.owner()) else {
            return Ok(());
        };

        if self.options.user {
            if let Err(err) = callback(&owner, &value, &old_value) {
                let info = format!("callback for watcher \"{}\"", self.expression);
                handle_error(&err, Some(&owner), &info);
            }
            Ok(())
        } else {
            callback(&owner, &value, &old_value)
        }
    }

    /// Lazy watchers: recompute the value and clear the dirty flag.
    pub fn evaluate(&self) -> Result<(), ReactiveError> {
        if let Some(value) = self.get()? {
            *self.value.borrow_mut() = value;
        }
        self.dirty.set(false);
        Ok(())
    }

    /// Make the currently evaluating watcher depend on everything this
    /// watcher read.
    pub fn depend(&self) {
        let deps: Vec<Rc<Dep>> = self.deps.borrow().values().cloned().collect();
        for dep in deps {
            dep.depend();
        }
    }

    pub(crate) fn call_before(&self) {
        if let (Some(before), Some(owner)) = (&self.options.before, self.owner()) {
            before(&owner);
        }
    }

    /// Unsubscribe from every registry and stop running.
    ///
    /// A watcher already sitting in the flush queue stays there; `run` checks
    /// the active flag.
    pub fn teardown(&self) {
        if !self.active.get() {
            return;
        }
        if let Some(owner) = self.owner() {
            if !owner.is_being_destroyed() {
                owner.unregister_watcher(self.id);
            }
        }
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps.values() {
            dep.unsubscribe(self.id);
        }
        self.active.set(false);
    }

    /// Alias for [`Watcher::teardown`].
    pub fn dispose(&self) {
        self.teardown();
    }

    /// Invalidate as if a dependency changed.
    pub fn force_reevaluate(&self) {
        self.update();
    }
}

impl Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id)
            .field("expression", &self.expression)
            .field("lazy", &self.options.lazy)
            .field("dirty", &self.dirty.get())
            .field("active", &self.active.get())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::observer::observe;

    fn sync_mode() {
        config::reset();
        config::configure(|c| c.settings.async_flush = false);
    }

    fn counting_watch(owner: &Owner, path: &str, hits: Rc<Cell<u32>>) -> Rc<Watcher> {
        Watcher::new(
            owner,
            WatchSource::path(path),
            Some(Rc::new(move |_, _, _| {
                hits.set(hits.get() + 1);
                Ok(())
            })),
            WatcherOptions::user(),
            false,
        )
        .unwrap()
    }

    #[test]
    fn non_lazy_watcher_evaluates_on_creation() {
        sync_mode();
        let owner = Owner::new("w");
        owner.init_data(Value::object([("a", Value::from(1))]));
        let watcher = Watcher::new(
            &owner,
            WatchSource::path("a"),
            None,
            WatcherOptions::default(),
            false,
        )
        .unwrap();
        assert_eq!(watcher.value().as_f64(), Some(1.0));
        assert_eq!(watcher.dependency_count(), 1);
    }

    #[test]
    fn lazy_watcher_starts_dirty() {
        let owner = Owner::new("w");
        let watcher = Watcher::new(
            &owner,
            WatchSource::getter(|_| Ok(Value::from(7))),
            None,
            WatcherOptions::lazy(),
            false,
        )
        .unwrap();
        assert!(watcher.is_dirty());
        assert!(watcher.value().is_undefined());

        watcher.evaluate().unwrap();
        assert!(!watcher.is_dirty());
        assert_eq!(watcher.value().as_f64(), Some(7.0));
    }

    #[test]
    fn callback_receives_new_and_old() {
        sync_mode();
        let owner = Owner::new("w");
        owner.init_data(Value::object([("a", Value::from(1))]));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        Watcher::new(
            &owner,
            WatchSource::path("a"),
            Some(Rc::new(move |_, new, old| {
                seen_clone.borrow_mut().push((new.as_f64(), old.as_f64()));
                Ok(())
            })),
            WatcherOptions::user(),
            false,
        )
        .unwrap();

        owner.set("a", Value::from(2));
        assert_eq!(*seen.borrow(), vec![(Some(2.0), Some(1.0))]);
        config::reset();
    }

    #[test]
    fn identical_write_does_not_fire() {
        sync_mode();
        let owner = Owner::new("w");
        owner.init_data(Value::object([("n", Value::Number(f64::NAN))]));
        let hits = Rc::new(Cell::new(0));
        counting_watch(&owner, "n", hits.clone());

        owner.set("n", Value::Number(f64::NAN));
        assert_eq!(hits.get(), 0);
        owner.set("n", Value::from(1));
        assert_eq!(hits.get(), 1);
        config::reset();
    }

    #[test]
    fn stale_dependencies_are_pruned() {
        sync_mode();
        let owner = Owner::new("w");
        owner.init_data(Value::object([
            ("flag", Value::from(true)),
            ("a", Value::from(1)),
            ("b", Value::from(2)),
        ]));
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let watcher = Watcher::new(
            &owner,
            WatchSource::getter(move |owner| {
                runs_clone.set(runs_clone.get() + 1);
                let flag = owner.get("flag")?.as_bool().unwrap_or(false);
                owner.get(if flag { "a" } else { "b" })
            }),
            None,
            WatcherOptions::default(),
            false,
        )
        .unwrap();
        assert_eq!(runs.get(), 1);

        owner.set("b", Value::from(3));
        assert_eq!(runs.get(), 1);

        owner.set("flag", Value::from(false));
        assert_eq!(runs.get(), 2);
        assert_eq!(watcher.value().as_f64(), Some(3.0));

        owner.set("a", Value::from(10));
        assert_eq!(runs.get(), 2);
        config::reset();
    }

    #[test]
    fn user_getter_failure_keeps_previous_value() {
        sync_mode();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let errors_clone = errors.clone();
        config::configure(|c| {
            c.error_handler = Some(Rc::new(move |err, _, info| {
                errors_clone.borrow_mut().push(format!("{info}: {err}"));
            }))
        });

        let owner = Owner::new("w");
        owner.init_data(Value::object([("x", Value::from(1))]));
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        let watcher = Watcher::new(
            &owner,
            WatchSource::getter(|owner| {
                let x = owner.get("x")?;
                if x.as_f64() == Some(2.0) {
                    return Err(ReactiveError::msg("two is not allowed"));
                }
                Ok(x)
            }),
            Some(Rc::new(move |_, _, _| {
                hits_clone.set(hits_clone.get() + 1);
                Ok(())
            })),
            WatcherOptions {
                label: Some("x guard".into()),
                ..WatcherOptions::user()
            },
            false,
        )
        .unwrap();

        owner.set("x", Value::from(2));
        assert_eq!(watcher.value().as_f64(), Some(1.0));
        assert_eq!(hits.get(), 0);
        assert_eq!(
            *errors.borrow(),
            vec!["getter for watcher \"x guard\": two is not allowed".to_string()]
        );
        config::reset();
    }

    #[test]
    fn internal_getter_failure_propagates() {
        let owner = Owner::new("w");
        let result = Watcher::new(
            &owner,
            WatchSource::getter(|_| Err(ReactiveError::msg("render failed"))),
            None,
            WatcherOptions::default(),
            true,
        );
        assert!(matches!(result, Err(ReactiveError::Thrown(msg)) if msg == "render failed"));
    }

    #[test]
    fn container_values_always_fire() {
        sync_mode();
        let list = Value::array([Value::from(1)]);
        let owner = Owner::new("w");
        owner.init_data(Value::object([("list", list.clone())]));
        let hits = Rc::new(Cell::new(0));
        counting_watch(&owner, "list", hits.clone());

        list.as_array().unwrap().push([Value::from(2)]);
        assert_eq!(hits.get(), 1);
        config::reset();
    }

    #[test]
    fn teardown_unsubscribes() {
        sync_mode();
        let owner = Owner::new("w");
        let data = Value::object([("a", Value::from(1))]);
        owner.init_data(data.clone());
        let hits = Rc::new(Cell::new(0));
        let watcher = counting_watch(&owner, "a", hits.clone());
        let dep = data
            .as_object()
            .unwrap()
            .property("a")
            .unwrap()
            .dep()
            .cloned()
            .unwrap();
        assert!(dep.has_subscriber(watcher.id()));

        watcher.dispose();
        assert!(!watcher.is_active());
        assert!(!dep.has_subscriber(watcher.id()));
        assert_eq!(owner.watcher_count(), 0);

        owner.set("a", Value::from(5));
        assert_eq!(hits.get(), 0);
        config::reset();
    }

    #[test]
    fn deep_watch_sees_nested_mutation() {
        sync_mode();
        let inner = Value::object([("leaf", Value::from(1))]);
        let owner = Owner::new("w");
        owner.init_data(Value::object([("outer", Value::object([("inner", inner.clone())]))]));
        observe(&inner, false);
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        Watcher::new(
            &owner,
            WatchSource::path("outer"),
            Some(Rc::new(move |_, _, _| {
                hits_clone.set(hits_clone.get() + 1);
                Ok(())
            })),
            WatcherOptions {
                deep: true,
                ..WatcherOptions::user()
            },
            false,
        )
        .unwrap();

        inner.as_object().unwrap().set("leaf", Value::from(2));
        assert_eq!(hits.get(), 1);
        config::reset();
    }
}
