//! Owner Contexts
//!
//! An [`Owner`] is the context computations are created against: a component
//! instance, in UI terms. It holds the owner's root data, props and computed
//! values, every watcher created for it, its primary render watcher and its
//! lifecycle hooks.
//!
//! Getters and callbacks receive `&Owner` rather than capturing it. Watchers
//! keep only a weak reference back, so an owner and its watchers never form
//! a reference cycle.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::debug;

use crate::diagnostics::{handle_error, warn};
use crate::error::ReactiveError;
use crate::observer::{
    define_reactive, observe, without_observing, CustomSetter, ReactiveObject, Value,
};
use crate::reactive::{
    untracked, Callback, Computed, WatchSource, Watcher, WatcherId, WatcherOptions,
};

/// Lifecycle hook names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    Activated,
    BeforeDestroy,
    Destroyed,
}

impl Hook {
    pub fn name(self) -> &'static str {
        match self {
            Hook::BeforeMount => "beforeMount",
            Hook::Mounted => "mounted",
            Hook::BeforeUpdate => "beforeUpdate",
            Hook::Updated => "updated",
            Hook::Activated => "activated",
            Hook::BeforeDestroy => "beforeDestroy",
            Hook::Destroyed => "destroyed",
        }
    }
}

/// Lifecycle hook callback.
pub type HookFn = Rc<dyn Fn(&Owner) -> Result<(), ReactiveError>>;

/// Options for [`Owner::watch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Also react to nested mutations.
    pub deep: bool,

    /// Invoke the callback once right away with `(value, Undefined)`.
    pub immediate: bool,

    /// Run on invalidation instead of queueing.
    pub sync: bool,
}

pub(crate) struct OwnerInner {
    name: String,
    data: RefCell<Option<Value>>,
    props: RefCell<Option<ReactiveObject>>,
    computed: RefCell<IndexMap<String, Computed>>,
    watchers: RefCell<Vec<Rc<Watcher>>>,
    render_watcher: RefCell<Option<Rc<Watcher>>>,
    hooks: RefCell<HashMap<Hook, Vec<HookFn>>>,
    mounted: Cell<bool>,
    being_destroyed: Cell<bool>,
    destroyed: Cell<bool>,
    inactive: Cell<bool>,
    updating_props: Cell<bool>,
}

/// Shared handle to an owner context.
#[derive(Clone)]
pub struct Owner(Rc<OwnerInner>);

impl Owner {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Rc::new(OwnerInner {
            name: name.into(),
            data: RefCell::new(None),
            props: RefCell::new(None),
            computed: RefCell::new(IndexMap::new()),
            watchers: RefCell::new(Vec::new()),
            render_watcher: RefCell::new(None),
            hooks: RefCell::new(HashMap::new()),
            mounted: Cell::new(false),
            being_destroyed: Cell::new(false),
            destroyed: Cell::new(false),
            inactive: Cell::new(false),
            updating_props: Cell::new(false),
        }))
    }

    pub fn name(&self) -> String {
        self.0.name.clone()
    }

    pub(crate) fn downgrade(&self) -> Weak<OwnerInner> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &Weak<OwnerInner>) -> Option<Self> {
        weak.upgrade().map(Self)
    }

    pub fn ptr_eq(&self, other: &Owner) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Install `value` as the root data and observe it.
    ///
    /// Non-object values are replaced by an empty object with a warning.
    pub fn init_data(&self, value: Value) {
        let data = match value {
            Value::Object(_) => value,
            _ => {
                warn("data functions should return an object", Some(self));
                Value::Object(ReactiveObject::new())
            }
        };

        if let (Some(obj), Some(props)) = (data.as_object(), self.props()) {
            for key in obj.entries().into_iter().map(|(key, _)| key) {
                if props.contains_key(&key) {
                    warn(
                        &format!(
                            "The data property \"{key}\" is already declared as a prop. \
                             Use prop default value instead."
                        ),
                        Some(self),
                    );
                }
            }
        }

        observe(&data, true);
        if let Some(previous) = self.0.data.replace(Some(data)) {
            release_root(&previous);
        }
    }

    /// Build the root data with `factory`, without collecting dependencies.
    ///
    /// A failing factory is reported with info `data()` and the data falls
    /// back to an empty object.
    pub fn init_data_with<F>(&self, factory: F)
    where
        F: FnOnce(&Owner) -> Result<Value, ReactiveError>,
    {
        let value = untracked(|| factory(self)).unwrap_or_else(|err| {
            handle_error(&err, Some(self), "data()");
            Value::Object(ReactiveObject::new())
        });
        self.init_data(value);
    }

    /// Define reactive props.
    ///
    /// For a non-root owner the prop values are not observed here: they
    /// belong to the parent, which has already observed whatever it wants
    /// reactive. Writing a prop of a non-root owner outside
    /// [`update_props`](Self::update_props) warns.
    pub fn init_props<K, I>(&self, values: I, is_root: bool)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let props = ReactiveObject::new();
        let define = || {
            for (key, value) in values {
                let key = key.into();
                let owner = self.downgrade();
                let prop_name = key.clone();
                let guard: CustomSetter = Rc::new(move || {
                    let Some(owner) = Owner::upgrade(&owner) else {
                        return;
                    };
                    if !is_root && !owner.0.updating_props.get() {
                        warn(
                            &format!(
                                "Avoid mutating a prop directly since the value will be \
                                 overwritten whenever the parent component re-renders. \
                                 Prop being mutated: \"{prop_name}\""
                            ),
                            Some(&owner),
                        );
                    }
                });
                define_reactive(&props, &key, value, Some(guard), false);
            }
        };
        if is_root {
            define();
        } else {
            without_observing(define);
        }
        *self.0.props.borrow_mut() = Some(props);
    }

    /// Push new prop values from the parent.
    pub fn update_props<K, I>(&self, values: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let Some(props) = self.props() else {
            return;
        };
        self.0.updating_props.set(true);
        without_observing(|| {
            for (key, value) in values {
                props.set(key.as_ref(), value);
            }
        });
        self.0.updating_props.set(false);
    }

    /// The root data, or `Undefined` before [`init_data`](Self::init_data).
    pub fn data(&self) -> Value {
        self.0.data.borrow().clone().unwrap_or_default()
    }

    pub fn props(&self) -> Option<ReactiveObject> {
        self.0.props.borrow().clone()
    }

    /// Tracked read of a prop, data key or computed value, in that order.
    /// Unknown keys read as `Undefined`.
    pub fn get(&self, key: &str) -> Result<Value, ReactiveError> {
        if let Some(props) = self.props() {
            if props.contains_key(key) {
                return Ok(props.get(key));
            }
        }
        let data = self.0.data.borrow().clone();
        if let Some(Value::Object(obj)) = &data {
            if obj.contains_key(key) {
                return Ok(obj.get(key));
            }
        }
        match self.computed(key) {
            Some(computed) => computed.get(),
            None => Ok(Value::Undefined),
        }
    }

    /// Write a prop or data key. Computed values have no setter and warn.
    ///
    /// Unknown keys are added to the root data as plain, untracked properties;
    /// use [`observer::set`](crate::observer::set) on a nested object to add a
    /// reactive one.
    pub fn set(&self, key: &str, value: Value) {
        if let Some(props) = self.props() {
            if props.contains_key(key) {
                props.set(key, value);
                return;
            }
        }
        let data = self.0.data.borrow().clone();
        let Some(Value::Object(obj)) = data else {
            return;
        };
        if !obj.contains_key(key) && self.0.computed.borrow().contains_key(key) {
            warn(
                &format!("Computed property \"{key}\" was assigned to but it has no setter."),
                Some(self),
            );
            return;
        }
        obj.set(key, value);
    }

    // ------------------------------------------------------------------
    // Computations
    // ------------------------------------------------------------------

    /// Define a cached computed value readable through [`get`](Self::get).
    pub fn define_computed<F>(&self, name: &str, getter: F) -> Computed
    where
        F: Fn(&Owner) -> Result<Value, ReactiveError> + 'static,
    {
        let in_data = self
            .0
            .data
            .borrow()
            .as_ref()
            .and_then(Value::as_object)
            .is_some_and(|obj| obj.contains_key(name));
        let in_props = self.props().is_some_and(|props| props.contains_key(name));
        if in_data {
            warn(
                &format!("The computed property \"{name}\" is already defined in data."),
                Some(self),
            );
        } else if in_props {
            warn(
                &format!("The computed property \"{name}\" is already defined as a prop."),
                Some(self),
            );
        }

        let watcher = Watcher::build(
            self,
            WatchSource::getter(getter),
            None,
            WatcherOptions {
                label: Some(name.to_string()),
                ..WatcherOptions::lazy()
            },
            false,
        );
        let computed = Computed::new(name, watcher);
        self.0
            .computed
            .borrow_mut()
            .insert(name.to_string(), computed.clone());
        computed
    }

    pub fn computed(&self, name: &str) -> Option<Computed> {
        self.0.computed.borrow().get(name).cloned()
    }

    /// Watch `source` and call `callback(owner, new, old)` when it changes.
    ///
    /// Dispose the returned watcher to stop watching.
    pub fn watch<F>(
        &self,
        source: WatchSource,
        callback: F,
        options: WatchOptions,
    ) -> Result<Rc<Watcher>, ReactiveError>
    where
        F: Fn(&Owner, &Value, &Value) -> Result<(), ReactiveError> + 'static,
    {
        let callback: Callback = Rc::new(callback);
        let watcher = Watcher::new(
            self,
            source,
            Some(callback.clone()),
            WatcherOptions {
                deep: options.deep,
                sync: options.sync,
                ..WatcherOptions::user()
            },
            false,
        )?;

        if options.immediate {
            let value = watcher.value();
            if let Err(err) = untracked(|| callback(self, &value, &Value::Undefined)) {
                let info = format!("callback for immediate watcher \"{}\"", watcher.expression());
                handle_error(&err, Some(self), &info);
            }
        }
        Ok(watcher)
    }

    /// Create the primary render watcher and mark the owner mounted.
    ///
    /// A render failure on mount is returned. Later failures surface from
    /// the flush that re-runs the render.
    pub fn mount<F>(&self, render: F) -> Result<Rc<Watcher>, ReactiveError>
    where
        F: Fn(&Owner) -> Result<(), ReactiveError> + 'static,
    {
        self.call_hook(Hook::BeforeMount);
        let before: Rc<dyn Fn(&Owner)> = Rc::new(|owner: &Owner| {
            if owner.is_mounted() && !owner.is_destroyed() {
                owner.call_hook(Hook::BeforeUpdate);
            }
        });
        let watcher = Watcher::new(
            self,
            WatchSource::getter(move |owner| {
                render(owner)?;
                Ok(Value::Undefined)
            }),
            None,
            WatcherOptions {
                before: Some(before),
                label: Some(format!("render of {}", self.0.name)),
                ..WatcherOptions::default()
            },
            true,
        )?;
        self.0.mounted.set(true);
        self.call_hook(Hook::Mounted);
        Ok(watcher)
    }

    /// Re-queue the render watcher.
    pub fn force_update(&self) {
        let watcher = self.0.render_watcher.borrow().clone();
        if let Some(watcher) = watcher {
            watcher.update();
        }
    }

    pub(crate) fn register_watcher(&self, watcher: Rc<Watcher>) {
        self.0.watchers.borrow_mut().push(watcher);
    }

    pub(crate) fn unregister_watcher(&self, id: WatcherId) {
        self.0.watchers.borrow_mut().retain(|watcher| watcher.id() != id);
    }

    pub(crate) fn set_render_watcher(&self, watcher: Rc<Watcher>) {
        *self.0.render_watcher.borrow_mut() = Some(watcher);
    }

    pub fn render_watcher(&self) -> Option<Rc<Watcher>> {
        self.0.render_watcher.borrow().clone()
    }

    pub(crate) fn is_render_watcher(&self, watcher: &Rc<Watcher>) -> bool {
        self.0
            .render_watcher
            .borrow()
            .as_ref()
            .is_some_and(|render| Rc::ptr_eq(render, watcher))
    }

    /// Number of live watchers owned by this context.
    pub fn watcher_count(&self) -> usize {
        self.0.watchers.borrow().len()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Register a lifecycle hook.
    pub fn on<F>(&self, hook: Hook, f: F)
    where
        F: Fn(&Owner) -> Result<(), ReactiveError> + 'static,
    {
        self.0
            .hooks
            .borrow_mut()
            .entry(hook)
            .or_default()
            .push(Rc::new(f));
    }

    /// Run every handler of `hook` without collecting dependencies.
    pub fn call_hook(&self, hook: Hook) {
        let handlers = self.0.hooks.borrow().get(&hook).cloned().unwrap_or_default();
        if handlers.is_empty() {
            return;
        }
        let info = format!("{} hook", hook.name());
        untracked(|| {
            for handler in handlers {
                if let Err(err) = handler(self) {
                    handle_error(&err, Some(self), &info);
                }
            }
        });
    }

    /// Tear down every watcher, release the root data and fire `Destroyed`.
    pub fn destroy(&self) {
        if self.0.being_destroyed.get() {
            return;
        }
        self.call_hook(Hook::BeforeDestroy);
        self.0.being_destroyed.set(true);

        let watchers = std::mem::take(&mut *self.0.watchers.borrow_mut());
        debug!(owner = %self.0.name, watchers = watchers.len(), "destroying owner");
        for watcher in &watchers {
            watcher.teardown();
        }
        if let Some(data) = self.0.data.borrow().as_ref() {
            release_root(data);
        }

        self.0.destroyed.set(true);
        self.call_hook(Hook::Destroyed);
    }

    pub fn is_mounted(&self) -> bool {
        self.0.mounted.get()
    }

    pub fn is_being_destroyed(&self) -> bool {
        self.0.being_destroyed.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    pub fn is_inactive(&self) -> bool {
        self.0.inactive.get()
    }

    pub fn set_inactive(&self, inactive: bool) {
        self.0.inactive.set(inactive);
    }
}

fn release_root(data: &Value) {
    if let Some(node) = data.as_object().and_then(ReactiveObject::observer) {
        node.release_root();
    }
}

impl Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("name", &self.0.name)
            .field("watchers", &self.watcher_count())
            .field("mounted", &self.is_mounted())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    fn sync_mode() {
        config::reset();
        config::configure(|c| c.settings.async_flush = false);
    }

    fn collect_warnings() -> Rc<RefCell<Vec<String>>> {
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let sink = warnings.clone();
        config::configure(|c| {
            c.warn_handler = Some(Rc::new(move |msg, _| sink.borrow_mut().push(msg.to_string())))
        });
        warnings
    }

    #[test]
    fn lookup_order_is_props_data_computed() {
        let owner = Owner::new("lookup");
        owner.init_props([("p", Value::from("prop"))], true);
        owner.init_data(Value::object([("d", Value::from("data"))]));
        owner.define_computed("c", |_| Ok(Value::from("computed")));

        assert_eq!(owner.get("p").unwrap().as_str(), Some("prop"));
        assert_eq!(owner.get("d").unwrap().as_str(), Some("data"));
        assert_eq!(owner.get("c").unwrap().as_str(), Some("computed"));
        assert!(owner.get("nope").unwrap().is_undefined());
    }

    #[test]
    fn data_must_be_an_object() {
        config::reset();
        let warnings = collect_warnings();
        let owner = Owner::new("data");
        owner.init_data(Value::from(3));
        assert!(owner.data().as_object().is_some());
        assert_eq!(warnings.borrow().len(), 1);
        config::reset();
    }

    #[test]
    fn data_factory_failure_falls_back() {
        config::reset();
        let infos = Rc::new(RefCell::new(Vec::new()));
        let sink = infos.clone();
        config::configure(|c| {
            c.error_handler = Some(Rc::new(move |_, _, info| sink.borrow_mut().push(info.to_string())))
        });

        let owner = Owner::new("data");
        owner.init_data_with(|_| Err(ReactiveError::msg("factory failed")));
        assert!(owner.data().as_object().unwrap().is_empty());
        assert_eq!(*infos.borrow(), vec!["data()".to_string()]);
        config::reset();
    }

    #[test]
    fn root_data_is_marked_and_released() {
        let owner = Owner::new("root");
        let data = Value::object([("a", Value::from(1))]);
        owner.init_data(data.clone());
        let node = data.as_object().unwrap().observer().unwrap();
        assert!(node.is_root());

        owner.destroy();
        assert!(!node.is_root());
        assert!(owner.is_destroyed());
    }

    #[test]
    fn child_props_warn_on_direct_mutation() {
        config::reset();
        let warnings = collect_warnings();
        let owner = Owner::new("child");
        owner.init_props([("title", Value::from("a"))], false);

        owner.update_props([("title", Value::from("b"))]);
        assert!(warnings.borrow().is_empty());
        assert_eq!(owner.get("title").unwrap().as_str(), Some("b"));

        owner.set("title", Value::from("c"));
        assert_eq!(warnings.borrow().len(), 1);
        assert!(warnings.borrow()[0].contains("Avoid mutating a prop directly"));
        config::reset();
    }

    #[test]
    fn child_props_do_not_observe_values() {
        let owner = Owner::new("child");
        let config_value = Value::object([("k", Value::from(1))]);
        owner.init_props([("config", config_value.clone())], false);
        assert!(config_value.as_object().unwrap().observer().is_none());

        let root = Owner::new("root");
        let root_value = Value::object([("k", Value::from(1))]);
        root.init_props([("config", root_value.clone())], true);
        assert!(root_value.as_object().unwrap().observer().is_some());
    }

    #[test]
    fn assigning_a_computed_warns() {
        config::reset();
        let warnings = collect_warnings();
        let owner = Owner::new("computed");
        owner.init_data(Value::object([("a", Value::from(1))]));
        owner.define_computed("a", |_| Ok(Value::Null));
        owner.define_computed("b", |_| Ok(Value::Null));
        owner.set("b", Value::from(1));
        assert_eq!(warnings.borrow().len(), 2);
        config::reset();
    }

    #[test]
    fn immediate_watch_fires_once_untracked() {
        sync_mode();
        let owner = Owner::new("watch");
        owner.init_data(Value::object([("a", Value::from(1)), ("b", Value::from(1))]));
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        owner
            .watch(
                WatchSource::path("a"),
                move |owner, new, old| {
                    // Reads here must not become dependencies.
                    owner.get("b")?;
                    sink.borrow_mut().push((new.as_f64(), old.is_undefined()));
                    Ok(())
                },
                WatchOptions {
                    immediate: true,
                    ..WatchOptions::default()
                },
            )
            .unwrap();
        assert_eq!(*calls.borrow(), vec![(Some(1.0), true)]);

        owner.set("b", Value::from(2));
        assert_eq!(calls.borrow().len(), 1);
        owner.set("a", Value::from(2));
        assert_eq!(calls.borrow().len(), 2);
        config::reset();
    }

    #[test]
    fn mount_fires_lifecycle_hooks() {
        sync_mode();
        let owner = Owner::new("mount");
        owner.init_data(Value::object([("n", Value::from(0))]));
        let log = Rc::new(RefCell::new(Vec::new()));
        for hook in [Hook::BeforeMount, Hook::Mounted, Hook::BeforeUpdate, Hook::Updated] {
            let log = log.clone();
            owner.on(hook, move |_| {
                log.borrow_mut().push(hook.name());
                Ok(())
            });
        }

        let renders = Rc::new(Cell::new(0));
        let counter = renders.clone();
        owner
            .mount(move |owner| {
                counter.set(counter.get() + 1);
                owner.get("n")?;
                Ok(())
            })
            .unwrap();
        assert!(owner.is_mounted());
        assert_eq!(*log.borrow(), vec!["beforeMount", "mounted"]);

        owner.set("n", Value::from(1));
        assert_eq!(renders.get(), 2);
        assert_eq!(
            *log.borrow(),
            vec!["beforeMount", "mounted", "beforeUpdate", "updated"]
        );

        owner.force_update();
        assert_eq!(renders.get(), 3);
        config::reset();
    }

    #[test]
    fn destroy_stops_all_watchers() {
        sync_mode();
        let owner = Owner::new("destroy");
        owner.init_data(Value::object([("n", Value::from(0))]));
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        owner
            .watch(
                WatchSource::path("n"),
                move |_, _, _| {
                    counter.set(counter.get() + 1);
                    Ok(())
                },
                WatchOptions::default(),
            )
            .unwrap();
        owner.mount(|owner| owner.get("n").map(|_| ())).unwrap();
        assert_eq!(owner.watcher_count(), 2);

        owner.destroy();
        assert_eq!(owner.watcher_count(), 0);
        owner.set("n", Value::from(1));
        assert_eq!(runs.get(), 0);
        config::reset();
    }
}
