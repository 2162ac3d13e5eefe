//! Dependency Registry
//!
//! A `Dep` is the subscriber set for one observable unit: a single reactive
//! property, or the identity/shape of a container.
//!
//! # How Registries Work
//!
//! 1. When a property is read while a watcher is evaluating, the property's
//!    registry hands itself to that watcher ([`Dep::depend`]). The watcher
//!    decides whether to subscribe, so a pass subscribes at most once.
//!
//! 2. When the property changes, [`Dep::notify`] snapshots the subscribers
//!    and calls each one's `update` hook. The hook, not the registry, decides
//!    whether to re-run, mark dirty or queue.
//!
//! # Ownership
//!
//! Subscribers are held by `Weak` reference. A registry indexes watchers, it
//! never keeps one alive.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::watcher::Watcher;
use super::{DepId, WatcherId};
use crate::config;

/// Subscriber set for one observable unit.
pub struct Dep {
    /// Unique identifier for this registry.
    id: DepId,

    /// Subscribers in subscription order.
    subs: RefCell<IndexMap<WatcherId, Weak<Watcher>>>,
}

impl Dep {
    /// Create a new empty registry.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            id: DepId::next(),
            subs: RefCell::new(IndexMap::new()),
        })
    }

    /// Get the registry's unique ID.
    pub fn id(&self) -> DepId {
        self.id
    }

    /// Add a subscriber. Re-subscribing the same watcher is a no-op.
    pub fn subscribe(&self, watcher: &Rc<Watcher>) {
        self.subs
            .borrow_mut()
            .entry(watcher.id())
            .or_insert_with(|| Rc::downgrade(watcher));
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, watcher_id: WatcherId) {
        self.subs.borrow_mut().shift_remove(&watcher_id);
    }

    /// Register this registry with the watcher that is currently evaluating.
    pub fn depend(self: &Rc<Self>) {
        if let Some(target) = ReactiveContext::current() {
            target.add_dep(self);
        }
    }

    /// Notify every subscriber that the observed unit changed.
    ///
    /// Iterates a snapshot, so subscribers added while notifying are only
    /// seen by the next notification. Entries whose watcher was dropped are
    /// pruned while the snapshot is taken. In synchronous mode the snapshot is
    /// sorted by watcher id because no scheduler will reorder it later.
    pub fn notify(&self) {
        let mut subs: SmallVec<[Rc<Watcher>; 8]> = SmallVec::new();
        self.subs.borrow_mut().retain(|_, weak| match weak.upgrade() {
            Some(watcher) => {
                subs.push(watcher);
                true
            }
            None => false,
        });

        if !config::is_async() {
            subs.sort_by_key(|watcher| watcher.id());
        }

        for watcher in subs {
            watcher.update();
        }
    }

    /// Check whether `watcher_id` is subscribed.
    pub fn has_subscriber(&self, watcher_id: WatcherId) -> bool {
        self.subs.borrow().contains_key(&watcher_id)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subs.borrow().len()
    }
}

impl Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::observer::Value;
    use crate::owner::Owner;
    use crate::reactive::{WatchSource, WatcherOptions};

    fn sync_counter(owner: &Owner, count: Rc<Cell<u32>>) -> Rc<Watcher> {
        Watcher::new(
            owner,
            WatchSource::getter(move |_| {
                count.set(count.get() + 1);
                Ok(Value::Undefined)
            }),
            None,
            WatcherOptions {
                sync: true,
                ..WatcherOptions::default()
            },
            false,
        )
        .unwrap()
    }

    #[test]
    fn subscribe_is_idempotent() {
        let owner = Owner::new("dep");
        let dep = Dep::new();
        let watcher = sync_counter(&owner, Rc::new(Cell::new(0)));

        dep.subscribe(&watcher);
        dep.subscribe(&watcher);
        assert_eq!(dep.subscriber_count(), 1);

        dep.unsubscribe(watcher.id());
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn notify_calls_update() {
        let owner = Owner::new("dep");
        let dep = Dep::new();
        let count = Rc::new(Cell::new(0));
        let watcher = sync_counter(&owner, count.clone());
        assert_eq!(count.get(), 1);

        dep.subscribe(&watcher);
        dep.notify();
        assert_eq!(count.get(), 2);

        dep.unsubscribe(watcher.id());
        dep.notify();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn torn_down_watchers_do_not_run() {
        let owner = Owner::new("dep");
        let dep = Dep::new();
        let count = Rc::new(Cell::new(0));
        {
            let watcher = sync_counter(&owner, count.clone());
            dep.subscribe(&watcher);
            owner.destroy();
        }
        dep.notify();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn depend_outside_evaluation_does_nothing() {
        let dep = Dep::new();
        dep.depend();
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn registry_ids_are_unique() {
        let d1 = Dep::new();
        let d2 = Dep::new();
        assert_ne!(d1.id(), d2.id());
    }

    #[test]
    fn subscribers_added_while_notifying_wait_for_next_notify() {
        let owner = Owner::new("dep");
        let dep = Dep::new();
        let late_runs = Rc::new(Cell::new(0));
        let late = sync_counter(&owner, late_runs.clone());

        let tick = Rc::new(Cell::new(0.0));
        let tick_clone = tick.clone();
        let dep_clone = dep.clone();
        let early = Watcher::new(
            &owner,
            WatchSource::getter(move |_| {
                tick_clone.set(tick_clone.get() + 1.0);
                Ok(Value::from(tick_clone.get()))
            }),
            Some(Rc::new(move |_, _, _| {
                dep_clone.subscribe(&late);
                Ok(())
            })),
            WatcherOptions {
                sync: true,
                ..WatcherOptions::default()
            },
            false,
        )
        .unwrap();
        dep.subscribe(&early);

        dep.notify();
        assert_eq!(dep.subscriber_count(), 2);
        assert_eq!(late_runs.get(), 1);

        dep.notify();
        assert_eq!(late_runs.get(), 2);
    }

    #[test]
    fn dropped_watchers_are_pruned_on_notify() {
        let dep = Dep::new();
        let count = Rc::new(Cell::new(0));
        {
            let owner = Owner::new("dep");
            let watcher = sync_counter(&owner, count.clone());
            dep.subscribe(&watcher);
        }
        assert_eq!(dep.subscriber_count(), 1);

        dep.notify();
        assert_eq!(dep.subscriber_count(), 0);
        assert_eq!(count.get(), 1);
    }
}
