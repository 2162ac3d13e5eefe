//! Flush Queue
//!
//! The flush queue holds the watchers invalidated since the last flush and
//! decides the order they run in.
//!
//! # Algorithm
//!
//! 1. While idle, `enqueue` appends. A watcher already pending is skipped.
//! 2. `begin` sorts by watcher id. Parents are created before children and a
//!    component's explicit watches before its render watcher, so id order is
//!    dependency order.
//! 3. The flush loop walks the queue by cursor. A watcher enqueued mid-flush
//!    is inserted at its sorted position after the cursor; one whose id is
//!    not greater than the running watcher's lands right after the cursor so
//!    it is never deferred forever.
//! 4. Enqueueing a watcher that already ran in this flush counts a repeat,
//!    whether it re-enqueued itself or another watcher did. Past the limit it
//!    is abandoned: pending copies are dropped and further enqueues are
//!    ignored until the queue resets. A watcher in a loop with itself or with
//!    others therefore runs at most `limit + 1` times per flush.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexSet;

use crate::reactive::{Watcher, WatcherId};

/// Outcome of [`FlushQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enqueued {
    Added,

    /// Already pending, or abandoned earlier in this flush.
    Skipped,

    /// This enqueue pushed the watcher past the repeat limit.
    Abandoned,
}

/// Pending watchers plus per-flush bookkeeping.
pub(crate) struct FlushQueue {
    queue: Vec<Rc<Watcher>>,

    /// Ids enqueued but not yet started.
    has: HashSet<WatcherId>,

    /// Ids started at least once in the current flush.
    started: HashSet<WatcherId>,

    /// Repeat counters for the current flush.
    circular: HashMap<WatcherId, usize>,

    /// Abandoned ids, in abandonment order.
    abandoned: IndexSet<WatcherId>,

    limit: usize,
    flushing: bool,

    /// Position of the running watcher.
    index: usize,
}

impl FlushQueue {
    pub(crate) fn new() -> Self {
        Self {
            queue: Vec::new(),
            has: HashSet::new(),
            started: HashSet::new(),
            circular: HashMap::new(),
            abandoned: IndexSet::new(),
            limit: usize::MAX,
            flushing: false,
            index: 0,
        }
    }

    /// Add `watcher` unless it is already pending or abandoned.
    ///
    /// A watcher enqueued by another one past the repeat limit is abandoned
    /// here. The running watcher re-enqueueing itself is settled by
    /// [`finish_run`](Self::finish_run) instead.
    pub(crate) fn enqueue(&mut self, watcher: &Rc<Watcher>) -> Enqueued {
        let id = watcher.id();
        if self.abandoned.contains(&id) || self.has.contains(&id) {
            return Enqueued::Skipped;
        }

        if self.flushing && self.started.contains(&id) {
            let count = self.circular.entry(id).or_insert(0);
            *count += 1;
            let running = self.queue.get(self.index).is_some_and(|w| w.id() == id);
            if *count > self.limit && !running {
                self.abandon(id);
                return Enqueued::Abandoned;
            }
        }
        self.has.insert(id);

        if !self.flushing {
            self.queue.push(watcher.clone());
        } else {
            let mut i = self.queue.len();
            while i > self.index + 1 && self.queue[i - 1].id() > id {
                i -= 1;
            }
            self.queue.insert(i, watcher.clone());
        }
        Enqueued::Added
    }

    /// Enter flushing mode with the queue sorted by id. `limit` is the number
    /// of repeats a watcher is allowed before it is abandoned.
    pub(crate) fn begin(&mut self, limit: usize) {
        self.limit = limit;
        self.flushing = true;
        self.index = 0;
        self.queue.sort_by_key(|watcher| watcher.id());
    }

    /// The watcher under the cursor.
    pub(crate) fn current(&self) -> Option<Rc<Watcher>> {
        self.queue.get(self.index).cloned()
    }

    /// Clear the pending marker of a watcher that is about to run.
    pub(crate) fn start(&mut self, id: WatcherId) {
        self.has.remove(&id);
        self.started.insert(id);
    }

    /// Settle a finished run: a watcher that re-enqueued itself past the
    /// limit is abandoned.
    ///
    /// Returns `true` when the watcher was abandoned.
    pub(crate) fn finish_run(&mut self, id: WatcherId) -> bool {
        if !self.has.contains(&id) {
            return false;
        }
        if self.circular.get(&id).copied().unwrap_or(0) <= self.limit {
            return false;
        }
        self.abandon(id);
        true
    }

    fn abandon(&mut self, id: WatcherId) {
        self.abandoned.insert(id);
        self.has.remove(&id);
        let tail = self.queue.split_off(self.index + 1);
        self.queue
            .extend(tail.into_iter().filter(|watcher| watcher.id() != id));
    }

    /// Watchers abandoned in the current flush.
    pub(crate) fn abandoned(&self) -> Vec<WatcherId> {
        self.abandoned.iter().copied().collect()
    }

    /// Move the cursor forward.
    pub(crate) fn advance(&mut self) {
        self.index += 1;
    }

    /// Take the flushed watchers and reset all transient state.
    pub(crate) fn drain(&mut self) -> Vec<Rc<Watcher>> {
        let flushed = std::mem::take(&mut self.queue);
        self.reset();
        flushed
    }

    pub(crate) fn reset(&mut self) {
        self.queue.clear();
        self.has.clear();
        self.started.clear();
        self.circular.clear();
        self.abandoned.clear();
        self.flushing = false;
        self.index = 0;
    }

    pub(crate) fn is_flushing(&self) -> bool {
        self.flushing
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: WatcherId) -> bool {
        self.has.contains(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn ids(&self) -> Vec<WatcherId> {
        self.queue.iter().map(|watcher| watcher.id()).collect()
    }
}

impl Default for FlushQueue {
    fn default() -> Self {
        Self::new()
    }
}
