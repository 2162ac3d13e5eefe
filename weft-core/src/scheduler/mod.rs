//! Update Scheduler
//!
//! Watchers invalidated by a write are not run on the spot. They are queued,
//! deduplicated, and run together in one ordered flush on the next tick (or
//! inline in synchronous mode).
//!
//! A flush:
//!
//! 1. sorts the queue by watcher id and runs it in order, calling each
//!    watcher's `before` hook first;
//! 2. abandons any watcher re-queued more than `max_update_count` times,
//!    by itself or by other watchers, and keeps draining the rest;
//! 3. resets all transient state, then fires `Activated` hooks for owners
//!    queued with [`queue_activated_component`] and `Updated` hooks for every
//!    flushed render watcher, child first.
//!
//! Resetting before the hooks means writes made by a hook start a fresh
//! flush cycle.

mod queue;
mod tick;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

pub use tick::{has_pending_ticks, next_tick, next_tick_async, run_pending_ticks};

use crate::config;
use crate::diagnostics::{handle_error, warn};
use crate::error::ReactiveError;
use crate::owner::{Hook, Owner};
use crate::reactive::{Watcher, WatcherId};
use queue::{Enqueued, FlushQueue};

struct SchedulerState {
    queue: FlushQueue,

    /// A flush has been scheduled or is running.
    waiting: bool,

    activated: Vec<Owner>,
}

thread_local! {
    static SCHEDULER: RefCell<SchedulerState> = RefCell::new(SchedulerState {
        queue: FlushQueue::new(),
        waiting: false,
        activated: Vec::new(),
    });
}

/// Outcome of one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Watchers run, in run order. A watcher run several times appears once
    /// per run.
    pub ran: Vec<WatcherId>,

    /// Watchers abandoned for exceeding the repeat limit.
    pub aborted: Vec<WatcherId>,
}

impl FlushReport {
    /// How many times `id` ran.
    pub fn runs_of(&self, id: WatcherId) -> usize {
        self.ran.iter().filter(|ran| **ran == id).count()
    }
}

/// Queue `watcher` for the next flush.
///
/// A watcher already pending is not queued twice. The first watcher queued
/// since the last flush schedules one: on the next tick, or immediately when
/// `async_flush` is off.
pub fn queue_watcher(watcher: &Rc<Watcher>) {
    let (enqueued, schedule) = SCHEDULER.with(|state| {
        let mut state = state.borrow_mut();
        let enqueued = state.queue.enqueue(watcher);
        if enqueued != Enqueued::Added {
            return (enqueued, false);
        }
        trace!(watcher = %watcher.id(), "watcher queued");
        let schedule = !state.waiting;
        state.waiting = true;
        (enqueued, schedule)
    });
    if enqueued == Enqueued::Abandoned {
        report_runaway(watcher);
        return;
    }
    if !schedule {
        return;
    }

    if !config::is_async() {
        if let Err(err) = flush_scheduler_queue() {
            handle_error(&err, watcher.owner().as_ref(), "flush");
        }
        return;
    }
    next_tick(|| flush_scheduled().map(|_| ()));
}

/// Queue an owner that became active again, for its `Activated` hook after
/// the next flush.
pub fn queue_activated_component(owner: &Owner) {
    owner.set_inactive(false);
    SCHEDULER.with(|state| state.borrow_mut().activated.push(owner.clone()));
}

/// Drain the queue now instead of waiting for the tick.
///
/// Does nothing if a flush is already running on this thread.
pub fn flush_now() -> Result<FlushReport, ReactiveError> {
    flush_scheduled()
}

/// Whether watchers are waiting for a flush.
pub fn has_pending_flush() -> bool {
    SCHEDULER.with(|state| !state.borrow().queue.is_empty())
}

/// Number of queued watchers.
pub fn pending_count() -> usize {
    SCHEDULER.with(|state| state.borrow().queue.len())
}

fn flush_scheduled() -> Result<FlushReport, ReactiveError> {
    let ready = SCHEDULER.with(|state| {
        let state = state.borrow();
        !state.queue.is_flushing() && (state.waiting || !state.activated.is_empty())
    });
    if !ready {
        return Ok(FlushReport::default());
    }
    flush_scheduler_queue()
}

fn reset_scheduler_state() -> (Vec<Rc<Watcher>>, Vec<Owner>) {
    SCHEDULER.with(|state| {
        let mut state = state.borrow_mut();
        let flushed = state.queue.drain();
        let activated = std::mem::take(&mut state.activated);
        state.waiting = false;
        (flushed, activated)
    })
}

/// Run every queued watcher in id order, then dispatch post-flush hooks.
///
/// An internal watcher failure aborts the flush: state is reset, hooks are
/// skipped, and the error is returned.
pub fn flush_scheduler_queue() -> Result<FlushReport, ReactiveError> {
    let limit = config::max_update_count();
    let already_flushing = SCHEDULER.with(|state| {
        let mut state = state.borrow_mut();
        if state.queue.is_flushing() {
            return true;
        }
        state.queue.begin(limit);
        false
    });
    if already_flushing {
        return Ok(FlushReport::default());
    }

    let mut report = FlushReport::default();
    loop {
        let Some(watcher) = SCHEDULER.with(|state| state.borrow().queue.current()) else {
            break;
        };
        watcher.call_before();
        let id = watcher.id();
        let was_active = watcher.is_active();
        SCHEDULER.with(|state| state.borrow_mut().queue.start(id));

        if let Err(err) = watcher.run() {
            reset_scheduler_state();
            return Err(err);
        }
        if was_active {
            report.ran.push(id);
        }

        let abandoned = SCHEDULER.with(|state| state.borrow_mut().queue.finish_run(id));
        if abandoned {
            report_runaway(&watcher);
        }
        SCHEDULER.with(|state| state.borrow_mut().queue.advance());
    }

    report.aborted = SCHEDULER.with(|state| state.borrow().queue.abandoned());
    let (flushed, activated) = reset_scheduler_state();
    debug!(
        ran = report.ran.len(),
        aborted = report.aborted.len(),
        "flush complete"
    );

    call_activated_hooks(&activated);
    call_updated_hooks(&flushed);
    Ok(report)
}

fn report_runaway(watcher: &Watcher) {
    let expression = if watcher.is_user() {
        format!("watcher with expression \"{}\"", watcher.expression())
    } else {
        "a component render function".to_string()
    };
    let err = ReactiveError::RunawayUpdateCycle {
        watcher: watcher.id(),
        expression,
    };
    warn(&err.to_string(), watcher.owner().as_ref());
}

fn call_activated_hooks(owners: &[Owner]) {
    for owner in owners {
        owner.call_hook(Hook::Activated);
    }
}

fn call_updated_hooks(flushed: &[Rc<Watcher>]) {
    for watcher in flushed.iter().rev() {
        let Some(owner) = watcher.owner() else {
            continue;
        };
        if owner.is_render_watcher(watcher) && owner.is_mounted() && !owner.is_destroyed() {
            owner.call_hook(Hook::Updated);
        }
    }
}
