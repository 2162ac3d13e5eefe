//! Next-Tick Queue
//!
//! Deferred work runs on "the next tick": a per-thread callback queue that
//! the host event loop drains with [`run_pending_ticks`]. Callbacks queued
//! while a batch runs are kept for the following batch.
//!
//! [`next_tick_async`] bridges the queue to async code with a tokio oneshot
//! channel.

use std::cell::RefCell;
use std::future::Future;

use tokio::sync::oneshot;
use tracing::trace;

use crate::diagnostics::handle_error;
use crate::error::ReactiveError;

type TickCallback = Box<dyn FnOnce() -> Result<(), ReactiveError>>;

thread_local! {
    static TICKS: RefCell<Vec<TickCallback>> = RefCell::new(Vec::new());
}

/// Queue `f` for the next tick.
pub fn next_tick<F>(f: F)
where
    F: FnOnce() -> Result<(), ReactiveError> + 'static,
{
    TICKS.with(|ticks| ticks.borrow_mut().push(Box::new(f)));
}

/// Whether any callback is waiting for the next tick.
pub fn has_pending_ticks() -> bool {
    TICKS.with(|ticks| !ticks.borrow().is_empty())
}

/// Run every callback queued so far.
///
/// Failures are reported through the error channel and do not stop the
/// batch. Returns the number of callbacks run.
pub fn run_pending_ticks() -> usize {
    let batch = TICKS.with(|ticks| std::mem::take(&mut *ticks.borrow_mut()));
    let count = batch.len();
    if count > 0 {
        trace!(count, "running tick callbacks");
    }
    for callback in batch {
        if let Err(err) = callback() {
            handle_error(&err, None, "nextTick");
        }
    }
    count
}

/// A future that resolves once the tick queue has been drained past this
/// point.
pub fn next_tick_async() -> impl Future<Output = ()> {
    let (tx, rx) = oneshot::channel();
    next_tick(move || {
        let _ = tx.send(());
        Ok(())
    });
    async move {
        let _ = rx.await;
    }
}
