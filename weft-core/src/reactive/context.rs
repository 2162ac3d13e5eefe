//! Reactive Context
//!
//! The reactive context tracks which watcher is currently evaluating. When a
//! reactive property is read, the registry asks the context for the active
//! watcher and subscribes it.
//!
//! # Implementation
//!
//! A thread-local stack holds the evaluating watchers. Entering pushes,
//! dropping the guard pops, so the previous top is restored even when a
//! nested evaluation returns early. Only the top frame collects dependencies.
//!
//! A frame may also be empty: [`ReactiveContext::untracked`] pushes a frame
//! with no watcher so that reads inside it register nothing (used for data
//! factories and immediate watch callbacks).
//!
//! The stack is never shared across threads and evaluation never yields, so
//! push/pop is strictly LIFO.

use std::cell::RefCell;
use std::rc::Rc;

use super::watcher::Watcher;
use super::WatcherId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<Rc<Watcher>>>> = RefCell::new(Vec::new());
}

/// Guard that pops its frame when dropped.
pub struct ReactiveContext {
    watcher_id: Option<WatcherId>,
}

impl ReactiveContext {
    /// Make `watcher` the active evaluation target until the guard drops.
    pub fn enter(watcher: Rc<Watcher>) -> Self {
        let watcher_id = Some(watcher.id());
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Some(watcher)));
        Self { watcher_id }
    }

    /// Suspend dependency collection until the guard drops.
    pub fn untracked() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(None));
        Self { watcher_id: None }
    }

    /// Check if a watcher is currently collecting dependencies.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// The watcher on top of the stack, if any.
    pub fn current() -> Option<Rc<Watcher>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// Number of frames currently on the stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.as_ref().map(|w| w.id()),
                    self.watcher_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

/// Run `f` without collecting dependencies.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::untracked();
    f()
}
