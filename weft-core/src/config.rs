//! Engine Configuration
//!
//! The engine is single-mutator: every thread that drives reactive state owns
//! its own scheduler, tracking stack and configuration. Settings are therefore
//! kept in a thread-local slot rather than a process-wide lock.
//!
//! Plain settings can be loaded from JSON. Handlers are installed with
//! [`configure`].

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::ReactiveError;

/// Default limit for how many times a watcher may re-queue itself per flush.
pub const MAX_UPDATE_COUNT: usize = 100;

/// Receives errors that were caught at a computation boundary.
///
/// Arguments are the error, the owner name (if any) and a context string
/// such as `callback for watcher "a.b"`.
pub type ErrorHandler = Rc<dyn Fn(&ReactiveError, Option<&str>, &str)>;

/// Receives diagnostic warnings. Arguments are the message and owner name.
pub type WarnHandler = Rc<dyn Fn(&str, Option<&str>)>;

/// Plain, serializable settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Defer flushes to the next tick. When `false`, flushes run inline and
    /// registries sort their subscribers before notifying.
    pub async_flush: bool,

    /// Suppress diagnostic warnings.
    pub silent: bool,

    /// Re-queue limit before a watcher is abandoned for the current flush.
    pub max_update_count: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            async_flush: true,
            silent: false,
            max_update_count: MAX_UPDATE_COUNT,
        }
    }
}

/// Full configuration: settings plus optional handlers.
#[derive(Clone, Default)]
pub struct Config {
    pub settings: Settings,
    pub error_handler: Option<ErrorHandler>,
    pub warn_handler: Option<WarnHandler>,
}

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// Mutate the current thread's configuration.
pub fn configure<F>(f: F)
where
    F: FnOnce(&mut Config),
{
    CONFIG.with(|config| f(&mut config.borrow_mut()));
}

/// Snapshot of the current settings.
pub fn settings() -> Settings {
    CONFIG.with(|config| config.borrow().settings.clone())
}

/// Replace settings from a JSON document. Missing fields take defaults.
pub fn load_json(json: &str) -> Result<(), ReactiveError> {
    let settings: Settings = serde_json::from_str(json)?;
    configure(|config| config.settings = settings);
    Ok(())
}

/// Restore defaults and drop installed handlers.
pub fn reset() {
    configure(|config| *config = Config::default());
}

pub(crate) fn is_async() -> bool {
    CONFIG.with(|config| config.borrow().settings.async_flush)
}

pub(crate) fn is_silent() -> bool {
    CONFIG.with(|config| config.borrow().settings.silent)
}

pub(crate) fn max_update_count() -> usize {
    CONFIG.with(|config| config.borrow().settings.max_update_count)
}

// Handlers are cloned out so they can re-enter `configure`.
pub(crate) fn error_handler() -> Option<ErrorHandler> {
    CONFIG.with(|config| config.borrow().error_handler.clone())
}

pub(crate) fn warn_handler() -> Option<WarnHandler> {
    CONFIG.with(|config| config.borrow().warn_handler.clone())
}
