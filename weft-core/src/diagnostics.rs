//! Warning and error channels.

use tracing::{error, warn as log_warn};

use crate::config;
use crate::error::ReactiveError;
use crate::owner::Owner;

/// Emit a diagnostic warning.
///
/// Suppressed when `silent` is set. Routed to the configured warn handler if
/// one is installed, otherwise logged.
pub fn warn(message: &str, owner: Option<&Owner>) {
    if config::is_silent() {
        return;
    }
    let name = owner.map(Owner::name);
    match config::warn_handler() {
        Some(handler) => handler(message, name.as_deref()),
        None => log_warn!(owner = name.as_deref().unwrap_or("<root>"), "{message}"),
    }
}

/// Report an error that was caught at a computation boundary.
pub fn handle_error(err: &ReactiveError, owner: Option<&Owner>, info: &str) {
    let name = owner.map(Owner::name);
    match config::error_handler() {
        Some(handler) => handler(err, name.as_deref(), info),
        None => error!(
            owner = name.as_deref().unwrap_or("<root>"),
            info,
            "unhandled error: {err}"
        ),
    }
}
