//! Dot-delimited watch paths.
//!
//! `"user.profile.name"` becomes a getter that reads `user` from the owner
//! and then descends one tracked property read per segment. Only ASCII
//! word characters, `$` and `.` are accepted.

use std::rc::Rc;

use super::watcher::Getter;
use crate::error::ReactiveError;
use crate::observer::Value;
use crate::owner::Owner;

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.')
}

/// Compile `path` into a getter, or `None` if it contains anything other than
/// simple segments.
pub fn parse_path(path: &str) -> Option<Getter> {
    if !path.chars().all(is_path_char) {
        return None;
    }
    let segments: Vec<String> = path.split('.').map(str::to_owned).collect();

    Some(Rc::new(move |owner: &Owner| -> Result<Value, ReactiveError> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(Value::Undefined);
        };
        let mut value = owner.get(first)?;
        for segment in rest {
            if value.is_undefined() {
                break;
            }
            value = value.get(segment);
        }
        Ok(value)
    }))
}
