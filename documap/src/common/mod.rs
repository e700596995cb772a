//! Common types shared across the mapper: the value model, the raw
//! attribute [`Document`], document ids, constants, and small concurrency
//! helpers.

mod constants;
mod document;
mod document_id;
mod type_utils;
mod value;

pub use constants::*;
pub use document::Document;
pub use document_id::DocumentId;
pub use type_utils::{atomic, Atomic, ReadExecutor, WriteExecutor};
pub use value::Value;

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time in milliseconds since the Unix epoch, or zero if
/// the system clock is before the epoch.
pub fn current_time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_else(|err| {
            log::warn!("System clock is before the Unix epoch: {}. Using 0.", err);
            0
        })
}
