//! Small shared helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in seconds, honoring `SOURCE_DATE_EPOCH`.
///
/// When the `SOURCE_DATE_EPOCH` environment variable is set, its value is
/// returned instead of the wall clock. Cache-freshness checks go through
/// this function rather than `SystemTime::now()` so tests can pin time.
pub fn get_now() -> u64 {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("system clock before Unix epoch")
                .as_secs()
        })
}
