//! Wall-clock helpers expressed in milliseconds since the Unix epoch.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current time in milliseconds since the Unix epoch.
///
/// Returns 0 if the system clock is set before the epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Absolute timestamp `offset` from now, in milliseconds since the epoch.
#[must_use]
pub fn ms_from_now(offset: Duration) -> u128 {
    now_ms() + offset.as_millis()
}

/// Signed difference `later - earlier` in seconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn seconds_between(earlier: u128, later: u128) -> f64 {
    if later >= earlier {
        (later - earlier) as f64 / 1000.0
    } else {
        -((earlier - later) as f64 / 1000.0)
    }
}
