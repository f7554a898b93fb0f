//! Overdue arithmetic.
//!
//! Pure functions over timestamps and the frozen allowance. All values
//! are non-negative integer seconds; inverted timestamp pairs (clock
//! skew) clamp to zero instead of going negative. Day conversion is
//! floor division.

use chrono::{DateTime, Utc};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Whole seconds between two instants, clamped at zero.
pub fn span_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().max(0)
}

/// Breach size for a completed assignment: `max(0, actual - allowed)`.
pub fn overdue_on_completion(
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    allowed_seconds: i64,
) -> i64 {
    (span_seconds(started_at, completed_at) - allowed_seconds).max(0)
}

/// How far past its allowance a still-open assignment is at `now`.
///
/// Returns 0 for an assignment that has not started — there is no clock
/// to measure against. No persistence; the scheduler uses this to gate
/// escalation eligibility without waiting for completion.
pub fn current_overdue_seconds(
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    allowed_seconds: i64,
) -> i64 {
    match started_at {
        None => 0,
        Some(started) => (span_seconds(started, now) - allowed_seconds).max(0),
    }
}

/// Redundant reporting figure stored next to every delay.
pub fn delay_days(delay_seconds: i64) -> i64 {
    delay_seconds / SECONDS_PER_DAY
}
