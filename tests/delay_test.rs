//! Overdue arithmetic: clamping, floor division, scheduler gating.

use caseflow_rs::engine::delay::{
    current_overdue_seconds, delay_days, overdue_on_completion, span_seconds,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 4, 8, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Completion-time breaches
// ---------------------------------------------------------------------------

#[test]
fn two_hours_over_an_eight_hour_allowance() {
    // Started at T, allowed 8h, completed at T+10h: 7200s over, 0 days.
    let overdue = overdue_on_completion(t0(), t0() + Duration::hours(10), 28_800);
    assert_eq!(overdue, 7200);
    assert_eq!(delay_days(overdue), 0);
}

#[test]
fn completion_within_allowance_is_zero() {
    let overdue = overdue_on_completion(t0(), t0() + Duration::hours(6), 28_800);
    assert_eq!(overdue, 0);
}

#[test]
fn completion_exactly_at_allowance_is_zero() {
    let overdue = overdue_on_completion(t0(), t0() + Duration::seconds(28_800), 28_800);
    assert_eq!(overdue, 0);
}

#[test]
fn inverted_timestamps_clamp_to_zero() {
    // Clock skew: completed before started must not go negative.
    let overdue = overdue_on_completion(t0(), t0() - Duration::hours(1), 3600);
    assert_eq!(overdue, 0);
    assert_eq!(span_seconds(t0(), t0() - Duration::hours(1)), 0);
}

#[test]
fn multi_day_breach_floors_days() {
    // 2 days + 1 hour over: 2 days, not rounded up.
    let overdue = overdue_on_completion(t0(), t0() + Duration::hours(49) + Duration::hours(24), 86_400);
    assert_eq!(overdue, 2 * 86_400 + 3600);
    assert_eq!(delay_days(overdue), 2);
}

// ---------------------------------------------------------------------------
// In-flight overdue (scheduler gate)
// ---------------------------------------------------------------------------

#[test]
fn in_flight_within_allowance_returns_zero() {
    // Started at T, allowed 24h, now T+20h: not yet overdue.
    let overdue = current_overdue_seconds(Some(t0()), t0() + Duration::hours(20), 86_400);
    assert_eq!(overdue, 0);
}

#[test]
fn in_flight_past_allowance_returns_excess() {
    let overdue = current_overdue_seconds(Some(t0()), t0() + Duration::hours(26), 86_400);
    assert_eq!(overdue, 2 * 3600);
}

#[test]
fn unstarted_assignment_is_never_overdue() {
    let overdue = current_overdue_seconds(None, t0() + Duration::days(30), 60);
    assert_eq!(overdue, 0);
}

#[test]
fn in_flight_never_negative_under_skew() {
    // now before started_at: clamp, don't underflow.
    let overdue = current_overdue_seconds(Some(t0()), t0() - Duration::hours(5), 3600);
    assert_eq!(overdue, 0);
}
