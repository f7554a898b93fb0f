//! Escalation rule evaluation.
//!
//! Pure decision logic: given an in-progress assignment, its step's
//! rules, and the latest escalation history row, decide whether a rule
//! fires right now. A single evaluation escalates at most once — the
//! first matching rule wins, with rules ordered by ascending threshold.

use chrono::{DateTime, Utc};

use crate::model::assignment::{Assignment, Status};
use crate::model::escalation::{EscalationHistory, EscalationRule};

use super::delay::span_seconds;

/// A rule that cleared its threshold and cooldown.
#[derive(Debug)]
pub struct RuleTrigger<'a> {
    pub rule: &'a EscalationRule,
    /// Integer percent of the allowance consumed; exceeds 100 once overdue.
    pub percentage_used: i64,
}

/// Integer percentage of the allowance consumed after `elapsed_seconds`.
pub fn percentage_used(elapsed_seconds: i64, allowed_seconds: i64) -> i64 {
    if allowed_seconds <= 0 {
        return 0;
    }
    elapsed_seconds.max(0) * 100 / allowed_seconds
}

/// Does the per-assignment cooldown suppress a new escalation at `now`?
pub fn cooldown_blocks(
    latest: Option<&EscalationHistory>,
    cooldown_seconds: i64,
    now: DateTime<Utc>,
) -> bool {
    match latest {
        None => false,
        Some(h) => (now - h.escalated_at).num_seconds() < cooldown_seconds,
    }
}

/// Find the first rule eligible to fire for `assignment` at `now`.
///
/// Returns None for anything not in progress or not yet started, and for
/// evaluations where every rule is below threshold or inside its
/// cooldown. The cooldown reference is the latest history row for the
/// assignment — per assignment, not per rule.
pub fn evaluate_rules<'a>(
    assignment: &Assignment,
    rules: &'a [EscalationRule],
    latest_escalation: Option<&EscalationHistory>,
    now: DateTime<Utc>,
) -> Option<RuleTrigger<'a>> {
    if assignment.status != Status::InProgress {
        return None;
    }
    let started = assignment.started_at?;

    let elapsed = span_seconds(started, now);
    let pct = percentage_used(elapsed, assignment.allowed_seconds);

    rules
        .iter()
        .filter(|r| r.active)
        .filter(|r| pct >= i64::from(r.threshold_percentage))
        .find(|r| !cooldown_blocks(latest_escalation, r.cooldown_seconds, now))
        .map(|rule| RuleTrigger {
            rule,
            percentage_used: pct,
        })
}

/// Reason string for rule-threshold escalations.
pub fn threshold_reason(percentage_used: i64) -> String {
    format!("SLA threshold exceeded: {percentage_used}%")
}

/// Reason string for the scheduler's own overdue-seconds trigger.
pub fn overdue_reason(overdue_seconds: i64) -> String {
    format!("SLA exceeded by {overdue_seconds} seconds")
}
