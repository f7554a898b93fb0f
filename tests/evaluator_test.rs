//! Escalation rule evaluation: thresholds, cooldowns, single-fire.

use caseflow_rs::engine::escalate::{
    cooldown_blocks, evaluate_rules, overdue_reason, percentage_used, threshold_reason,
};
use caseflow_rs::model::assignment::{Assignment, AssignmentId, Status};
use caseflow_rs::model::escalation::{EscalationHistory, EscalationRule};
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 4, 8, 0, 0).unwrap()
}

fn in_progress(allowed_seconds: i64) -> Assignment {
    Assignment {
        id: AssignmentId::new(),
        request_id: Uuid::new_v4(),
        step_id: Uuid::new_v4(),
        assigned_to: Uuid::new_v4(),
        assigned_by: None,
        status: Status::InProgress,
        assigned_at: t0(),
        started_at: Some(t0()),
        completed_at: None,
        allowed_seconds,
        actual_seconds: None,
        notes: None,
        version: 1,
    }
}

fn rule(threshold_percentage: i32, cooldown_seconds: i64) -> EscalationRule {
    EscalationRule {
        id: Uuid::new_v4(),
        step_id: Uuid::new_v4(),
        threshold_percentage,
        escalation_user_id: None,
        escalation_role: None,
        cooldown_seconds,
        active: true,
    }
}

fn history_at(assignment_id: AssignmentId, escalated_at: DateTime<Utc>) -> EscalationHistory {
    EscalationHistory {
        id: Uuid::new_v4(),
        assignment_id,
        escalated_from: Uuid::new_v4(),
        escalated_to_user: Some(Uuid::new_v4()),
        escalated_to_role: None,
        reason: "SLA threshold exceeded: 120%".to_string(),
        escalated_at,
        resolved_at: None,
    }
}

// ---------------------------------------------------------------------------
// Percentage math
// ---------------------------------------------------------------------------

#[test]
fn percentage_is_integer_floor() {
    assert_eq!(percentage_used(3599, 3600), 99);
    assert_eq!(percentage_used(3600, 3600), 100);
    assert_eq!(percentage_used(7200, 3600), 200);
    assert_eq!(percentage_used(0, 3600), 0);
}

#[test]
fn percentage_guards_degenerate_inputs() {
    assert_eq!(percentage_used(-50, 3600), 0);
    assert_eq!(percentage_used(100, 0), 0);
}

// ---------------------------------------------------------------------------
// Threshold + cooldown
// ---------------------------------------------------------------------------

#[test]
fn rule_fires_past_threshold_with_no_history() {
    // Allowed 1h, now T+2h: 200% used against an 80% threshold.
    let assignment = in_progress(3600);
    let rules = [rule(80, 3600)];

    let trigger = evaluate_rules(&assignment, &rules, None, t0() + Duration::hours(2))
        .expect("rule should fire");
    assert_eq!(trigger.percentage_used, 200);
    assert_eq!(trigger.rule.threshold_percentage, 80);
}

#[test]
fn rule_holds_below_threshold() {
    // 50% used against an 80% threshold.
    let assignment = in_progress(7200);
    let rules = [rule(80, 3600)];

    assert!(evaluate_rules(&assignment, &rules, None, t0() + Duration::hours(1)).is_none());
}

#[test]
fn history_within_cooldown_suppresses() {
    // Escalated at T+1.5h; cooldown 1h; evaluating at T+2h.
    let assignment = in_progress(3600);
    let rules = [rule(80, 3600)];
    let last = history_at(assignment.id, t0() + Duration::minutes(90));

    assert!(
        evaluate_rules(&assignment, &rules, Some(&last), t0() + Duration::hours(2)).is_none()
    );
}

#[test]
fn history_past_cooldown_allows_refire() {
    let assignment = in_progress(3600);
    let rules = [rule(80, 3600)];
    let last = history_at(assignment.id, t0() + Duration::hours(1));

    let trigger =
        evaluate_rules(&assignment, &rules, Some(&last), t0() + Duration::hours(3))
            .expect("cooldown elapsed, rule should fire");
    assert_eq!(trigger.rule.threshold_percentage, 80);
}

#[test]
fn cooldown_boundary_is_inclusive() {
    // Exactly cooldown_seconds after the last escalation is allowed.
    let last = history_at(AssignmentId::new(), t0());
    assert!(cooldown_blocks(Some(&last), 3600, t0() + Duration::seconds(3599)));
    assert!(!cooldown_blocks(Some(&last), 3600, t0() + Duration::seconds(3600)));
}

// ---------------------------------------------------------------------------
// Single-fire and preconditions
// ---------------------------------------------------------------------------

#[test]
fn one_trigger_even_when_several_rules_match() {
    // Both thresholds are crossed; only the most lenient fires.
    let assignment = in_progress(3600);
    let rules = [rule(50, 600), rule(90, 600)];

    let trigger = evaluate_rules(&assignment, &rules, None, t0() + Duration::hours(2))
        .expect("should fire once");
    assert_eq!(trigger.rule.threshold_percentage, 50);
}

#[test]
fn inactive_rules_are_ignored() {
    let assignment = in_progress(3600);
    let mut inactive = rule(10, 0);
    inactive.active = false;

    assert!(evaluate_rules(&assignment, &[inactive], None, t0() + Duration::hours(2)).is_none());
}

#[test]
fn unstarted_or_terminal_assignments_never_trigger() {
    let rules = [rule(1, 0)];

    let mut unstarted = in_progress(60);
    unstarted.status = Status::Pending;
    unstarted.started_at = None;
    assert!(evaluate_rules(&unstarted, &rules, None, t0() + Duration::days(7)).is_none());

    let mut escalated = in_progress(60);
    escalated.status = Status::Escalated;
    assert!(evaluate_rules(&escalated, &rules, None, t0() + Duration::days(7)).is_none());
}

// ---------------------------------------------------------------------------
// Reason strings
// ---------------------------------------------------------------------------

#[test]
fn reason_strings_carry_the_measured_amounts() {
    assert_eq!(threshold_reason(200), "SLA threshold exceeded: 200%");
    assert_eq!(overdue_reason(7200), "SLA exceeded by 7200 seconds");
}
