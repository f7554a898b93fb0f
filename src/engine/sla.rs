//! SLA resolution: how many seconds an assignment is allowed.
//!
//! Resolution happens exactly once, when an assignment is created; the
//! result is frozen onto the assignment and never re-resolved, so later
//! SLA config changes only affect future assignments.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::FeatureFlags;
use crate::model::process::{ExclusionWindow, Role, SlaRecord, StepDefinition};

/// Global fallback when neither the step nor any SLA record configures
/// an allowance: 24 hours.
pub const DEFAULT_ALLOWED_SECONDS: i64 = 86_400;

/// Resolve the allowed duration for a fresh assignment at `step`.
///
/// Priority: step default → SLA record matching the assignee's role →
/// first active SLA record for the step → [`DEFAULT_ALLOWED_SECONDS`].
/// When exclusion windows are enabled, every active window that applies
/// to the step and overlaps `now` contributes to a single slack grant:
/// the mean duration of the overlapping windows, added once. That is a
/// deliberate flat compensation, not business-hours calendar math.
///
/// Read-only; the caller freezes the result onto the assignment.
pub fn resolve_allowed_seconds(
    step: &StepDefinition,
    assignee_role: Option<Role>,
    sla_records: &[SlaRecord],
    windows: &[ExclusionWindow],
    flags: &FeatureFlags,
    now: DateTime<Utc>,
) -> i64 {
    let base = step
        .default_allowed_seconds
        .or_else(|| record_allowance(step.id, assignee_role, sla_records))
        .unwrap_or(DEFAULT_ALLOWED_SECONDS);

    let slack = if flags.sla_exclusions {
        exclusion_slack(step.id, windows, now)
    } else {
        0
    };

    (base + slack).max(1)
}

fn record_allowance(
    step_id: Uuid,
    assignee_role: Option<Role>,
    records: &[SlaRecord],
) -> Option<i64> {
    let candidates: Vec<&SlaRecord> = records
        .iter()
        .filter(|r| r.active && r.step_id == step_id)
        .collect();

    if let Some(role) = assignee_role
        && let Some(matched) = candidates.iter().find(|r| r.role == Some(role))
    {
        return Some(matched.allowed_seconds);
    }

    candidates.first().map(|r| r.allowed_seconds)
}

/// Mean duration of the active windows applying to `step_id` that
/// overlap `now`, or zero when none do.
fn exclusion_slack(step_id: Uuid, windows: &[ExclusionWindow], now: DateTime<Utc>) -> i64 {
    let durations: Vec<i64> = windows
        .iter()
        .filter(|w| w.active && w.applies_to(step_id) && w.overlaps(now))
        .map(ExclusionWindow::duration_seconds)
        .collect();

    if durations.is_empty() {
        return 0;
    }
    durations.iter().sum::<i64>() / durations.len() as i64
}
