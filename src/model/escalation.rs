//! Escalation rules, history, and delegation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::assignment::AssignmentId;
use super::process::Role;

/// Per-step escalation trigger configuration. Rules are independent
/// triggers; a single evaluation escalates at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRule {
    pub id: Uuid,
    pub step_id: Uuid,

    /// Percent of the allowed duration elapsed that makes this rule
    /// eligible. May exceed 100.
    pub threshold_percentage: i32,

    /// Explicit destination user. When set it wins over role resolution.
    pub escalation_user_id: Option<Uuid>,

    /// Destination role, resolved to its first active user.
    pub escalation_role: Option<Role>,

    /// Minimum seconds between two escalations of the same assignment.
    pub cooldown_seconds: i64,

    pub active: bool,
}

/// Append-only record of an actual escalation event.
///
/// The most recent row per assignment is the sole idempotence guard:
/// a new escalation requires `now - escalated_at >= cooldown_seconds`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationHistory {
    pub id: Uuid,
    pub assignment_id: AssignmentId,
    pub escalated_from: Uuid,

    /// None records a dead-end escalation: the assignment was closed
    /// `ESCALATED` but no destination user could be resolved.
    pub escalated_to_user: Option<Uuid>,
    pub escalated_to_role: Option<Role>,

    pub reason: String,
    pub escalated_at: DateTime<Utc>,

    /// Set by the external resolution workflow, not by the engine.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Reassignment of an open assignment to another user. Consulted when a
/// breach is recorded so a shadow delay can be written against the
/// original responsible party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delegation {
    pub id: Uuid,
    pub assignment_id: AssignmentId,
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub delegated_at: DateTime<Utc>,
}
