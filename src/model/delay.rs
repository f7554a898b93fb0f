//! Delay records: one row per detected SLA breach, with attribution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::assignment::AssignmentId;
use super::process::Role;

/// Reason category stamped on engine-detected breaches.
pub const SLA_BREACH: &str = "SLA_BREACH";

/// A persisted SLA breach. Only ever created with `delay_seconds > 0`.
/// An assignment may accumulate several rows (breach at completion plus
/// shadow rows from delegation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delay {
    pub id: Uuid,
    pub assignment_id: AssignmentId,

    /// The user held responsible, copied from the assignment at
    /// detection time.
    pub user_id: Uuid,
    pub role: Option<Role>,

    pub delay_seconds: i64,
    /// `delay_seconds / 86400`, stored redundantly for reporting.
    pub delay_days: i64,

    pub reason: Option<String>,
    pub reason_category: String,

    /// Wall-clock time of detection. The scheduler may detect overdue
    /// state before the assignment completes, so this is not necessarily
    /// `completed_at`.
    pub detected_at: DateTime<Utc>,

    /// Justification fields are set later by a human reviewer; the
    /// engine only ever writes `justified = false`.
    pub justified: bool,
    pub justification: Option<String>,
    pub justified_by: Option<Uuid>,
    pub justified_at: Option<DateTime<Utc>>,

    /// True for rows recorded against a delegated-away original
    /// responsible user, alongside (not replacing) the real delay.
    pub is_shadow: bool,
}

/// Aggregated delay-days per user, for accountability reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtScore {
    pub user_id: Uuid,
    pub total_delay_days: i64,
    pub breach_count: i64,
}
