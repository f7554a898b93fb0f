//! Assignments and their lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// One step's unit of work. Created when the previous step's assignment
/// reaches a forward-moving terminal state (or at request submission for
/// the first step). Never deleted — superseded assignments stay in place
/// as the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Unique identifier.
    pub id: AssignmentId,

    /// The request this assignment belongs to.
    pub request_id: Uuid,

    /// The process step this assignment works.
    pub step_id: Uuid,

    /// The principal responsible for completing this assignment.
    pub assigned_to: Uuid,

    /// Who routed the work here. None for scheduler-created assignments.
    pub assigned_by: Option<Uuid>,

    /// Current lifecycle state.
    pub status: Status,

    pub assigned_at: DateTime<Utc>,

    /// Set on transition to `InProgress`, null until then.
    pub started_at: Option<DateTime<Utc>>,

    /// Set on any terminal transition.
    pub completed_at: Option<DateTime<Utc>>,

    /// SLA allowance in seconds, resolved once at creation and frozen.
    /// Later SLA config changes never touch an existing assignment.
    pub allowed_seconds: i64,

    /// `completed_at - started_at` in seconds; null until completed.
    pub actual_seconds: Option<i64>,

    /// Free text set by the completing actor.
    pub notes: Option<String>,

    /// Optimistic-concurrency counter. Every write to this row must
    /// compare-and-swap on it; a lost race is a state-mismatch error.
    pub version: i64,
}

/// Newtype for assignment IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentId(pub Uuid);

impl AssignmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for AssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Created, waiting for the assignee to pick it up.
    Pending,
    /// Assignee working; the SLA clock runs from `started_at`.
    InProgress,
    /// Completed with approval; the request advances. Terminal.
    Approved,
    /// Completed with rejection; the request stops. Terminal.
    Rejected,
    /// Handed off laterally to another role. Terminal for this assignment.
    Forwarded,
    /// Closed by the escalation engine. Terminal.
    Escalated,
}

impl Status {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (InProgress, Approved)
                | (InProgress, Rejected)
                | (InProgress, Forwarded)
                | (InProgress, Escalated)
        )
    }

    /// Is this a terminal state? No transitions leave a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Approved | Status::Rejected | Status::Forwarded | Status::Escalated
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
            Status::Forwarded => "forwarded",
            Status::Escalated => "escalated",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "in_progress" => Ok(Status::InProgress),
            "approved" => Ok(Status::Approved),
            "rejected" => Ok(Status::Rejected),
            "forwarded" => Ok(Status::Forwarded),
            "escalated" => Ok(Status::Escalated),
            _ => Err(Error::Other(format!("unknown assignment status: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Completion action
// ---------------------------------------------------------------------------

/// The explicit outcome a completing actor chooses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionAction {
    /// Advance the request to the next step (or complete it on the last).
    Approve,
    /// Stop the request; no further assignments.
    Reject,
    /// Lateral hand-off; the request stays in progress.
    Forward,
}

impl CompletionAction {
    pub fn target_status(self) -> Status {
        match self {
            CompletionAction::Approve => Status::Approved,
            CompletionAction::Reject => Status::Rejected,
            CompletionAction::Forward => Status::Forwarded,
        }
    }
}

impl std::str::FromStr for CompletionAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(CompletionAction::Approve),
            "reject" => Ok(CompletionAction::Reject),
            "forward" => Ok(CompletionAction::Forward),
            _ => Err(Error::Other(format!("unknown completion action: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_only_starts() {
        assert!(Status::Pending.can_transition_to(Status::InProgress));
        assert!(!Status::Pending.can_transition_to(Status::Approved));
        assert!(!Status::Pending.can_transition_to(Status::Escalated));
    }

    #[test]
    fn in_progress_reaches_all_terminals() {
        for to in [
            Status::Approved,
            Status::Rejected,
            Status::Forwarded,
            Status::Escalated,
        ] {
            assert!(Status::InProgress.can_transition_to(to), "{to}");
        }
    }

    #[test]
    fn no_transition_leaves_a_terminal_state() {
        for from in [
            Status::Approved,
            Status::Rejected,
            Status::Forwarded,
            Status::Escalated,
        ] {
            assert!(from.is_terminal());
            for to in [Status::Pending, Status::InProgress, Status::Approved] {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            Status::Pending,
            Status::InProgress,
            Status::Approved,
            Status::Rejected,
            Status::Forwarded,
            Status::Escalated,
        ] {
            let parsed: Status = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }
}
