//! Span helpers for the escalation scheduler.

use tracing::Span;

use crate::model::assignment::AssignmentId;

/// Span wrapping one full auto-escalation pass.
pub fn start_pass_span() -> Span {
    tracing::info_span!("escalation.pass")
}

/// Span wrapping the evaluation of one assignment within a pass.
pub fn start_evaluation_span(id: &AssignmentId) -> Span {
    tracing::info_span!(
        "assignment.evaluate",
        "assignment.id" = %id,
    )
}
