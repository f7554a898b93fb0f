//! The SLA/delay/escalation engine: allowance resolution, overdue math,
//! rule evaluation, lifecycle transitions, and the recurring scheduler.

pub mod delay;
pub mod escalate;
pub mod lifecycle;
pub mod scheduler;
pub mod sla;

pub use lifecycle::{Engine, EscalationOutcome, EvaluationOutcome};
pub use scheduler::{PassSummary, Scheduler, SchedulerConfig};
