//! Metric instrument factories for caseflow-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"caseflow-rs"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for caseflow-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("caseflow-rs")
}

/// Counter: assignment state transitions.
/// Labels: `from`, `to`.
pub fn assignment_transitions() -> Counter<u64> {
    meter()
        .u64_counter("caseflow.assignment.transitions")
        .with_description("Number of assignment state transitions")
        .build()
}

/// Counter: delay rows persisted.
/// Labels: `kind` ("breach" | "shadow").
pub fn delays_recorded() -> Counter<u64> {
    meter()
        .u64_counter("caseflow.delays.recorded")
        .with_description("Number of SLA breach delays recorded")
        .build()
}

/// Counter: escalation transitions executed.
/// Labels: `outcome` ("escalated" | "dead_end").
pub fn escalations() -> Counter<u64> {
    meter()
        .u64_counter("caseflow.escalations")
        .with_description("Number of escalation transitions executed")
        .build()
}

/// Counter: evaluations held back by a guard.
/// Labels: `guard` ("interval" | "rule").
pub fn evaluations_suppressed() -> Counter<u64> {
    meter()
        .u64_counter("caseflow.evaluations.suppressed")
        .with_description("Evaluations suppressed by cooldown or throttle")
        .build()
}

/// Counter: completed scheduler passes.
pub fn scheduler_passes() -> Counter<u64> {
    meter()
        .u64_counter("caseflow.scheduler.passes")
        .with_description("Number of completed auto-escalation passes")
        .build()
}

/// Histogram: scheduler pass duration in milliseconds.
pub fn pass_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("caseflow.scheduler.pass_duration_ms")
        .with_description("Auto-escalation pass duration in milliseconds")
        .with_unit("ms")
        .build()
}
