//! Auto-escalation scheduler: the recurring pass over open assignments.
//!
//! A single timer drives the loop; each pass scans every in-progress
//! assignment and evaluates it independently. One assignment failing
//! never aborts the rest of the pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, error, info};

use crate::db::Db;
use crate::error::Result;
use crate::telemetry::metrics;
use crate::telemetry::spans::{start_evaluation_span, start_pass_span};

use super::lifecycle::{Engine, EvaluationOutcome};

/// Configuration for the scheduler loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between passes. Hourly in production.
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
        }
    }
}

/// Counters from one scheduler pass, for logs and metrics.
#[derive(Debug, Default)]
pub struct PassSummary {
    pub scanned: usize,
    pub escalated: usize,
    pub dead_ends: usize,
    pub suppressed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// The scheduler loop: tick, scan, evaluate, repeat until shutdown.
pub struct Scheduler {
    engine: Arc<Engine>,
    db: Arc<Db>,
    config: SchedulerConfig,
    shutdown: Arc<Notify>,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>, db: Arc<Db>, config: SchedulerConfig) -> Self {
        Self {
            engine,
            db,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Signal the scheduler to shut down after the current pass.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run passes at the configured cadence until shutdown.
    pub async fn run(&self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_seconds = self.config.interval.as_secs(),
            "auto-escalation scheduler started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("auto-escalation scheduler shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            let now = Utc::now();
            let span = start_pass_span();
            async {
                match self.run_pass(now).await {
                    Ok(summary) => info!(
                        scanned = summary.scanned,
                        escalated = summary.escalated,
                        dead_ends = summary.dead_ends,
                        suppressed = summary.suppressed,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "escalation pass complete"
                    ),
                    Err(e) => error!("escalation pass failed: {e}"),
                }
            }
            .instrument(span)
            .await;
        }
    }

    /// One pass: evaluate every in-progress assignment at `now`.
    ///
    /// Errors from a single assignment are logged and counted; only a
    /// failure of the scan query itself aborts the pass.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<PassSummary> {
        let flags = self.engine.flags();
        if !flags.escalation || !flags.auto_escalation_engine {
            tracing::debug!("escalation disabled; pass is a no-op");
            return Ok(PassSummary::default());
        }

        let started = std::time::Instant::now();
        let assignments = self.db.list_in_progress_assignments().await?;
        let interval_seconds = self.config.interval.as_secs() as i64;

        let mut summary = PassSummary::default();
        for assignment in assignments {
            summary.scanned += 1;

            let result = self
                .engine
                .evaluate_assignment(&assignment, interval_seconds, now)
                .instrument(start_evaluation_span(&assignment.id))
                .await;

            match result {
                Ok(EvaluationOutcome::Escalated { successor, .. }) => {
                    if successor.is_some() {
                        summary.escalated += 1;
                    } else {
                        summary.dead_ends += 1;
                    }
                }
                Ok(EvaluationOutcome::Suppressed { .. }) => summary.suppressed += 1,
                Ok(EvaluationOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    error!(assignment_id = %assignment.id, "evaluation failed: {e}");
                    summary.failed += 1;
                }
            }
        }

        metrics::scheduler_passes().add(1, &[]);
        metrics::pass_duration_ms().record(
            started.elapsed().as_millis() as f64,
            &[KeyValue::new("scanned", summary.scanned as i64)],
        );

        Ok(summary)
    }
}
