//! Assignment lifecycle: the engine every state transition flows through.
//!
//! Owns the persistence handle and the external collaborators. Human
//! actions (start, complete, forward, delegate) run synchronously in the
//! caller; the escalation path is shared between the recurring scheduler
//! and the on-demand evaluation trigger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditSink, record_best_effort};
use crate::config::FeatureFlags;
use crate::db::Db;
use crate::directory::{Directory, UserRecord};
use crate::error::{Error, Result};
use crate::model::assignment::{Assignment, AssignmentId, CompletionAction, Status};
use crate::model::delay::{Delay, SLA_BREACH};
use crate::model::escalation::{Delegation, EscalationHistory};
use crate::model::process::{Request, RequestStatus, Role, StepDefinition};
use crate::notify::Notifier;
use crate::telemetry::metrics;

use super::delay::{current_overdue_seconds, delay_days, span_seconds};
use super::escalate::{evaluate_rules, overdue_reason, threshold_reason};
use super::sla;

/// The engine. All invariants on assignments are enforced here.
pub struct Engine {
    db: Arc<Db>,
    directory: Arc<dyn Directory>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
    flags: FeatureFlags,
}

/// What an executed escalation produced.
#[derive(Debug)]
pub struct EscalationOutcome {
    pub history: EscalationHistory,
    /// None is a dead end: the assignment was closed `ESCALATED` but no
    /// destination could be resolved, and no successor exists.
    pub successor: Option<Assignment>,
}

/// Result of one evaluation of one assignment — one iteration of the
/// scheduler body.
#[derive(Debug)]
pub enum EvaluationOutcome {
    Escalated {
        history_id: Uuid,
        /// None marks a dead-end escalation.
        successor: Option<AssignmentId>,
    },
    /// Eligible but held back by a cooldown or the pass throttle.
    Suppressed { reason: String },
    /// Not eligible: nothing was written, retry next pass if relevant.
    Skipped { reason: String },
}

impl Engine {
    pub fn new(
        db: Arc<Db>,
        directory: Arc<dyn Directory>,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn Notifier>,
        flags: FeatureFlags,
    ) -> Self {
        Self {
            db,
            directory,
            audit,
            notifier,
            flags,
        }
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    // -----------------------------------------------------------------------
    // Request intake
    // -----------------------------------------------------------------------

    /// Create a request and its first assignment at the process's first
    /// step.
    pub async fn submit_request(
        &self,
        process_id: Uuid,
        title: String,
        submitted_by: Uuid,
    ) -> Result<(Request, Assignment)> {
        let now = Utc::now();

        let first = self.db.first_step(process_id).await?.ok_or_else(|| {
            Error::ConfigurationMissing(format!("process {process_id} has no steps"))
        })?;

        let request = Request {
            id: Uuid::new_v4(),
            process_id,
            title,
            submitted_by,
            status: RequestStatus::InProgress,
            created_at: now,
        };
        self.db.insert_request(&request).await?;

        let assignment = self
            .create_assignment_at(request.id, &first, Some(submitted_by), now)
            .await?;

        info!(request_id = %request.id, assignment_id = %assignment.id, "request submitted");
        Ok((request, assignment))
    }

    // -----------------------------------------------------------------------
    // Human transitions
    // -----------------------------------------------------------------------

    /// Pending → InProgress. Starts the SLA clock.
    pub async fn start(&self, id: AssignmentId) -> Result<Assignment> {
        let assignment = self.db.get_assignment(id).await?;
        if assignment.status != Status::Pending {
            return Err(Error::InvalidTransition {
                from: assignment.status.to_string(),
                to: Status::InProgress.to_string(),
            });
        }

        let now = Utc::now();
        let updated = self.db.begin_assignment(id, assignment.version, now).await?;

        record_best_effort(
            self.audit.as_ref(),
            AuditRecord::new(
                "assignment.started",
                "assignment",
                id.0,
                json!({ "request_id": updated.request_id }),
                Some(updated.assigned_to),
                now,
            ),
        )
        .await;

        Ok(updated)
    }

    /// InProgress → a chosen terminal outcome. Persists a breach delay
    /// when the actual duration exceeds the frozen allowance, then
    /// applies the outcome to the request.
    pub async fn complete(
        &self,
        id: AssignmentId,
        action: CompletionAction,
        notes: Option<String>,
    ) -> Result<Assignment> {
        let assignment = self.db.get_assignment(id).await?;
        let target = action.target_status();
        if assignment.status != Status::InProgress {
            return Err(Error::InvalidTransition {
                from: assignment.status.to_string(),
                to: target.to_string(),
            });
        }
        let started = assignment.started_at.ok_or_else(|| {
            Error::Other(format!("in-progress assignment {id} has no started_at"))
        })?;

        let now = Utc::now();
        let actual = span_seconds(started, now);

        let updated = self
            .db
            .complete_assignment(id, assignment.version, target, now, actual, notes)
            .await?;

        let overdue = (actual - assignment.allowed_seconds).max(0);
        if overdue > 0 {
            self.record_breach(&updated, overdue, now).await?;
        }

        match action {
            CompletionAction::Approve => self.advance_request(&updated, now).await?,
            CompletionAction::Reject => {
                self.db
                    .set_request_status(updated.request_id, RequestStatus::Rejected)
                    .await?;
            }
            // Lateral hand-off; the request stays in progress and the
            // explicit forward_to operation creates the successor.
            CompletionAction::Forward => {}
        }

        record_best_effort(
            self.audit.as_ref(),
            AuditRecord::new(
                "assignment.completed",
                "assignment",
                id.0,
                json!({
                    "action": format!("{action:?}"),
                    "actual_seconds": actual,
                    "overdue_seconds": overdue,
                }),
                Some(updated.assigned_to),
                now,
            ),
        )
        .await;

        Ok(updated)
    }

    /// Complete the current assignment as Forwarded and open a new one
    /// at the same step for the target role's first active user.
    pub async fn forward_to(
        &self,
        id: AssignmentId,
        target_role: Role,
        notes: Option<String>,
    ) -> Result<(Assignment, Assignment)> {
        let forwarded = self.complete(id, CompletionAction::Forward, notes).await?;

        let step = self.db.get_step(forwarded.step_id).await?;
        let user = self.first_active_user(target_role).await?;
        let now = Utc::now();

        let successor = self
            .spawn_assignment(
                forwarded.request_id,
                &step,
                user.id,
                Some(target_role),
                Some(forwarded.assigned_to),
                now,
            )
            .await?;

        record_best_effort(
            self.audit.as_ref(),
            AuditRecord::new(
                "assignment.forwarded",
                "assignment",
                id.0,
                json!({ "to_role": target_role.to_string(), "successor": successor.id.0 }),
                Some(forwarded.assigned_to),
                now,
            ),
        )
        .await;

        Ok((forwarded, successor))
    }

    /// Reassign an open assignment to another user, keeping its state and
    /// SLA clock. The delegation row makes the original assignee eligible
    /// for a shadow delay if the assignment later breaches.
    pub async fn delegate(&self, id: AssignmentId, to_user: Uuid) -> Result<Assignment> {
        let assignment = self.db.get_assignment(id).await?;
        if assignment.status.is_terminal() {
            return Err(Error::InvalidTransition {
                from: assignment.status.to_string(),
                to: assignment.status.to_string(),
            });
        }

        let now = Utc::now();
        let updated = self
            .db
            .reassign_assignment(id, assignment.version, to_user)
            .await?;

        self.db
            .insert_delegation(&Delegation {
                id: Uuid::new_v4(),
                assignment_id: id,
                from_user: assignment.assigned_to,
                to_user,
                delegated_at: now,
            })
            .await?;

        record_best_effort(
            self.audit.as_ref(),
            AuditRecord::new(
                "assignment.delegated",
                "assignment",
                id.0,
                json!({ "from": assignment.assigned_to, "to": to_user }),
                Some(assignment.assigned_to),
                now,
            ),
        )
        .await;

        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Escalation
    // -----------------------------------------------------------------------

    /// One iteration of the scheduler body for one assignment: the
    /// overdue gate, the pass-level throttle, rule evaluation, successor
    /// lookup, and — when everything clears — the escalation transition.
    pub async fn evaluate_assignment(
        &self,
        assignment: &Assignment,
        pass_interval_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<EvaluationOutcome> {
        if !self.flags.escalation || !self.flags.auto_escalation_engine {
            return Ok(EvaluationOutcome::Skipped {
                reason: "escalation disabled".to_string(),
            });
        }
        if assignment.status != Status::InProgress {
            return Ok(EvaluationOutcome::Skipped {
                reason: format!("status is {}", assignment.status),
            });
        }
        if assignment.started_at.is_none() {
            return Ok(EvaluationOutcome::Skipped {
                reason: "not started".to_string(),
            });
        }

        let overdue = current_overdue_seconds(assignment.started_at, now, assignment.allowed_seconds);
        if overdue == 0 {
            return Ok(EvaluationOutcome::Skipped {
                reason: "within allowance".to_string(),
            });
        }

        // Coarse per-assignment throttle: at most one escalation per
        // scheduler interval, independent of rule cooldowns.
        let latest = self.db.latest_escalation_for(assignment.id).await?;
        if let Some(h) = &latest
            && (now - h.escalated_at).num_seconds() < pass_interval_seconds
        {
            metrics::evaluations_suppressed().add(1, &[KeyValue::new("guard", "interval")]);
            return Ok(EvaluationOutcome::Suppressed {
                reason: "escalated within the current interval".to_string(),
            });
        }

        // Rule-configured steps escalate through their rules; steps with
        // no rules fall back to the plain overdue trigger.
        let rules = self.db.active_rules_for_step(assignment.step_id).await?;
        let (explicit_destination, reason) = if rules.is_empty() {
            (None, overdue_reason(overdue))
        } else {
            match evaluate_rules(assignment, &rules, latest.as_ref(), now) {
                Some(trigger) => (
                    trigger.rule.escalation_user_id,
                    threshold_reason(trigger.percentage_used),
                ),
                None => {
                    metrics::evaluations_suppressed().add(1, &[KeyValue::new("guard", "rule")]);
                    return Ok(EvaluationOutcome::Suppressed {
                        reason: "no rule cleared threshold and cooldown".to_string(),
                    });
                }
            }
        };

        let step = self.db.get_step(assignment.step_id).await?;
        let next = self
            .db
            .next_step_after(step.process_id, step.sequence_order)
            .await?;

        // End of the chain: leave the assignment untouched.
        let Some(next) = next else {
            return Ok(EvaluationOutcome::Skipped {
                reason: "no next step".to_string(),
            });
        };

        // Destination pre-check. An unresolvable destination here is a
        // recoverable no-op, retried on the next pass.
        if explicit_destination.is_none() {
            let Some(role) = next.responsible_role else {
                warn!(
                    assignment_id = %assignment.id,
                    step = next.sequence_order,
                    "next step has no responsible role; escalation skipped"
                );
                return Ok(EvaluationOutcome::Skipped {
                    reason: "next step has no responsible role".to_string(),
                });
            };
            match self.first_active_user(role).await {
                Ok(_) => {}
                Err(Error::DestinationUnresolvable { .. }) => {
                    return Ok(EvaluationOutcome::Skipped {
                        reason: format!("no active user for role {role}"),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let outcome = self
            .escalate(assignment, Some(&next), explicit_destination, overdue, reason, now)
            .await?;

        Ok(EvaluationOutcome::Escalated {
            history_id: outcome.history.id,
            successor: outcome.successor.map(|s| s.id),
        })
    }

    /// Fetch-then-evaluate convenience for the on-demand trigger.
    pub async fn evaluate_by_id(
        &self,
        id: AssignmentId,
        pass_interval_seconds: i64,
    ) -> Result<EvaluationOutcome> {
        let assignment = self.db.get_assignment(id).await?;
        self.evaluate_assignment(&assignment, pass_interval_seconds, Utc::now())
            .await
    }

    /// Close an overdue in-progress assignment as `ESCALATED` and open
    /// its successor.
    ///
    /// `explicit_destination` (from a rule) wins over resolving the next
    /// step's role. When no destination can be resolved — no next step,
    /// no responsible role, or no active user — the assignment is still
    /// closed `ESCALATED` but without a successor: a terminal dead end,
    /// recorded in history and surfaced to operators.
    pub async fn escalate(
        &self,
        assignment: &Assignment,
        next_step: Option<&StepDefinition>,
        explicit_destination: Option<Uuid>,
        overdue_seconds: i64,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<EscalationOutcome> {
        if assignment.status != Status::InProgress {
            return Err(Error::InvalidTransition {
                from: assignment.status.to_string(),
                to: Status::Escalated.to_string(),
            });
        }
        let started = assignment.started_at.ok_or_else(|| {
            Error::Other(format!(
                "in-progress assignment {} has no started_at",
                assignment.id
            ))
        })?;

        let destination = self
            .resolve_destination(next_step, explicit_destination)
            .await?;

        let annotation = format!("escalated: overdue by {overdue_seconds}s");
        let annotated = match &assignment.notes {
            Some(existing) => format!("{existing}\n{annotation}"),
            None => annotation,
        };

        let closed = self
            .db
            .complete_assignment(
                assignment.id,
                assignment.version,
                Status::Escalated,
                now,
                span_seconds(started, now),
                Some(annotated),
            )
            .await?;

        // Escalation completes the assignment over its allowance, so the
        // breach is attributed here, same as a late human completion.
        if overdue_seconds > 0 {
            self.record_breach(&closed, overdue_seconds, now).await?;
        }

        let (to_user, to_role) = match &destination {
            Some((user, role)) => (Some(user.id), *role),
            None => (None, next_step.and_then(|s| s.responsible_role)),
        };

        let history = EscalationHistory {
            id: Uuid::new_v4(),
            assignment_id: assignment.id,
            escalated_from: assignment.assigned_to,
            escalated_to_user: to_user,
            escalated_to_role: to_role,
            reason: reason.clone(),
            escalated_at: now,
            resolved_at: None,
        };
        self.db.insert_escalation(&history).await?;

        let successor = match (&destination, next_step) {
            (Some((user, role)), Some(next)) => Some(
                self.spawn_assignment(closed.request_id, next, user.id, *role, None, now)
                    .await?,
            ),
            _ => None,
        };

        match &successor {
            Some(s) => {
                info!(
                    assignment_id = %assignment.id,
                    successor_id = %s.id,
                    overdue_seconds,
                    "assignment escalated"
                );
                metrics::escalations().add(1, &[KeyValue::new("outcome", "escalated")]);
            }
            None => {
                warn!(
                    assignment_id = %assignment.id,
                    overdue_seconds,
                    "escalation dead end: no destination resolvable, no successor created"
                );
                metrics::escalations().add(1, &[KeyValue::new("outcome", "dead_end")]);
            }
        }

        record_best_effort(
            self.audit.as_ref(),
            AuditRecord::new(
                if successor.is_some() {
                    "assignment.escalated"
                } else {
                    "escalation.dead_end"
                },
                "assignment",
                assignment.id.0,
                json!({
                    "reason": reason,
                    "overdue_seconds": overdue_seconds,
                    "to_user": to_user,
                    "successor": successor.as_ref().map(|s| s.id.0),
                }),
                None,
                now,
            ),
        )
        .await;

        // Best-effort notification; never blocks or rolls back the
        // escalation.
        let notifier = Arc::clone(&self.notifier);
        let request_id = closed.request_id;
        let assignment_id = assignment.id;
        let message = format!("assignment {assignment_id} escalated: {reason}");
        tokio::spawn(async move {
            if let Err(e) = notifier
                .notify_admins(request_id, assignment_id, &message)
                .await
            {
                warn!(assignment_id = %assignment_id, "admin notification failed: {e}");
            }
        });

        Ok(EscalationOutcome { history, successor })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Resolve where an escalation should land. None means dead end.
    async fn resolve_destination(
        &self,
        next_step: Option<&StepDefinition>,
        explicit_destination: Option<Uuid>,
    ) -> Result<Option<(UserRecord, Option<Role>)>> {
        let Some(next) = next_step else {
            return Ok(None);
        };

        if let Some(user_id) = explicit_destination {
            // A rule pinned the destination; trust it without a lookup.
            return Ok(Some((
                UserRecord {
                    id: user_id,
                    display_name: String::new(),
                    role: next.responsible_role.unwrap_or(Role::Administrator),
                    active: true,
                },
                next.responsible_role,
            )));
        }

        let Some(role) = next.responsible_role else {
            return Ok(None);
        };
        match self.first_active_user(role).await {
            Ok(user) => Ok(Some((user, Some(role)))),
            Err(Error::DestinationUnresolvable { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolve the allowance and insert a fresh `PENDING` assignment at
    /// `step`. The allowance snapshot happens here, once per assignment.
    async fn spawn_assignment(
        &self,
        request_id: Uuid,
        step: &StepDefinition,
        assigned_to: Uuid,
        assignee_role: Option<Role>,
        assigned_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Assignment> {
        let records = self.db.sla_records_for_step(step.id).await?;
        let windows = self.db.overlapping_windows_for_step(step.id, now).await?;
        let allowed =
            sla::resolve_allowed_seconds(step, assignee_role, &records, &windows, &self.flags, now);

        let assignment = Assignment {
            id: AssignmentId::new(),
            request_id,
            step_id: step.id,
            assigned_to,
            assigned_by,
            status: Status::Pending,
            assigned_at: now,
            started_at: None,
            completed_at: None,
            allowed_seconds: allowed,
            actual_seconds: None,
            notes: None,
            version: 0,
        };
        self.db.insert_assignment(&assignment).await?;

        record_best_effort(
            self.audit.as_ref(),
            AuditRecord::new(
                "assignment.created",
                "assignment",
                assignment.id.0,
                json!({
                    "request_id": request_id,
                    "step": step.sequence_order,
                    "allowed_seconds": allowed,
                }),
                assigned_by,
                now,
            ),
        )
        .await;

        Ok(assignment)
    }

    /// Create the assignment for `step`, resolving the assignee from the
    /// step's responsible role.
    async fn create_assignment_at(
        &self,
        request_id: Uuid,
        step: &StepDefinition,
        assigned_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Assignment> {
        let role = step.responsible_role.ok_or_else(|| {
            Error::ConfigurationMissing(format!(
                "step {} of process {} has no responsible role",
                step.sequence_order, step.process_id
            ))
        })?;
        let user = self.first_active_user(role).await?;

        self.spawn_assignment(request_id, step, user.id, Some(role), assigned_by, now)
            .await
    }

    /// Advance a request after an approval: next step's assignment, or
    /// mark the request completed on the last step.
    async fn advance_request(&self, approved: &Assignment, now: DateTime<Utc>) -> Result<()> {
        let step = self.db.get_step(approved.step_id).await?;
        match self
            .db
            .next_step_after(step.process_id, step.sequence_order)
            .await?
        {
            Some(next) => {
                self.create_assignment_at(
                    approved.request_id,
                    &next,
                    Some(approved.assigned_to),
                    now,
                )
                .await?;
            }
            None => {
                self.db
                    .set_request_status(approved.request_id, RequestStatus::Completed)
                    .await?;
                record_best_effort(
                    self.audit.as_ref(),
                    AuditRecord::new(
                        "request.completed",
                        "request",
                        approved.request_id,
                        json!({}),
                        Some(approved.assigned_to),
                        now,
                    ),
                )
                .await;
            }
        }
        Ok(())
    }

    /// Persist the breach delay for a completed assignment, plus a shadow
    /// row against the original assignee when the work was delegated.
    async fn record_breach(
        &self,
        assignment: &Assignment,
        overdue_seconds: i64,
        detected_at: DateTime<Utc>,
    ) -> Result<()> {
        let step = self.db.get_step(assignment.step_id).await?;

        let delay = Delay {
            id: Uuid::new_v4(),
            assignment_id: assignment.id,
            user_id: assignment.assigned_to,
            role: step.responsible_role,
            delay_seconds: overdue_seconds,
            delay_days: delay_days(overdue_seconds),
            reason: None,
            reason_category: SLA_BREACH.to_string(),
            detected_at,
            justified: false,
            justification: None,
            justified_by: None,
            justified_at: None,
            is_shadow: false,
        };
        self.db.insert_delay(&delay).await?;

        record_best_effort(
            self.audit.as_ref(),
            AuditRecord::new(
                "delay.recorded",
                "delay",
                delay.id,
                json!({
                    "assignment_id": assignment.id.0,
                    "delay_seconds": overdue_seconds,
                    "delay_days": delay.delay_days,
                }),
                None,
                detected_at,
            ),
        )
        .await;

        if let Some(delegation) = self.db.original_delegation_for(assignment.id).await?
            && delegation.from_user != assignment.assigned_to
        {
            let shadow = Delay {
                id: Uuid::new_v4(),
                user_id: delegation.from_user,
                is_shadow: true,
                ..delay
            };
            self.db.insert_delay(&shadow).await?;
        }

        Ok(())
    }

    async fn first_active_user(&self, role: Role) -> Result<UserRecord> {
        self.directory
            .users_for_role(role)
            .await?
            .into_iter()
            .find(|u| u.active)
            .ok_or(Error::DestinationUnresolvable {
                role: role.to_string(),
            })
    }
}
