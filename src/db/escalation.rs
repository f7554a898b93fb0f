//! Escalation rules, history, and delegation persistence.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::assignment::AssignmentId;
use crate::model::escalation::{Delegation, EscalationHistory, EscalationRule};

impl super::Db {
    /// Active rules for a step, most lenient threshold first so the
    /// first match reports the percentage that actually tripped.
    pub async fn active_rules_for_step(&self, step_id: Uuid) -> Result<Vec<EscalationRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(
            "SELECT id, step_id, threshold_percentage, escalation_user_id, escalation_role,
                    cooldown_seconds, active
             FROM escalation_rules WHERE step_id = $1 AND active
             ORDER BY threshold_percentage ASC, id ASC",
        )
        .bind(step_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into_rule()).collect()
    }

    /// The most recent escalation of an assignment, if any. This row is
    /// the cooldown reference point.
    pub async fn latest_escalation_for(
        &self,
        id: AssignmentId,
    ) -> Result<Option<EscalationHistory>> {
        let row: Option<HistoryRow> = sqlx::query_as(
            "SELECT id, assignment_id, escalated_from, escalated_to_user, escalated_to_role,
                    reason, escalated_at, resolved_at
             FROM escalation_history WHERE assignment_id = $1
             ORDER BY escalated_at DESC LIMIT 1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into_history()).transpose()
    }

    pub async fn escalation_history_for(
        &self,
        id: AssignmentId,
    ) -> Result<Vec<EscalationHistory>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT id, assignment_id, escalated_from, escalated_to_user, escalated_to_role,
                    reason, escalated_at, resolved_at
             FROM escalation_history WHERE assignment_id = $1
             ORDER BY escalated_at ASC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into_history()).collect()
    }

    pub async fn insert_escalation(&self, h: &EscalationHistory) -> Result<()> {
        sqlx::query(
            "INSERT INTO escalation_history (id, assignment_id, escalated_from,
                escalated_to_user, escalated_to_role, reason, escalated_at, resolved_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(h.id)
        .bind(h.assignment_id.0)
        .bind(h.escalated_from)
        .bind(h.escalated_to_user)
        .bind(h.escalated_to_role.map(|r| r.to_string()))
        .bind(&h.reason)
        .bind(h.escalated_at)
        .bind(h.resolved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark an escalation resolved. Driven by the external resolution
    /// workflow, kept here so consumers share one write path.
    pub async fn resolve_escalation(&self, escalation_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let rows_affected = sqlx::query(
            "UPDATE escalation_history SET resolved_at = $1
             WHERE id = $2 AND resolved_at IS NULL",
        )
        .bind(now)
        .bind(escalation_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(Error::NotFound(format!(
                "unresolved escalation {escalation_id}"
            )));
        }
        Ok(())
    }

    pub async fn insert_delegation(&self, d: &Delegation) -> Result<()> {
        sqlx::query(
            "INSERT INTO delegations (id, assignment_id, from_user, to_user, delegated_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(d.id)
        .bind(d.assignment_id.0)
        .bind(d.from_user)
        .bind(d.to_user)
        .bind(d.delegated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The earliest delegation of an assignment: its `from_user` is the
    /// original responsible party for shadow-delay attribution.
    pub async fn original_delegation_for(
        &self,
        id: AssignmentId,
    ) -> Result<Option<Delegation>> {
        let row: Option<DelegationRow> = sqlx::query_as(
            "SELECT id, assignment_id, from_user, to_user, delegated_at
             FROM delegations WHERE assignment_id = $1
             ORDER BY delegated_at ASC LIMIT 1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_delegation()))
    }
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    step_id: Uuid,
    threshold_percentage: i32,
    escalation_user_id: Option<Uuid>,
    escalation_role: Option<String>,
    cooldown_seconds: i64,
    active: bool,
}

impl RuleRow {
    fn try_into_rule(self) -> Result<EscalationRule> {
        Ok(EscalationRule {
            id: self.id,
            step_id: self.step_id,
            threshold_percentage: self.threshold_percentage,
            escalation_user_id: self.escalation_user_id,
            escalation_role: self.escalation_role.as_deref().map(str::parse).transpose()?,
            cooldown_seconds: self.cooldown_seconds,
            active: self.active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    assignment_id: Uuid,
    escalated_from: Uuid,
    escalated_to_user: Option<Uuid>,
    escalated_to_role: Option<String>,
    reason: String,
    escalated_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl HistoryRow {
    fn try_into_history(self) -> Result<EscalationHistory> {
        Ok(EscalationHistory {
            id: self.id,
            assignment_id: AssignmentId(self.assignment_id),
            escalated_from: self.escalated_from,
            escalated_to_user: self.escalated_to_user,
            escalated_to_role: self.escalated_to_role.as_deref().map(str::parse).transpose()?,
            reason: self.reason,
            escalated_at: self.escalated_at,
            resolved_at: self.resolved_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DelegationRow {
    id: Uuid,
    assignment_id: Uuid,
    from_user: Uuid,
    to_user: Uuid,
    delegated_at: DateTime<Utc>,
}

impl DelegationRow {
    fn into_delegation(self) -> Delegation {
        Delegation {
            id: self.id,
            assignment_id: AssignmentId(self.assignment_id),
            from_user: self.from_user,
            to_user: self.to_user,
            delegated_at: self.delegated_at,
        }
    }
}
