//! Delay persistence and accountability aggregates.

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::assignment::AssignmentId;
use crate::model::delay::{DebtScore, Delay};
use crate::telemetry::metrics;

impl super::Db {
    pub async fn insert_delay(&self, d: &Delay) -> Result<()> {
        sqlx::query(
            "INSERT INTO delays (id, assignment_id, user_id, role, delay_seconds, delay_days,
                reason, reason_category, detected_at, justified, justification,
                justified_by, justified_at, is_shadow)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(d.id)
        .bind(d.assignment_id.0)
        .bind(d.user_id)
        .bind(d.role.map(|r| r.to_string()))
        .bind(d.delay_seconds)
        .bind(d.delay_days)
        .bind(&d.reason)
        .bind(&d.reason_category)
        .bind(d.detected_at)
        .bind(d.justified)
        .bind(&d.justification)
        .bind(d.justified_by)
        .bind(d.justified_at)
        .bind(d.is_shadow)
        .execute(&self.pool)
        .await?;

        metrics::delays_recorded().add(
            1,
            &[KeyValue::new(
                "kind",
                if d.is_shadow { "shadow" } else { "breach" },
            )],
        );
        Ok(())
    }

    pub async fn delays_for_assignment(&self, id: AssignmentId) -> Result<Vec<Delay>> {
        let rows: Vec<DelayRow> = sqlx::query_as(
            "SELECT id, assignment_id, user_id, role, delay_seconds, delay_days, reason,
                    reason_category, detected_at, justified, justification, justified_by,
                    justified_at, is_shadow
             FROM delays WHERE assignment_id = $1 ORDER BY detected_at ASC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into_delay()).collect()
    }

    pub async fn list_delays(&self, limit: i64) -> Result<Vec<Delay>> {
        let rows: Vec<DelayRow> = sqlx::query_as(
            "SELECT id, assignment_id, user_id, role, delay_seconds, delay_days, reason,
                    reason_category, detected_at, justified, justification, justified_by,
                    justified_at, is_shadow
             FROM delays ORDER BY detected_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into_delay()).collect()
    }

    /// Record a human reviewer's justification verdict on a delay.
    /// The justification workflow itself lives outside this engine.
    pub async fn set_delay_justification(
        &self,
        delay_id: Uuid,
        justified_by: Uuid,
        justification: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let rows_affected = sqlx::query(
            "UPDATE delays
             SET justified = TRUE, justification = $1, justified_by = $2, justified_at = $3
             WHERE id = $4",
        )
        .bind(justification)
        .bind(justified_by)
        .bind(now)
        .bind(delay_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(Error::NotFound(format!("delay {delay_id}")));
        }
        Ok(())
    }

    /// Total delay days per user, worst offenders first. Shadow rows are
    /// excluded so delegated work is not double-counted.
    pub async fn debt_scores(&self, limit: i64) -> Result<Vec<DebtScore>> {
        let rows: Vec<(Uuid, i64, i64)> = sqlx::query_as(
            "SELECT user_id, COALESCE(SUM(delay_days), 0)::BIGINT, COUNT(*)
             FROM delays WHERE NOT is_shadow
             GROUP BY user_id
             ORDER BY 2 DESC, 3 DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, total_delay_days, breach_count)| DebtScore {
                user_id,
                total_delay_days,
                breach_count,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct DelayRow {
    id: Uuid,
    assignment_id: Uuid,
    user_id: Uuid,
    role: Option<String>,
    delay_seconds: i64,
    delay_days: i64,
    reason: Option<String>,
    reason_category: String,
    detected_at: DateTime<Utc>,
    justified: bool,
    justification: Option<String>,
    justified_by: Option<Uuid>,
    justified_at: Option<DateTime<Utc>>,
    is_shadow: bool,
}

impl DelayRow {
    fn try_into_delay(self) -> Result<Delay> {
        Ok(Delay {
            id: self.id,
            assignment_id: AssignmentId(self.assignment_id),
            user_id: self.user_id,
            role: self.role.as_deref().map(str::parse).transpose()?,
            delay_seconds: self.delay_seconds,
            delay_days: self.delay_days,
            reason: self.reason,
            reason_category: self.reason_category,
            detected_at: self.detected_at,
            justified: self.justified,
            justification: self.justification,
            justified_by: self.justified_by,
            justified_at: self.justified_at,
            is_shadow: self.is_shadow,
        })
    }
}
