//! Assignment persistence: inserts, lookups, and version-guarded
//! lifecycle transitions.
//!
//! Every transition is a compare-and-swap on `(id, status, version)`.
//! Zero rows affected means another writer got there first (or the caller
//! raced a human action); that surfaces as a state-mismatch error rather
//! than a silent overwrite.

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::assignment::{Assignment, AssignmentId, Status};
use crate::telemetry::metrics;

impl super::Db {
    /// Insert a new assignment in its creation state.
    pub async fn insert_assignment(&self, a: &Assignment) -> Result<()> {
        sqlx::query(
            "INSERT INTO assignments (id, request_id, step_id, assigned_to, assigned_by,
                status, assigned_at, started_at, completed_at, allowed_seconds,
                actual_seconds, notes, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(a.id.0)
        .bind(a.request_id)
        .bind(a.step_id)
        .bind(a.assigned_to)
        .bind(a.assigned_by)
        .bind(a.status.to_string())
        .bind(a.assigned_at)
        .bind(a.started_at)
        .bind(a.completed_at)
        .bind(a.allowed_seconds)
        .bind(a.actual_seconds)
        .bind(&a.notes)
        .bind(a.version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get an assignment by ID.
    pub async fn get_assignment(&self, id: AssignmentId) -> Result<Assignment> {
        let row: Option<AssignmentRow> = sqlx::query_as(
            "SELECT id, request_id, step_id, assigned_to, assigned_by, status,
                    assigned_at, started_at, completed_at, allowed_seconds,
                    actual_seconds, notes, version
             FROM assignments WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("assignment {id}")))?
            .try_into_assignment()
    }

    /// List assignments by status, oldest first.
    pub async fn list_assignments_by_status(
        &self,
        status: Option<Status>,
        limit: i64,
    ) -> Result<Vec<Assignment>> {
        let rows: Vec<AssignmentRow> = match status {
            Some(s) => {
                sqlx::query_as(
                    "SELECT id, request_id, step_id, assigned_to, assigned_by, status,
                            assigned_at, started_at, completed_at, allowed_seconds,
                            actual_seconds, notes, version
                     FROM assignments WHERE status = $1
                     ORDER BY assigned_at ASC LIMIT $2",
                )
                .bind(s.to_string())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT id, request_id, step_id, assigned_to, assigned_by, status,
                            assigned_at, started_at, completed_at, allowed_seconds,
                            actual_seconds, notes, version
                     FROM assignments ORDER BY assigned_at ASC LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(|r| r.try_into_assignment()).collect()
    }

    /// Every assignment the scheduler must look at: in progress, any age.
    pub async fn list_in_progress_assignments(&self) -> Result<Vec<Assignment>> {
        self.list_assignments_by_status(Some(Status::InProgress), i64::MAX)
            .await
    }

    /// Pending → InProgress. Sets `started_at`.
    pub async fn begin_assignment(
        &self,
        id: AssignmentId,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<Assignment> {
        let rows_affected = sqlx::query(
            "UPDATE assignments
             SET status = 'in_progress', started_at = $1, version = version + 1
             WHERE id = $2 AND status = 'pending' AND version = $3",
        )
        .bind(now)
        .bind(id.0)
        .bind(expected_version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(self.transition_conflict(id, Status::InProgress).await);
        }

        record_transition(Status::Pending, Status::InProgress);
        self.get_assignment(id).await
    }

    /// InProgress → a terminal status. Sets `completed_at`,
    /// `actual_seconds`, and the completing actor's notes.
    pub async fn complete_assignment(
        &self,
        id: AssignmentId,
        expected_version: i64,
        target: Status,
        completed_at: DateTime<Utc>,
        actual_seconds: i64,
        notes: Option<String>,
    ) -> Result<Assignment> {
        if !Status::InProgress.can_transition_to(target) {
            return Err(Error::InvalidTransition {
                from: Status::InProgress.to_string(),
                to: target.to_string(),
            });
        }

        let rows_affected = sqlx::query(
            "UPDATE assignments
             SET status = $1, completed_at = $2, actual_seconds = $3,
                 notes = COALESCE($4, notes), version = version + 1
             WHERE id = $5 AND status = 'in_progress' AND version = $6",
        )
        .bind(target.to_string())
        .bind(completed_at)
        .bind(actual_seconds)
        .bind(&notes)
        .bind(id.0)
        .bind(expected_version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(self.transition_conflict(id, target).await);
        }

        record_transition(Status::InProgress, target);
        self.get_assignment(id).await
    }

    /// Reassign an open assignment to another user without changing its
    /// lifecycle state. Used by delegation.
    pub async fn reassign_assignment(
        &self,
        id: AssignmentId,
        expected_version: i64,
        to_user: Uuid,
    ) -> Result<Assignment> {
        let rows_affected = sqlx::query(
            "UPDATE assignments SET assigned_to = $1, version = version + 1
             WHERE id = $2 AND status IN ('pending', 'in_progress') AND version = $3",
        )
        .bind(to_user)
        .bind(id.0)
        .bind(expected_version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            // Reuse the conflict path: the row is terminal or the version moved.
            return Err(self.transition_conflict(id, Status::InProgress).await);
        }

        self.get_assignment(id).await
    }

    /// Build the error for a CAS that affected zero rows: missing row,
    /// terminal state, or a concurrent writer bumped the version.
    async fn transition_conflict(&self, id: AssignmentId, to: Status) -> Error {
        match self.get_assignment(id).await {
            Ok(current) => Error::InvalidTransition {
                from: current.status.to_string(),
                to: to.to_string(),
            },
            Err(e) => e,
        }
    }
}

fn record_transition(from: Status, to: Status) {
    metrics::assignment_transitions().add(
        1,
        &[
            KeyValue::new("from", from.to_string()),
            KeyValue::new("to", to.to_string()),
        ],
    );
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: Uuid,
    request_id: Uuid,
    step_id: Uuid,
    assigned_to: Uuid,
    assigned_by: Option<Uuid>,
    status: String,
    assigned_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    allowed_seconds: i64,
    actual_seconds: Option<i64>,
    notes: Option<String>,
    version: i64,
}

impl AssignmentRow {
    fn try_into_assignment(self) -> Result<Assignment> {
        Ok(Assignment {
            id: AssignmentId(self.id),
            request_id: self.request_id,
            step_id: self.step_id,
            assigned_to: self.assigned_to,
            assigned_by: self.assigned_by,
            status: self.status.parse()?,
            assigned_at: self.assigned_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            allowed_seconds: self.allowed_seconds,
            actual_seconds: self.actual_seconds,
            notes: self.notes,
            version: self.version,
        })
    }
}
