//! Process-step, SLA-record, and exclusion-window lookups.
//!
//! All read-only from the engine's perspective; mutation is an
//! administrative action outside this core.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::process::{ExclusionWindow, SlaRecord, StepDefinition};

impl super::Db {
    /// Get a step definition by ID.
    pub async fn get_step(&self, step_id: Uuid) -> Result<StepDefinition> {
        let row: Option<StepRow> = sqlx::query_as(
            "SELECT id, process_id, sequence_order, responsible_role, default_allowed_seconds
             FROM process_steps WHERE id = $1",
        )
        .bind(step_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("process step {step_id}")))?
            .try_into_step()
    }

    /// The lowest-ordered step of a process, where new requests land.
    pub async fn first_step(&self, process_id: Uuid) -> Result<Option<StepDefinition>> {
        let row: Option<StepRow> = sqlx::query_as(
            "SELECT id, process_id, sequence_order, responsible_role, default_allowed_seconds
             FROM process_steps WHERE process_id = $1
             ORDER BY sequence_order ASC LIMIT 1",
        )
        .bind(process_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into_step()).transpose()
    }

    /// The next step after the given sequence order, or None at the end
    /// of the chain.
    pub async fn next_step_after(
        &self,
        process_id: Uuid,
        sequence_order: i32,
    ) -> Result<Option<StepDefinition>> {
        let row: Option<StepRow> = sqlx::query_as(
            "SELECT id, process_id, sequence_order, responsible_role, default_allowed_seconds
             FROM process_steps WHERE process_id = $1 AND sequence_order > $2
             ORDER BY sequence_order ASC LIMIT 1",
        )
        .bind(process_id)
        .bind(sequence_order)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into_step()).transpose()
    }

    /// Active SLA records for a step, role-scoped records first.
    pub async fn sla_records_for_step(&self, step_id: Uuid) -> Result<Vec<SlaRecord>> {
        let rows: Vec<SlaRow> = sqlx::query_as(
            "SELECT id, step_id, role, allowed_seconds, active
             FROM sla_records WHERE step_id = $1 AND active
             ORDER BY role NULLS LAST, id ASC",
        )
        .bind(step_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into_record()).collect()
    }

    /// Active exclusion windows overlapping `at` that apply to the step
    /// (step-scoped or global).
    pub async fn overlapping_windows_for_step(
        &self,
        step_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<ExclusionWindow>> {
        let rows: Vec<WindowRow> = sqlx::query_as(
            "SELECT id, kind, step_id, starts_at, ends_at, active
             FROM exclusion_windows
             WHERE active AND (step_id IS NULL OR step_id = $1)
               AND starts_at <= $2 AND ends_at > $2
             ORDER BY starts_at ASC",
        )
        .bind(step_id)
        .bind(at)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into_window()).collect()
    }
}

#[derive(sqlx::FromRow)]
struct StepRow {
    id: Uuid,
    process_id: Uuid,
    sequence_order: i32,
    responsible_role: Option<String>,
    default_allowed_seconds: Option<i64>,
}

impl StepRow {
    fn try_into_step(self) -> Result<StepDefinition> {
        Ok(StepDefinition {
            id: self.id,
            process_id: self.process_id,
            sequence_order: self.sequence_order,
            responsible_role: self.responsible_role.as_deref().map(str::parse).transpose()?,
            default_allowed_seconds: self.default_allowed_seconds,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SlaRow {
    id: Uuid,
    step_id: Uuid,
    role: Option<String>,
    allowed_seconds: i64,
    active: bool,
}

impl SlaRow {
    fn try_into_record(self) -> Result<SlaRecord> {
        Ok(SlaRecord {
            id: self.id,
            step_id: self.step_id,
            role: self.role.as_deref().map(str::parse).transpose()?,
            allowed_seconds: self.allowed_seconds,
            active: self.active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WindowRow {
    id: Uuid,
    kind: String,
    step_id: Option<Uuid>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    active: bool,
}

impl WindowRow {
    fn try_into_window(self) -> Result<ExclusionWindow> {
        Ok(ExclusionWindow {
            id: self.id,
            kind: self.kind.parse()?,
            step_id: self.step_id,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            active: self.active,
        })
    }
}
