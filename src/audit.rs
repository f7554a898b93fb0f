//! Audit collaborator: fire-and-forget structured records.
//!
//! The engine emits events to the sink but does not own its storage or
//! query surface. A sink failure is logged and swallowed; it never fails
//! the transition that produced the event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::db::Db;
use crate::error::Result;

/// One structured audit event.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub details: serde_json::Value,
    /// The acting principal. None for scheduler-driven actions.
    pub actor: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: Uuid,
        details: serde_json::Value,
        actor: Option<Uuid>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id,
            details,
            actor,
            recorded_at,
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, rec: AuditRecord) -> Result<()>;
}

/// Record an audit event, logging instead of propagating on failure.
pub async fn record_best_effort(sink: &dyn AuditSink, rec: AuditRecord) {
    let action = rec.action.clone();
    if let Err(e) = sink.record(rec).await {
        warn!(action, "audit record failed: {e}");
    }
}

/// Postgres-backed sink writing the `audit_log` table.
pub struct PgAudit {
    pool: PgPool,
}

impl PgAudit {
    pub fn new(db: &Db) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl AuditSink for PgAudit {
    async fn record(&self, rec: AuditRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_log (action, entity_type, entity_id, details, actor, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&rec.action)
        .bind(&rec.entity_type)
        .bind(rec.entity_id)
        .bind(&rec.details)
        .bind(rec.actor)
        .bind(rec.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Log-only sink for tests and environments without an audit store.
pub struct TracingAudit;

#[async_trait]
impl AuditSink for TracingAudit {
    async fn record(&self, rec: AuditRecord) -> Result<()> {
        tracing::info!(
            action = %rec.action,
            entity_type = %rec.entity_type,
            entity_id = %rec.entity_id,
            "audit"
        );
        Ok(())
    }
}
