//! Error types for caseflow-rs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// A required step/SLA/role lookup came up empty. Soft stop: the
    /// operation is skipped and the condition surfaced to operators.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Escalation wants to route to a role with no active user.
    /// Recoverable no-op; retried on the next scheduler pass.
    #[error("no active user resolvable for role {role}")]
    DestinationUnresolvable { role: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
