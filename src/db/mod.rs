//! Database connection pool, migrations, and health check.
//!
//! Shared Postgres connection pool used by every persistence submodule.
//! Assignment rows are the only resource requiring per-row mutual
//! exclusion; configuration tables are read-only during a pass.

pub mod assignment;
pub mod delay;
pub mod escalation;
pub mod process;
pub mod request;

use crate::error::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Database handle. Owns the connection pool shared across all modules.
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check — run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool (for collaborator impls).
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
