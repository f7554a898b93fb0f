//! Identity collaborator: who holds which role.
//!
//! The engine only ever asks "who is responsible for role X" — user and
//! permission storage belongs to an external system. The shipped default
//! reads a `users` table in the same database; tests and dev tooling use
//! the in-memory directory.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::Db;
use crate::error::Result;
use crate::model::process::Role;

/// A resolved principal.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Active users holding the given role, in stable order.
    async fn users_for_role(&self, role: Role) -> Result<Vec<UserRecord>>;

    /// Validate a free-text role name into the closed role set.
    async fn role_by_name(&self, name: &str) -> Result<Option<Role>>;
}

/// Postgres-backed directory reading the `users` table.
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(db: &Db) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn users_for_role(&self, role: Role) -> Result<Vec<UserRecord>> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT id, display_name FROM users
             WHERE role = $1 AND active ORDER BY display_name ASC, id ASC",
        )
        .bind(role.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, display_name)| UserRecord {
                id,
                display_name,
                role,
                active: true,
            })
            .collect())
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(name.parse().ok())
    }
}

/// Fixed in-memory directory for tests and local experiments.
#[derive(Default)]
pub struct StaticDirectory {
    users: Vec<UserRecord>,
}

impl StaticDirectory {
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn users_for_role(&self, role: Role) -> Result<Vec<UserRecord>> {
        Ok(self
            .users
            .iter()
            .filter(|u| u.role == role && u.active)
            .cloned()
            .collect())
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(name.parse().ok())
    }
}
