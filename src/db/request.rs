//! Request persistence: creation and terminal status updates.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::process::{Request, RequestStatus};

impl super::Db {
    pub async fn insert_request(&self, r: &Request) -> Result<()> {
        sqlx::query(
            "INSERT INTO requests (id, process_id, title, submitted_by, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(r.id)
        .bind(r.process_id)
        .bind(&r.title)
        .bind(r.submitted_by)
        .bind(r.status.to_string())
        .bind(r.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_request(&self, id: Uuid) -> Result<Request> {
        let row: Option<RequestRow> = sqlx::query_as(
            "SELECT id, process_id, title, submitted_by, status, created_at
             FROM requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("request {id}")))?
            .try_into_request()
    }

    pub async fn set_request_status(&self, id: Uuid, status: RequestStatus) -> Result<()> {
        let rows_affected = sqlx::query("UPDATE requests SET status = $1 WHERE id = $2")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(Error::NotFound(format!("request {id}")));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    process_id: Uuid,
    title: String,
    submitted_by: Uuid,
    status: String,
    created_at: DateTime<Utc>,
}

impl RequestRow {
    fn try_into_request(self) -> Result<Request> {
        Ok(Request {
            id: self.id,
            process_id: self.process_id,
            title: self.title,
            submitted_by: self.submitted_by,
            status: self.status.parse()?,
            created_at: self.created_at,
        })
    }
}
