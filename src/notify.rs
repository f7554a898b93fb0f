//! Notification collaborator: best-effort admin alerts.
//!
//! Delivery mechanics (mail, push) live outside this engine. Escalation
//! notifies through this trait fire-and-forget; a failure is logged and
//! never rolls back the escalation that triggered it.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::assignment::AssignmentId;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_admins(
        &self,
        request_id: Uuid,
        assignment_id: AssignmentId,
        message: &str,
    ) -> Result<()>;
}

/// Log-only notifier. The default until a real channel is wired up.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify_admins(
        &self,
        request_id: Uuid,
        assignment_id: AssignmentId,
        message: &str,
    ) -> Result<()> {
        tracing::info!(
            request_id = %request_id,
            assignment_id = %assignment_id,
            message,
            "admin notification"
        );
        Ok(())
    }
}
