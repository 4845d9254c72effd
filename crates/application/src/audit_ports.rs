use async_trait::async_trait;

use rolegate_core::{ActorId, AppResult};
use rolegate_domain::AuditAction;

/// Append-only audit event emitted by administrative use-cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Actor that performed the action.
    pub actor_id: ActorId,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Optional audit detail payload.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends an audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
