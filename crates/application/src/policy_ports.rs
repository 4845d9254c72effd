use std::collections::BTreeSet;

use async_trait::async_trait;

use rolegate_core::{ActorId, AppResult};
use rolegate_domain::{Permission, PermissionKey};

/// Grants visible to one actor, read in a single consistent snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorGrants {
    /// Superadmin override flag on the actor.
    pub is_superadmin: bool,
    /// Union of grants across the actor's assigned, active roles.
    pub permissions: BTreeSet<PermissionKey>,
}

/// Read port over the policy store used by evaluation.
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    /// Loads the actor's superadmin flag and effective grants in one read.
    ///
    /// Returns `None` when the actor does not exist.
    async fn load_actor_grants(&self, actor_id: ActorId) -> AppResult<Option<ActorGrants>>;

    /// Lists the full permission catalog ordered by resource and action.
    async fn list_permissions(&self) -> AppResult<Vec<Permission>>;
}
