use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rolegate_core::{ActorId, AppResult};
use rolegate_domain::{
    LegacyPrivilegeLevel, Permission, PermissionId, PermissionReference, Role, RoleId,
    RoleProfile,
};

/// Role listing row with usage counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSummary {
    /// Persisted role.
    pub role: Role,
    /// Number of granted catalog permissions.
    pub permission_count: u64,
    /// Number of actors holding the role.
    pub assigned_actor_count: u64,
}

/// Actor holding a role, as shown on the role detail screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedActorSummary {
    /// Actor identifier.
    pub actor_id: ActorId,
    /// Actor display name.
    pub display_name: String,
    /// Actor email, when known.
    pub email: Option<String>,
    /// Legacy tier still stored on the actor.
    pub privilege_level: LegacyPrivilegeLevel,
    /// Assignment timestamp.
    pub assigned_at: DateTime<Utc>,
}

/// Role with its grants and holders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDetail {
    /// Persisted role.
    pub role: Role,
    /// Granted catalog permissions ordered by resource and action.
    pub permissions: Vec<Permission>,
    /// Actors holding the role.
    pub assigned_actors: Vec<AssignedActorSummary>,
}

impl RoleDetail {
    /// Returns the number of granted permissions.
    #[must_use]
    pub fn permission_count(&self) -> usize {
        self.permissions.len()
    }

    /// Returns the number of actors holding the role.
    #[must_use]
    pub fn assigned_actor_count(&self) -> usize {
        self.assigned_actors.len()
    }
}

/// Submitted role payload for create and full replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRoleInput {
    /// Role name, unique across roles.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional `#RRGGBB` badge color.
    pub color: Option<String>,
    /// Whether grants of the role count toward evaluation.
    pub is_active: bool,
    /// Complete permission set the role must hold afterwards.
    pub permissions: Vec<PermissionReference>,
}

/// Result of a transactional delete attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleDeletion {
    /// Grants and role row were removed.
    Deleted,
    /// Assignments still reference the role; nothing was removed.
    InUse {
        /// Number of actors blocking the delete.
        assigned_actor_count: u64,
    },
}

/// Repository port for role persistence.
///
/// Every mutating method runs in one transaction: either all of its writes are
/// visible afterwards or none are.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Lists all roles with usage counts, ordered by name.
    async fn list_roles(&self) -> AppResult<Vec<RoleSummary>>;

    /// Finds a role by id.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Finds a role by its exact stored name.
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    /// Loads a role with grants and holders.
    async fn role_detail(&self, role_id: RoleId) -> AppResult<Option<RoleDetail>>;

    /// Creates a non-system role with the provided grants.
    async fn create_role(
        &self,
        profile: RoleProfile,
        permission_ids: BTreeSet<PermissionId>,
    ) -> AppResult<Role>;

    /// Replaces scalar fields and the whole grant set of a role.
    async fn replace_role(
        &self,
        role_id: RoleId,
        profile: RoleProfile,
        permission_ids: BTreeSet<PermissionId>,
    ) -> AppResult<Role>;

    /// Deletes grants and the role unless assignments still reference it.
    async fn delete_role(&self, role_id: RoleId) -> AppResult<RoleDeletion>;

    /// Assigns an active role to an existing actor. Assigning twice is a no-op.
    ///
    /// Unknown actors yield `NotFound`; inactive roles yield `Validation`.
    async fn assign_role(&self, role_id: RoleId, actor_id: ActorId) -> AppResult<()>;

    /// Removes a role assignment, or yields `NotFound` when there is none.
    async fn unassign_role(&self, role_id: RoleId, actor_id: ActorId) -> AppResult<()>;
}
