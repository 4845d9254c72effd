use std::collections::BTreeSet;
use std::sync::Arc;

use rolegate_core::{ActorId, AppError, AppResult};
use rolegate_domain::{
    AuditAction, Permission, PermissionId, PermissionReference, Role, RoleId, RoleProfile,
};
use thiserror::Error;

use crate::{
    AccessContext, AuditEvent, AuditRepository, EnforcementGateway, PermissionRequirement,
    PolicyRepository, RoleDeletion, RoleDetail, RoleRepository, RoleSummary, SaveRoleInput,
};

mod assignments;

/// Failure of a role delete.
#[derive(Debug, Error)]
pub enum DeleteRoleError {
    /// Assignments still reference the role.
    #[error("role '{role_name}' is assigned to {assigned_actor_count} actor(s); unassign them before deleting")]
    InUse {
        /// Name of the blocked role.
        role_name: String,
        /// Exact number of blocking assignments.
        assigned_actor_count: u64,
    },
    /// Any other failure.
    #[error(transparent)]
    App(#[from] AppError),
}

impl From<DeleteRoleError> for AppError {
    fn from(value: DeleteRoleError) -> Self {
        match value {
            DeleteRoleError::InUse { .. } => AppError::Conflict(value.to_string()),
            DeleteRoleError::App(error) => error,
        }
    }
}

/// Application service for role administration.
///
/// Every operation re-checks its own permission against the caller's
/// [`AccessContext`], independent of any route-level gate.
#[derive(Clone)]
pub struct RoleAdminService {
    gateway: EnforcementGateway,
    policy_repository: Arc<dyn PolicyRepository>,
    repository: Arc<dyn RoleRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl RoleAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        gateway: EnforcementGateway,
        policy_repository: Arc<dyn PolicyRepository>,
        repository: Arc<dyn RoleRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            gateway,
            policy_repository,
            repository,
            audit_repository,
        }
    }

    /// Lists roles with usage counts.
    pub async fn list_roles(&self, context: &AccessContext) -> AppResult<Vec<RoleSummary>> {
        self.require(context, "roles", "view").await?;
        self.repository.list_roles().await
    }

    /// Lists the permission catalog.
    pub async fn list_permissions(&self, context: &AccessContext) -> AppResult<Vec<Permission>> {
        self.require(context, "roles", "view").await?;
        self.policy_repository.list_permissions().await
    }

    /// Returns a role with its grants and holders.
    pub async fn get_role(&self, context: &AccessContext, role_id: RoleId) -> AppResult<RoleDetail> {
        self.require(context, "roles", "view").await?;
        self.load_detail(role_id).await
    }

    /// Creates a role with a complete permission set.
    ///
    /// The audit event is appended after the write commits, so an audit
    /// failure is returned for a change that is already persisted.
    pub async fn create_role(
        &self,
        context: &AccessContext,
        input: SaveRoleInput,
    ) -> AppResult<RoleDetail> {
        self.require(context, "roles", "create").await?;

        let profile = RoleProfile::new(input.name, input.description, input.color, input.is_active)?;
        if self.repository.find_role_by_name(profile.name()).await?.is_some() {
            return Err(AppError::Validation(format!(
                "role '{}' already exists",
                profile.name()
            )));
        }

        let permission_ids = self.resolve_permissions(&input.permissions).await?;
        let role = self.repository.create_role(profile, permission_ids).await?;

        self.append_role_event(
            context.actor_id(),
            AuditAction::SecurityRoleCreated,
            &role,
            format!("created role '{}'", role.name()),
        )
        .await?;

        self.load_detail(role.id()).await
    }

    /// Replaces a role's scalar fields and its whole permission set.
    ///
    /// Validation happens before any write. Concurrent updates of the same role
    /// resolve as last-committed-wins on the complete set.
    ///
    /// The audit event is appended after the write commits, so an audit
    /// failure is returned for a change that is already persisted.
    pub async fn update_role(
        &self,
        context: &AccessContext,
        role_id: RoleId,
        input: SaveRoleInput,
    ) -> AppResult<RoleDetail> {
        self.require(context, "roles", "edit").await?;

        let existing = self.find_existing(role_id).await?;
        let profile = RoleProfile::new(input.name, input.description, input.color, input.is_active)?;

        if profile.name() != existing.name()
            && let Some(other) = self.repository.find_role_by_name(profile.name()).await?
            && other.id() != role_id
        {
            return Err(AppError::Validation(format!(
                "role '{}' already exists",
                profile.name()
            )));
        }
        existing.ensure_profile_change_allowed(&profile)?;

        let permission_ids = self.resolve_permissions(&input.permissions).await?;
        let grant_count = permission_ids.len();
        let role = self
            .repository
            .replace_role(role_id, profile, permission_ids)
            .await?;

        self.append_role_event(
            context.actor_id(),
            AuditAction::SecurityRoleUpdated,
            &role,
            format!(
                "replaced role '{}' with {grant_count} permission(s)",
                role.name()
            ),
        )
        .await?;

        self.load_detail(role.id()).await
    }

    /// Deletes a role that is neither a system role nor assigned to anyone.
    ///
    /// The audit event is appended after the write commits, so an audit
    /// failure is returned for a change that is already persisted.
    pub async fn delete_role(
        &self,
        context: &AccessContext,
        role_id: RoleId,
    ) -> Result<(), DeleteRoleError> {
        self.require(context, "roles", "delete").await?;

        let role = self.find_existing(role_id).await?;
        role.ensure_deletable()?;

        match self.repository.delete_role(role_id).await? {
            RoleDeletion::Deleted => {}
            RoleDeletion::InUse {
                assigned_actor_count,
            } => {
                return Err(DeleteRoleError::InUse {
                    role_name: role.name().to_owned(),
                    assigned_actor_count,
                });
            }
        }

        self.append_role_event(
            context.actor_id(),
            AuditAction::SecurityRoleDeleted,
            &role,
            format!("deleted role '{}'", role.name()),
        )
        .await?;

        Ok(())
    }

    async fn require(&self, context: &AccessContext, resource: &str, action: &str) -> AppResult<()> {
        let requirement = PermissionRequirement::single(resource, action)?;
        self.gateway.require(context, &requirement).await
    }

    async fn find_existing(&self, role_id: RoleId) -> AppResult<Role> {
        self.repository
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))
    }

    async fn load_detail(&self, role_id: RoleId) -> AppResult<RoleDetail> {
        self.repository
            .role_detail(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))
    }

    /// Resolves every reference or rejects the whole submission.
    async fn resolve_permissions(
        &self,
        references: &[PermissionReference],
    ) -> AppResult<BTreeSet<PermissionId>> {
        if references.is_empty() {
            return Err(AppError::Validation(
                "role must grant at least one permission".to_owned(),
            ));
        }

        let catalog = self.policy_repository.list_permissions().await?;
        let mut resolved = BTreeSet::new();
        let mut unresolved = Vec::new();

        for reference in references {
            match catalog
                .iter()
                .find(|permission| reference.matches(permission))
            {
                Some(permission) => {
                    resolved.insert(permission.id());
                }
                None => unresolved.push(reference.to_string()),
            }
        }

        if !unresolved.is_empty() {
            return Err(AppError::Validation(format!(
                "unknown permission(s): {}",
                unresolved.join(", ")
            )));
        }

        Ok(resolved)
    }

    async fn append_role_event(
        &self,
        actor_id: ActorId,
        action: AuditAction,
        role: &Role,
        detail: String,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                actor_id,
                action,
                resource_type: "role".to_owned(),
                resource_id: role.id().to_string(),
                detail: Some(detail),
            })
            .await
    }
}

#[cfg(test)]
mod tests;
