use super::*;

impl RoleAdminService {
    /// Assigns a role to an actor and emits an audit event.
    ///
    /// As with role writes, the event follows the committed assignment.
    pub async fn assign_role(
        &self,
        context: &AccessContext,
        role_id: RoleId,
        actor_id: ActorId,
    ) -> AppResult<()> {
        self.require(context, "users", "edit").await?;

        let role = self.find_existing(role_id).await?;
        if !role.profile().is_active() {
            return Err(AppError::Validation(format!(
                "role '{}' is inactive and cannot be assigned",
                role.name()
            )));
        }

        self.repository.assign_role(role_id, actor_id).await?;

        self.audit_repository
            .append_event(AuditEvent {
                actor_id: context.actor_id(),
                action: AuditAction::SecurityRoleAssigned,
                resource_type: "role_assignment".to_owned(),
                resource_id: format!("{actor_id}:{role_id}"),
                detail: Some(format!("assigned role '{}' to '{actor_id}'", role.name())),
            })
            .await
    }

    /// Removes a role assignment and emits an audit event.
    pub async fn unassign_role(
        &self,
        context: &AccessContext,
        role_id: RoleId,
        actor_id: ActorId,
    ) -> AppResult<()> {
        self.require(context, "users", "edit").await?;

        let role = self.find_existing(role_id).await?;
        self.repository.unassign_role(role_id, actor_id).await?;

        self.audit_repository
            .append_event(AuditEvent {
                actor_id: context.actor_id(),
                action: AuditAction::SecurityRoleUnassigned,
                resource_type: "role_assignment".to_owned(),
                resource_id: format!("{actor_id}:{role_id}"),
                detail: Some(format!("removed role '{}' from '{actor_id}'", role.name())),
            })
            .await
    }
}
