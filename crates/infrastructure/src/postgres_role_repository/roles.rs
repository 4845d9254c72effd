use super::*;

impl PostgresRoleRepository {
    pub(super) async fn create_role_impl(
        &self,
        profile: RoleProfile,
        permission_ids: BTreeSet<PermissionId>,
    ) -> AppResult<Role> {
        let mut transaction = begin(&self.pool).await?;

        let role = sqlx::query_as::<_, RoleRow>(&format!(
            r#"
            INSERT INTO roles (name, description, color, is_active, is_system_role)
            VALUES ($1, $2, $3, $4, false)
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(profile.name())
        .bind(profile.description())
        .bind(profile.color().as_str())
        .bind(profile.is_active())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| map_role_write_error(error, profile.name(), "create role"))
        .and_then(Role::try_from)?;

        insert_grants(&mut transaction, role.id(), &permission_ids).await?;
        commit(transaction).await?;

        log_mutation("role created", &role, permission_ids.len());
        Ok(role)
    }

    pub(super) async fn replace_role_impl(
        &self,
        role_id: RoleId,
        profile: RoleProfile,
        permission_ids: BTreeSet<PermissionId>,
    ) -> AppResult<Role> {
        let mut transaction = begin(&self.pool).await?;

        let current = lock_role(&mut transaction, role_id, "UPDATE").await?;
        current.ensure_profile_change_allowed(&profile)?;

        let role = sqlx::query_as::<_, RoleRow>(&format!(
            r#"
            UPDATE roles
            SET
                name = $2,
                description = $3,
                color = $4,
                is_active = $5,
                updated_at = now()
            WHERE roles.id = $1
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(role_id.as_uuid())
        .bind(profile.name())
        .bind(profile.description())
        .bind(profile.color().as_str())
        .bind(profile.is_active())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| map_role_write_error(error, profile.name(), "update role"))
        .and_then(Role::try_from)?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to clear role grants: {error}"))
            })?;

        insert_grants(&mut transaction, role_id, &permission_ids).await?;
        commit(transaction).await?;

        log_mutation("role replaced", &role, permission_ids.len());
        Ok(role)
    }

    pub(super) async fn delete_role_impl(&self, role_id: RoleId) -> AppResult<RoleDeletion> {
        let mut transaction = begin(&self.pool).await?;

        let role = lock_role(&mut transaction, role_id, "UPDATE").await?;
        role.ensure_deletable()?;

        let assigned_actor_count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM user_role_assignments
            WHERE role_id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count assignments: {error}")))?;

        if assigned_actor_count > 0 {
            transaction.rollback().await.map_err(|error| {
                AppError::Internal(format!("failed to roll back transaction: {error}"))
            })?;

            return Ok(RoleDeletion::InUse {
                assigned_actor_count: count_to_u64(assigned_actor_count),
            });
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete role grants: {error}"))
            })?;

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        commit(transaction).await?;

        log_mutation("role deleted", &role, 0);
        Ok(RoleDeletion::Deleted)
    }
}
