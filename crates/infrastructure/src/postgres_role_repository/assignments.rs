use super::*;

impl PostgresRoleRepository {
    pub(super) async fn assign_role_impl(&self, role_id: RoleId, actor_id: ActorId) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;

        // Shares the row lock with delete, so a delete never misses this assignment.
        let role = lock_role(&mut transaction, role_id, "SHARE").await?;
        if !role.profile().is_active() {
            return Err(AppError::Validation(format!(
                "role '{}' is inactive and cannot be assigned",
                role.name()
            )));
        }

        let actor_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM actors WHERE id = $1)",
        )
        .bind(actor_id.as_uuid())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve actor: {error}")))?;

        if !actor_exists {
            return Err(AppError::NotFound(format!("actor '{actor_id}' was not found")));
        }

        sqlx::query(
            r#"
            INSERT INTO user_role_assignments (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(actor_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to assign role: {error}")))?;

        commit(transaction).await?;

        info!(%role_id, %actor_id, "role assigned");
        Ok(())
    }

    pub(super) async fn unassign_role_impl(
        &self,
        role_id: RoleId,
        actor_id: ActorId,
    ) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM user_role_assignments
            WHERE user_id = $1
                AND role_id = $2
            "#,
        )
        .bind(actor_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to remove role assignment: {error}"))
        })?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "role assignment '{actor_id}:{role_id}' was not found"
            )));
        }

        info!(%role_id, %actor_id, "role unassigned");
        Ok(())
    }
}
