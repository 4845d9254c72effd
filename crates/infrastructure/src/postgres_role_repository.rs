use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::info;

use rolegate_application::{
    AssignedActorSummary, RoleDeletion, RoleDetail, RoleRepository, RoleSummary,
};
use rolegate_core::{ActorId, AppError, AppResult};
use rolegate_domain::{
    LegacyPrivilegeLevel, Permission, PermissionId, Role, RoleId, RoleProfile,
};

use crate::postgres_policy_repository::PermissionRow;

mod assignments;
mod roles;

/// PostgreSQL-backed repository for role administration.
///
/// Mutations lock the role row, so concurrent writes to one role serialize and
/// the last committed permission set wins as a whole.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: uuid::Uuid,
    name: String,
    description: Option<String>,
    color: String,
    is_active: bool,
    is_system_role: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        let profile = RoleProfile::new(row.name, row.description, Some(row.color), row.is_active)
            .map_err(|error| {
                AppError::Internal(format!("stored role '{}' is invalid: {error}", row.id))
            })?;

        Ok(Role::new(
            RoleId::from_uuid(row.id),
            profile,
            row.is_system_role,
            row.created_at,
            row.updated_at,
        ))
    }
}

#[derive(Debug, FromRow)]
struct RoleSummaryRow {
    #[sqlx(flatten)]
    role: RoleRow,
    permission_count: i64,
    assigned_actor_count: i64,
}

#[derive(Debug, FromRow)]
struct AssignedActorRow {
    actor_id: uuid::Uuid,
    display_name: String,
    email: Option<String>,
    privilege_level: i32,
    assigned_at: DateTime<Utc>,
}

const ROLE_COLUMNS: &str = r#"
    roles.id,
    roles.name,
    roles.description,
    roles.color,
    roles.is_active,
    roles.is_system_role,
    roles.created_at,
    roles.updated_at
"#;

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn list_roles(&self) -> AppResult<Vec<RoleSummary>> {
        let rows = sqlx::query_as::<_, RoleSummaryRow>(&format!(
            r#"
            SELECT
                {ROLE_COLUMNS},
                (
                    SELECT COUNT(*)
                    FROM role_permissions AS grants
                    WHERE grants.role_id = roles.id
                ) AS permission_count,
                (
                    SELECT COUNT(*)
                    FROM user_role_assignments AS assignments
                    WHERE assignments.role_id = roles.id
                ) AS assigned_actor_count
            FROM roles
            ORDER BY roles.name
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter()
            .map(|row| {
                Ok(RoleSummary {
                    role: Role::try_from(row.role)?,
                    permission_count: count_to_u64(row.permission_count),
                    assigned_actor_count: count_to_u64(row.assigned_actor_count),
                })
            })
            .collect()
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE roles.id = $1"
        ))
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?
        .map(Role::try_from)
        .transpose()
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE roles.name = $1"
        ))
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role by name: {error}")))?
        .map(Role::try_from)
        .transpose()
    }

    async fn role_detail(&self, role_id: RoleId) -> AppResult<Option<RoleDetail>> {
        let Some(role) = self.find_role(role_id).await? else {
            return Ok(None);
        };

        let permissions = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT permissions.id, permissions.resource, permissions.action, permissions.description
            FROM role_permissions AS grants
            INNER JOIN permissions
                ON permissions.id = grants.permission_id
            WHERE grants.role_id = $1
            ORDER BY permissions.resource, permissions.action
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role grants: {error}")))?
        .into_iter()
        .map(Permission::try_from)
        .collect::<AppResult<Vec<_>>>()?;

        let assigned_actors = sqlx::query_as::<_, AssignedActorRow>(
            r#"
            SELECT
                actors.id AS actor_id,
                actors.display_name,
                actors.email,
                actors.privilege_level,
                assignments.assigned_at
            FROM user_role_assignments AS assignments
            INNER JOIN actors
                ON actors.id = assignments.user_id
            WHERE assignments.role_id = $1
            ORDER BY actors.display_name, actors.id
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load role assignments: {error}"))
        })?
        .into_iter()
        .map(|row| AssignedActorSummary {
            actor_id: ActorId::from_uuid(row.actor_id),
            display_name: row.display_name,
            email: row.email,
            privilege_level: LegacyPrivilegeLevel::new(row.privilege_level),
            assigned_at: row.assigned_at,
        })
        .collect();

        Ok(Some(RoleDetail {
            role,
            permissions,
            assigned_actors,
        }))
    }

    async fn create_role(
        &self,
        profile: RoleProfile,
        permission_ids: BTreeSet<PermissionId>,
    ) -> AppResult<Role> {
        self.create_role_impl(profile, permission_ids).await
    }

    async fn replace_role(
        &self,
        role_id: RoleId,
        profile: RoleProfile,
        permission_ids: BTreeSet<PermissionId>,
    ) -> AppResult<Role> {
        self.replace_role_impl(role_id, profile, permission_ids)
            .await
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<RoleDeletion> {
        self.delete_role_impl(role_id).await
    }

    async fn assign_role(&self, role_id: RoleId, actor_id: ActorId) -> AppResult<()> {
        self.assign_role_impl(role_id, actor_id).await
    }

    async fn unassign_role(&self, role_id: RoleId, actor_id: ActorId) -> AppResult<()> {
        self.unassign_role_impl(role_id, actor_id).await
    }
}

async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
}

async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
}

/// Locks the role row for the rest of the transaction.
async fn lock_role(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: RoleId,
    lock: &str,
) -> AppResult<Role> {
    sqlx::query_as::<_, RoleRow>(&format!(
        "SELECT {ROLE_COLUMNS} FROM roles WHERE roles.id = $1 FOR {lock}"
    ))
    .bind(role_id.as_uuid())
    .fetch_optional(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to lock role: {error}")))?
    .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))
    .and_then(Role::try_from)
}

async fn insert_grants(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: RoleId,
    permission_ids: &BTreeSet<PermissionId>,
) -> AppResult<()> {
    let ids = permission_ids
        .iter()
        .map(PermissionId::as_uuid)
        .collect::<Vec<_>>();

    sqlx::query(
        r#"
        INSERT INTO role_permissions (role_id, permission_id)
        SELECT $1, permission_id
        FROM UNNEST($2::uuid[]) AS submitted(permission_id)
        ON CONFLICT (role_id, permission_id) DO NOTHING
        "#,
    )
    .bind(role_id.as_uuid())
    .bind(ids)
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        if is_database_error(&error, "23503") {
            return AppError::Validation(
                "role grants reference a permission missing from the catalog".to_owned(),
            );
        }

        AppError::Internal(format!("failed to persist role grants: {error}"))
    })?;

    Ok(())
}

fn map_role_write_error(error: sqlx::Error, role_name: &str, step: &str) -> AppError {
    if is_database_error(&error, "23505") {
        return AppError::Validation(format!("role '{role_name}' already exists"));
    }

    AppError::Internal(format!("failed to {step}: {error}"))
}

fn is_database_error(error: &sqlx::Error, code: &str) -> bool {
    if let sqlx::Error::Database(database_error) = error
        && database_error.code().as_deref() == Some(code)
    {
        return true;
    }

    false
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}

fn log_mutation(action: &str, role: &Role, permission_count: usize) {
    info!(
        role_id = %role.id(),
        role_name = role.name(),
        permission_count,
        "{action}"
    );
}

#[cfg(test)]
mod tests;
