use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use rolegate_application::{ActorGrants, PolicyRepository};
use rolegate_core::{ActorId, AppError, AppResult};
use rolegate_domain::{Permission, PermissionId, PermissionKey};

/// PostgreSQL-backed read side of the policy store.
#[derive(Clone)]
pub struct PostgresPolicyRepository {
    pool: PgPool,
}

impl PostgresPolicyRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    is_superadmin: bool,
    resource: Option<String>,
    action: Option<String>,
}

#[derive(Debug, FromRow)]
pub(crate) struct PermissionRow {
    pub(crate) id: uuid::Uuid,
    pub(crate) resource: String,
    pub(crate) action: String,
    pub(crate) description: String,
}

impl TryFrom<PermissionRow> for Permission {
    type Error = AppError;

    fn try_from(row: PermissionRow) -> Result<Self, Self::Error> {
        let key = PermissionKey::new(row.resource, row.action).map_err(|error| {
            AppError::Internal(format!("stored permission '{}' is invalid: {error}", row.id))
        })?;

        Ok(Permission::new(
            PermissionId::from_uuid(row.id),
            key,
            row.description,
        ))
    }
}

#[async_trait]
impl PolicyRepository for PostgresPolicyRepository {
    async fn load_actor_grants(&self, actor_id: ActorId) -> AppResult<Option<ActorGrants>> {
        // One statement, so flag and grants come from the same snapshot.
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT
                actors.is_superadmin,
                permissions.resource,
                permissions.action
            FROM actors
            LEFT JOIN user_role_assignments AS assignments
                ON assignments.user_id = actors.id
            LEFT JOIN roles
                ON roles.id = assignments.role_id
                AND roles.is_active
            LEFT JOIN role_permissions AS grants
                ON grants.role_id = roles.id
            LEFT JOIN permissions
                ON permissions.id = grants.permission_id
            WHERE actors.id = $1
            "#,
        )
        .bind(actor_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load actor grants: {error}")))?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let is_superadmin = first.is_superadmin;

        let mut permissions = BTreeSet::new();
        for row in rows {
            if let (Some(resource), Some(action)) = (row.resource, row.action) {
                permissions.insert(PermissionKey::new(resource, action).map_err(|error| {
                    AppError::Internal(format!("stored grant is invalid: {error}"))
                })?);
            }
        }

        Ok(Some(ActorGrants {
            is_superadmin,
            permissions,
        }))
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, resource, action, description
            FROM permissions
            ORDER BY resource, action
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?;

        rows.into_iter().map(Permission::try_from).collect()
    }
}
