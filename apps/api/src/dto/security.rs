use rolegate_application::{AssignedActorSummary, RoleDetail, RoleSummary, SaveRoleInput};
use rolegate_core::AppResult;
use rolegate_domain::{Permission, PermissionReference, Role};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for role creation and full replacement.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/save-role-request.ts"
)]
pub struct SaveRoleRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub is_active: Option<bool>,
    /// Permission ids or `resource:action` keys.
    pub permissions: Vec<String>,
}

impl SaveRoleRequest {
    /// Parses the submitted permission references.
    pub fn into_input(self) -> AppResult<SaveRoleInput> {
        let permissions = self
            .permissions
            .iter()
            .map(|value| PermissionReference::from_transport(value))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(SaveRoleInput {
            name: self.name,
            description: self.description,
            color: self.color,
            is_active: self.is_active.unwrap_or(true),
            permissions,
        })
    }
}

/// Incoming payload for role assignment.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/assign-role-request.ts"
)]
pub struct AssignRoleRequest {
    pub actor_id: String,
}

/// API representation of a catalog permission.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/permission-response.ts"
)]
pub struct PermissionResponse {
    pub permission_id: String,
    pub resource: String,
    pub action: String,
    pub key: String,
    pub description: String,
}

impl From<&Permission> for PermissionResponse {
    fn from(value: &Permission) -> Self {
        Self {
            permission_id: value.id().to_string(),
            resource: value.key().resource().to_owned(),
            action: value.key().action().to_owned(),
            key: value.key().to_string(),
            description: value.description().to_owned(),
        }
    }
}

/// API representation of a role in listings.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/role-summary-response.ts"
)]
pub struct RoleSummaryResponse {
    pub role_id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub is_active: bool,
    pub is_system_role: bool,
    #[ts(type = "number")]
    pub permission_count: u64,
    #[ts(type = "number")]
    pub assigned_actor_count: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl RoleSummaryResponse {
    fn from_role(role: &Role, permission_count: u64, assigned_actor_count: u64) -> Self {
        Self {
            role_id: role.id().to_string(),
            name: role.name().to_owned(),
            description: role.profile().description().map(ToOwned::to_owned),
            color: role.profile().color().as_str().to_owned(),
            is_active: role.profile().is_active(),
            is_system_role: role.is_system_role(),
            permission_count,
            assigned_actor_count,
            created_at: role.created_at().to_rfc3339(),
            updated_at: role.updated_at().to_rfc3339(),
        }
    }
}

impl From<RoleSummary> for RoleSummaryResponse {
    fn from(value: RoleSummary) -> Self {
        Self::from_role(
            &value.role,
            value.permission_count,
            value.assigned_actor_count,
        )
    }
}

/// Actor holding a role.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/assigned-actor-response.ts"
)]
pub struct AssignedActorResponse {
    pub actor_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub privilege_level: i32,
    pub assigned_at: String,
}

impl From<AssignedActorSummary> for AssignedActorResponse {
    fn from(value: AssignedActorSummary) -> Self {
        Self {
            actor_id: value.actor_id.to_string(),
            display_name: value.display_name,
            email: value.email,
            privilege_level: value.privilege_level.value(),
            assigned_at: value.assigned_at.to_rfc3339(),
        }
    }
}

/// Role with its permissions and holders.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/role-detail-response.ts"
)]
pub struct RoleDetailResponse {
    pub role: RoleSummaryResponse,
    pub permissions: Vec<PermissionResponse>,
    pub assigned_actors: Vec<AssignedActorResponse>,
}

impl From<RoleDetail> for RoleDetailResponse {
    fn from(value: RoleDetail) -> Self {
        let permission_count = u64::try_from(value.permission_count()).unwrap_or(u64::MAX);
        let assigned_actor_count =
            u64::try_from(value.assigned_actor_count()).unwrap_or(u64::MAX);

        Self {
            role: RoleSummaryResponse::from_role(
                &value.role,
                permission_count,
                assigned_actor_count,
            ),
            permissions: value
                .permissions
                .iter()
                .map(PermissionResponse::from)
                .collect(),
            assigned_actors: value
                .assigned_actors
                .into_iter()
                .map(AssignedActorResponse::from)
                .collect(),
        }
    }
}
