use serde::Serialize;
use ts_rs::TS;

mod security;

pub use security::{
    AssignRoleRequest, AssignedActorResponse, PermissionResponse, RoleDetailResponse,
    RoleSummaryResponse, SaveRoleRequest,
};

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Effective permission set of the signed-in actor.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/my-permissions-response.ts"
)]
pub struct MyPermissionsResponse {
    pub actor_id: String,
    pub display_name: String,
    pub permissions: Vec<String>,
}
