use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use rolegate_application::AccessContext;
use rolegate_core::{ActorId, AppError};
use rolegate_domain::RoleId;
use uuid::Uuid;

use crate::dto::{AssignRoleRequest, RoleDetailResponse, RoleSummaryResponse, SaveRoleRequest};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
) -> ApiResult<Json<Vec<RoleSummaryResponse>>> {
    let roles = state.role_admin_service.list_roles(&context).await?;

    Ok(Json(
        roles.into_iter().map(RoleSummaryResponse::from).collect(),
    ))
}

pub async fn get_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Path(role_id): Path<String>,
) -> ApiResult<Json<RoleDetailResponse>> {
    let detail = state
        .role_admin_service
        .get_role(&context, parse_role_id(&role_id)?)
        .await?;

    Ok(Json(RoleDetailResponse::from(detail)))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Json(payload): Json<SaveRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleDetailResponse>)> {
    let detail = state
        .role_admin_service
        .create_role(&context, payload.into_input()?)
        .await?;

    Ok((StatusCode::CREATED, Json(RoleDetailResponse::from(detail))))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Path(role_id): Path<String>,
    Json(payload): Json<SaveRoleRequest>,
) -> ApiResult<Json<RoleDetailResponse>> {
    let detail = state
        .role_admin_service
        .update_role(&context, parse_role_id(&role_id)?, payload.into_input()?)
        .await?;

    Ok(Json(RoleDetailResponse::from(detail)))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Path(role_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .role_admin_service
        .delete_role(&context, parse_role_id(&role_id)?)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Path(role_id): Path<String>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<StatusCode> {
    let actor_id = payload.actor_id.parse::<ActorId>()?;
    state
        .role_admin_service
        .assign_role(&context, parse_role_id(&role_id)?, actor_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unassign_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Path((role_id, actor_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let actor_id = actor_id.parse::<ActorId>()?;
    state
        .role_admin_service
        .unassign_role(&context, parse_role_id(&role_id)?, actor_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn parse_role_id(value: &str) -> Result<RoleId, AppError> {
    Uuid::parse_str(value.trim())
        .map(RoleId::from_uuid)
        .map_err(|error| AppError::Validation(format!("invalid role id '{value}': {error}")))
}
