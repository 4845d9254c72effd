use axum::extract::State;
use axum::{Extension, Json};
use rolegate_application::AccessContext;

use crate::dto::PermissionResponse;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_permissions_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
) -> ApiResult<Json<Vec<PermissionResponse>>> {
    let permissions = state
        .role_admin_service
        .list_permissions(&context)
        .await?;

    Ok(Json(
        permissions.iter().map(PermissionResponse::from).collect(),
    ))
}
