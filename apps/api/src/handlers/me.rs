use axum::extract::State;
use axum::{Extension, Json};
use rolegate_application::AccessContext;

use crate::dto::MyPermissionsResponse;
use crate::error::ApiResult;
use crate::state::AppState;

/// Returns the caller's effective permission set, for UI gating only.
pub async fn my_permissions_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
) -> ApiResult<Json<MyPermissionsResponse>> {
    let permissions = state
        .gateway
        .evaluator()
        .permission_set(context.actor_id())
        .await?;

    Ok(Json(MyPermissionsResponse {
        actor_id: context.actor_id().to_string(),
        display_name: context.identity().display_name().to_owned(),
        permissions: permissions.iter().map(ToString::to_string).collect(),
    }))
}
