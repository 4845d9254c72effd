use axum::Extension;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use rolegate_application::{DenyReason, PermissionRequirement};
use rolegate_core::{AppError, UserIdentity};
use tower_sessions::Session;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Session key under which the sign-in service stores the caller identity.
pub const SESSION_USER_KEY: &str = "user_identity";

/// Evaluates the route's requirement before the handler runs.
///
/// On success the handler receives an `AccessContext` extension.
pub async fn enforce_permissions(
    State(state): State<AppState>,
    Extension(requirement): Extension<PermissionRequirement>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = session_identity(&session).await?;
    let actor_id = identity.as_ref().map(UserIdentity::actor_id);

    let context = state
        .gateway
        .authorize(identity, &requirement)
        .await
        .inspect_err(|reason| {
            let path = request.uri().path();
            match (reason, actor_id) {
                (DenyReason::EvaluationFailed(detail), _) => {
                    warn!(path, ?actor_id, %detail, "permission evaluation failed");
                }
                (_, Some(actor_id)) => {
                    warn!(path, %actor_id, %reason, "request denied");
                }
                (_, None) => warn!(path, "unauthenticated request denied"),
            }
        })?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Resolves identity only, for routes open to every signed-in actor.
pub async fn require_identity(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = session_identity(&session).await?;
    let context = state.gateway.authenticate(identity).inspect_err(|_| {
        warn!(path = request.uri().path(), "unauthenticated request denied");
    })?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

async fn session_identity(session: &Session) -> Result<Option<UserIdentity>, ApiError> {
    session
        .get::<UserIdentity>(SESSION_USER_KEY)
        .await
        .map_err(|error| {
            ApiError::from(AppError::Internal(format!(
                "failed to read session identity: {error}"
            )))
        })
}
