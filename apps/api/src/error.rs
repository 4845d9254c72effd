use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rolegate_application::{DeleteRoleError, DenyReason};
use rolegate_core::AppError;
use rolegate_domain::PermissionKey;
use serde::Serialize;
use ts_rs::TS;

/// API error payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/error-response.ts"
)]
pub struct ErrorResponse {
    message: String,
}

/// Permission pair named in a denial.
#[derive(Debug, PartialEq, Eq, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-pair.ts"
)]
pub struct PermissionPair {
    pub resource: String,
    pub action: String,
}

impl From<&PermissionKey> for PermissionPair {
    fn from(value: &PermissionKey) -> Self {
        Self {
            resource: value.resource().to_owned(),
            action: value.action().to_owned(),
        }
    }
}

/// Structured refusal returned by permission-gated routes.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/deny-response.ts"
)]
pub struct DenyResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub required: Option<PermissionPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub any_of: Option<Vec<PermissionPair>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub missing: Option<Vec<PermissionPair>>,
}

/// Body of a role delete blocked by assignments.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-in-use-response.ts"
)]
pub struct RoleInUseResponse {
    pub message: String,
    #[ts(type = "number")]
    pub blocking_actor_count: u64,
}

/// HTTP API error.
#[derive(Debug)]
pub enum ApiError {
    /// Application error mapped by kind.
    App(AppError),
    /// Gateway refusal with the structured deny body.
    Denied(DenyReason),
    /// Role delete refused because actors still hold the role.
    RoleInUse {
        message: String,
        blocking_actor_count: u64,
    },
}

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self::App(value)
    }
}

impl From<DenyReason> for ApiError {
    fn from(value: DenyReason) -> Self {
        Self::Denied(value)
    }
}

impl From<DeleteRoleError> for ApiError {
    fn from(value: DeleteRoleError) -> Self {
        match value {
            DeleteRoleError::InUse {
                assigned_actor_count,
                ..
            } => Self::RoleInUse {
                message: value.to_string(),
                blocking_actor_count: assigned_actor_count,
            },
            DeleteRoleError::App(error) => Self::App(error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::App(error) => app_error_response(error),
            Self::Denied(reason) => deny_response(reason),
            Self::RoleInUse {
                message,
                blocking_actor_count,
            } => (
                StatusCode::CONFLICT,
                Json(RoleInUseResponse {
                    message,
                    blocking_actor_count,
                }),
            )
                .into_response(),
        }
    }
}

fn app_error_response(error: AppError) -> Response {
    let status = match error {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Conflict(_) => StatusCode::CONFLICT,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = Json(ErrorResponse {
        message: error.to_string(),
    });

    (status, payload).into_response()
}

fn deny_response(reason: DenyReason) -> Response {
    let (status, body) = match reason {
        DenyReason::AuthenticationRequired => (
            StatusCode::UNAUTHORIZED,
            DenyResponse {
                error: "authentication required".to_owned(),
                required: None,
                any_of: None,
                missing: None,
            },
        ),
        DenyReason::MissingPermission { required } => (
            StatusCode::FORBIDDEN,
            DenyResponse {
                error: "permission denied".to_owned(),
                required: Some(PermissionPair::from(&required)),
                any_of: None,
                missing: None,
            },
        ),
        DenyReason::MissingAnyPermission { any_of } => (
            StatusCode::FORBIDDEN,
            DenyResponse {
                error: "permission denied".to_owned(),
                required: any_of.first().map(PermissionPair::from),
                any_of: Some(any_of.iter().map(PermissionPair::from).collect()),
                missing: None,
            },
        ),
        DenyReason::MissingPermissions { missing } => (
            StatusCode::FORBIDDEN,
            DenyResponse {
                error: "permission denied".to_owned(),
                required: None,
                any_of: None,
                missing: Some(missing.iter().map(PermissionPair::from).collect()),
            },
        ),
        // Evaluation detail stays in the server log.
        DenyReason::EvaluationFailed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            DenyResponse {
                error: "permission evaluation failed".to_owned(),
                required: None,
                any_of: None,
                missing: None,
            },
        ),
    };

    (status, Json(body)).into_response()
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
