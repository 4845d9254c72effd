use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{MethodRouter, delete, get, post, put};
use axum::{Extension, Router};
use rolegate_application::PermissionRequirement;
use rolegate_core::AppError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::handlers;
use crate::middleware::{enforce_permissions, require_identity};
use crate::state::AppState;

pub fn build_router<Store>(
    app_state: AppState,
    frontend_url: &str,
    session_layer: SessionManagerLayer<Store>,
) -> Result<Router, AppError>
where
    Store: SessionStore + Clone,
{
    let frontend_origin = HeaderValue::from_str(frontend_url).map_err(|error| {
        AppError::Validation(format!("invalid FRONTEND_URL '{frontend_url}': {error}"))
    })?;

    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    let protected_routes = protected_routes(&app_state)?;

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state))
}

fn protected_routes(app_state: &AppState) -> Result<Router<AppState>, AppError> {
    let guard = RouteGuard { app_state };

    Ok(Router::new()
        .route(
            "/api/me/permissions",
            get(handlers::me::my_permissions_handler).route_layer(from_fn_with_state(
                app_state.clone(),
                require_identity,
            )),
        )
        .route(
            "/api/permissions",
            guard.gate(
                get(handlers::permissions::list_permissions_handler),
                "roles",
                "view",
            )?,
        )
        .route(
            "/api/roles",
            guard
                .gate(get(handlers::roles::list_roles_handler), "roles", "view")?
                .merge(guard.gate(
                    post(handlers::roles::create_role_handler),
                    "roles",
                    "create",
                )?),
        )
        .route(
            "/api/roles/{role_id}",
            guard
                .gate(get(handlers::roles::get_role_handler), "roles", "view")?
                .merge(guard.gate(
                    put(handlers::roles::update_role_handler),
                    "roles",
                    "edit",
                )?)
                .merge(guard.gate(
                    delete(handlers::roles::delete_role_handler),
                    "roles",
                    "delete",
                )?),
        )
        .route(
            "/api/roles/{role_id}/assignments",
            guard.gate(
                post(handlers::roles::assign_role_handler),
                "users",
                "edit",
            )?,
        )
        .route(
            "/api/roles/{role_id}/assignments/{actor_id}",
            guard.gate(
                delete(handlers::roles::unassign_role_handler),
                "users",
                "edit",
            )?,
        ))
}

/// Attaches a permission requirement and the enforcing middleware to a route.
struct RouteGuard<'a> {
    app_state: &'a AppState,
}

impl RouteGuard<'_> {
    fn gate(
        &self,
        route: MethodRouter<AppState>,
        resource: &str,
        action: &str,
    ) -> Result<MethodRouter<AppState>, AppError> {
        let requirement = PermissionRequirement::single(resource, action)?;

        Ok(route
            .route_layer(from_fn_with_state(
                self.app_state.clone(),
                enforce_permissions,
            ))
            .layer(Extension(requirement)))
    }
}
