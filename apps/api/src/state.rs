use rolegate_application::{EnforcementGateway, RoleAdminService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: EnforcementGateway,
    pub role_admin_service: RoleAdminService,
}
