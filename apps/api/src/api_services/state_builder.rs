use std::sync::Arc;
use std::time::Duration;

use rolegate_application::{
    AuditRepository, EnforcementGateway, PolicyEvaluator, PolicyRepository, RoleAdminService,
    RoleRepository,
};
use rolegate_infrastructure::{
    PostgresAuditRepository, PostgresPolicyRepository, PostgresRoleRepository,
};
use sqlx::PgPool;

use crate::state::AppState;

pub fn build_app_state(pool: PgPool, evaluation_timeout: Duration) -> AppState {
    let policy_repository: Arc<dyn PolicyRepository> =
        Arc::new(PostgresPolicyRepository::new(pool.clone()));
    let role_repository: Arc<dyn RoleRepository> =
        Arc::new(PostgresRoleRepository::new(pool.clone()));
    let audit_repository: Arc<dyn AuditRepository> =
        Arc::new(PostgresAuditRepository::new(pool));

    assemble_app_state(
        policy_repository,
        role_repository,
        audit_repository,
        evaluation_timeout,
    )
}

pub(crate) fn assemble_app_state(
    policy_repository: Arc<dyn PolicyRepository>,
    role_repository: Arc<dyn RoleRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    evaluation_timeout: Duration,
) -> AppState {
    let evaluator = PolicyEvaluator::new(policy_repository.clone());
    let gateway = EnforcementGateway::new(evaluator, evaluation_timeout);
    let role_admin_service = RoleAdminService::new(
        gateway.clone(),
        policy_repository,
        role_repository,
        audit_repository,
    );

    AppState {
        gateway,
        role_admin_service,
    }
}
