//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod enforcement_gateway;
mod policy_evaluator;
mod policy_ports;
mod role_admin_ports;
mod role_admin_service;

pub use audit_ports::{AuditEvent, AuditRepository};
pub use enforcement_gateway::{
    AccessContext, CheckMode, DenyReason, EnforcementGateway, PermissionRequirement,
};
pub use policy_evaluator::{PermissionDecisions, PolicyEvaluator};
pub use policy_ports::{ActorGrants, PolicyRepository};
pub use role_admin_ports::{
    AssignedActorSummary, RoleDeletion, RoleDetail, RoleRepository, RoleSummary, SaveRoleInput,
};
pub use role_admin_service::{DeleteRoleError, RoleAdminService};
