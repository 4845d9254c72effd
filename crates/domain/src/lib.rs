//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod actor;
mod migration;
mod role;
mod security;

pub use actor::LegacyPrivilegeLevel;
pub use migration::MigrationState;
pub use role::{DEFAULT_ROLE_COLOR, Role, RoleColor, RoleId, RoleProfile};
pub use security::{AuditAction, Permission, PermissionId, PermissionKey, PermissionReference};
