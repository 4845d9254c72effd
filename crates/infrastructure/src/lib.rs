//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_policy_store;
mod postgres_audit_repository;
mod postgres_policy_repository;
mod postgres_role_repository;

pub use in_memory_policy_store::InMemoryPolicyStore;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_policy_repository::PostgresPolicyRepository;
pub use postgres_role_repository::PostgresRoleRepository;
