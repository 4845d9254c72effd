use std::collections::BTreeSet;

use rolegate_application::{PolicyRepository, RoleDeletion, RoleRepository};
use rolegate_core::{ActorId, AppError};
use rolegate_domain::{PermissionId, RoleProfile};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresRoleRepository;
use crate::PostgresPolicyRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres role tests: {error}");
    }

    Some(pool)
}

async fn catalog_ids(pool: &PgPool, keys: &[&str]) -> BTreeSet<PermissionId> {
    let Ok(catalog) = PostgresPolicyRepository::new(pool.clone())
        .list_permissions()
        .await
    else {
        panic!("catalog should load");
    };

    keys.iter()
        .map(|key| {
            let Some(permission) = catalog
                .iter()
                .find(|permission| permission.key().to_string() == *key)
            else {
                panic!("seeded catalog should contain '{key}'");
            };
            permission.id()
        })
        .collect()
}

async fn ensure_actor(pool: &PgPool) -> ActorId {
    let actor_id = ActorId::new();
    let insert = sqlx::query(
        r#"
        INSERT INTO actors (id, display_name, privilege_level)
        VALUES ($1, $2, 2)
        "#,
    )
    .bind(actor_id.as_uuid())
    .bind(format!("actor-{actor_id}"))
    .execute(pool)
    .await;

    assert!(insert.is_ok());
    actor_id
}

fn profile(name: &str) -> RoleProfile {
    let Ok(profile) = RoleProfile::new(name, Some("Test role".to_owned()), None, true) else {
        panic!("fixture profile should be valid");
    };
    profile
}

fn unique_name(prefix: &str) -> String {
    format!("{prefix} {}", Uuid::new_v4())
}

async fn stored_grants(pool: &PgPool, role_id: Uuid) -> Vec<Uuid> {
    let Ok(rows) = sqlx::query_scalar::<_, Uuid>(
        "SELECT permission_id FROM role_permissions WHERE role_id = $1 ORDER BY permission_id",
    )
    .bind(role_id)
    .fetch_all(pool)
    .await
    else {
        panic!("grants should load");
    };
    rows
}

#[tokio::test]
async fn replace_role_replaces_the_whole_grant_set() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleRepository::new(pool.clone());
    let name = unique_name("Recruiter");

    let first = catalog_ids(&pool, &["jobs:view", "jobs:edit"]).await;
    let Ok(role) = repository.create_role(profile(&name), first).await else {
        panic!("create should succeed");
    };

    let second = catalog_ids(&pool, &["applications:view"]).await;
    let replaced = repository
        .replace_role(role.id(), profile(&name), second.clone())
        .await;
    assert!(replaced.is_ok());

    let again = repository
        .replace_role(role.id(), profile(&name), second.clone())
        .await;
    assert!(again.is_ok());

    let expected = second
        .iter()
        .map(PermissionId::as_uuid)
        .collect::<Vec<_>>();
    assert_eq!(stored_grants(&pool, role.id().as_uuid()).await, expected);
}

#[tokio::test]
async fn create_then_fetch_round_trips_profile_and_grants() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleRepository::new(pool.clone());
    let name = unique_name("Interviewer");
    let grants = catalog_ids(&pool, &["interviews:view", "interviews:edit"]).await;

    let Ok(submitted) = RoleProfile::new(
        name.as_str(),
        Some("Test role".to_owned()),
        Some("#0f766e".to_owned()),
        true,
    ) else {
        panic!("fixture profile should be valid");
    };

    let Ok(role) = repository.create_role(submitted, grants).await else {
        panic!("create should succeed");
    };

    let Ok(Some(detail)) = repository.role_detail(role.id()).await else {
        panic!("detail should load");
    };
    assert_eq!(detail.role.name(), name);
    assert_eq!(detail.role.profile().description(), Some("Test role"));
    assert_eq!(detail.role.profile().color().as_str(), "#0f766e");
    assert_eq!(
        detail
            .permissions
            .iter()
            .map(|permission| permission.key().to_string())
            .collect::<Vec<_>>(),
        vec!["interviews:edit".to_owned(), "interviews:view".to_owned()]
    );
}

#[tokio::test]
async fn duplicate_role_name_is_rejected() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleRepository::new(pool.clone());
    let name = unique_name("Coordinator");
    let grants = catalog_ids(&pool, &["jobs:view"]).await;

    assert!(
        repository
            .create_role(profile(&name), grants.clone())
            .await
            .is_ok()
    );
    let duplicate = repository.create_role(profile(&name), grants).await;

    assert!(matches!(duplicate, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn delete_role_reports_blocking_assignments() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleRepository::new(pool.clone());
    let grants = catalog_ids(&pool, &["jobs:view"]).await;
    let Ok(role) = repository
        .create_role(profile(&unique_name("Hiring Manager")), grants)
        .await
    else {
        panic!("create should succeed");
    };

    for _ in 0..2 {
        let actor_id = ensure_actor(&pool).await;
        assert!(repository.assign_role(role.id(), actor_id).await.is_ok());
    }

    let blocked = repository.delete_role(role.id()).await;
    assert!(matches!(
        blocked,
        Ok(RoleDeletion::InUse {
            assigned_actor_count: 2
        })
    ));
    assert!(matches!(repository.find_role(role.id()).await, Ok(Some(_))));
}

#[tokio::test]
async fn delete_unassigned_role_removes_role_and_grants() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleRepository::new(pool.clone());
    let grants = catalog_ids(&pool, &["jobs:view", "jobs:create"]).await;
    let Ok(role) = repository
        .create_role(profile(&unique_name("Temporary")), grants)
        .await
    else {
        panic!("create should succeed");
    };

    let deleted = repository.delete_role(role.id()).await;

    assert!(matches!(deleted, Ok(RoleDeletion::Deleted)));
    assert!(matches!(repository.find_role(role.id()).await, Ok(None)));
    assert!(stored_grants(&pool, role.id().as_uuid()).await.is_empty());
}

#[tokio::test]
async fn seeded_system_role_cannot_be_deleted() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleRepository::new(pool);

    let Ok(Some(administrator)) = repository.find_role_by_name("Administrator").await else {
        panic!("seeded system role should exist");
    };
    let result = repository.delete_role(administrator.id()).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn concurrent_replacements_leave_exactly_one_submitted_set() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleRepository::new(pool.clone());
    let name = unique_name("Contested");
    let initial = catalog_ids(&pool, &["settings:view"]).await;
    let Ok(role) = repository.create_role(profile(&name), initial).await else {
        panic!("create should succeed");
    };

    let left_set = catalog_ids(&pool, &["jobs:view", "jobs:edit", "jobs:create"]).await;
    let right_set = catalog_ids(&pool, &["email:view", "analytics:view"]).await;

    let left_repository = repository.clone();
    let right_repository = repository.clone();
    let left_profile = profile(&name);
    let right_profile = profile(&name);
    let left_ids = left_set.clone();
    let right_ids = right_set.clone();
    let role_id = role.id();

    let (left, right) = tokio::join!(
        left_repository.replace_role(role_id, left_profile, left_ids),
        right_repository.replace_role(role_id, right_profile, right_ids),
    );
    assert!(left.is_ok());
    assert!(right.is_ok());

    let stored = stored_grants(&pool, role_id.as_uuid()).await;
    let as_uuids = |set: &BTreeSet<PermissionId>| {
        set.iter().map(PermissionId::as_uuid).collect::<Vec<_>>()
    };
    assert!(stored == as_uuids(&left_set) || stored == as_uuids(&right_set));
}
