use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use rolegate_core::{ActorId, AppError, AppResult};
use rolegate_domain::{Permission, PermissionId, PermissionKey};
use tokio::sync::Mutex;

use crate::{ActorGrants, PolicyRepository};

use super::PolicyEvaluator;

#[derive(Default)]
struct FakePolicyRepository {
    actors: Mutex<HashMap<ActorId, ActorGrants>>,
    catalog: Vec<Permission>,
    reads: Mutex<usize>,
    fail: bool,
}

#[async_trait]
impl PolicyRepository for FakePolicyRepository {
    async fn load_actor_grants(&self, actor_id: ActorId) -> AppResult<Option<ActorGrants>> {
        if self.fail {
            return Err(AppError::Internal("store offline".to_owned()));
        }

        *self.reads.lock().await += 1;
        Ok(self.actors.lock().await.get(&actor_id).cloned())
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        Ok(self.catalog.clone())
    }
}

fn key(resource: &str, action: &str) -> PermissionKey {
    let Ok(key) = PermissionKey::new(resource, action) else {
        panic!("fixture key should be valid");
    };
    key
}

fn grants(is_superadmin: bool, keys: &[(&str, &str)]) -> ActorGrants {
    ActorGrants {
        is_superadmin,
        permissions: keys
            .iter()
            .map(|(resource, action)| key(resource, action))
            .collect(),
    }
}

fn evaluator_with(
    actors: Vec<(ActorId, ActorGrants)>,
) -> (PolicyEvaluator, Arc<FakePolicyRepository>) {
    let repository = Arc::new(FakePolicyRepository {
        actors: Mutex::new(actors.into_iter().collect()),
        catalog: vec![
            Permission::new(PermissionId::new(), key("jobs", "view"), "View jobs"),
            Permission::new(PermissionId::new(), key("jobs", "edit"), "Edit jobs"),
            Permission::new(PermissionId::new(), key("roles", "view"), "View roles"),
        ],
        ..FakePolicyRepository::default()
    });
    (PolicyEvaluator::new(repository.clone()), repository)
}

#[tokio::test]
async fn has_permission_reflects_union_of_grants() {
    let actor_id = ActorId::new();
    let (evaluator, _) =
        evaluator_with(vec![(actor_id, grants(false, &[("jobs", "view"), ("roles", "view")]))]);

    assert!(matches!(
        evaluator.has_permission(actor_id, &key("jobs", "view")).await,
        Ok(true)
    ));
    assert!(matches!(
        evaluator.has_permission(actor_id, &key("jobs", "edit")).await,
        Ok(false)
    ));
}

#[tokio::test]
async fn superadmin_override_allows_everything() {
    let actor_id = ActorId::new();
    let (evaluator, _) = evaluator_with(vec![(actor_id, grants(true, &[]))]);

    assert!(matches!(
        evaluator
            .has_permission(actor_id, &key("settings", "delete"))
            .await,
        Ok(true)
    ));
}

#[tokio::test]
async fn unknown_actor_fails_closed() {
    let (evaluator, _) = evaluator_with(Vec::new());
    let stranger = ActorId::new();

    assert!(matches!(
        evaluator.has_permission(stranger, &key("jobs", "view")).await,
        Ok(false)
    ));
    assert!(matches!(
        evaluator.permission_set(stranger).await,
        Ok(ref set) if set.is_empty()
    ));
}

#[tokio::test]
async fn bulk_checks_use_a_single_read() {
    let actor_id = ActorId::new();
    let (evaluator, repository) =
        evaluator_with(vec![(actor_id, grants(false, &[("jobs", "view")]))]);

    let decisions = evaluator
        .has_permissions(
            actor_id,
            &[key("jobs", "view"), key("jobs", "edit"), key("roles", "view")],
        )
        .await;

    let Ok(decisions) = decisions else {
        panic!("bulk evaluation should succeed");
    };
    assert_eq!(decisions.len(), 3);
    assert_eq!(decisions.decision(&key("jobs", "view")), Some(true));
    assert_eq!(decisions.decision(&key("jobs", "edit")), Some(false));
    assert_eq!(*repository.reads.lock().await, 1);
}

#[tokio::test]
async fn grant_changes_are_visible_on_the_next_check() {
    let actor_id = ActorId::new();
    let (evaluator, repository) = evaluator_with(vec![(actor_id, grants(false, &[]))]);

    assert!(matches!(
        evaluator.has_permission(actor_id, &key("jobs", "edit")).await,
        Ok(false)
    ));

    repository
        .actors
        .lock()
        .await
        .insert(actor_id, grants(false, &[("jobs", "edit")]));

    assert!(matches!(
        evaluator.has_permission(actor_id, &key("jobs", "edit")).await,
        Ok(true)
    ));
}

#[tokio::test]
async fn superadmin_permission_set_is_the_catalog() {
    let actor_id = ActorId::new();
    let (evaluator, _) = evaluator_with(vec![(actor_id, grants(true, &[]))]);

    let expected: BTreeSet<PermissionKey> = [
        key("jobs", "view"),
        key("jobs", "edit"),
        key("roles", "view"),
    ]
    .into_iter()
    .collect();

    assert!(matches!(
        evaluator.permission_set(actor_id).await,
        Ok(ref set) if set == &expected
    ));
}

#[tokio::test]
async fn storage_failures_propagate_instead_of_granting() {
    let repository = Arc::new(FakePolicyRepository {
        fail: true,
        ..FakePolicyRepository::default()
    });
    let evaluator = PolicyEvaluator::new(repository);

    let result = evaluator
        .has_permission(ActorId::new(), &key("jobs", "view"))
        .await;
    assert!(matches!(result, Err(AppError::Internal(_))));
}
