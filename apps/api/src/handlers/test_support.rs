use std::sync::Arc;
use std::time::Duration;

use axum::body::to_bytes;
use axum::response::Response;
use rolegate_application::{AccessContext, RoleRepository};
use rolegate_core::{ActorId, UserIdentity};
use rolegate_domain::{LegacyPrivilegeLevel, PermissionKey, Role, RoleProfile};
use rolegate_infrastructure::InMemoryPolicyStore;
use serde_json::Value;

use crate::api_services::state_builder::assemble_app_state;
use crate::state::AppState;

pub(crate) struct TestApp {
    pub store: Arc<InMemoryPolicyStore>,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryPolicyStore::new());
        for resource in ["jobs", "roles", "users"] {
            for action in ["view", "create", "edit", "delete"] {
                let seeded = store
                    .seed_permission(resource, action, &format!("{action} {resource}"))
                    .await;
                assert!(seeded.is_ok());
            }
        }

        let state = assemble_app_state(
            store.clone(),
            store.clone(),
            store.clone(),
            Duration::from_secs(2),
        );

        Self { store, state }
    }

    /// Seeds an actor holding one role with the listed grants.
    pub async fn actor_with(&self, name: &str, grants: &[&str]) -> AccessContext {
        let actor_id = self.seed_actor(name).await;
        let role = self.seed_role(&format!("{name} role"), grants).await;
        let assigned = self.store.assign_role(role.id(), actor_id).await;
        assert!(assigned.is_ok());

        self.context_for(actor_id, name)
    }

    pub async fn seed_actor(&self, name: &str) -> ActorId {
        let actor_id = ActorId::new();
        self.store
            .seed_actor(actor_id, name, LegacyPrivilegeLevel::new(0), false)
            .await;
        actor_id
    }

    pub async fn seed_role(&self, name: &str, grants: &[&str]) -> Role {
        let keys = grants
            .iter()
            .map(|value| {
                let Ok(key) = value.parse::<PermissionKey>() else {
                    panic!("fixture key '{value}' should parse");
                };
                key
            })
            .collect::<Vec<_>>();
        let Ok(profile) = RoleProfile::new(name, None, None, true) else {
            panic!("fixture profile should be valid");
        };
        let Ok(role) = self.store.seed_role(profile, false, &keys).await else {
            panic!("fixture role should be stored");
        };
        role
    }

    pub fn context_for(&self, actor_id: ActorId, name: &str) -> AccessContext {
        let identity = UserIdentity::new(actor_id, name, None);
        let Ok(context) = self.state.gateway.authenticate(Some(identity)) else {
            panic!("identity should authenticate");
        };
        context
    }
}

pub(crate) async fn json_body(response: Response) -> Value {
    let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
        panic!("response body should be readable");
    };
    let Ok(body) = serde_json::from_slice::<Value>(&bytes) else {
        panic!("response body should be json");
    };
    body
}
