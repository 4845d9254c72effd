use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use rolegate_application::{
    ActorGrants, AssignedActorSummary, AuditEvent, AuditRepository, PolicyRepository,
    RoleDeletion, RoleDetail, RoleRepository, RoleSummary,
};
use rolegate_core::{ActorId, AppError, AppResult};
use rolegate_domain::{
    LegacyPrivilegeLevel, Permission, PermissionId, PermissionKey, Role, RoleId, RoleProfile,
};

/// In-memory policy store implementing the policy, role and audit ports.
///
/// All state sits behind one lock, so every mutation is atomic and
/// evaluations read one consistent snapshot.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    state: RwLock<PolicyState>,
}

#[derive(Debug, Default)]
struct PolicyState {
    permissions: BTreeMap<PermissionKey, Permission>,
    roles: HashMap<RoleId, StoredRole>,
    actors: HashMap<ActorId, StoredActor>,
    assignments: BTreeMap<(RoleId, ActorId), DateTime<Utc>>,
    audit_events: Vec<AuditEvent>,
}

#[derive(Debug, Clone)]
struct StoredRole {
    role: Role,
    grants: BTreeSet<PermissionId>,
}

#[derive(Debug, Clone)]
struct StoredActor {
    display_name: String,
    email: Option<String>,
    privilege_level: LegacyPrivilegeLevel,
    is_superadmin: bool,
}

impl InMemoryPolicyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a catalog entry, returning the existing one for a known pair.
    pub async fn seed_permission(
        &self,
        resource: &str,
        action: &str,
        description: &str,
    ) -> AppResult<Permission> {
        let key = PermissionKey::new(resource, action)?;
        let mut state = self.state.write().await;

        Ok(state
            .permissions
            .entry(key.clone())
            .or_insert_with(|| Permission::new(PermissionId::new(), key, description))
            .clone())
    }

    /// Adds an actor row.
    pub async fn seed_actor(
        &self,
        actor_id: ActorId,
        display_name: &str,
        privilege_level: LegacyPrivilegeLevel,
        is_superadmin: bool,
    ) {
        self.state.write().await.actors.insert(
            actor_id,
            StoredActor {
                display_name: display_name.to_owned(),
                email: None,
                privilege_level,
                is_superadmin,
            },
        );
    }

    /// Adds a role granting the listed catalog pairs.
    pub async fn seed_role(
        &self,
        profile: RoleProfile,
        is_system_role: bool,
        grants: &[PermissionKey],
    ) -> AppResult<Role> {
        let mut state = self.state.write().await;
        ensure_unique_name(&state, profile.name(), None)?;

        let grants = grants
            .iter()
            .map(|key| {
                state
                    .permissions
                    .get(key)
                    .map(Permission::id)
                    .ok_or_else(|| AppError::Validation(format!("unknown permission '{key}'")))
            })
            .collect::<AppResult<BTreeSet<_>>>()?;

        let now = Utc::now();
        let role = Role::new(RoleId::new(), profile, is_system_role, now, now);
        state.roles.insert(
            role.id(),
            StoredRole {
                role: role.clone(),
                grants,
            },
        );

        Ok(role)
    }

    /// Returns the audit events appended so far.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.state.read().await.audit_events.clone()
    }

    /// Returns the granted pairs of a role, ordered.
    pub async fn role_grant_keys(&self, role_id: RoleId) -> Option<Vec<PermissionKey>> {
        let state = self.state.read().await;
        let stored = state.roles.get(&role_id)?;

        Some(
            state
                .permissions
                .values()
                .filter(|permission| stored.grants.contains(&permission.id()))
                .map(|permission| permission.key().clone())
                .collect(),
        )
    }
}

fn ensure_unique_name(state: &PolicyState, name: &str, except: Option<RoleId>) -> AppResult<()> {
    let taken = state
        .roles
        .values()
        .any(|stored| stored.role.name() == name && Some(stored.role.id()) != except);

    if taken {
        return Err(AppError::Validation(format!("role '{name}' already exists")));
    }

    Ok(())
}

fn ensure_catalog_ids(state: &PolicyState, permission_ids: &BTreeSet<PermissionId>) -> AppResult<()> {
    let known = state
        .permissions
        .values()
        .map(Permission::id)
        .collect::<BTreeSet<_>>();

    if !permission_ids.is_subset(&known) {
        return Err(AppError::Validation(
            "role grants reference a permission missing from the catalog".to_owned(),
        ));
    }

    Ok(())
}

fn assignment_count(state: &PolicyState, role_id: RoleId) -> u64 {
    state
        .assignments
        .keys()
        .filter(|(assigned_role_id, _)| *assigned_role_id == role_id)
        .count() as u64
}

fn role_not_found(role_id: RoleId) -> AppError {
    AppError::NotFound(format!("role '{role_id}' was not found"))
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyStore {
    async fn load_actor_grants(&self, actor_id: ActorId) -> AppResult<Option<ActorGrants>> {
        let state = self.state.read().await;
        let Some(actor) = state.actors.get(&actor_id) else {
            return Ok(None);
        };

        let granted_ids = state
            .assignments
            .keys()
            .filter(|(_, assigned_actor_id)| *assigned_actor_id == actor_id)
            .filter_map(|(role_id, _)| state.roles.get(role_id))
            .filter(|stored| stored.role.profile().is_active())
            .flat_map(|stored| stored.grants.iter().copied())
            .collect::<BTreeSet<_>>();

        let permissions = state
            .permissions
            .values()
            .filter(|permission| granted_ids.contains(&permission.id()))
            .map(|permission| permission.key().clone())
            .collect();

        Ok(Some(ActorGrants {
            is_superadmin: actor.is_superadmin,
            permissions,
        }))
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        Ok(self.state.read().await.permissions.values().cloned().collect())
    }
}

#[async_trait]
impl RoleRepository for InMemoryPolicyStore {
    async fn list_roles(&self) -> AppResult<Vec<RoleSummary>> {
        let state = self.state.read().await;

        let mut summaries = state
            .roles
            .values()
            .map(|stored| RoleSummary {
                role: stored.role.clone(),
                permission_count: stored.grants.len() as u64,
                assigned_actor_count: assignment_count(&state, stored.role.id()),
            })
            .collect::<Vec<_>>();
        summaries.sort_by(|left, right| left.role.name().cmp(right.role.name()));

        Ok(summaries)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .get(&role_id)
            .map(|stored| stored.role.clone()))
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let name = name.trim();

        Ok(self
            .state
            .read()
            .await
            .roles
            .values()
            .find(|stored| stored.role.name() == name)
            .map(|stored| stored.role.clone()))
    }

    async fn role_detail(&self, role_id: RoleId) -> AppResult<Option<RoleDetail>> {
        let state = self.state.read().await;
        let Some(stored) = state.roles.get(&role_id) else {
            return Ok(None);
        };

        let permissions = state
            .permissions
            .values()
            .filter(|permission| stored.grants.contains(&permission.id()))
            .cloned()
            .collect();

        let mut assigned_actors = state
            .assignments
            .iter()
            .filter(|((assigned_role_id, _), _)| *assigned_role_id == role_id)
            .filter_map(|((_, actor_id), assigned_at)| {
                state.actors.get(actor_id).map(|actor| AssignedActorSummary {
                    actor_id: *actor_id,
                    display_name: actor.display_name.clone(),
                    email: actor.email.clone(),
                    privilege_level: actor.privilege_level,
                    assigned_at: *assigned_at,
                })
            })
            .collect::<Vec<_>>();
        assigned_actors.sort_by(|left, right| left.display_name.cmp(&right.display_name));

        Ok(Some(RoleDetail {
            role: stored.role.clone(),
            permissions,
            assigned_actors,
        }))
    }

    async fn create_role(
        &self,
        profile: RoleProfile,
        permission_ids: BTreeSet<PermissionId>,
    ) -> AppResult<Role> {
        let mut state = self.state.write().await;
        ensure_unique_name(&state, profile.name(), None)?;
        ensure_catalog_ids(&state, &permission_ids)?;

        let now = Utc::now();
        let role = Role::new(RoleId::new(), profile, false, now, now);
        state.roles.insert(
            role.id(),
            StoredRole {
                role: role.clone(),
                grants: permission_ids,
            },
        );

        Ok(role)
    }

    async fn replace_role(
        &self,
        role_id: RoleId,
        profile: RoleProfile,
        permission_ids: BTreeSet<PermissionId>,
    ) -> AppResult<Role> {
        let mut state = self.state.write().await;
        let current = state
            .roles
            .get(&role_id)
            .map(|stored| stored.role.clone())
            .ok_or_else(|| role_not_found(role_id))?;

        current.ensure_profile_change_allowed(&profile)?;
        ensure_unique_name(&state, profile.name(), Some(role_id))?;
        ensure_catalog_ids(&state, &permission_ids)?;

        let role = current.with_profile(profile, Utc::now());
        state.roles.insert(
            role_id,
            StoredRole {
                role: role.clone(),
                grants: permission_ids,
            },
        );

        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<RoleDeletion> {
        let mut state = self.state.write().await;
        let stored = state.roles.get(&role_id).ok_or_else(|| role_not_found(role_id))?;
        stored.role.ensure_deletable()?;

        let assigned_actor_count = assignment_count(&state, role_id);
        if assigned_actor_count > 0 {
            return Ok(RoleDeletion::InUse {
                assigned_actor_count,
            });
        }

        state.roles.remove(&role_id);
        Ok(RoleDeletion::Deleted)
    }

    async fn assign_role(&self, role_id: RoleId, actor_id: ActorId) -> AppResult<()> {
        let mut state = self.state.write().await;
        let stored = state.roles.get(&role_id).ok_or_else(|| role_not_found(role_id))?;

        if !stored.role.profile().is_active() {
            return Err(AppError::Validation(format!(
                "role '{}' is inactive and cannot be assigned",
                stored.role.name()
            )));
        }
        if !state.actors.contains_key(&actor_id) {
            return Err(AppError::NotFound(format!("actor '{actor_id}' was not found")));
        }

        state
            .assignments
            .entry((role_id, actor_id))
            .or_insert_with(Utc::now);
        Ok(())
    }

    async fn unassign_role(&self, role_id: RoleId, actor_id: ActorId) -> AppResult<()> {
        if self
            .state
            .write()
            .await
            .assignments
            .remove(&(role_id, actor_id))
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "role assignment '{actor_id}:{role_id}' was not found"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl AuditRepository for InMemoryPolicyStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.state.write().await.audit_events.push(event);
        Ok(())
    }
}
