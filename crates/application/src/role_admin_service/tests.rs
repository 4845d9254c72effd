use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use rolegate_core::{ActorId, AppError, AppResult, UserIdentity};
use rolegate_domain::{
    LegacyPrivilegeLevel, Permission, PermissionId, PermissionKey, PermissionReference, Role,
    RoleId, RoleProfile,
};

use crate::{
    AccessContext, ActorGrants, AssignedActorSummary, AuditEvent, AuditRepository,
    EnforcementGateway, PolicyEvaluator, PolicyRepository, RoleDeletion, RoleDetail,
    RoleRepository, RoleSummary, SaveRoleInput,
};

use super::{DeleteRoleError, RoleAdminService};

fn key(resource: &str, action: &str) -> PermissionKey {
    let Ok(key) = PermissionKey::new(resource, action) else {
        panic!("fixture key should be valid");
    };
    key
}

struct FakePolicyRepository {
    grants: HashMap<ActorId, ActorGrants>,
    catalog: Vec<Permission>,
}

#[async_trait]
impl PolicyRepository for FakePolicyRepository {
    async fn load_actor_grants(&self, actor_id: ActorId) -> AppResult<Option<ActorGrants>> {
        Ok(self.grants.get(&actor_id).cloned())
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        Ok(self.catalog.clone())
    }
}

#[derive(Default)]
struct FakeRoleRepository {
    roles: Mutex<Vec<(Role, BTreeSet<PermissionId>)>>,
    assignments: Mutex<Vec<(RoleId, ActorId)>>,
    mutations: Mutex<usize>,
}

impl FakeRoleRepository {
    async fn seed(&self, name: &str, is_system_role: bool) -> RoleId {
        let Ok(profile) = RoleProfile::new(name, None, None, true) else {
            panic!("fixture profile should be valid");
        };
        let now = Utc::now();
        let role = Role::new(RoleId::new(), profile, is_system_role, now, now);
        let role_id = role.id();
        self.roles.lock().await.push((role, BTreeSet::new()));
        role_id
    }
}

#[async_trait]
impl RoleRepository for FakeRoleRepository {
    async fn list_roles(&self) -> AppResult<Vec<RoleSummary>> {
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .map(|(role, grants)| RoleSummary {
                role: role.clone(),
                permission_count: grants.len() as u64,
                assigned_actor_count: 0,
            })
            .collect())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|(role, _)| role.id() == role_id)
            .map(|(role, _)| role.clone()))
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|(role, _)| role.name() == name)
            .map(|(role, _)| role.clone()))
    }

    async fn role_detail(&self, role_id: RoleId) -> AppResult<Option<RoleDetail>> {
        let assignments = self.assignments.lock().await.clone();
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|(role, _)| role.id() == role_id)
            .map(|(role, _)| RoleDetail {
                role: role.clone(),
                permissions: Vec::new(),
                assigned_actors: assignments
                    .iter()
                    .filter(|(assigned_role_id, _)| *assigned_role_id == role_id)
                    .map(|(_, actor_id)| AssignedActorSummary {
                        actor_id: *actor_id,
                        display_name: actor_id.to_string(),
                        email: None,
                        privilege_level: LegacyPrivilegeLevel::new(0),
                        assigned_at: Utc::now(),
                    })
                    .collect(),
            }))
    }

    async fn create_role(
        &self,
        profile: RoleProfile,
        permission_ids: BTreeSet<PermissionId>,
    ) -> AppResult<Role> {
        *self.mutations.lock().await += 1;
        let now = Utc::now();
        let role = Role::new(RoleId::new(), profile, false, now, now);
        self.roles.lock().await.push((role.clone(), permission_ids));
        Ok(role)
    }

    async fn replace_role(
        &self,
        role_id: RoleId,
        profile: RoleProfile,
        permission_ids: BTreeSet<PermissionId>,
    ) -> AppResult<Role> {
        *self.mutations.lock().await += 1;
        let mut roles = self.roles.lock().await;
        let Some(entry) = roles.iter_mut().find(|(role, _)| role.id() == role_id) else {
            return Err(AppError::NotFound("role".to_owned()));
        };
        entry.0 = entry.0.with_profile(profile, Utc::now());
        entry.1 = permission_ids;
        Ok(entry.0.clone())
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<RoleDeletion> {
        let assigned_actor_count = self
            .assignments
            .lock()
            .await
            .iter()
            .filter(|(assigned_role_id, _)| *assigned_role_id == role_id)
            .count() as u64;
        if assigned_actor_count > 0 {
            return Ok(RoleDeletion::InUse {
                assigned_actor_count,
            });
        }

        *self.mutations.lock().await += 1;
        self.roles.lock().await.retain(|(role, _)| role.id() != role_id);
        Ok(RoleDeletion::Deleted)
    }

    async fn assign_role(&self, role_id: RoleId, actor_id: ActorId) -> AppResult<()> {
        let mut assignments = self.assignments.lock().await;
        if !assignments.contains(&(role_id, actor_id)) {
            assignments.push((role_id, actor_id));
        }
        Ok(())
    }

    async fn unassign_role(&self, role_id: RoleId, actor_id: ActorId) -> AppResult<()> {
        self.assignments
            .lock()
            .await
            .retain(|entry| entry != &(role_id, actor_id));
        Ok(())
    }
}

#[derive(Default)]
struct FakeAuditRepository {
    events: Mutex<Vec<AuditEvent>>,
    failing: AtomicBool,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("audit store unavailable".to_owned()));
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}

struct Harness {
    service: RoleAdminService,
    gateway: EnforcementGateway,
    roles: Arc<FakeRoleRepository>,
    audit: Arc<FakeAuditRepository>,
    actor_id: ActorId,
}

impl Harness {
    fn new(granted: &[(&str, &str)]) -> Self {
        let actor_id = ActorId::new();
        let policy = Arc::new(FakePolicyRepository {
            grants: HashMap::from([(
                actor_id,
                ActorGrants {
                    is_superadmin: false,
                    permissions: granted
                        .iter()
                        .map(|(resource, action)| key(resource, action))
                        .collect(),
                },
            )]),
            catalog: vec![
                Permission::new(PermissionId::new(), key("jobs", "view"), "View jobs"),
                Permission::new(PermissionId::new(), key("jobs", "edit"), "Edit jobs"),
                Permission::new(PermissionId::new(), key("roles", "view"), "View roles"),
            ],
        });
        let gateway =
            EnforcementGateway::new(PolicyEvaluator::new(policy.clone()), Duration::from_secs(2));
        let roles = Arc::new(FakeRoleRepository::default());
        let audit = Arc::new(FakeAuditRepository::default());
        let service =
            RoleAdminService::new(gateway.clone(), policy, roles.clone(), audit.clone());

        Self {
            service,
            gateway,
            roles,
            audit,
            actor_id,
        }
    }

    fn context(&self) -> AccessContext {
        let Ok(context) = self
            .gateway
            .authenticate(Some(UserIdentity::new(self.actor_id, "Admin", None)))
        else {
            panic!("identity should authenticate");
        };
        context
    }
}

fn input(name: &str, permissions: &[&str]) -> SaveRoleInput {
    SaveRoleInput {
        name: name.to_owned(),
        description: Some("Screens candidates".to_owned()),
        color: Some("#1d4ed8".to_owned()),
        is_active: true,
        permissions: permissions
            .iter()
            .map(|value| {
                let Ok(reference) = PermissionReference::from_transport(value) else {
                    panic!("fixture reference should parse");
                };
                reference
            })
            .collect(),
    }
}

#[tokio::test]
async fn create_role_requires_create_permission() {
    let harness = Harness::new(&[("roles", "view")]);

    let result = harness
        .service
        .create_role(&harness.context(), input("Recruiter", &["jobs:view"]))
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(ref message)) if message.contains("roles:create")));
    assert_eq!(*harness.roles.mutations.lock().await, 0);
}

#[tokio::test]
async fn create_role_persists_and_audits() {
    let harness = Harness::new(&[("roles", "create")]);

    let result = harness
        .service
        .create_role(&harness.context(), input("Recruiter", &["jobs:view", "jobs:view"]))
        .await;

    let Ok(detail) = result else {
        panic!("create should succeed");
    };
    assert_eq!(detail.role.name(), "Recruiter");
    assert_eq!(detail.role.profile().color().as_str(), "#1d4ed8");
    assert_eq!(harness.roles.roles.lock().await[0].1.len(), 1);

    let events = harness.audit.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].actor_id, harness.actor_id);
}

#[tokio::test]
async fn unresolvable_permission_rejects_before_any_write() {
    let harness = Harness::new(&[("roles", "create")]);

    let result = harness
        .service
        .create_role(
            &harness.context(),
            input("Recruiter", &["jobs:view", "jobs:teleport", "ghosts:view"]),
        )
        .await;

    assert!(matches!(
        result,
        Err(AppError::Validation(ref message))
            if message.contains("jobs:teleport") && message.contains("ghosts:view")
    ));
    assert_eq!(*harness.roles.mutations.lock().await, 0);
    assert!(harness.audit.events.lock().await.is_empty());
}

#[tokio::test]
async fn empty_permission_set_is_rejected() {
    let harness = Harness::new(&[("roles", "create")]);

    let result = harness
        .service
        .create_role(&harness.context(), input("Recruiter", &[]))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn duplicate_name_is_a_validation_error() {
    let harness = Harness::new(&[("roles", "create")]);
    harness.roles.seed("Recruiter", false).await;

    let result = harness
        .service
        .create_role(&harness.context(), input("Recruiter", &["jobs:view"]))
        .await;

    assert!(matches!(result, Err(AppError::Validation(ref message)) if message.contains("already exists")));
}

#[tokio::test]
async fn update_role_rejects_blank_name() {
    let harness = Harness::new(&[("roles", "edit")]);
    let role_id = harness.roles.seed("Recruiter", false).await;

    let result = harness
        .service
        .update_role(&harness.context(), role_id, input("  ", &["jobs:view"]))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(*harness.roles.mutations.lock().await, 0);
}

#[tokio::test]
async fn update_role_rejects_rename_into_existing_name() {
    let harness = Harness::new(&[("roles", "edit")]);
    let role_id = harness.roles.seed("Recruiter", false).await;
    harness.roles.seed("Interviewer", false).await;

    let result = harness
        .service
        .update_role(&harness.context(), role_id, input("Interviewer", &["jobs:view"]))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(*harness.roles.mutations.lock().await, 0);
}

#[tokio::test]
async fn system_role_keeps_its_name_but_other_fields_change() {
    let harness = Harness::new(&[("roles", "edit")]);
    let role_id = harness.roles.seed("Administrator", true).await;

    let renamed = harness
        .service
        .update_role(&harness.context(), role_id, input("Root", &["jobs:view"]))
        .await;
    assert!(matches!(renamed, Err(AppError::Validation(_))));

    let mut recolored = input("Administrator", &["jobs:edit"]);
    recolored.color = Some("#000000".to_owned());
    let updated = harness
        .service
        .update_role(&harness.context(), role_id, recolored)
        .await;

    let Ok(detail) = updated else {
        panic!("non-name edits of a system role should succeed");
    };
    assert_eq!(detail.role.profile().color().as_str(), "#000000");
    assert!(detail.role.is_system_role());
}

#[tokio::test]
async fn update_role_on_unknown_id_is_not_found() {
    let harness = Harness::new(&[("roles", "edit")]);

    let result = harness
        .service
        .update_role(&harness.context(), RoleId::new(), input("Recruiter", &["jobs:view"]))
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn delete_system_role_is_a_conflict_even_for_full_grants() {
    let harness = Harness::new(&[("roles", "delete"), ("roles", "edit"), ("roles", "create")]);
    let role_id = harness.roles.seed("Administrator", true).await;

    let result = harness.service.delete_role(&harness.context(), role_id).await;

    assert!(matches!(
        result,
        Err(DeleteRoleError::App(AppError::Conflict(_)))
    ));
}

#[tokio::test]
async fn delete_assigned_role_reports_exact_blocking_count() {
    let harness = Harness::new(&[("roles", "delete")]);
    let role_id = harness.roles.seed("Recruiter", false).await;
    for _ in 0..3 {
        harness
            .roles
            .assignments
            .lock()
            .await
            .push((role_id, ActorId::new()));
    }

    let result = harness.service.delete_role(&harness.context(), role_id).await;

    let Err(error) = result else {
        panic!("delete should be blocked");
    };
    assert!(matches!(
        error,
        DeleteRoleError::InUse {
            assigned_actor_count: 3,
            ..
        }
    ));
    assert!(matches!(AppError::from(error), AppError::Conflict(ref message) if message.contains(" 3 ")));
    assert!(harness.roles.find_role(role_id).await.ok().flatten().is_some());
}

#[tokio::test]
async fn delete_unassigned_role_removes_it() {
    let harness = Harness::new(&[("roles", "delete")]);
    let role_id = harness.roles.seed("Recruiter", false).await;

    let result = harness.service.delete_role(&harness.context(), role_id).await;

    assert!(result.is_ok());
    assert!(harness.roles.find_role(role_id).await.ok().flatten().is_none());
    assert_eq!(harness.audit.events.lock().await.len(), 1);
}

#[tokio::test]
async fn audit_failure_after_delete_reports_error_but_keeps_the_delete() {
    let harness = Harness::new(&[("roles", "delete")]);
    let role_id = harness.roles.seed("Recruiter", false).await;
    harness.audit.failing.store(true, Ordering::SeqCst);

    let result = harness.service.delete_role(&harness.context(), role_id).await;

    assert!(matches!(result, Err(DeleteRoleError::App(AppError::Internal(_)))));
    assert!(harness.roles.find_role(role_id).await.ok().flatten().is_none());
    assert!(harness.audit.events.lock().await.is_empty());
}

#[tokio::test]
async fn assign_role_requires_user_edit_and_active_role() {
    let harness = Harness::new(&[("users", "edit")]);
    let role_id = harness.roles.seed("Recruiter", false).await;
    let target = ActorId::new();

    assert!(
        harness
            .service
            .assign_role(&harness.context(), role_id, target)
            .await
            .is_ok()
    );
    assert_eq!(harness.roles.assignments.lock().await.len(), 1);

    let denied = Harness::new(&[("roles", "edit")]);
    let other_role = denied.roles.seed("Recruiter", false).await;
    let result = denied
        .service
        .assign_role(&denied.context(), other_role, target)
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn list_permissions_requires_view() {
    let harness = Harness::new(&[]);

    let result = harness.service.list_permissions(&harness.context()).await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}
