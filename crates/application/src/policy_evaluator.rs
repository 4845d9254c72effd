use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rolegate_core::{ActorId, AppResult};
use rolegate_domain::PermissionKey;

use crate::{ActorGrants, PolicyRepository};

/// Per-check decisions produced by one bulk evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDecisions {
    decisions: BTreeMap<PermissionKey, bool>,
}

impl PermissionDecisions {
    /// Returns the decision for a key, if it was evaluated.
    #[must_use]
    pub fn decision(&self, key: &PermissionKey) -> Option<bool> {
        self.decisions.get(key).copied()
    }

    /// Returns whether the key was evaluated and granted.
    #[must_use]
    pub fn is_granted(&self, key: &PermissionKey) -> bool {
        self.decision(key).unwrap_or(false)
    }

    /// Iterates over evaluated keys and their decisions.
    pub fn iter(&self) -> impl Iterator<Item = (&PermissionKey, bool)> {
        self.decisions.iter().map(|(key, granted)| (key, *granted))
    }

    /// Returns the number of evaluated keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /// Returns whether nothing was evaluated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Merges decisions from a later evaluation.
    pub fn extend(&mut self, other: PermissionDecisions) {
        self.decisions.extend(other.decisions);
    }
}

impl FromIterator<(PermissionKey, bool)> for PermissionDecisions {
    fn from_iter<T: IntoIterator<Item = (PermissionKey, bool)>>(iter: T) -> Self {
        Self {
            decisions: iter.into_iter().collect(),
        }
    }
}

/// Stateless decision function over the policy store.
///
/// Every call re-reads the store, so role edits are visible to the next check.
#[derive(Clone)]
pub struct PolicyEvaluator {
    repository: Arc<dyn PolicyRepository>,
}

impl PolicyEvaluator {
    /// Creates an evaluator from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn PolicyRepository>) -> Self {
        Self { repository }
    }

    /// Returns whether the actor holds the permission.
    ///
    /// Unknown actors are denied.
    pub async fn has_permission(&self, actor_id: ActorId, key: &PermissionKey) -> AppResult<bool> {
        let grants = self.load_grants(actor_id).await?;
        Ok(grants_allow(&grants, key))
    }

    /// Evaluates several checks against one read of the actor's grants.
    pub async fn has_permissions(
        &self,
        actor_id: ActorId,
        checks: &[PermissionKey],
    ) -> AppResult<PermissionDecisions> {
        let grants = self.load_grants(actor_id).await?;

        Ok(checks
            .iter()
            .map(|key| (key.clone(), grants_allow(&grants, key)))
            .collect())
    }

    /// Returns every permission the actor holds.
    ///
    /// A superadmin holds the whole catalog.
    pub async fn permission_set(&self, actor_id: ActorId) -> AppResult<BTreeSet<PermissionKey>> {
        let grants = self.load_grants(actor_id).await?;
        if !grants.is_superadmin {
            return Ok(grants.permissions);
        }

        Ok(self
            .repository
            .list_permissions()
            .await?
            .into_iter()
            .map(|permission| permission.key().clone())
            .collect())
    }

    async fn load_grants(&self, actor_id: ActorId) -> AppResult<ActorGrants> {
        Ok(self
            .repository
            .load_actor_grants(actor_id)
            .await?
            .unwrap_or_default())
    }
}

fn grants_allow(grants: &ActorGrants, key: &PermissionKey) -> bool {
    grants.is_superadmin || grants.permissions.contains(key)
}

#[cfg(test)]
mod tests;
