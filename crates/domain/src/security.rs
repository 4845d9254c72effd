use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rolegate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a permission catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionId(Uuid);

impl PermissionId {
    /// Creates a random permission identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a permission identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PermissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PermissionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// The atomic grantable capability: an action performed on a resource.
///
/// Keys order by resource first, then action, so sets of keys group naturally
/// by resource when rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey {
    resource: String,
    action: String,
}

impl PermissionKey {
    /// Creates a validated permission key.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> AppResult<Self> {
        let resource = validate_segment("resource", resource.into())?;
        let action = validate_segment("action", action.into())?;

        Ok(Self { resource, action })
    }

    /// Returns the resource name.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource.as_str()
    }

    /// Returns the action name.
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_str()
    }
}

impl Display for PermissionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.resource, self.action)
    }
}

impl FromStr for PermissionKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((resource, action)) = value.trim().split_once(':') else {
            return Err(AppError::Validation(format!(
                "permission '{value}' must use the 'resource:action' form"
            )));
        };

        Self::new(resource, action)
    }
}

fn validate_segment(label: &str, value: String) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!(
            "permission {label} must not be empty"
        )));
    }

    if trimmed
        .chars()
        .any(|character| character == ':' || character.is_whitespace())
    {
        return Err(AppError::Validation(format!(
            "permission {label} '{trimmed}' must not contain ':' or whitespace"
        )));
    }

    Ok(trimmed.to_owned())
}

/// Permission catalog entry. Catalog rows are seeded once and read-only at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    id: PermissionId,
    key: PermissionKey,
    description: String,
}

impl Permission {
    /// Creates a catalog entry.
    #[must_use]
    pub fn new(id: PermissionId, key: PermissionKey, description: impl Into<String>) -> Self {
        Self {
            id,
            key,
            description: description.into(),
        }
    }

    /// Returns the catalog identifier.
    #[must_use]
    pub fn id(&self) -> PermissionId {
        self.id
    }

    /// Returns the `(resource, action)` pair.
    #[must_use]
    pub fn key(&self) -> &PermissionKey {
        &self.key
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }
}

/// Reference to a catalog permission submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PermissionReference {
    /// Reference by catalog row id.
    Id(PermissionId),
    /// Reference by `(resource, action)` pair.
    Key(PermissionKey),
}

impl PermissionReference {
    /// Parses a transport value: a UUID catalog id or a `resource:action` key.
    pub fn from_transport(value: &str) -> AppResult<Self> {
        if let Ok(uuid) = Uuid::parse_str(value.trim()) {
            return Ok(Self::Id(PermissionId::from_uuid(uuid)));
        }

        PermissionKey::from_str(value).map(Self::Key)
    }

    /// Returns whether this reference points at the catalog entry.
    #[must_use]
    pub fn matches(&self, permission: &Permission) -> bool {
        match self {
            Self::Id(id) => permission.id() == *id,
            Self::Key(key) => permission.key() == key,
        }
    }
}

impl Display for PermissionReference {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(formatter, "{id}"),
            Self::Key(key) => write!(formatter, "{key}"),
        }
    }
}

/// Stable audit actions emitted by role administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a role is created.
    SecurityRoleCreated,
    /// Emitted when a role's fields or grants are replaced.
    SecurityRoleUpdated,
    /// Emitted when a role is deleted.
    SecurityRoleDeleted,
    /// Emitted when a role is assigned to an actor.
    SecurityRoleAssigned,
    /// Emitted when a role is removed from an actor.
    SecurityRoleUnassigned,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityRoleCreated => "security.role.created",
            Self::SecurityRoleUpdated => "security.role.updated",
            Self::SecurityRoleDeleted => "security.role.deleted",
            Self::SecurityRoleAssigned => "security.role.assigned",
            Self::SecurityRoleUnassigned => "security.role.unassigned",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;

    use super::{PermissionId, PermissionKey, PermissionReference};

    #[test]
    fn permission_key_parses_resource_action_form() {
        let parsed = PermissionKey::from_str("jobs:edit");
        assert!(matches!(
            parsed,
            Ok(ref key) if key.resource() == "jobs" && key.action() == "edit"
        ));
    }

    #[test]
    fn permission_key_rejects_missing_separator() {
        assert!(PermissionKey::from_str("jobs").is_err());
        assert!(PermissionKey::from_str("jobs:").is_err());
        assert!(PermissionKey::from_str(":edit").is_err());
    }

    #[test]
    fn permission_key_rejects_nested_separator() {
        assert!(PermissionKey::from_str("jobs:edit:all").is_err());
    }

    #[test]
    fn reference_prefers_uuid_form() {
        let id = PermissionId::new();
        let parsed = PermissionReference::from_transport(id.to_string().as_str());
        assert_eq!(parsed.ok(), Some(PermissionReference::Id(id)));
    }

    #[test]
    fn reference_falls_back_to_key_form() {
        let parsed = PermissionReference::from_transport("roles:view");
        assert!(matches!(parsed, Ok(PermissionReference::Key(_))));
    }

    proptest! {
        #[test]
        fn display_form_parses_back(
            resource in "[a-z][a-z0-9_]{0,15}",
            action in "[a-z][a-z0-9_]{0,15}",
        ) {
            let key = PermissionKey::new(resource.clone(), action.clone());
            prop_assert!(key.is_ok());
            if let Ok(key) = key {
                let restored = PermissionKey::from_str(key.to_string().as_str());
                prop_assert_eq!(restored.ok(), Some(key));
            }
        }

        #[test]
        fn whitespace_never_survives_in_a_key(resource in "[a-z]{1,8}", padding in " {0,3}") {
            let key = PermissionKey::new(format!("{padding}{resource}{padding}"), "view");
            prop_assert!(key.is_ok());
            if let Ok(key) = key {
                prop_assert_eq!(key.resource(), resource.as_str());
            }
        }
    }
}
