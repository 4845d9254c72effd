use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use rolegate_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Color assigned to roles created without one.
pub const DEFAULT_ROLE_COLOR: &str = "#6B7280";

/// Stable identifier of a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
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

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Badge color in `#RRGGBB` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleColor(String);

impl RoleColor {
    /// Creates a validated color, keeping the submitted digit case.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or_default();

        if digits.len() != 6 || !digits.chars().all(|character| character.is_ascii_hexdigit()) {
            return Err(AppError::Validation(format!(
                "role color '{trimmed}' must use the '#RRGGBB' form"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the color string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for RoleColor {
    fn default() -> Self {
        Self(DEFAULT_ROLE_COLOR.to_owned())
    }
}

/// Editable scalar fields of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleProfile {
    name: NonEmptyString,
    description: Option<String>,
    color: RoleColor,
    is_active: bool,
}

impl RoleProfile {
    /// Creates a validated role profile.
    ///
    /// The name is trimmed but keeps its casing; uniqueness is compared on the
    /// trimmed value exactly as stored.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        color: Option<String>,
        is_active: bool,
    ) -> AppResult<Self> {
        let name = name.into();
        let name = NonEmptyString::new(name.trim())
            .map_err(|_| AppError::Validation("role name must not be empty".to_owned()))?;

        let description = description.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        let color = match color {
            Some(value) if !value.trim().is_empty() => RoleColor::new(value)?,
            _ => RoleColor::default(),
        };

        Ok(Self {
            name,
            description,
            color,
            is_active,
        })
    }

    /// Returns the role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the badge color.
    #[must_use]
    pub fn color(&self) -> &RoleColor {
        &self.color
    }

    /// Returns whether grants of this role count toward evaluation.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Persisted role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    profile: RoleProfile,
    is_system_role: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Role {
    /// Creates a role from its stored parts.
    #[must_use]
    pub fn new(
        id: RoleId,
        profile: RoleProfile,
        is_system_role: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            profile,
            is_system_role,
            created_at,
            updated_at,
        }
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the editable scalar fields.
    #[must_use]
    pub fn profile(&self) -> &RoleProfile {
        &self.profile
    }

    /// Returns the role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.profile.name()
    }

    /// System roles keep their name forever and cannot be deleted.
    #[must_use]
    pub fn is_system_role(&self) -> bool {
        self.is_system_role
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Checks that replacing the profile keeps system-role invariants.
    pub fn ensure_profile_change_allowed(&self, next: &RoleProfile) -> AppResult<()> {
        if self.is_system_role && next.name() != self.name() {
            return Err(AppError::Validation(format!(
                "system role '{}' cannot be renamed",
                self.name()
            )));
        }

        Ok(())
    }

    /// Checks that the role is not protected against deletion.
    pub fn ensure_deletable(&self) -> AppResult<()> {
        if self.is_system_role {
            return Err(AppError::Conflict(format!(
                "system role '{}' cannot be deleted",
                self.name()
            )));
        }

        Ok(())
    }

    /// Returns a copy with the profile replaced and the update timestamp moved.
    #[must_use]
    pub fn with_profile(&self, profile: RoleProfile, updated_at: DateTime<Utc>) -> Self {
        Self {
            profile,
            updated_at,
            ..self.clone()
        }
    }
}
