use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Authorization migration state of one protected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// Enforced through the gateway or the policy evaluator.
    Migrated,
    /// Enforced only by comparing the legacy privilege level.
    LegacyOnly,
    /// No enforcement detected.
    Unprotected,
}

impl MigrationState {
    /// Returns a stable label for reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Migrated => "migrated",
            Self::LegacyOnly => "legacy_only",
            Self::Unprotected => "unprotected",
        }
    }
}

impl Display for MigrationState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
