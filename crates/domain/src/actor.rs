use serde::{Deserialize, Serialize};

/// Deprecated coarse authorization tier stored on the actor row.
///
/// Kept readable for migration reporting only. Policy evaluation never consults it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LegacyPrivilegeLevel(i32);

impl LegacyPrivilegeLevel {
    /// Wraps a stored privilege level.
    #[must_use]
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw tier value.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.0
    }
}
