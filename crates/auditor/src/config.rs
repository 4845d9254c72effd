/// Knobs of one audit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    /// File names that mark a protected-operation unit.
    pub unit_file_names: Vec<String>,
    /// Path segments whose units may stay unprotected.
    pub allow_list_segments: Vec<String>,
    /// Gateway wrappers taking explicit `(resource, action)` pairs.
    pub enforcement_functions: Vec<String>,
    /// Direct policy evaluator entry points.
    pub evaluator_functions: Vec<String>,
    /// Field names of the deprecated privilege level.
    pub legacy_fields: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            unit_file_names: owned(&["route.ts", "route.js", "route.tsx", "route.jsx"]),
            allow_list_segments: owned(&["auth", "health", "public", "setup"]),
            enforcement_functions: owned(&[
                "withPermission",
                "withPermissions",
                "withAnyPermission",
                "requirePermission",
                "requirePermissions",
            ]),
            evaluator_functions: owned(&["hasPermission", "hasPermissions", "checkPermission"]),
            legacy_fields: owned(&["privilegeLevel", "privilege_level"]),
        }
    }
}

impl AuditConfig {
    /// Adds allow-listed segments, skipping ones already present.
    #[must_use]
    pub fn with_allow_list(mut self, segments: impl IntoIterator<Item = String>) -> Self {
        extend_unique(&mut self.allow_list_segments, segments);
        self
    }

    /// Adds helper names treated as gateway wrappers.
    #[must_use]
    pub fn with_enforcement_functions(mut self, names: impl IntoIterator<Item = String>) -> Self {
        extend_unique(&mut self.enforcement_functions, names);
        self
    }

    /// Replaces the unit file names when any are given.
    #[must_use]
    pub fn with_unit_file_names(mut self, names: Vec<String>) -> Self {
        if !names.is_empty() {
            self.unit_file_names = names;
        }
        self
    }

    pub(crate) fn is_unit_file(&self, file_name: &str) -> bool {
        self.unit_file_names.iter().any(|name| name == file_name)
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

fn extend_unique(target: &mut Vec<String>, values: impl IntoIterator<Item = String>) {
    for value in values {
        let value = value.trim().to_owned();
        if !value.is_empty() && !target.contains(&value) {
            target.push(value);
        }
    }
}
