use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use rolegate_domain::MigrationState;
use serde::Serialize;

use crate::HandlerRecord;

/// Fixed remediation checklist printed after every report.
pub const REMEDIATIONS: [&str; 6] = [
    "Wrap every exported handler in withPermission(resource, action) or requirePermissions([...]).",
    "Pass literal resource and action names to enforcement calls so they can be verified.",
    "Replace privilegeLevel comparisons with explicit resource:action checks.",
    "Add missing pairs to the permission catalog seed, or correct the pair names.",
    "Keep intentionally public endpoints under an allow-listed segment (auth, health, public, setup).",
    "Re-run the audit with --deny-issues in CI once every unit is migrated.",
];

/// Unit that could not be analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedUnit {
    /// Unit path relative to the source root.
    pub path: String,
    /// Read or parse failure.
    pub reason: String,
}

/// Totals of one audit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    /// Units analyzed.
    pub units_scanned: usize,
    /// Issue tags across all units.
    pub issues: usize,
    /// Permission catalog size.
    pub catalog_size: usize,
    /// Units enforced through the gateway or evaluator.
    pub migrated: usize,
    /// Units guarded only by the legacy level.
    pub legacy_only: usize,
    /// Units without enforcement.
    pub unprotected: usize,
    /// Units skipped on failure.
    pub skipped: usize,
}

/// Grouped audit output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Units grouped by inferred resource, ordered by path within a group.
    pub groups: BTreeMap<String, Vec<HandlerRecord>>,
    /// Units skipped on failure.
    pub skipped: Vec<SkippedUnit>,
    /// Totals.
    pub summary: AuditSummary,
    /// Remediation checklist.
    pub remediations: &'static [&'static str],
}

impl AuditReport {
    /// Builds a report from analyzed and skipped units.
    #[must_use]
    pub fn new(records: Vec<HandlerRecord>, mut skipped: Vec<SkippedUnit>, catalog_size: usize) -> Self {
        let count = |state: MigrationState| {
            records
                .iter()
                .filter(|record| record.classification == state)
                .count()
        };
        skipped.sort_by(|left, right| left.path.cmp(&right.path));

        let summary = AuditSummary {
            units_scanned: records.len(),
            issues: records.iter().map(|record| record.issues.len()).sum(),
            catalog_size,
            migrated: count(MigrationState::Migrated),
            legacy_only: count(MigrationState::LegacyOnly),
            unprotected: count(MigrationState::Unprotected),
            skipped: skipped.len(),
        };

        let mut groups: BTreeMap<String, Vec<HandlerRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.resource.clone()).or_default().push(record);
        }
        for records in groups.values_mut() {
            records.sort_by(|left, right| left.path.cmp(&right.path));
        }

        Self {
            groups,
            skipped,
            summary,
            remediations: &REMEDIATIONS,
        }
    }

    /// Iterates over every analyzed unit.
    pub fn records(&self) -> impl Iterator<Item = &HandlerRecord> {
        self.groups.values().flatten()
    }

    /// Finds a unit by its relative path.
    #[must_use]
    pub fn record(&self, path: &str) -> Option<&HandlerRecord> {
        self.records().find(|record| record.path == path)
    }

    /// Returns whether any unit carries an issue tag.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        self.summary.issues > 0
    }
}

impl Display for AuditReport {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(formatter, "Authorization consistency report")?;

        for (resource, records) in &self.groups {
            writeln!(formatter)?;
            writeln!(formatter, "[{resource}]")?;
            for record in records {
                writeln!(formatter, "  {}", record.path)?;
                writeln!(formatter, "    methods: {}", list_or_none(&record.http_methods))?;
                writeln!(formatter, "    state: {}", record.classification)?;
                if !record.enforcement_calls.is_empty() {
                    writeln!(
                        formatter,
                        "    enforcement: {}",
                        join(&record.enforcement_calls)
                    )?;
                }
                if !record.legacy_checks.is_empty() {
                    writeln!(formatter, "    legacy checks: {}", join(&record.legacy_checks))?;
                }
                if record.allow_listed {
                    writeln!(formatter, "    allow-listed")?;
                }
                if !record.issues.is_empty() {
                    let tags = record
                        .issues
                        .iter()
                        .map(|issue| issue.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    writeln!(formatter, "    issues: {tags}")?;
                }
            }
        }

        if !self.skipped.is_empty() {
            writeln!(formatter)?;
            writeln!(formatter, "Skipped units:")?;
            for skipped in &self.skipped {
                writeln!(formatter, "  {}: {}", skipped.path, skipped.reason)?;
            }
        }

        let summary = self.summary;
        writeln!(formatter)?;
        writeln!(
            formatter,
            "Summary: {} units scanned, {} issues, {} catalog permissions \
             (migrated {}, legacy-only {}, unprotected {}, skipped {})",
            summary.units_scanned,
            summary.issues,
            summary.catalog_size,
            summary.migrated,
            summary.legacy_only,
            summary.unprotected,
            summary.skipped
        )?;

        writeln!(formatter)?;
        writeln!(formatter, "Remediation:")?;
        for (index, step) in self.remediations.iter().enumerate() {
            writeln!(formatter, "  {}. {step}", index + 1)?;
        }

        Ok(())
    }
}

fn list_or_none(values: &[String]) -> String {
    if values.is_empty() {
        return "none".to_owned();
    }
    values.join(", ")
}

fn join<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
