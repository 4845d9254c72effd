use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rolegate_domain::PermissionKey;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::UnitAnalyzer;
use crate::{AuditConfig, AuditReport, HandlerRecord, SkippedUnit};

/// Directories never descended into.
const IGNORED_DIRECTORIES: [&str; 5] = ["node_modules", ".git", ".next", "target", "dist"];

/// Failure that aborts a whole audit run.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The source root is missing or not a directory.
    #[error("source root '{0}' is not a readable directory")]
    InvalidRoot(String),
    /// A configured name produced an invalid detector.
    #[error("invalid detector pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Read-only static analysis over a handler source tree.
#[derive(Debug)]
pub struct ConsistencyAuditor {
    analyzer: UnitAnalyzer,
}

impl ConsistencyAuditor {
    /// Compiles detectors for the config and catalog.
    pub fn new(config: AuditConfig, catalog: BTreeSet<PermissionKey>) -> Result<Self, AuditError> {
        Ok(Self {
            analyzer: UnitAnalyzer::new(config, catalog)?,
        })
    }

    /// Analyzes one unit's source text.
    #[must_use]
    pub fn analyze_source(&self, relative_path: &str, source: &str) -> HandlerRecord {
        self.analyzer.analyze(relative_path, source)
    }

    /// Scans every unit under `source_root`.
    ///
    /// Units that cannot be read are reported as skipped; only an unusable root
    /// fails the run.
    pub fn audit(&self, source_root: &Path) -> Result<AuditReport, AuditError> {
        if !source_root.is_dir() {
            return Err(AuditError::InvalidRoot(source_root.display().to_string()));
        }

        let mut units = Vec::new();
        let mut skipped = Vec::new();
        self.collect_units(source_root, source_root, &mut units, &mut skipped);
        units.sort();
        debug!(units = units.len(), "collected protected-operation units");

        let outcomes = units
            .par_iter()
            .map(|path| {
                let relative = relative_path(source_root, path);
                fs::read_to_string(path)
                    .map(|source| self.analyzer.analyze(&relative, &source))
                    .map_err(|error| SkippedUnit {
                        path: relative,
                        reason: error.to_string(),
                    })
            })
            .collect::<Vec<_>>();

        let mut records = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(record) => records.push(record),
                Err(unit) => {
                    warn!(path = %unit.path, reason = %unit.reason, "skipping unreadable unit");
                    skipped.push(unit);
                }
            }
        }

        Ok(AuditReport::new(
            records,
            skipped,
            self.analyzer.catalog_size(),
        ))
    }

    fn collect_units(
        &self,
        root: &Path,
        directory: &Path,
        units: &mut Vec<PathBuf>,
        skipped: &mut Vec<SkippedUnit>,
    ) {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(error) => {
                let path = relative_path(root, directory);
                warn!(%path, %error, "skipping unreadable directory");
                skipped.push(SkippedUnit {
                    path,
                    reason: error.to_string(),
                });
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_symlink() && path.is_dir() {
                debug!(path = %relative_path(root, &path), "not following symlinked directory");
                continue;
            }

            if file_type.is_dir() {
                if !IGNORED_DIRECTORIES.contains(&name.as_str()) {
                    self.collect_units(root, &path, units, skipped);
                }
            } else if self.analyzer.config().is_unit_file(&name) {
                units.push(path);
            }
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
