//! Rolegate permission consistency audit.

#![forbid(unsafe_code)]

mod audit_cli;
mod catalog;

use std::process::ExitCode;

use clap::Parser;
use rolegate_auditor::{AuditConfig, ConsistencyAuditor};
use rolegate_core::AppError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::audit_cli::AuditCli;

#[tokio::main]
async fn main() -> Result<ExitCode, AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = AuditCli::parse();
    let catalog = catalog::load_catalog(cli.catalog.as_deref(), cli.database_url.as_deref()).await?;
    if catalog.is_empty() {
        warn!("permission catalog is empty; unknown permission checks are skipped");
    }

    let auditor = ConsistencyAuditor::new(cli.audit_config(), catalog)
        .map_err(|error| AppError::Internal(format!("failed to build auditor: {error}")))?;

    info!(source_root = %cli.source_root.display(), "scanning route handlers");
    let source_root = cli.source_root.clone();
    let report = tokio::task::spawn_blocking(move || auditor.audit(&source_root))
        .await
        .map_err(|error| AppError::Internal(format!("audit task failed: {error}")))?
        .map_err(|error| AppError::Validation(error.to_string()))?;

    if cli.json {
        let rendered = serde_json::to_string_pretty(&report).map_err(|error| {
            AppError::Internal(format!("failed to serialize audit report: {error}"))
        })?;
        println!("{rendered}");
    } else {
        print!("{report}");
    }

    if cli.deny_issues && report.has_issues() {
        warn!(
            issues = report.summary.issues,
            "audit found issues; failing the run"
        );
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

impl AuditCli {
    fn audit_config(&self) -> AuditConfig {
        AuditConfig::default()
            .with_allow_list(self.allow.iter().cloned())
            .with_enforcement_functions(self.enforcement_function.iter().cloned())
            .with_unit_file_names(self.unit_file.clone())
    }
}
