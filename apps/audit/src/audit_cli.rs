use std::path::PathBuf;

use clap::Parser;

/// Reports how route handlers enforce permissions.
#[derive(Debug, Parser)]
#[command(name = "rolegate-audit")]
#[command(about = "Audits route handlers for permission enforcement consistency")]
pub struct AuditCli {
    /// Tree of route handler units to scan
    #[arg(long, env = "AUDIT_SOURCE_ROOT")]
    pub source_root: PathBuf,

    /// JSON permission catalog: `resource:action` strings or `{resource, action}` objects
    #[arg(long, env = "AUDIT_CATALOG_PATH")]
    pub catalog: Option<PathBuf>,

    /// Database to read the catalog from when no catalog file is given
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Extra allow-listed path segment (repeatable)
    #[arg(long)]
    pub allow: Vec<String>,

    /// Extra enforcement helper name (repeatable)
    #[arg(long)]
    pub enforcement_function: Vec<String>,

    /// Unit file name replacing the defaults (repeatable)
    #[arg(long)]
    pub unit_file: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit with status 1 when any unit has issues
    #[arg(long)]
    pub deny_issues: bool,
}
