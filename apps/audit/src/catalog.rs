use std::collections::BTreeSet;
use std::path::Path;

use rolegate_application::PolicyRepository;
use rolegate_core::{AppError, AppResult};
use rolegate_domain::PermissionKey;
use rolegate_infrastructure::PostgresPolicyRepository;
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogEntry {
    Key(String),
    Pair { resource: String, action: String },
}

/// Loads the permission catalog from a file, else from the database, else empty.
pub async fn load_catalog(
    catalog_path: Option<&Path>,
    database_url: Option<&str>,
) -> AppResult<BTreeSet<PermissionKey>> {
    if let Some(path) = catalog_path {
        let contents = std::fs::read_to_string(path).map_err(|error| {
            AppError::Validation(format!(
                "failed to read catalog '{}': {error}",
                path.display()
            ))
        })?;
        let catalog = parse_catalog(&contents)?;
        info!(path = %path.display(), size = catalog.len(), "loaded catalog file");
        return Ok(catalog);
    }

    if let Some(database_url) = database_url {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to connect to database: {error}"))
            })?;
        let permissions = PostgresPolicyRepository::new(pool).list_permissions().await?;
        info!(size = permissions.len(), "loaded catalog from database");
        return Ok(permissions
            .into_iter()
            .map(|permission| permission.key().clone())
            .collect());
    }

    Ok(BTreeSet::new())
}

pub(crate) fn parse_catalog(contents: &str) -> AppResult<BTreeSet<PermissionKey>> {
    let entries = serde_json::from_str::<Vec<CatalogEntry>>(contents).map_err(|error| {
        AppError::Validation(format!("catalog must be a JSON array of permissions: {error}"))
    })?;

    entries
        .into_iter()
        .map(|entry| match entry {
            CatalogEntry::Key(value) => value.parse::<PermissionKey>(),
            CatalogEntry::Pair { resource, action } => PermissionKey::new(resource, action),
        })
        .collect()
}

#[cfg(test)]
mod tests;
