use std::io::Write;

use rolegate_domain::PermissionKey;

use super::{load_catalog, parse_catalog};

fn key(value: &str) -> PermissionKey {
    let Ok(key) = value.parse::<PermissionKey>() else {
        panic!("fixture key '{value}' should parse");
    };
    key
}

#[test]
fn mixed_entries_collapse_into_one_set() {
    let Ok(catalog) = parse_catalog(
        r#"["jobs:view", {"resource": "jobs", "action": "edit"}, {"resource": "jobs", "action": "view", "description": "View jobs"}]"#,
    ) else {
        panic!("catalog should parse");
    };

    assert_eq!(catalog.len(), 2);
    assert!(catalog.contains(&key("jobs:view")));
    assert!(catalog.contains(&key("jobs:edit")));
}

#[test]
fn malformed_entries_are_rejected() {
    assert!(parse_catalog(r#"{"jobs": "view"}"#).is_err());
    assert!(parse_catalog(r#"["jobs"]"#).is_err());
}

#[tokio::test]
async fn file_catalog_takes_precedence_over_database() {
    let Ok(mut file) = tempfile::NamedTempFile::new() else {
        panic!("temp file should be created");
    };
    assert!(file.write_all(br#"["roles:view"]"#).is_ok());

    let catalog = load_catalog(Some(file.path()), Some("postgres://unreachable.invalid/db")).await;

    let Ok(catalog) = catalog else {
        panic!("file catalog should load without touching the database");
    };
    assert_eq!(catalog.into_iter().collect::<Vec<_>>(), vec![key("roles:view")]);
}

#[tokio::test]
async fn missing_sources_yield_an_empty_catalog() {
    let Ok(catalog) = load_catalog(None, None).await else {
        panic!("empty catalog should load");
    };
    assert!(catalog.is_empty());
}
