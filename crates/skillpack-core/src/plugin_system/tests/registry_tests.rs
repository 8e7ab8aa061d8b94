#![cfg(test)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tempfile::tempdir;

use crate::kernel::constants;
use crate::plugin_system::manifest::PluginStatus;
use crate::plugin_system::registry::{PluginRegistry, RegistryDocument, RegistryEntry, RegistryError};

fn entry(name: &str, version: &str, status: PluginStatus) -> RegistryEntry {
    let now = Utc::now();
    RegistryEntry {
        name: name.to_string(),
        version: version.to_string(),
        status,
        installed_at: now,
        updated_at: now,
        source: format!("/src/{}", name),
        checksum: None,
        dependencies: BTreeMap::new(),
    }
}

#[tokio::test]
async fn test_missing_file_is_created_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("registry.json");
    let registry = PluginRegistry::new(&path);

    let document = registry.load().await.expect("load should create the registry");
    assert_eq!(document, RegistryDocument::default());
    assert_eq!(document.version, constants::REGISTRY_FORMAT_VERSION);
    assert!(path.is_file(), "empty registry should be persisted immediately");
}

#[tokio::test]
async fn test_corrupt_file_is_a_load_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.json");
    std::fs::write(&path, "{ not json").unwrap();

    let registry = PluginRegistry::new(&path);
    let err = registry.load().await.unwrap_err();
    assert!(matches!(err, RegistryError::Load { .. }));
    assert_eq!(err.code(), "REGISTRY_LOAD_ERROR");

    // The broken file is left for the user to inspect
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[tokio::test]
async fn test_add_get_remove_round_trip() {
    let dir = tempdir().unwrap();
    let registry = PluginRegistry::new(dir.path().join("registry.json"));
    registry.initialize().await.unwrap();

    let record = entry("pdf-tools", "1.0.0", PluginStatus::Active);
    registry.add_plugin(record.clone()).await.unwrap();
    assert_eq!(registry.get_plugin("pdf-tools").await.unwrap(), Some(record));
    assert!(registry.has_plugin("pdf-tools").await.unwrap());

    assert!(registry.remove_plugin("pdf-tools").await.unwrap());
    assert_eq!(registry.get_plugin("pdf-tools").await.unwrap(), None);

    // Removing again is a no-op
    assert!(!registry.remove_plugin("pdf-tools").await.unwrap());
}

#[tokio::test]
async fn test_add_replaces_entry_with_same_name() {
    let dir = tempdir().unwrap();
    let registry = PluginRegistry::new(dir.path().join("registry.json"));

    registry.add_plugin(entry("a", "1.0.0", PluginStatus::Active)).await.unwrap();
    registry.add_plugin(entry("b", "1.0.0", PluginStatus::Active)).await.unwrap();
    registry.add_plugin(entry("a", "2.0.0", PluginStatus::Inactive)).await.unwrap();

    let all = registry.get_all_plugins().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "a");
    assert_eq!(all[0].version, "2.0.0");
}

#[tokio::test]
async fn test_changes_are_visible_to_a_fresh_instance() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.json");

    PluginRegistry::new(&path)
        .add_plugin(entry("persisted", "1.0.0", PluginStatus::Inactive))
        .await
        .unwrap();

    let reopened = PluginRegistry::new(&path);
    let found = reopened.get_plugin("persisted").await.unwrap().unwrap();
    assert_eq!(found.status, PluginStatus::Inactive);
}

#[tokio::test]
async fn test_update_status_refreshes_timestamp() {
    let dir = tempdir().unwrap();
    let registry = PluginRegistry::new(dir.path().join("registry.json"));
    let mut record = entry("toggle", "1.0.0", PluginStatus::Inactive);
    record.updated_at = Utc::now() - chrono::Duration::hours(1);
    registry.add_plugin(record.clone()).await.unwrap();

    let updated = registry.update_plugin_status("toggle", PluginStatus::Active).await.unwrap();
    assert_eq!(updated.status, PluginStatus::Active);
    assert!(updated.updated_at > record.updated_at);
    assert_eq!(updated.installed_at, record.installed_at);

    let active = registry.get_plugins_by_status(PluginStatus::Active).await.unwrap();
    assert_eq!(active.len(), 1);
    assert!(registry.get_plugins_by_status(PluginStatus::Inactive).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_status_of_unknown_plugin() {
    let dir = tempdir().unwrap();
    let registry = PluginRegistry::new(dir.path().join("registry.json"));

    let err = registry.update_plugin_status("ghost", PluginStatus::Active).await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(ref name) if name == "ghost"));
    assert_eq!(err.code(), "PLUGIN_NOT_FOUND");
    assert_eq!(err.plugin(), Some("ghost"));
}

#[tokio::test]
async fn test_failed_mutation_writes_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let registry = PluginRegistry::new(&path);
    registry.add_plugin(entry("keep", "1.0.0", PluginStatus::Active)).await.unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let result: Result<(), RegistryError> = registry
        .mutate(|document| {
            document.plugins.clear();
            Err(RegistryError::NotFound("nope".into()))
        })
        .await;
    assert!(result.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[tokio::test]
async fn test_concurrent_mutations_are_serialized() {
    let dir = tempdir().unwrap();
    let registry = Arc::new(PluginRegistry::new(dir.path().join("registry.json")));
    registry.initialize().await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..10 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry
                .add_plugin(entry(&format!("plugin-{}", i), "1.0.0", PluginStatus::Active))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(registry.get_all_plugins().await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_marketplaces() {
    let dir = tempdir().unwrap();
    let registry = PluginRegistry::new(dir.path().join("registry.json"));

    registry.add_marketplace("official", "https://example.com/a").await.unwrap();
    registry.add_marketplace("community", "https://example.com/b").await.unwrap();
    registry.add_marketplace("official", "https://example.com/c").await.unwrap();

    let marketplaces = registry.get_marketplaces().await.unwrap();
    assert_eq!(marketplaces.len(), 2);
    assert_eq!(marketplaces[0].url, "https://example.com/c");

    assert!(registry.remove_marketplace("community").await.unwrap());
    assert!(!registry.remove_marketplace("community").await.unwrap());
    assert_eq!(registry.get_marketplaces().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_clear_keeps_marketplaces() {
    let dir = tempdir().unwrap();
    let registry = PluginRegistry::new(dir.path().join("registry.json"));
    registry.add_plugin(entry("a", "1.0.0", PluginStatus::Active)).await.unwrap();
    registry.add_marketplace("official", "https://example.com").await.unwrap();

    registry.clear().await.unwrap();
    assert!(registry.get_all_plugins().await.unwrap().is_empty());
    assert_eq!(registry.get_marketplaces().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_export_import() {
    let dir = tempdir().unwrap();
    let source = PluginRegistry::new(dir.path().join("one.json"));
    let mut record = entry("exported", "3.1.4", PluginStatus::Inactive);
    record.checksum = Some("abc123".into());
    record.dependencies.insert("base".into(), "1.0.0".into());
    source.add_plugin(record.clone()).await.unwrap();

    let json = source.export().await.unwrap();
    assert!(json.contains("\"installedAt\""));
    assert!(json.contains("\"status\": \"inactive\""));

    let target = PluginRegistry::new(dir.path().join("two.json"));
    target.import(&json).await.unwrap();
    assert_eq!(target.get_plugin("exported").await.unwrap(), Some(record));

    let err = target.import("[]").await.unwrap_err();
    assert_eq!(err.code(), "REGISTRY_LOAD_ERROR");
    assert!(target.has_plugin("exported").await.unwrap());
}

#[tokio::test]
async fn test_save_failure_is_reported() {
    let dir = tempdir().unwrap();
    // A regular file where the parent directory should be
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "file").unwrap();
    let registry = PluginRegistry::new(blocker.join("registry.json"));

    let err = registry.save(&RegistryDocument::default()).await.unwrap_err();
    assert!(matches!(err, RegistryError::Save { .. }));
    assert_eq!(err.code(), "REGISTRY_SAVE_ERROR");
}
