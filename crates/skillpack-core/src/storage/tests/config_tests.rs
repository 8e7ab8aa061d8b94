#![cfg(test)]

use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

use crate::kernel::error::Result;
use crate::storage::config::{ConfigFormat, ConfigOverrides, ManagerConfig};

#[test]
fn test_format_from_path() {
    assert_eq!(ConfigFormat::from_path(Path::new("config.json")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("CONFIG.JSON")), Some(ConfigFormat::Json));
    #[cfg(feature = "toml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("config.toml")), Some(ConfigFormat::Toml));
    #[cfg(feature = "yaml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("config.yml")), Some(ConfigFormat::Yaml));
    assert_eq!(ConfigFormat::from_path(Path::new("config.ini")), None);
    assert_eq!(ConfigFormat::from_path(Path::new("config")), None);
}

#[test]
fn test_default_layout() {
    let config = ManagerConfig::from_base_dir("/srv/skills");
    assert_eq!(config.plugin_dir, Path::new("/srv/skills/plugins"));
    assert_eq!(config.registry_path, Path::new("/srv/skills/registry.json"));
    assert_eq!(config.cache_dir, Path::new("/srv/skills/cache"));
    assert_eq!(config.logs_dir, Path::new("/srv/skills/logs"));
    assert!(config.validate_checksum);
    assert!(!config.auto_update);
    assert_eq!(config.hook_timeout, Duration::from_secs(60));
}

#[test]
fn test_load_without_config_file_uses_defaults() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp dir");
    let config = ManagerConfig::load(dir.path())?;
    assert_eq!(config, ManagerConfig::from_base_dir(dir.path()));
    Ok(())
}

#[test]
fn test_load_applies_json_overrides() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp dir");
    fs::write(
        dir.path().join("config.json"),
        r#"{ "validateChecksum": false, "hookTimeoutSecs": 5 }"#,
    )
    .expect("Failed to write config");

    let config = ManagerConfig::load(dir.path())?;
    assert!(!config.validate_checksum);
    assert!(!config.auto_update);
    assert_eq!(config.hook_timeout, Duration::from_secs(5));
    Ok(())
}

#[cfg(feature = "toml-config")]
#[test]
fn test_load_applies_toml_overrides() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp dir");
    fs::write(dir.path().join("config.toml"), "autoUpdate = true\n").expect("Failed to write config");

    let config = ManagerConfig::load(dir.path())?;
    assert!(config.auto_update);
    assert!(config.validate_checksum);
    Ok(())
}

#[test]
fn test_malformed_config_is_an_error() {
    let dir = tempdir().expect("Failed to create temp dir");
    fs::write(dir.path().join("config.json"), "{ not json").expect("Failed to write config");

    let err = ManagerConfig::load(dir.path()).unwrap_err();
    assert_eq!(err.code(), "DESERIALIZATION_ERROR");
}

#[test]
fn test_unsupported_override_file() {
    let err = ConfigOverrides::from_file(Path::new("/tmp/settings.ini")).unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_CONFIG_FORMAT");
}
