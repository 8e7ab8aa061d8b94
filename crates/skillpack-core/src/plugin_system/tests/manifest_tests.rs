#![cfg(test)]

use std::str::FromStr;

use serde_json::json;

use crate::plugin_system::manifest::{HookKind, ManifestBuilder, Plugin, PluginManifest, PluginStatus, SkillReference};

#[test]
fn test_builder_defaults() {
    let manifest = ManifestBuilder::new("pdf-tools", "1.0.0").build();
    assert_eq!(manifest.name, "pdf-tools");
    assert_eq!(manifest.version, "1.0.0");
    assert_eq!(manifest.description, "The pdf-tools plugin");
    assert!(manifest.author.is_none());
    assert!(manifest.skills.is_empty());
    assert!(manifest.dependencies.is_empty());
    assert!(manifest.hooks.is_empty());
}

#[test]
fn test_builder_chaining() {
    let manifest = ManifestBuilder::new("pdf-tools", "1.0.0")
        .description("Work with PDF files")
        .author("Ada")
        .license("MIT")
        .repository("https://example.com/pdf-tools.git")
        .category("documents")
        .keyword("pdf")
        .keyword("documents")
        .skill("skills/extract")
        .dependency("base", "^1.0.0")
        .hook(HookKind::OnInstall, "hooks/install.sh")
        .platforms(&["linux", "darwin"])
        .build();

    assert_eq!(manifest.author.as_ref().map(|a| a.name.as_str()), Some("Ada"));
    assert_eq!(manifest.repository.as_ref().map(|r| r.kind.as_str()), Some("git"));
    assert_eq!(manifest.keywords, vec!["pdf", "documents"]);
    assert_eq!(manifest.skills, vec![SkillReference::Path("skills/extract".into())]);
    assert_eq!(manifest.dependencies["base"], "^1.0.0");
    assert_eq!(manifest.hooks["onInstall"], "hooks/install.sh");
    assert_eq!(
        manifest.system_requirements.unwrap().platforms,
        Some(vec!["linux".to_string(), "darwin".to_string()])
    );
}

#[test]
fn test_manifest_json_uses_camel_case() {
    let json = json!({
        "name": "full",
        "version": "2.1.0",
        "description": "Every optional field set",
        "author": {"name": "Ada", "email": "ada@example.com"},
        "license": "Apache-2.0",
        "repository": {"type": "git", "url": "https://example.com/full.git"},
        "keywords": ["one"],
        "category": "misc",
        "skills": ["skills/a", {"path": "skills/b", "enabled": false, "required": true}],
        "dependencies": {"base": "^1.0.0"},
        "peerDependencies": {"peer": ">=2.0.0"},
        "systemRequirements": {"minVersion": "1.0.0", "platforms": ["linux"]},
        "permissions": {"filesystem": ["read"], "tools": ["git"]},
        "hooks": {"onActivate": "hooks/activate.sh"},
        "config": {"threshold": 3},
        "metadata": {"homepage": "https://example.com"}
    });

    let manifest: PluginManifest = serde_json::from_value(json.clone()).unwrap();
    assert_eq!(manifest.peer_dependencies["peer"], ">=2.0.0");
    assert_eq!(
        manifest.system_requirements.as_ref().unwrap().min_version.as_deref(),
        Some("1.0.0")
    );
    assert_eq!(manifest.config.as_ref().unwrap()["threshold"], 3);

    // Nothing is lost or renamed on the way back out
    assert_eq!(serde_json::to_value(&manifest).unwrap(), json);
}

#[test]
fn test_optional_fields_are_omitted() {
    let manifest = ManifestBuilder::new("lean", "1.0.0").build();
    let value = serde_json::to_value(&manifest).unwrap();
    let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys.len(), 4, "unexpected keys: {:?}", keys);
    assert!(value.get("author").is_none());
    assert!(value.get("hooks").is_none());
    assert_eq!(value["skills"], json!([]));
}

#[test]
fn test_manifest_requires_core_fields() {
    let result = serde_json::from_value::<PluginManifest>(json!({"name": "x", "version": "1.0.0"}));
    assert!(result.is_err());
}

#[test]
fn test_skill_reference_forms() {
    let bare: SkillReference = serde_json::from_value(json!("skills/a")).unwrap();
    assert_eq!(bare.path(), "skills/a");
    assert!(bare.enabled());
    assert!(!bare.required());

    let detailed: SkillReference = serde_json::from_value(json!({"path": "skills/b", "enabled": false})).unwrap();
    assert_eq!(detailed.path(), "skills/b");
    assert!(!detailed.enabled());

    let defaults: SkillReference = serde_json::from_value(json!({"path": "skills/c"})).unwrap();
    assert!(defaults.enabled());
    assert!(!defaults.required());
}

#[test]
fn test_status_strings() {
    for status in [
        PluginStatus::Installing,
        PluginStatus::Active,
        PluginStatus::Inactive,
        PluginStatus::Broken,
        PluginStatus::Uninstalling,
    ] {
        assert_eq!(PluginStatus::from_str(&status.to_string()), Ok(status));
        assert_eq!(serde_json::to_value(status).unwrap(), json!(status.as_str()));
    }
    assert!(PluginStatus::from_str("Active").is_err());

    assert!(PluginStatus::Active.is_at_rest());
    assert!(PluginStatus::Inactive.is_at_rest());
    assert!(!PluginStatus::Installing.is_at_rest());
}

#[test]
fn test_hook_names() {
    assert_eq!(HookKind::PreInstall.to_string(), "preInstall");
    assert_eq!(HookKind::PostActivate.as_str(), "postActivate");
    assert!(HookKind::is_known("onUpdate"));
    assert!(!HookKind::is_known("onBoot"));
    assert!(!HookKind::is_known("OnInstall"));
    assert_eq!(HookKind::ALL.len(), 7);
}

#[test]
fn test_transient_plugin() {
    let manifest = ManifestBuilder::new("fresh", "0.3.0").build();
    let plugin = Plugin::transient(manifest.clone(), PluginStatus::Installing, "/tmp/fresh");

    assert_eq!(plugin.name, "fresh");
    assert_eq!(plugin.version, "0.3.0");
    assert_eq!(plugin.manifest, manifest);
    assert_eq!(plugin.installed_at, plugin.updated_at);
    assert!(plugin.checksum.is_none());

    let active = plugin.with_status(PluginStatus::Active);
    assert_eq!(active.status, PluginStatus::Active);
}
