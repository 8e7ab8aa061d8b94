use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a plugin manifest (`plugin.json`) that describes a plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Unique key: lowercase alphanumeric and hyphens
    pub name: String,

    /// Semantic version string
    pub version: String,

    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Skill directories, in declaration order
    pub skills: Vec<SkillReference>,

    /// Plugin name to version-range expression
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub peer_dependencies: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_requirements: Option<SystemRequirements>,

    /// Declared capabilities. Informational, never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,

    /// Lifecycle event name to script path, relative to the plugin root
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hooks: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Map<String, serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A skill entry: either a bare path or a path with flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkillReference {
    Path(String),
    Detailed {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        required: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enabled: Option<bool>,
    },
}

impl SkillReference {
    pub fn path(&self) -> &str {
        match self {
            SkillReference::Path(path) => path,
            SkillReference::Detailed { path, .. } => path,
        }
    }

    /// Skills are enabled unless explicitly switched off
    pub fn enabled(&self) -> bool {
        match self {
            SkillReference::Path(_) => true,
            SkillReference::Detailed { enabled, .. } => enabled.unwrap_or(true),
        }
    }

    pub fn required(&self) -> bool {
        match self {
            SkillReference::Path(_) => false,
            SkillReference::Detailed { required, .. } => required.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
    /// `linux`, `darwin`, `win32`, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkPermission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Vec<String>>,
}

/// Network access, either as a blanket flag or a list of hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NetworkPermission {
    Enabled(bool),
    Hosts(Vec<String>),
}

impl From<Vec<String>> for NetworkPermission {
    fn from(hosts: Vec<String>) -> Self {
        NetworkPermission::Hosts(hosts)
    }
}

/// Lifecycle state of an installed plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    Installing,
    Active,
    Inactive,
    Broken,
    Uninstalling,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginStatus::Installing => "installing",
            PluginStatus::Active => "active",
            PluginStatus::Inactive => "inactive",
            PluginStatus::Broken => "broken",
            PluginStatus::Uninstalling => "uninstalling",
        }
    }

    /// Only these may be persisted outside of a running transition
    pub fn is_at_rest(&self) -> bool {
        matches!(self, PluginStatus::Active | PluginStatus::Inactive)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installing" => Ok(PluginStatus::Installing),
            "active" => Ok(PluginStatus::Active),
            "inactive" => Ok(PluginStatus::Inactive),
            "broken" => Ok(PluginStatus::Broken),
            "uninstalling" => Ok(PluginStatus::Uninstalling),
            other => Err(format!("Unknown plugin status: {}", other)),
        }
    }
}

/// Lifecycle hooks a manifest may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    PreInstall,
    OnInstall,
    OnActivate,
    PostActivate,
    OnDeactivate,
    OnUninstall,
    OnUpdate,
}

impl HookKind {
    pub const ALL: [HookKind; 7] = [
        HookKind::PreInstall,
        HookKind::OnInstall,
        HookKind::OnActivate,
        HookKind::PostActivate,
        HookKind::OnDeactivate,
        HookKind::OnUninstall,
        HookKind::OnUpdate,
    ];

    /// Key used in the manifest `hooks` map
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::PreInstall => "preInstall",
            HookKind::OnInstall => "onInstall",
            HookKind::OnActivate => "onActivate",
            HookKind::PostActivate => "postActivate",
            HookKind::OnDeactivate => "onDeactivate",
            HookKind::OnUninstall => "onUninstall",
            HookKind::OnUpdate => "onUpdate",
        }
    }

    pub fn is_known(name: &str) -> bool {
        HookKind::ALL.iter().any(|hook| hook.as_str() == name)
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime view of an installed plugin: a registry record joined with its manifest.
///
/// Built fresh for every query so that edits on disk are always visible.
#[derive(Debug, Clone, PartialEq)]
pub struct Plugin {
    pub name: String,
    pub version: String,
    pub manifest: PluginManifest,
    pub status: PluginStatus,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Path or URL the plugin was installed from
    pub source: String,
    pub checksum: Option<String>,
    /// Dependency name to the version actually present at install time
    pub resolved_dependencies: BTreeMap<String, String>,
}

impl Plugin {
    /// A record for a plugin that is not persisted yet
    pub fn transient(manifest: PluginManifest, status: PluginStatus, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            manifest,
            status,
            installed_at: now,
            updated_at: now,
            source: source.into(),
            checksum: None,
            resolved_dependencies: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: PluginStatus) -> Self {
        self.status = status;
        self
    }
}

/// Builder for creating a plugin manifest
pub struct ManifestBuilder {
    manifest: PluginManifest,
}

impl ManifestBuilder {
    /// Create a new manifest builder
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            manifest: PluginManifest {
                name: name.to_string(),
                version: version.to_string(),
                description: format!("The {} plugin", name),
                author: None,
                license: None,
                repository: None,
                keywords: Vec::new(),
                category: None,
                skills: Vec::new(),
                dependencies: BTreeMap::new(),
                peer_dependencies: BTreeMap::new(),
                system_requirements: None,
                permissions: None,
                hooks: BTreeMap::new(),
                config: None,
                metadata: None,
            },
        }
    }

    /// Set the plugin description
    pub fn description(mut self, description: &str) -> Self {
        self.manifest.description = description.to_string();
        self
    }

    pub fn author(mut self, name: &str) -> Self {
        self.manifest.author = Some(Author {
            name: name.to_string(),
            email: None,
            url: None,
        });
        self
    }

    pub fn license(mut self, license: &str) -> Self {
        self.manifest.license = Some(license.to_string());
        self
    }

    pub fn repository(mut self, url: &str) -> Self {
        self.manifest.repository = Some(Repository {
            kind: "git".to_string(),
            url: url.to_string(),
        });
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.manifest.category = Some(category.to_string());
        self
    }

    pub fn keyword(mut self, keyword: &str) -> Self {
        self.manifest.keywords.push(keyword.to_string());
        self
    }

    pub fn skill(mut self, path: &str) -> Self {
        self.manifest.skills.push(SkillReference::Path(path.to_string()));
        self
    }

    pub fn dependency(mut self, name: &str, range: &str) -> Self {
        self.manifest.dependencies.insert(name.to_string(), range.to_string());
        self
    }

    pub fn hook(mut self, hook: HookKind, script: &str) -> Self {
        self.manifest.hooks.insert(hook.as_str().to_string(), script.to_string());
        self
    }

    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.manifest.permissions = Some(permissions);
        self
    }

    pub fn platforms(mut self, platforms: &[&str]) -> Self {
        let requirements = self.manifest.system_requirements.get_or_insert_with(SystemRequirements::default);
        requirements.platforms = Some(platforms.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Build the manifest
    pub fn build(self) -> PluginManifest {
        self.manifest
    }
}
