//! # Skillpack Core Plugin System Errors
//!
//! Defines [`PluginSystemError`], the error returned by the loader and the
//! plugin manager. Resolution and registry failures keep their own enums
//! ([`DependencyError`], [`RegistryError`]) and are wrapped here via `#[from]`.
//!
//! Every variant maps to a stable machine-readable code through
//! [`PluginSystemError::code`].
use std::path::PathBuf;

use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::registry::RegistryError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Failed to load manifest from '{path}': {source}")]
    ManifestLoad {
        path: PathBuf,
        #[source]
        source: Box<PluginSystemErrorSource>,
    },

    #[error("Dependency resolution failed: {0}")]
    Dependency(#[from] DependencyError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to install plugin '{plugin}': {message}")]
    Install {
        plugin: String,
        message: String,
        #[source]
        source: Option<Box<PluginSystemErrorSource>>,
    },

    #[error("Plugin '{plugin}' is already installed (version {version}). Use force to reinstall.")]
    AlreadyInstalled { plugin: String, version: String },

    #[error("Plugin not found: {plugin}")]
    PluginNotFound { plugin: String },

    #[error("Failed to activate plugin '{plugin}': {message}")]
    Activation { plugin: String, message: String },

    #[error("Failed to deactivate plugin '{plugin}': {message}")]
    Deactivation { plugin: String, message: String },

    #[error("Failed to uninstall plugin '{plugin}': {message}")]
    Uninstall { plugin: String, message: String },

    #[error("Failed to load skill '{skill_path}' of plugin '{plugin}': {message}")]
    SkillLoad {
        plugin: String,
        skill_path: String,
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemErrorSource {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Other: {0}")]
    Other(String),
}

impl PluginSystemError {
    pub fn install(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        PluginSystemError::Install {
            plugin: plugin.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PluginSystemError::ManifestLoad { .. } => "MANIFEST_LOAD_ERROR",
            PluginSystemError::Dependency(_) => "DEPENDENCY_ERROR",
            PluginSystemError::Registry(e) => e.code(),
            PluginSystemError::Install { .. } => "INSTALL_ERROR",
            PluginSystemError::AlreadyInstalled { .. } => "ALREADY_INSTALLED",
            PluginSystemError::PluginNotFound { .. } => "PLUGIN_NOT_FOUND",
            PluginSystemError::Activation { .. } => "ACTIVATION_ERROR",
            PluginSystemError::Deactivation { .. } => "DEACTIVATION_ERROR",
            PluginSystemError::Uninstall { .. } => "UNINSTALL_ERROR",
            PluginSystemError::SkillLoad { .. } => "SKILL_LOAD_ERROR",
        }
    }

    /// The plugin the failure concerns, if known
    pub fn plugin(&self) -> Option<&str> {
        match self {
            PluginSystemError::ManifestLoad { .. } => None,
            PluginSystemError::Dependency(e) => e.plugin(),
            PluginSystemError::Registry(e) => e.plugin(),
            PluginSystemError::Install { plugin, .. }
            | PluginSystemError::AlreadyInstalled { plugin, .. }
            | PluginSystemError::PluginNotFound { plugin }
            | PluginSystemError::Activation { plugin, .. }
            | PluginSystemError::Deactivation { plugin, .. }
            | PluginSystemError::Uninstall { plugin, .. }
            | PluginSystemError::SkillLoad { plugin, .. } => Some(plugin),
        }
    }
}
