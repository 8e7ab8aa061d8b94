use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
#[cfg(feature = "yaml-config")]
use serde_yaml;
#[cfg(feature = "toml-config")]
use toml;

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    /// All formats compiled into this build, in lookup order
    pub fn enabled() -> Vec<ConfigFormat> {
        let mut formats = vec![ConfigFormat::Json];
        #[cfg(feature = "toml-config")]
        formats.push(ConfigFormat::Toml);
        #[cfg(feature = "yaml-config")]
        formats.push(ConfigFormat::Yaml);
        formats
    }
}

/// Optional settings read from `<base>/config.{json,toml,yaml}`.
///
/// Every field is optional; absent fields keep the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverrides {
    pub validate_checksum: Option<bool>,
    pub auto_update: Option<bool>,
    pub hook_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat, path: &Path) -> Result<Self> {
        let parsed: std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> = match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| e.into()),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| e.into()),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| e.into()),
        };

        parsed.map_err(|source| {
            StorageSystemError::DeserializationError {
                format: format.extension().to_string(),
                path: path.to_path_buf(),
                source,
            }
            .into()
        })
    }

    /// Read overrides from an explicit file, picking the format from its extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            StorageSystemError::UnsupportedConfigFormat(path.display().to_string())
        })?;
        let data = std::fs::read_to_string(path)
            .map_err(|e| StorageSystemError::io(e, "read_config", path.to_path_buf()))?;
        Self::deserialize(&data, format, path)
    }

    /// Look for `config.<ext>` in `base_dir`, first match wins
    pub fn discover(base_dir: &Path) -> Result<Option<Self>> {
        for format in ConfigFormat::enabled() {
            let candidate = base_dir.join(format!("{}.{}", constants::CONFIG_FILE_STEM, format.extension()));
            if candidate.is_file() {
                log::debug!("Loading configuration from {}", candidate.display());
                return Self::from_file(&candidate).map(Some);
            }
        }
        Ok(None)
    }
}

/// Paths and switches used by the plugin manager
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Directory holding `<name>@<version>` installations
    pub plugin_dir: PathBuf,
    /// Registry document
    pub registry_path: PathBuf,
    pub cache_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Compute and store a checksum of every installed plugin
    pub validate_checksum: bool,
    /// Reserved for update tooling, carried through but never acted upon by the core
    pub auto_update: bool,
    /// Deadline for a single hook script
    pub hook_timeout: Duration,
}

impl ManagerConfig {
    /// Derive the standard layout under `base_dir`
    pub fn from_base_dir(base_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.as_ref();
        Self {
            plugin_dir: base_dir.join(constants::PLUGINS_DIR),
            registry_path: base_dir.join(constants::REGISTRY_FILE),
            cache_dir: base_dir.join(constants::CACHE_DIR),
            logs_dir: base_dir.join(constants::LOGS_DIR),
            validate_checksum: true,
            auto_update: false,
            hook_timeout: Duration::from_secs(constants::HOOK_TIMEOUT_SECS),
        }
    }

    /// `<cwd>/.claude-plugin`
    pub fn default_base_dir() -> Result<PathBuf> {
        let cwd = std::env::current_dir()
            .map_err(|e| StorageSystemError::io(e, "current_dir", PathBuf::from(".")))?;
        Ok(cwd.join(constants::DEFAULT_BASE_DIR_NAME))
    }

    /// Standard layout under `base_dir`, with any `config.*` file found there applied
    pub fn load(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let config = Self::from_base_dir(base_dir);
        match ConfigOverrides::discover(base_dir)? {
            Some(overrides) => Ok(config.with_overrides(&overrides)),
            None => Ok(config),
        }
    }

    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(validate_checksum) = overrides.validate_checksum {
            self.validate_checksum = validate_checksum;
        }
        if let Some(auto_update) = overrides.auto_update {
            self.auto_update = auto_update;
        }
        if let Some(secs) = overrides.hook_timeout_secs {
            self.hook_timeout = Duration::from_secs(secs);
        }
        self
    }
}
