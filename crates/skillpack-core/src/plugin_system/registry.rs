use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::kernel::constants;
use crate::plugin_system::manifest::{Plugin, PluginManifest, PluginStatus};
use crate::storage::error::StorageSystemError;
use crate::storage::local::{read_json, write_json_atomic};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to load registry from '{path}': {message}")]
    Load { path: PathBuf, message: String },

    #[error("Failed to save registry to '{path}': {message}")]
    Save { path: PathBuf, message: String },

    #[error("Plugin not found in registry: {0}")]
    NotFound(String),
}

impl RegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::Load { .. } => "REGISTRY_LOAD_ERROR",
            RegistryError::Save { .. } => "REGISTRY_SAVE_ERROR",
            RegistryError::NotFound(_) => "PLUGIN_NOT_FOUND",
        }
    }

    pub fn plugin(&self) -> Option<&str> {
        match self {
            RegistryError::NotFound(name) => Some(name),
            _ => None,
        }
    }
}

type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Persisted record of one installed plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub name: String,
    pub version: String,
    pub status: PluginStatus,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Resolved dependency name to installed version
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl RegistryEntry {
    /// Join this record with a freshly loaded manifest
    pub fn into_plugin(self, manifest: PluginManifest) -> Plugin {
        Plugin {
            name: self.name,
            version: self.version,
            manifest,
            status: self.status,
            installed_at: self.installed_at,
            updated_at: self.updated_at,
            source: self.source,
            checksum: self.checksum,
            resolved_dependencies: self.dependencies,
        }
    }
}

impl From<&Plugin> for RegistryEntry {
    fn from(plugin: &Plugin) -> Self {
        Self {
            name: plugin.name.clone(),
            version: plugin.version.clone(),
            status: plugin.status,
            installed_at: plugin.installed_at,
            updated_at: plugin.updated_at,
            source: plugin.source.clone(),
            checksum: plugin.checksum.clone(),
            dependencies: plugin.resolved_dependencies.clone(),
        }
    }
}

/// A named plugin source; recorded for tooling, never contacted by the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marketplace {
    pub name: String,
    pub url: String,
    pub added_at: DateTime<Utc>,
}

/// The whole on-disk registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub version: String,
    #[serde(default)]
    pub plugins: Vec<RegistryEntry>,
    #[serde(default)]
    pub marketplaces: Vec<Marketplace>,
}

impl Default for RegistryDocument {
    fn default() -> Self {
        Self {
            version: constants::REGISTRY_FORMAT_VERSION.to_string(),
            plugins: Vec::new(),
            marketplaces: Vec::new(),
        }
    }
}

impl RegistryDocument {
    pub fn find(&self, name: &str) -> Option<&RegistryEntry> {
        self.plugins.iter().find(|entry| entry.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut RegistryEntry> {
        self.plugins.iter_mut().find(|entry| entry.name == name)
    }
}

/// Durable store of installed plugin records over a single JSON document.
///
/// Every read goes to disk and every change is a full load, modify, save
/// cycle. Changes made through one instance are serialized; separate
/// processes writing the same file are not coordinated.
#[derive(Debug)]
pub struct PluginRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PluginRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty registry file unless one already exists
    pub async fn initialize(&self) -> RegistryResult<()> {
        self.load().await.map(|_| ())
    }

    /// Read the whole document.
    ///
    /// A missing file is created empty on the spot; a file that exists but
    /// cannot be read or parsed is an error and is left untouched.
    pub async fn load(&self) -> RegistryResult<RegistryDocument> {
        match read_json::<RegistryDocument>(&self.path).await {
            Ok(document) => Ok(document),
            Err(StorageSystemError::FileNotFound(_)) => {
                log::info!("Creating new plugin registry at {}", self.path.display());
                let document = RegistryDocument::default();
                self.save(&document).await?;
                Ok(document)
            }
            Err(e) => Err(RegistryError::Load {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// Atomically replace the document on disk
    pub async fn save(&self, document: &RegistryDocument) -> RegistryResult<()> {
        write_json_atomic(&self.path, document)
            .await
            .map_err(|e| RegistryError::Save {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    /// Load, apply `f`, save. Nothing is written when `f` fails.
    pub async fn mutate<T, F>(&self, f: F) -> RegistryResult<T>
    where
        F: FnOnce(&mut RegistryDocument) -> RegistryResult<T>,
    {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        let result = f(&mut document)?;
        self.save(&document).await?;
        Ok(result)
    }

    /// Insert or replace the entry with the same name
    pub async fn add_plugin(&self, entry: RegistryEntry) -> RegistryResult<()> {
        log::debug!("Recording {}@{} as {}", entry.name, entry.version, entry.status);
        self.mutate(move |document| {
            match document.find_mut(&entry.name) {
                Some(existing) => *existing = entry,
                None => document.plugins.push(entry),
            }
            Ok(())
        })
        .await
    }

    /// Returns whether an entry was removed
    pub async fn remove_plugin(&self, name: &str) -> RegistryResult<bool> {
        self.mutate(|document| {
            let before = document.plugins.len();
            document.plugins.retain(|entry| entry.name != name);
            Ok(document.plugins.len() < before)
        })
        .await
    }

    pub async fn get_plugin(&self, name: &str) -> RegistryResult<Option<RegistryEntry>> {
        Ok(self.load().await?.find(name).cloned())
    }

    pub async fn get_all_plugins(&self) -> RegistryResult<Vec<RegistryEntry>> {
        Ok(self.load().await?.plugins)
    }

    pub async fn has_plugin(&self, name: &str) -> RegistryResult<bool> {
        Ok(self.load().await?.find(name).is_some())
    }

    pub async fn get_plugins_by_status(&self, status: PluginStatus) -> RegistryResult<Vec<RegistryEntry>> {
        let document = self.load().await?;
        Ok(document.plugins.into_iter().filter(|entry| entry.status == status).collect())
    }

    /// Set the status of an existing entry and refresh its `updated_at`
    pub async fn update_plugin_status(&self, name: &str, status: PluginStatus) -> RegistryResult<RegistryEntry> {
        self.mutate(|document| {
            let entry = document
                .find_mut(name)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
            entry.status = status;
            entry.updated_at = Utc::now();
            Ok(entry.clone())
        })
        .await
    }

    /// Insert or replace the marketplace with the same name
    pub async fn add_marketplace(&self, name: &str, url: &str) -> RegistryResult<()> {
        let marketplace = Marketplace {
            name: name.to_string(),
            url: url.to_string(),
            added_at: Utc::now(),
        };
        self.mutate(move |document| {
            match document.marketplaces.iter_mut().find(|m| m.name == marketplace.name) {
                Some(existing) => *existing = marketplace,
                None => document.marketplaces.push(marketplace),
            }
            Ok(())
        })
        .await
    }

    pub async fn remove_marketplace(&self, name: &str) -> RegistryResult<bool> {
        self.mutate(|document| {
            let before = document.marketplaces.len();
            document.marketplaces.retain(|m| m.name != name);
            Ok(document.marketplaces.len() < before)
        })
        .await
    }

    pub async fn get_marketplaces(&self) -> RegistryResult<Vec<Marketplace>> {
        Ok(self.load().await?.marketplaces)
    }

    /// Forget every plugin; marketplaces are kept
    pub async fn clear(&self) -> RegistryResult<()> {
        self.mutate(|document| {
            document.plugins.clear();
            Ok(())
        })
        .await
    }

    /// The current document as pretty-printed JSON
    pub async fn export(&self) -> RegistryResult<String> {
        let document = self.load().await?;
        serde_json::to_string_pretty(&document).map_err(|e| RegistryError::Load {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    /// Replace the whole document with `json`. Invalid input leaves the registry unchanged.
    pub async fn import(&self, json: &str) -> RegistryResult<()> {
        let document: RegistryDocument = serde_json::from_str(json).map_err(|e| RegistryError::Load {
            path: self.path.clone(),
            message: format!("invalid registry document: {}", e),
        })?;

        let _guard = self.lock.lock().await;
        self.save(&document).await
    }
}
