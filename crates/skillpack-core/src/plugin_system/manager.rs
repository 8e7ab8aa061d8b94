use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::event::{AsyncEventHandler, BoxFuture, EventId, PluginEvent, PluginEventKind, SharedEventDispatcher};
use crate::kernel::error::{Error, Result};
use crate::plugin_system::dependency::DependencyResolver;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::hooks::ProcessSpawner;
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::manifest::{HookKind, Plugin, PluginManifest, PluginStatus};
use crate::plugin_system::registry::{PluginRegistry, RegistryEntry};
use crate::plugin_system::validator::Validator;
use crate::storage::config::ManagerConfig;

/// Environment variable telling `onUninstall` scripts to preserve user data
pub const KEEP_DATA_ENV_VAR: &str = "PLUGIN_KEEP_DATA";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOptions {
    /// Reinstall even when a plugin of the same name is present
    pub force: bool,
    pub skip_dependencies: bool,
    /// Activate right after installing
    pub activate: bool,
    /// Expected version; installation fails if the source provides another one
    pub version: Option<String>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            force: false,
            skip_dependencies: false,
            activate: true,
            version: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallOptions {
    /// Remove the plugin even if its `onUninstall` hook fails
    pub force: bool,
    pub keep_data: bool,
}

/// Criteria for [`PluginManager::list`]; empty fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginFilter {
    pub statuses: Vec<PluginStatus>,
    pub category: Option<String>,
    /// Case-insensitive match against name, description and keywords
    pub keyword: Option<String>,
}

impl PluginFilter {
    pub fn with_status(mut self, status: PluginStatus) -> Self {
        self.statuses.push(status);
        self
    }

    fn matches_manifest(&self, manifest: &PluginManifest) -> bool {
        if let Some(category) = &self.category {
            if manifest.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }

        match &self.keyword {
            Some(keyword) => {
                let haystack = format!(
                    "{} {} {}",
                    manifest.name,
                    manifest.description,
                    manifest.keywords.join(" ")
                )
                .to_lowercase();
                haystack.contains(&keyword.to_lowercase())
            }
            None => true,
        }
    }
}

/// Plugin lifecycle operations
#[async_trait]
pub trait PluginManager: Send + Sync {
    /// Install the plugin found at `source`
    async fn install(&self, source: &Path, options: InstallOptions) -> Result<Plugin>;

    async fn uninstall(&self, name: &str, options: UninstallOptions) -> Result<()>;

    /// Run activation hooks and mark the plugin active. No-op if already active.
    async fn activate(&self, name: &str) -> Result<()>;

    /// Run the deactivation hook and mark the plugin inactive. No-op if already inactive.
    async fn deactivate(&self, name: &str) -> Result<()>;

    /// Installed plugins matching `filter`, skipping any whose manifest cannot be loaded
    async fn list(&self, filter: &PluginFilter) -> Result<Vec<Plugin>>;

    /// `None` when the plugin is not installed or its manifest cannot be loaded
    async fn get(&self, name: &str) -> Result<Option<Plugin>>;
}

/// Default implementation of plugin manager
pub struct DefaultPluginManager {
    config: ManagerConfig,
    registry: PluginRegistry,
    loader: PluginLoader,
    validator: Validator,
    resolver: DependencyResolver,
    events: SharedEventDispatcher,
}

impl Debug for DefaultPluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPluginManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DefaultPluginManager {
    /// Create a new default plugin manager
    pub fn new(config: ManagerConfig) -> Self {
        let loader = PluginLoader::new(config.plugin_dir.clone(), config.hook_timeout);
        Self::with_loader(config, loader)
    }

    /// Manager whose hooks run through `spawner`
    pub fn with_spawner(config: ManagerConfig, spawner: Arc<dyn ProcessSpawner>) -> Self {
        let loader = PluginLoader::new(config.plugin_dir.clone(), config.hook_timeout).with_spawner(spawner);
        Self::with_loader(config, loader)
    }

    fn with_loader(config: ManagerConfig, loader: PluginLoader) -> Self {
        Self {
            registry: PluginRegistry::new(config.registry_path.clone()),
            loader,
            validator: Validator::new(),
            resolver: DependencyResolver::new(),
            events: SharedEventDispatcher::new(),
            config,
        }
    }

    /// Create the directory layout and the registry file if they are missing
    pub async fn initialize(&self) -> Result<()> {
        for dir in [&self.config.plugin_dir, &self.config.cache_dir, &self.config.logs_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::io(e, "create_dir_all", dir.clone()))?;
        }
        self.registry.initialize().await?;
        Ok(())
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Register a closure for `kind`; handlers run in registration order
    pub async fn on(
        &self,
        kind: PluginEventKind,
        handler: Box<dyn Fn(&PluginEvent) -> BoxFuture<'_> + Send + Sync>,
    ) -> EventId {
        self.events.register_handler(kind, handler).await
    }

    pub async fn on_event(&self, kind: PluginEventKind, handler: Box<dyn AsyncEventHandler>) -> EventId {
        self.events.register(kind, handler).await
    }

    pub async fn off(&self, id: EventId) -> bool {
        self.events.unregister_handler(id).await
    }

    /// Deliver an event; handler failures are logged by the dispatcher and dropped here
    async fn emit(&self, event: PluginEvent) {
        let failures = self.events.dispatch(&event).await;
        if !failures.is_empty() {
            log::debug!("{} handler(s) failed for {} event", failures.len(), event.name());
        }
    }

    async fn emit_error(&self, plugin: &str, error: &Error) {
        let data = serde_json::json!({
            "code": error.code(),
            "message": error.to_string(),
        });
        self.emit(PluginEvent::new(PluginEventKind::Error, plugin).with_data(data)).await;
    }

    /// Manifests of every installed plugin that can still be loaded
    async fn installed_manifests(&self) -> Result<HashMap<String, PluginManifest>> {
        let mut manifests = HashMap::new();
        for entry in self.registry.get_all_plugins().await? {
            let path = self.loader.plugin_path(&entry.name, &entry.version);
            match self.loader.load_manifest(&path).await {
                Ok(manifest) => {
                    manifests.insert(entry.name, manifest);
                }
                Err(e) => log::warn!("Skipping {}: {}", entry.name, e),
            }
        }
        Ok(manifests)
    }

    async fn load_plugin(&self, entry: RegistryEntry) -> Result<Plugin> {
        let path = self.loader.plugin_path(&entry.name, &entry.version);
        let manifest = self.loader.load_manifest(&path).await?;
        Ok(entry.into_plugin(manifest))
    }

    async fn require_entry(&self, name: &str) -> Result<RegistryEntry> {
        self.registry.get_plugin(name).await?.ok_or_else(|| {
            PluginSystemError::PluginNotFound {
                plugin: name.to_string(),
            }
            .into()
        })
    }

    /// Resolve `manifest` against installed plugins and return the
    /// dependency name to installed version mapping to record
    async fn resolve_dependencies(&self, manifest: &PluginManifest) -> Result<BTreeMap<String, String>> {
        let available = self.installed_manifests().await?;
        let resolution = self.resolver.resolve(manifest, &available)?;

        for dependency in resolution.install_order.iter().filter(|n| **n != manifest.name) {
            if !available.contains_key(dependency) {
                return Err(PluginSystemError::install(
                    &manifest.name,
                    format!("Dependency {} not available", dependency),
                )
                .into());
            }
        }

        Ok(resolution
            .dependency_tree
            .dependencies
            .iter()
            .map(|node| (node.name.clone(), node.version.clone()))
            .collect())
    }

    async fn install_inner(&self, source: &Path, options: &InstallOptions) -> Result<Plugin> {
        let candidate = self.loader.load_manifest_value(source).await?;
        // A missing or mistyped name is reported by validation below
        let declared_name = candidate.get("name").and_then(Value::as_str).map(str::to_string);
        let label = declared_name.clone().unwrap_or_else(|| source.display().to_string());

        let existing = match &declared_name {
            Some(name) => self.registry.get_plugin(name).await?,
            None => None,
        };
        if let Some(existing) = &existing {
            if !options.force {
                return Err(PluginSystemError::AlreadyInstalled {
                    plugin: existing.name.clone(),
                    version: existing.version.clone(),
                }
                .into());
            }
        }

        let validation = self.validator.validate(&candidate, source).await;
        if !validation.valid {
            return Err(PluginSystemError::install(
                &label,
                format!("Plugin validation failed: {}", validation.error_summary()),
            )
            .into());
        }
        for warning in &validation.warnings {
            log::warn!("{}: {}", label, warning);
        }

        let manifest: PluginManifest = serde_json::from_value(candidate).map_err(|e| {
            PluginSystemError::install(&label, format!("Plugin manifest could not be read: {}", e))
        })?;
        let name = manifest.name.clone();
        let version = manifest.version.clone();

        if let Some(expected) = &options.version {
            if *expected != version {
                return Err(PluginSystemError::install(
                    &name,
                    format!("Requested version {} but source provides {}", expected, version),
                )
                .into());
            }
        }

        let resolved_dependencies = if options.skip_dependencies || manifest.dependencies.is_empty() {
            manifest.dependencies.clone()
        } else {
            self.resolve_dependencies(&manifest).await?
        };

        let source_label = source.display().to_string();
        let staging = Plugin::transient(manifest.clone(), PluginStatus::Installing, source_label.clone());
        let pre_install = self
            .loader
            .execute_hook_in(&staging, HookKind::PreInstall, source, &BTreeMap::new())
            .await;
        if !pre_install.success {
            return Err(PluginSystemError::install(
                &name,
                format!("preInstall hook failed: {}", pre_install.failure_message()),
            )
            .into());
        }

        // A forced reinstall of the same version must survive a failed attempt
        let backup = self.loader.backup_plugin(&name, &version).await?;

        let status = if options.activate {
            PluginStatus::Active
        } else {
            PluginStatus::Inactive
        };
        let mut plugin = Plugin::transient(manifest, status, source_label);
        plugin.resolved_dependencies = resolved_dependencies;
        if let Err(e) = self.place_plugin(source, &mut plugin).await {
            self.roll_back(&name, &version, backup.as_deref()).await;
            return Err(e);
        }
        if let Some(backup) = backup {
            self.loader.discard_backup(&backup).await;
        }

        if let Some(previous) = existing.filter(|e| e.version != version) {
            if let Err(e) = self.loader.uninstall_plugin(&previous.name, &previous.version).await {
                log::warn!("Could not remove {}@{}: {}", previous.name, previous.version, e);
            }
            let data = serde_json::json!({ "from": previous.version, "to": version });
            self.emit(PluginEvent::new(PluginEventKind::Update, &name).with_data(data)).await;
        }

        log::info!("Installed {}@{}", name, version);

        // Failures are reported once, by the install error event
        if options.activate {
            let entry = self.require_entry(&name).await?;
            self.emit(PluginEvent::new(PluginEventKind::Activate, &name)).await;
            self.activate_inner(entry).await?;
        }

        let entry = self.require_entry(&name).await?;
        self.load_plugin(entry).await
    }

    /// Copy, checksum, run `onInstall` and persist the record as inactive.
    ///
    /// Activation later moves the record to active through the regular protocol.
    async fn place_plugin(&self, source: &Path, plugin: &mut Plugin) -> Result<()> {
        let install_path = self.loader.install_plugin(source, &plugin.name, &plugin.version).await?;

        if self.config.validate_checksum {
            plugin.checksum = Some(self.validator.calculate_checksum(&install_path).await?);
        }

        let on_install = self
            .loader
            .execute_hook(plugin, HookKind::OnInstall, &BTreeMap::new())
            .await;
        if !on_install.success {
            return Err(PluginSystemError::install(
                &plugin.name,
                format!("onInstall hook failed: {}", on_install.failure_message()),
            )
            .into());
        }

        let mut entry = RegistryEntry::from(&*plugin);
        entry.status = PluginStatus::Inactive;
        self.registry.add_plugin(entry).await?;
        Ok(())
    }

    /// Remove the copy made by a failed install and bring back what it replaced
    async fn roll_back(&self, name: &str, version: &str, backup: Option<&Path>) {
        if let Err(e) = self.loader.uninstall_plugin(name, version).await {
            log::error!("Rollback of {}@{} failed: {}", name, version, e);
        }
        if let Some(backup) = backup {
            if let Err(e) = self.loader.restore_plugin(name, version, backup).await {
                log::error!("Could not restore previous {}@{}: {}", name, version, e);
            }
        }
    }

    async fn uninstall_inner(&self, entry: RegistryEntry, options: &UninstallOptions) -> Result<()> {
        let name = entry.name.clone();
        let version = entry.version.clone();

        let mut env = BTreeMap::new();
        if options.keep_data {
            env.insert(KEEP_DATA_ENV_VAR.to_string(), "1".to_string());
        }

        match self.load_plugin(entry).await {
            Ok(plugin) => {
                let plugin = plugin.with_status(PluginStatus::Uninstalling);
                let result = self.loader.execute_hook(&plugin, HookKind::OnUninstall, &env).await;
                if !result.success {
                    let message = format!("onUninstall hook failed: {}", result.failure_message());
                    if !options.force {
                        return Err(PluginSystemError::Uninstall { plugin: name, message }.into());
                    }
                    log::warn!("{}: {}, continuing because of force", name, message);
                }
            }
            Err(e) if options.force => log::warn!("Removing {} without running hooks: {}", name, e),
            Err(e) => return Err(e),
        }

        self.loader.uninstall_plugin(&name, &version).await?;
        self.registry.remove_plugin(&name).await?;
        log::info!("Uninstalled {}@{}", name, version);
        Ok(())
    }

    async fn activate_inner(&self, entry: RegistryEntry) -> Result<()> {
        let plugin = self.load_plugin(entry).await?.with_status(PluginStatus::Active);
        let no_env = BTreeMap::new();

        let result = self.loader.execute_hook(&plugin, HookKind::OnActivate, &no_env).await;
        if !result.success {
            return Err(PluginSystemError::Activation {
                plugin: plugin.name,
                message: format!("onActivate hook failed: {}", result.failure_message()),
            }
            .into());
        }

        // Best effort, a failing postActivate does not undo activation
        let post = self.loader.execute_hook(&plugin, HookKind::PostActivate, &no_env).await;
        if !post.success {
            log::warn!("postActivate hook for {} failed: {}", plugin.name, post.failure_message());
        }

        self.registry.update_plugin_status(&plugin.name, PluginStatus::Active).await?;
        log::info!("Activated {}", plugin.name);
        Ok(())
    }

    async fn deactivate_inner(&self, entry: RegistryEntry) -> Result<()> {
        let plugin = self.load_plugin(entry).await?.with_status(PluginStatus::Inactive);

        let result = self
            .loader
            .execute_hook(&plugin, HookKind::OnDeactivate, &BTreeMap::new())
            .await;
        if !result.success {
            return Err(PluginSystemError::Deactivation {
                plugin: plugin.name,
                message: format!("onDeactivate hook failed: {}", result.failure_message()),
            }
            .into());
        }

        self.registry.update_plugin_status(&plugin.name, PluginStatus::Inactive).await?;
        log::info!("Deactivated {}", plugin.name);
        Ok(())
    }
}

#[async_trait]
impl PluginManager for DefaultPluginManager {
    async fn install(&self, source: &Path, options: InstallOptions) -> Result<Plugin> {
        let source_label = source.display().to_string();
        let data = serde_json::to_value(&options).unwrap_or_default();
        self.emit(PluginEvent::new(PluginEventKind::Install, &source_label).with_data(data))
            .await;

        let result = self.install_inner(source, &options).await;
        if let Err(e) = &result {
            self.emit_error(&source_label, e).await;
        }
        result
    }

    async fn uninstall(&self, name: &str, options: UninstallOptions) -> Result<()> {
        let entry = self.require_entry(name).await?;

        let data = serde_json::to_value(&options).unwrap_or_default();
        self.emit(PluginEvent::new(PluginEventKind::Uninstall, name).with_data(data))
            .await;

        let result = self.uninstall_inner(entry, &options).await;
        if let Err(e) = &result {
            self.emit_error(name, e).await;
        }
        result
    }

    async fn activate(&self, name: &str) -> Result<()> {
        let entry = self.require_entry(name).await?;
        if entry.status == PluginStatus::Active {
            log::debug!("{} is already active", name);
            return Ok(());
        }

        self.emit(PluginEvent::new(PluginEventKind::Activate, name)).await;
        let result = self.activate_inner(entry).await;
        if let Err(e) = &result {
            self.emit_error(name, e).await;
        }
        result
    }

    async fn deactivate(&self, name: &str) -> Result<()> {
        let entry = self.require_entry(name).await?;
        if entry.status == PluginStatus::Inactive {
            log::debug!("{} is already inactive", name);
            return Ok(());
        }

        self.emit(PluginEvent::new(PluginEventKind::Deactivate, name)).await;
        let result = self.deactivate_inner(entry).await;
        if let Err(e) = &result {
            self.emit_error(name, e).await;
        }
        result
    }

    async fn list(&self, filter: &PluginFilter) -> Result<Vec<Plugin>> {
        let mut plugins = Vec::new();

        for entry in self.registry.get_all_plugins().await? {
            if !filter.statuses.is_empty() && !filter.statuses.contains(&entry.status) {
                continue;
            }

            let name = entry.name.clone();
            let plugin = match self.load_plugin(entry).await {
                Ok(plugin) => plugin,
                Err(e) => {
                    log::debug!("Skipping {} in listing: {}", name, e);
                    continue;
                }
            };

            if filter.matches_manifest(&plugin.manifest) {
                plugins.push(plugin);
            }
        }

        Ok(plugins)
    }

    async fn get(&self, name: &str) -> Result<Option<Plugin>> {
        let Some(entry) = self.registry.get_plugin(name).await? else {
            return Ok(None);
        };

        match self.load_plugin(entry).await {
            Ok(plugin) => Ok(Some(plugin)),
            Err(e) => {
                log::warn!("Cannot load manifest of {}: {}", name, e);
                Ok(None)
            }
        }
    }
}
