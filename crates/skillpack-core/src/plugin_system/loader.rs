use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::fs;

use crate::kernel::constants;
use crate::kernel::error::{Error as KernelError, Result as KernelResult};
use crate::plugin_system::error::{PluginSystemError, PluginSystemErrorSource};
use crate::plugin_system::hooks::{HookResult, ProcessSpawner, ProcessSpec, TokioProcessSpawner};
use crate::plugin_system::manifest::{HookKind, Plugin, PluginManifest};
use crate::plugin_system::skills::{DEFAULT_SKILL_DESCRIPTION, SkillInfo, parse_frontmatter};
use crate::utils::fs::{copy_dir, dir_size, remove_dir_all_if_exists};

/// Filesystem side of the plugin system: manifests, installed copies,
/// hook scripts and skill descriptors.
pub struct PluginLoader {
    plugin_dir: PathBuf,
    spawner: Arc<dyn ProcessSpawner>,
    hook_timeout: Duration,
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("plugin_dir", &self.plugin_dir)
            .field("hook_timeout", &self.hook_timeout)
            .finish_non_exhaustive()
    }
}

impl PluginLoader {
    /// Loader that runs hooks with [`TokioProcessSpawner`]
    pub fn new(plugin_dir: impl Into<PathBuf>, hook_timeout: Duration) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            spawner: Arc::new(TokioProcessSpawner),
            hook_timeout,
        }
    }

    /// Replace the process spawner used for hooks
    pub fn with_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// Installation directory of `name` at `version`
    pub fn plugin_path(&self, name: &str, version: &str) -> PathBuf {
        self.plugin_dir.join(format!("{}@{}", name, version))
    }

    /// Read `<plugin_path>/plugin.json` without interpreting it
    pub async fn load_manifest_value(&self, plugin_path: &Path) -> KernelResult<Value> {
        let manifest_path = plugin_path.join(constants::MANIFEST_FILE);
        let content = fs::read_to_string(&manifest_path)
            .await
            .map_err(|e| manifest_error(&manifest_path, e.into()))?;

        serde_json::from_str(&content).map_err(|e| manifest_error(&manifest_path, e.into()))
    }

    /// Load and parse `<plugin_path>/plugin.json`
    pub async fn load_manifest(&self, plugin_path: &Path) -> KernelResult<PluginManifest> {
        let value = self.load_manifest_value(plugin_path).await?;
        serde_json::from_value(value)
            .map_err(|e| manifest_error(&plugin_path.join(constants::MANIFEST_FILE), e.into()))
    }

    /// Copy `source` into the installation directory, replacing any previous copy.
    ///
    /// `node_modules` and `.git` are left behind.
    pub async fn install_plugin(&self, source: &Path, name: &str, version: &str) -> KernelResult<PathBuf> {
        let target = self.plugin_path(name, version);
        log::info!("Copying {} to {}", source.display(), target.display());

        let (from, to) = (source.to_path_buf(), target.clone());
        let copied = tokio::task::spawn_blocking(move || {
            remove_dir_all_if_exists(&to)?;
            copy_dir(&from, &to, constants::EXCLUDED_DIRS)
        })
        .await
        .map_err(|e| install_error(name, "copy task failed", std::io::Error::other(e)))?;

        copied.map_err(|e| install_error(name, &format!("failed to copy {}", source.display()), e))?;
        Ok(target)
    }

    /// Where a live installation is parked while it is being replaced
    pub fn backup_path(&self, name: &str, version: &str) -> PathBuf {
        self.plugin_dir.join(format!(".{}@{}.previous", name, version))
    }

    /// Move an existing installation of `name@version` out of the way.
    ///
    /// Returns the backup location, or `None` when nothing was installed there.
    pub async fn backup_plugin(&self, name: &str, version: &str) -> KernelResult<Option<PathBuf>> {
        let target = self.plugin_path(name, version);
        if !fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(None);
        }

        let backup = self.backup_path(name, version);
        let (from, to) = (target.clone(), backup.clone());
        let moved = tokio::task::spawn_blocking(move || {
            remove_dir_all_if_exists(&to)?;
            std::fs::rename(&from, &to)
        })
        .await
        .map_err(|e| install_error(name, "backup task failed", std::io::Error::other(e)))?;

        moved.map_err(|e| install_error(name, &format!("failed to back up {}", target.display()), e))?;
        log::debug!("Moved {} to {}", target.display(), backup.display());
        Ok(Some(backup))
    }

    /// Put a backup taken by [`backup_plugin`](Self::backup_plugin) back in place,
    /// discarding whatever occupies the installation directory
    pub async fn restore_plugin(&self, name: &str, version: &str, backup: &Path) -> KernelResult<()> {
        let target = self.plugin_path(name, version);
        let (from, to) = (backup.to_path_buf(), target.clone());
        let restored = tokio::task::spawn_blocking(move || {
            remove_dir_all_if_exists(&to)?;
            std::fs::rename(&from, &to)
        })
        .await
        .map_err(|e| install_error(name, "restore task failed", std::io::Error::other(e)))?;

        restored.map_err(|e| install_error(name, &format!("failed to restore {}", target.display()), e))
    }

    /// Drop a backup once its replacement is in place
    pub async fn discard_backup(&self, backup: &Path) {
        let path = backup.to_path_buf();
        let removed = tokio::task::spawn_blocking(move || remove_dir_all_if_exists(&path)).await;
        match removed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Could not remove backup {}: {}", backup.display(), e),
            Err(e) => log::warn!("Could not remove backup {}: {}", backup.display(), e),
        }
    }

    /// Remove the installation directory; an absent directory is not an error
    pub async fn uninstall_plugin(&self, name: &str, version: &str) -> KernelResult<()> {
        let target = self.plugin_path(name, version);
        let path = target.clone();
        let removed = tokio::task::spawn_blocking(move || remove_dir_all_if_exists(&path))
            .await
            .map_err(|e| KernelError::io(std::io::Error::other(e), "spawn_blocking", target.clone()))?;

        removed.map_err(|e| {
            PluginSystemError::Uninstall {
                plugin: name.to_string(),
                message: format!("failed to remove {}: {}", target.display(), e),
            }
            .into()
        })
    }

    pub async fn is_installed(&self, name: &str, version: &str) -> bool {
        fs::try_exists(self.plugin_path(name, version)).await.unwrap_or(false)
    }

    /// A plugin directory is well-formed when it carries a manifest file
    pub async fn validate_structure(&self, plugin_path: &Path) -> bool {
        fs::try_exists(plugin_path.join(constants::MANIFEST_FILE))
            .await
            .unwrap_or(false)
    }

    /// Run `hook` from the plugin's installation directory
    pub async fn execute_hook(
        &self,
        plugin: &Plugin,
        hook: HookKind,
        extra_env: &BTreeMap<String, String>,
    ) -> HookResult {
        let plugin_path = self.plugin_path(&plugin.name, &plugin.version);
        self.execute_hook_in(plugin, hook, &plugin_path, extra_env).await
    }

    /// Run `hook` with `root` as both the script base and the working directory.
    ///
    /// A hook the manifest does not declare succeeds without running anything.
    pub async fn execute_hook_in(
        &self,
        plugin: &Plugin,
        hook: HookKind,
        root: &Path,
        extra_env: &BTreeMap<String, String>,
    ) -> HookResult {
        let Some(script) = plugin.manifest.hooks.get(hook.as_str()) else {
            return HookResult::skipped();
        };

        let script_path = root.join(script);
        if !fs::try_exists(&script_path).await.unwrap_or(false) {
            return HookResult::failed(format!("Hook script not found: {}", script_path.display()));
        }
        make_executable(&script_path).await;

        let mut env = BTreeMap::from([
            ("PLUGIN_NAME".to_string(), plugin.name.clone()),
            ("PLUGIN_VERSION".to_string(), plugin.version.clone()),
            ("PLUGIN_PATH".to_string(), root.display().to_string()),
        ]);
        env.extend(extra_env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let spec = ProcessSpec {
            program: script_path,
            args: Vec::new(),
            cwd: root.to_path_buf(),
            env,
            timeout: self.hook_timeout,
        };

        log::debug!("Running {} hook for {}@{}", hook, plugin.name, plugin.version);
        let result = match self.spawner.run(spec).await {
            Ok(output) => HookResult::from(output),
            Err(e) => HookResult::failed(e.to_string()),
        };

        if !result.success {
            log::warn!("{} hook for {} failed: {}", hook, plugin.name, result.failure_message());
        }
        result
    }

    /// Read every declared skill's descriptor, in declaration order
    pub async fn load_skills(&self, plugin: &Plugin) -> KernelResult<Vec<SkillInfo>> {
        let plugin_path = self.plugin_path(&plugin.name, &plugin.version);
        let mut skills = Vec::with_capacity(plugin.manifest.skills.len());

        for reference in &plugin.manifest.skills {
            let skill_dir = plugin_path.join(reference.path());
            let skill_error = |message: String| PluginSystemError::SkillLoad {
                plugin: plugin.name.clone(),
                skill_path: reference.path().to_string(),
                message,
            };

            let descriptor = skill_dir.join(constants::SKILL_DESCRIPTOR_FILE);
            let content = fs::read_to_string(&descriptor)
                .await
                .map_err(|e| skill_error(format!("cannot read {}: {}", descriptor.display(), e)))?;
            let fields = parse_frontmatter(&content)
                .ok_or_else(|| skill_error(format!("no frontmatter found in {}", constants::SKILL_DESCRIPTOR_FILE)))?;

            let fallback_name = Path::new(reference.path())
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| reference.path().to_string());

            skills.push(SkillInfo {
                name: fields.get("name").cloned().unwrap_or(fallback_name),
                description: fields
                    .get("description")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_SKILL_DESCRIPTION.to_string()),
                path: skill_dir,
                enabled: reference.enabled(),
                plugin: plugin.name.clone(),
            });
        }

        Ok(skills)
    }

    /// Best-effort size in bytes of an installation
    pub async fn plugin_size(&self, name: &str, version: &str) -> u64 {
        let path = self.plugin_path(name, version);
        tokio::task::spawn_blocking(move || dir_size(path, constants::EXCLUDED_DIRS))
            .await
            .unwrap_or(0)
    }
}

fn manifest_error(path: &Path, source: PluginSystemErrorSource) -> KernelError {
    PluginSystemError::ManifestLoad {
        path: path.to_path_buf(),
        source: Box::new(source),
    }
    .into()
}

fn install_error(plugin: &str, message: &str, source: std::io::Error) -> KernelError {
    PluginSystemError::Install {
        plugin: plugin.to_string(),
        message: format!("{}: {}", message, source),
        source: Some(Box::new(source.into())),
    }
    .into()
}

#[cfg(unix)]
async fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let Ok(metadata) = fs::metadata(path).await else {
        return;
    };
    let mut permissions = metadata.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    if let Err(e) = fs::set_permissions(path, permissions).await {
        log::debug!("Could not mark {} executable: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) {}
