#![cfg(test)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;

use crate::plugin_system::hooks::{ProcessOutput, ProcessSpawner, ProcessSpec};
use crate::plugin_system::manager::DefaultPluginManager;
use crate::plugin_system::manifest::{ManifestBuilder, PluginManifest};
use crate::storage::config::ManagerConfig;

pub const SKILL_DIR: &str = "skills/main";

/// A manifest that passes validation once written with [`write_plugin`]
pub fn manifest(name: &str, version: &str) -> ManifestBuilder {
    ManifestBuilder::new(name, version)
        .description("Test plugin used by the plugin system tests")
        .author("Test Author")
        .license("MIT")
        .repository("https://example.com/test.git")
        .skill(SKILL_DIR)
}

/// Lay out a plugin source directory under `root` and return its path.
///
/// Every declared skill gets a `SKILL.md`, every declared hook a placeholder script.
pub fn write_plugin(root: &Path, manifest: &PluginManifest) -> PathBuf {
    let dir = root.join(format!("{}-{}", manifest.name, manifest.version));
    std::fs::create_dir_all(&dir).expect("create plugin dir");

    for skill in &manifest.skills {
        let skill_dir = dir.join(skill.path());
        std::fs::create_dir_all(&skill_dir).expect("create skill dir");
        let skill_name = skill_dir.file_name().unwrap().to_string_lossy().into_owned();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            format!("---\nname: {}\ndescription: Does useful things\n---\n\n# Skill\n", skill_name),
        )
        .expect("write SKILL.md");
    }

    for script in manifest.hooks.values() {
        let script_path = dir.join(script);
        std::fs::create_dir_all(script_path.parent().unwrap()).expect("create hook dir");
        std::fs::write(&script_path, "#!/bin/sh\nexit 0\n").expect("write hook script");
    }

    let json = serde_json::to_string_pretty(manifest).expect("serialize manifest");
    std::fs::write(dir.join("plugin.json"), json).expect("write plugin.json");
    dir
}

/// Spawner that never starts a process: it records every request and
/// answers with a canned outcome chosen by the script's file name.
#[derive(Default)]
pub struct ScriptedSpawner {
    calls: StdMutex<Vec<ProcessSpec>>,
    outcomes: HashMap<String, ProcessOutput>,
}

impl ScriptedSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, script_file: &str, stderr: &str) -> Self {
        self.outcomes.insert(
            script_file.to_string(),
            ProcessOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code: Some(2),
                timed_out: false,
            },
        );
        self
    }

    pub fn timing_out(mut self, script_file: &str) -> Self {
        self.outcomes.insert(
            script_file.to_string(),
            ProcessOutput {
                timed_out: true,
                ..ProcessOutput::default()
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<ProcessSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// File names of the scripts run so far, in order
    pub fn scripts_run(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|spec| spec.program.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }
}

#[async_trait]
impl ProcessSpawner for ScriptedSpawner {
    async fn run(&self, spec: ProcessSpec) -> io::Result<ProcessOutput> {
        let key = spec
            .program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(spec);

        Ok(self.outcomes.get(&key).cloned().unwrap_or(ProcessOutput {
            stdout: format!("ran {}", key),
            stderr: String::new(),
            exit_code: Some(0),
            timed_out: false,
        }))
    }
}

/// An initialized manager rooted at `base`, running hooks through `spawner`
pub async fn manager_in(base: &Path, spawner: Arc<ScriptedSpawner>) -> DefaultPluginManager {
    let manager = DefaultPluginManager::with_spawner(ManagerConfig::from_base_dir(base), spawner);
    manager.initialize().await.expect("initialize manager");
    manager
}
