//! # Skillpack Core Plugin System
//!
//! Installs, validates, activates and removes plugins: directories holding a
//! `plugin.json` manifest, one or more skills and optional lifecycle scripts.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`manifest`]**: the manifest schema ([`PluginManifest`]), the runtime
//!   [`Plugin`] view and [`PluginStatus`].
//! - **[`validator`]**: structural and filesystem checks on manifests, and
//!   content checksums of plugin directories.
//! - **[`registry`]**: the durable JSON store of installed plugins
//!   ([`PluginRegistry`]).
//! - **[`dependency`]**: dependency trees, cycle detection and install order
//!   ([`DependencyResolver`]), with range matching in [`version`] and
//!   conflict records in [`conflict`].
//! - **[`loader`]**: copying plugins in and out of the plugin directory,
//!   running hook scripts through [`hooks`] and reading skill descriptors
//!   via [`skills`].
//! - **[`manager`]**: the lifecycle state machine ([`DefaultPluginManager`])
//!   tying everything together and emitting lifecycle events.
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError) and its codes.
pub mod conflict;
pub mod dependency;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod registry;
pub mod skills;
pub mod validator;
pub mod version;

pub use conflict::DependencyConflict;
pub use dependency::{DependencyError, DependencyErrorKind, DependencyNode, DependencyResolver, ResolvedDependencies};
pub use error::PluginSystemError;
pub use hooks::{HookResult, ProcessOutput, ProcessSpawner, ProcessSpec, TokioProcessSpawner};
pub use loader::PluginLoader;
pub use manager::{DefaultPluginManager, InstallOptions, PluginFilter, PluginManager, UninstallOptions};
pub use manifest::{HookKind, ManifestBuilder, NetworkPermission, Plugin, PluginManifest, PluginStatus, SkillReference};
pub use registry::{Marketplace, PluginRegistry, RegistryDocument, RegistryEntry, RegistryError};
pub use skills::SkillInfo;
pub use validator::{ValidationIssue, ValidationResult, Validator};
pub use version::{VersionRange, satisfies_version};

// Test module declaration
#[cfg(test)]
mod tests;
