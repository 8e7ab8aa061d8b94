pub mod event;
pub mod kernel;
pub mod plugin_system;
pub mod storage;
pub mod utils;

// Re-export key public types for the binary
pub use event::{PluginEvent, PluginEventKind};
pub use kernel::error::{Error, Result};
pub use plugin_system::{
    DefaultPluginManager, InstallOptions, Plugin, PluginFilter, PluginLoader, PluginManager, PluginManifest,
    PluginStatus, UninstallOptions, Validator,
};
pub use storage::ManagerConfig;
