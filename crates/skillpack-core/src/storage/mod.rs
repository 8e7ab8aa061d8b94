//! # Skillpack Core Storage
//!
//! Persistence helpers shared by the plugin system.
//!
//! - **[`local`]**: JSON documents read with `tokio::fs` and written atomically
//!   through a temporary file in the target directory.
//! - **[`config`]**: [`ManagerConfig`] and the optional `config.{json,toml,yaml}`
//!   override file.
//! - **[`error`]**: [`StorageSystemError`](error::StorageSystemError).
pub mod config;
pub mod error;
pub mod local;

/// Re-export key types
pub use config::{ConfigFormat, ConfigOverrides, ManagerConfig};
pub use local::{read_json, write_json_atomic};

// Test module declaration
#[cfg(test)]
mod tests;
