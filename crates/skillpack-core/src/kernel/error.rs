//! # Skillpack Core Kernel Errors
//!
//! Defines the crate-wide [`Error`] type.
//!
//! Each subsystem owns a typed error enum (plugin system, storage, events).
//! [`Error`] wraps them via `#[from]` so that public operations can use `?`
//! freely, while callers can still branch on [`Error::code`] instead of
//! matching on message text.
use std::path::PathBuf;
use std::result::Result as StdResult;

use crate::event::error::EventSystemError;
use crate::plugin_system::error::PluginSystemError;
use crate::storage::error::StorageSystemError;
use thiserror::Error as ThisError;

/// Error type for the skillpack core
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error(transparent)]
    PluginSystem(#[from] PluginSystemError),

    /// Specific, typed storage system error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Event system error
    #[error("Event system error: {0}")]
    EventSystem(#[from] EventSystemError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl Error {
    /// Helper to create an I/O error with operation and path context
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }

    /// Machine-readable code for this error, stable across releases
    pub fn code(&self) -> &'static str {
        match self {
            Error::PluginSystem(e) => e.code(),
            Error::StorageSystem(e) => e.code(),
            Error::EventSystem(_) => "EVENT_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Name of the plugin the error concerns, when there is one
    pub fn plugin(&self) -> Option<&str> {
        match self {
            Error::PluginSystem(e) => e.plugin(),
            _ => None,
        }
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<crate::plugin_system::dependency::DependencyError> for Error {
    fn from(err: crate::plugin_system::dependency::DependencyError) -> Self {
        Error::PluginSystem(PluginSystemError::from(err))
    }
}

impl From<crate::plugin_system::registry::RegistryError> for Error {
    fn from(err: crate::plugin_system::registry::RegistryError) -> Self {
        Error::PluginSystem(PluginSystemError::from(err))
    }
}
