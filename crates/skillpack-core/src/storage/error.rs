//! # Skillpack Core Storage Errors
//!
//! Defines [`StorageSystemError`], covering file I/O, serialization of
//! JSON documents and configuration file parsing.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageSystemError {
    #[error("I/O error during operation '{operation}' on path '{path}': {source}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found at path: {0}")]
    FileNotFound(PathBuf),

    #[error("Serialization to '{format}' failed: {source}")]
    SerializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Deserialization from '{format}' failed for '{path}': {source}")]
    DeserializationError {
        format: String,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Unsupported configuration format: {0}")]
    UnsupportedConfigFormat(String),

    #[error("Invalid path provided: '{path}': {reason}")]
    InvalidPath { path: PathBuf, reason: String },
}

// Helper for creating Io errors, ensuring path is always included.
impl StorageSystemError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        StorageSystemError::Io {
            source,
            operation: operation.into(),
            path,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StorageSystemError::Io { .. } => "IO_ERROR",
            StorageSystemError::FileNotFound(_) => "FILE_NOT_FOUND",
            StorageSystemError::SerializationError { .. } => "SERIALIZATION_ERROR",
            StorageSystemError::DeserializationError { .. } => "DESERIALIZATION_ERROR",
            StorageSystemError::UnsupportedConfigFormat(_) => "UNSUPPORTED_CONFIG_FORMAT",
            StorageSystemError::InvalidPath { .. } => "INVALID_PATH",
        }
    }
}
