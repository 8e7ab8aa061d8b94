use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::storage::error::StorageSystemError;

type StorageResult<T> = std::result::Result<T, StorageSystemError>;

/// Read and parse a JSON document.
///
/// A missing file is reported as [`StorageSystemError::FileNotFound`] so that
/// callers can tell first-time absence apart from corruption.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageSystemError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(StorageSystemError::io(e, "read_to_string", path.to_path_buf())),
    };

    serde_json::from_str(&contents).map_err(|e| StorageSystemError::DeserializationError {
        format: "json".to_string(),
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let contents = serde_json::to_vec_pretty(value).map_err(|e| StorageSystemError::SerializationError {
        format: "json".to_string(),
        source: Box::new(e),
    })?;
    write_bytes_atomic(path, contents).await
}

/// Write `contents` to a temporary file next to `path`, then rename it over `path`.
pub async fn write_bytes_atomic(path: &Path, contents: Vec<u8>) -> StorageResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => {
            return Err(StorageSystemError::InvalidPath {
                path: path.to_path_buf(),
                reason: "path has no parent directory".to_string(),
            });
        }
    };

    tokio::fs::create_dir_all(&parent)
        .await
        .map_err(|e| StorageSystemError::io(e, "create_dir_all", parent.clone()))?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || persist_in(&parent, &target, &contents))
        .await
        .map_err(|e| StorageSystemError::io(std::io::Error::other(e), "spawn_blocking", path.to_path_buf()))?
}

fn persist_in(parent: &Path, target: &PathBuf, contents: &[u8]) -> StorageResult<()> {
    let mut temp_file = NamedTempFile::new_in(parent)
        .map_err(|e| StorageSystemError::io(e, "create_temp_file", parent.to_path_buf()))?;

    temp_file
        .write_all(contents)
        .map_err(|e| StorageSystemError::io(e, "write_to_temp_file", temp_file.path().to_path_buf()))?;

    // Persist the temporary file, atomically replacing the target file
    temp_file
        .persist(target)
        .map_err(|e| StorageSystemError::io(e.error, "persist_temp_file", target.clone()))?;

    Ok(())
}
