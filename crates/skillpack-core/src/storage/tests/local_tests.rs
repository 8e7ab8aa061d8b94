#![cfg(test)]

use serde::{Deserialize, Serialize};
use tempfile::tempdir;

use crate::storage::error::StorageSystemError;
use crate::storage::local::{read_json, write_json_atomic};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Doc {
    name: String,
    count: u32,
}

#[tokio::test]
async fn test_write_then_read() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("nested").join("doc.json");
    let doc = Doc { name: "alpha".into(), count: 3 };

    write_json_atomic(&path, &doc).await.expect("write failed");
    assert!(path.is_file());

    let read: Doc = read_json(&path).await.expect("read failed");
    assert_eq!(read, doc);
}

#[tokio::test]
async fn test_overwrite_replaces_whole_document() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("doc.json");

    write_json_atomic(&path, &Doc { name: "a-much-longer-name".into(), count: 1 }).await.unwrap();
    write_json_atomic(&path, &Doc { name: "b".into(), count: 2 }).await.unwrap();

    let read: Doc = read_json(&path).await.unwrap();
    assert_eq!(read, Doc { name: "b".into(), count: 2 });

    // No temp files left behind
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_read_missing_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let result = read_json::<Doc>(&dir.path().join("absent.json")).await;
    assert!(matches!(result, Err(StorageSystemError::FileNotFound(_))));
}

#[tokio::test]
async fn test_read_corrupt_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("doc.json");
    std::fs::write(&path, "{\"name\": ").unwrap();

    let result = read_json::<Doc>(&path).await;
    assert!(matches!(result, Err(StorageSystemError::DeserializationError { .. })));
}
