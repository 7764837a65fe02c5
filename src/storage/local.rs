//! Local filesystem storage implementation.
//!
//! Backs both storage seams for development, tests and `--local-only`
//! exports. Every write lands in a temp file first and is renamed into
//! place, so readers never observe a half-written document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{BlobStore, DocumentStore, check_path, check_segment};

const BLOB_DIR: &str = "blobs";

/// Local filesystem store.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn document_path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        check_segment(collection)?;
        check_segment(id)?;
        Ok(self.root_dir.join(collection).join(format!("{id}.json")))
    }

    fn blob_path(&self, path: &str) -> Result<PathBuf> {
        check_path(path)?;
        Ok(self.root_dir.join(BLOB_DIR).join(path))
    }
}

/// Write bytes atomically (write to temp, then rename).
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(AppError::Io(e));
    }
    Ok(())
}

/// Read bytes, returning None if the file doesn't exist.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    fn location(&self, collection: &str, id: &str) -> String {
        self.root_dir
            .join(collection)
            .join(format!("{id}.json"))
            .display()
            .to_string()
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let path = self.document_path(collection, id)?;
        match read_optional(&path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_document(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let path = self.document_path(collection, id)?;
        let bytes = serde_json::to_vec_pretty(document)?;
        write_atomic(&path, &bytes).await
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    fn blob_url(&self, path: &str) -> String {
        self.root_dir.join(BLOB_DIR).join(path).display().to_string()
    }

    async fn put_blob(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let full = self.blob_path(path)?;
        write_atomic(&full, &bytes).await?;
        log::info!("Wrote {} bytes to {}", bytes.len(), full.display());
        Ok(self.blob_url(path))
    }

    async fn get_blob(&self, path: &str) -> Result<Option<Vec<u8>>> {
        read_optional(&self.blob_path(path)?).await
    }

    async fn delete_blob(&self, path: &str) -> Result<()> {
        let full = self.blob_path(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => {
                log::info!("Deleted {}", full.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_document_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let doc = json!({ "season": 2024, "driver_standings": [] });
        store.put_document("standings", "2024", &doc).await.unwrap();

        let loaded = store.get_document("standings", "2024").await.unwrap();
        assert_eq!(loaded, Some(doc));
        assert!(tmp.path().join("standings/2024.json").exists());
    }

    #[tokio::test]
    async fn test_missing_document_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        assert!(store.get_document("drivers", "nobody").await.unwrap().is_none());
        assert!(store.get_blob("races/2024/1.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blob_write_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let url = store
            .put_blob("races/2024/1.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();
        assert!(url.ends_with("1.json"));

        let dir = tmp.path().join("blobs/races/2024");
        let names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("1.json")]);
    }

    #[tokio::test]
    async fn test_delete_blob_tolerates_missing() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store
            .put_blob("races/2024/1.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();

        store.delete_blob("races/2024/1.json").await.unwrap();
        assert!(store.get_blob("races/2024/1.json").await.unwrap().is_none());
        store.delete_blob("races/2024/1.json").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_ids() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let err = store.put_document("drivers", "../x", &json!({})).await;
        assert!(err.is_err());
    }
}
