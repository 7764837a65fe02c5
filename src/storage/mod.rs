//! Storage backends for published data.
//!
//! Two seams: a document store holding one JSON document per
//! `(collection, id)` and a blob store holding opaque files by path.
//!
//! ## Local layout
//!
//! ```text
//! {root}/
//! ├── standings/
//! │   └── 2024.json         # one document per season
//! ├── drivers/
//! │   └── max_verstappen.json
//! ├── teams/ cars/ races/   # roster and telemetry metadata documents
//! └── blobs/
//!     └── races/2024/1.json # telemetry exports
//! ```

pub mod artifact;
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, Result};

// Re-export for convenience
pub use artifact::{StandingsArtifact, render_standings_module};
pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Keyed JSON documents grouped into collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Human-readable location of a document.
    fn location(&self, collection: &str, id: &str) -> String;

    /// Read a document, `None` when it does not exist.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Replace a document as one unit.
    async fn put_document(&self, collection: &str, id: &str, document: &Value) -> Result<()>;
}

/// Opaque files addressed by relative path.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Public reference recorded next to the blob's metadata.
    fn blob_url(&self, path: &str) -> String;

    /// Write a blob as one unit and return its URL.
    async fn put_blob(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    /// Read a blob, `None` when it does not exist.
    async fn get_blob(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a blob; removing a missing blob is not an error.
    async fn delete_blob(&self, path: &str) -> Result<()>;
}

/// Reject keys that would escape their collection.
pub(crate) fn check_segment(segment: &str) -> Result<()> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\'])
    {
        return Err(AppError::validation(format!(
            "Invalid storage key segment '{segment}'"
        )));
    }
    Ok(())
}

/// Reject relative blob paths with empty or parent segments.
pub(crate) fn check_path(path: &str) -> Result<()> {
    if path.starts_with('/') {
        return Err(AppError::validation(format!("Blob path '{path}' is absolute")));
    }
    path.split('/').try_for_each(check_segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments() {
        assert!(check_segment("2024_1").is_ok());
        assert!(check_segment("").is_err());
        assert!(check_segment("..").is_err());
        assert!(check_segment("a/b").is_err());
    }

    #[test]
    fn test_paths() {
        assert!(check_path("races/2024/1.json").is_ok());
        assert!(check_path("/etc/passwd").is_err());
        assert!(check_path("races/../secrets").is_err());
        assert!(check_path("races//1.json").is_err());
    }
}
