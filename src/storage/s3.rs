//! AWS S3 storage implementation.
//!
//! Documents live at `{prefix}/{collection}/{id}.json`, blobs at
//! `{prefix}/{path}`. A single `put_object` is the unit of write, so a
//! document is either fully replaced or left as it was.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use serde::Deserialize;
use serde_json::Value;

use crate::config::CredentialSource;
use crate::error::{AppError, Result};
use crate::storage::{BlobStore, DocumentStore, check_path, check_segment};

/// Static credentials file accepted for the object store.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    session_token: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

/// S3-backed document and blob store.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Create a new S3 store from a ready client.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Build the client once from the resolved credential source.
    pub async fn connect(
        source: &CredentialSource,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Result<Self> {
        let loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        let loader = match source.path() {
            Some(path) => {
                let file = read_credentials(path)?;
                log::info!("Using object store credentials from {}", source);
                let loader = loader.credentials_provider(Credentials::new(
                    file.access_key_id,
                    file.secret_access_key,
                    file.session_token,
                    None,
                    "pitwall-credentials-file",
                ));
                match file.region {
                    Some(region) => loader.region(Region::new(region)),
                    None => loader,
                }
            }
            None => {
                log::info!("Using ambient object store credentials");
                loader
            }
        };
        let config = loader.load().await;
        Ok(Self::new(Client::new(&config), bucket, prefix))
    }

    fn key(&self, relative: &str) -> String {
        if self.prefix.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.prefix, relative)
        }
    }

    fn document_key(&self, collection: &str, id: &str) -> Result<String> {
        check_segment(collection)?;
        check_segment(id)?;
        Ok(self.key(&format!("{collection}/{id}.json")))
    }

    /// Read an object, `None` when the key does not exist.
    async fn read_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::S3(e.to_string()))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::debug!("No existing object at s3://{}/{}", self.bucket, key);
                    Ok(None)
                } else {
                    Err(AppError::S3(service_err.to_string()))
                }
            }
        }
    }

    async fn write_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let len = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::S3(e.to_string()))?;

        log::info!("Wrote {} bytes to s3://{}/{}", len, self.bucket, key);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::S3(e.to_string()))?;

        log::info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

fn read_credentials(path: &Path) -> Result<CredentialsFile> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        AppError::config(format!(
            "Credentials file {} is not usable: {}",
            path.display(),
            e
        ))
    })
}

#[async_trait]
impl DocumentStore for S3Store {
    fn location(&self, collection: &str, id: &str) -> String {
        format!(
            "s3://{}/{}",
            self.bucket,
            self.key(&format!("{collection}/{id}.json"))
        )
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let key = self.document_key(collection, id)?;
        match self.read_object(&key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_document(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let key = self.document_key(collection, id)?;
        let bytes = serde_json::to_vec_pretty(document)?;
        self.write_object(&key, bytes, "application/json").await
    }
}

#[async_trait]
impl BlobStore for S3Store {
    fn blob_url(&self, path: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.key(path))
    }

    async fn put_blob(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        check_path(path)?;
        self.write_object(&self.key(path), bytes, content_type).await?;
        Ok(self.blob_url(path))
    }

    async fn get_blob(&self, path: &str) -> Result<Option<Vec<u8>>> {
        check_path(path)?;
        self.read_object(&self.key(path)).await
    }

    async fn delete_blob(&self, path: &str) -> Result<()> {
        check_path(path)?;
        self.delete_object(&self.key(path)).await
    }
}
