// src/services/source.rs

//! Source API access.
//!
//! A [`Resource`] names one JSON document and where its records sit inside
//! it. [`HttpSource`] fetches it with a bounded number of attempts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{RawRecord, SourceConfig};
use crate::pipeline::sanitize::relax_non_finite;
use crate::utils::http::create_async_client;

/// One fetchable Source API document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Short name used in logs and errors
    pub name: String,
    pub url: Url,
    /// Whether a failure must abort the run
    pub mandatory: bool,
    /// Dotted path to the record array; numeric segments index arrays
    pub payload_path: String,
}

impl Resource {
    /// A mandatory resource whose payload is the whole document.
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
            mandatory: true,
            payload_path: String::new(),
        }
    }

    /// Set the dotted path to the record array.
    pub fn at(mut self, payload_path: impl Into<String>) -> Self {
        self.payload_path = payload_path.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    /// Pull the record array out of a fetched document.
    ///
    /// A path that runs out early yields no records; a path that ends on
    /// something other than an array is malformed.
    pub fn extract(&self, document: Value) -> Result<Vec<RawRecord>> {
        let mut node = document;
        for segment in self.payload_path.split('.').filter(|s| !s.is_empty()) {
            let next = match (&mut node, segment.parse::<usize>()) {
                (Value::Array(items), Ok(index)) if index < items.len() => {
                    Some(items.swap_remove(index))
                }
                (Value::Object(map), _) => map.remove(segment),
                _ => None,
            };
            match next {
                Some(value) => node = value,
                None => {
                    log::warn!("{}: nothing at '{}'", self.name, self.payload_path);
                    return Ok(Vec::new());
                }
            }
        }

        let Value::Array(items) = node else {
            return Err(AppError::fetch(
                &self.name,
                format!("payload at '{}' is not an array", self.payload_path),
            ));
        };

        let total = items.len();
        let records: Vec<RawRecord> = items.into_iter().filter_map(RawRecord::from_value).collect();
        if records.len() < total {
            log::warn!(
                "{}: skipped {} non-object entries",
                self.name,
                total - records.len()
            );
        }
        Ok(records)
    }
}

/// Read-only Source API.
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetch the raw JSON document of a resource.
    async fn fetch_document(&self, resource: &Resource) -> Result<Value>;

    /// Fetch a resource's record array.
    async fn fetch(&self, resource: &Resource) -> Result<Vec<RawRecord>> {
        let document = self.fetch_document(resource).await?;
        resource.extract(document)
    }
}

/// Why one attempt failed, and whether another may help.
#[derive(Debug)]
struct AttemptError {
    message: String,
    retryable: bool,
}

impl AttemptError {
    fn retry(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// HTTP Source API client with bounded retries.
///
/// Also reads `file://` URLs, which lets runs replay saved documents.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    async fn attempt(&self, url: &Url) -> std::result::Result<Value, AttemptError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AttemptError::retry(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {status}");
            return Err(if retryable_status(status) {
                AttemptError::retry(message)
            } else {
                AttemptError::fatal(message)
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::retry(e.to_string()))?;
        parse_document(&body).map_err(|e| AttemptError::retry(format!("malformed JSON: {e}")))
    }

    async fn read_file(&self, resource: &Resource) -> Result<Value> {
        let path = resource
            .url
            .to_file_path()
            .map_err(|_| AppError::fetch(&resource.name, "invalid file URL"))?;
        let body = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AppError::fetch(&resource.name, format!("{}: {e}", path.display())))?;
        parse_document(&body)
            .map_err(|e| AppError::fetch(&resource.name, format!("malformed JSON: {e}")))
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn fetch_document(&self, resource: &Resource) -> Result<Value> {
        if resource.url.scheme() == "file" {
            return self.read_file(resource).await;
        }

        let mut last = String::new();
        for attempt in 1..=self.max_attempts {
            log::debug!("GET {} (attempt {}/{})", resource.url, attempt, self.max_attempts);
            match self.attempt(&resource.url).await {
                Ok(document) => return Ok(document),
                Err(e) if e.retryable && attempt < self.max_attempts => {
                    log::warn!(
                        "{}: attempt {}/{} failed: {}, retrying",
                        resource.name,
                        attempt,
                        self.max_attempts,
                        e.message
                    );
                    last = e.message;
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => {
                    last = e.message;
                    break;
                }
            }
        }

        log::error!("{}: giving up: {}", resource.name, last);
        Err(AppError::fetch(&resource.name, last))
    }
}

fn retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn parse_document(body: &str) -> serde_json::Result<Value> {
    serde_json::from_str(&relax_non_finite(body))
}
