// src/error.rs

//! Unified error handling for the publishing pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A Source API request failed after every allowed attempt
    #[error("Fetch error for {resource}: {message}")]
    Fetch { resource: String, message: String },

    /// A raw record lacks a required identity field
    #[error("Normalize error for {record}: {message}")]
    Normalize { record: String, message: String },

    /// A sink rejected the write or could not be reached
    #[error("Publish error for {sink}: {message}")]
    Publish { sink: String, message: String },

    /// The run was aborted before anything was published
    #[error("Run aborted at {resource}: {reason}")]
    Aborted { resource: String, reason: String },

    /// AWS S3 error
    #[error("S3 error: {0}")]
    S3(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a fetch error for a resource.
    pub fn fetch(resource: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            resource: resource.into(),
            message: message.to_string(),
        }
    }

    /// Create a normalize error for a record.
    pub fn normalize(record: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Normalize {
            record: record.into(),
            message: message.to_string(),
        }
    }

    /// Create a publish error for a sink.
    pub fn publish(sink: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Publish {
            sink: sink.into(),
            message: message.to_string(),
        }
    }

    /// Create an abort error naming the resource that stopped the run.
    pub fn aborted(resource: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Aborted {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error must stop a run before the publish step.
    pub fn is_mandatory_failure(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Aborted { .. })
    }
}
