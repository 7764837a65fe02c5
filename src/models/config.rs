//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source API endpoints and HTTP behavior
    #[serde(default)]
    pub source: SourceConfig,

    /// Run-level settings
    #[serde(default)]
    pub run: RunConfig,

    /// Local output locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Remote store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Publish guard thresholds
    #[serde(default)]
    pub guard: GuardConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.source.max_attempts == 0 {
            return Err(AppError::validation("source.max_attempts must be > 0"));
        }
        if self.source.max_attempts > 10 {
            return Err(AppError::validation("source.max_attempts must be <= 10"));
        }
        if self.source.max_concurrent == 0 {
            return Err(AppError::validation("source.max_concurrent must be > 0"));
        }
        url::Url::parse(&self.source.base_url)?;
        url::Url::parse(&self.source.roster_url)?;
        if self.run.run_timeout_secs == 0 {
            return Err(AppError::validation("run.run_timeout_secs must be > 0"));
        }
        if self.guard.max_drop_percent > 100 {
            return Err(AppError::validation(
                "guard.max_drop_percent must be within 0-100",
            ));
        }
        Ok(())
    }
}

/// Source API endpoints and HTTP client behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Season-scoped standings API root
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Live-timing API root used for rosters
    #[serde(default = "defaults::roster_url")]
    pub roster_url: String,

    /// Optional endpoint serving raw telemetry documents
    #[serde(default)]
    pub telemetry_url: Option<String>,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-attempt timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per resource before giving up
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            roster_url: defaults::roster_url(),
            telemetry_url: None,
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_attempts: defaults::max_attempts(),
            retry_delay_ms: defaults::retry_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Run-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Season to fetch when none is given on the command line
    #[serde(default = "defaults::season")]
    pub season: u16,

    /// Upper bound for the whole fetch phase
    #[serde(default = "defaults::run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            season: defaults::season(),
            run_timeout_secs: defaults::run_timeout(),
        }
    }
}

/// Local output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Generated standings module
    #[serde(default = "defaults::artifact")]
    pub artifact: PathBuf,

    /// Root directory of the local document/blob store
    #[serde(default = "defaults::store_root")]
    pub store_root: PathBuf,

    /// Directory for local-only telemetry exports
    #[serde(default = "defaults::export_dir")]
    pub export_dir: PathBuf,

    /// Optional reference tables file
    #[serde(default)]
    pub reference: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            artifact: defaults::artifact(),
            store_root: defaults::store_root(),
            export_dir: defaults::export_dir(),
            reference: None,
        }
    }
}

/// Remote store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Object storage bucket; the local store is used when unset
    #[serde(default)]
    pub bucket: Option<String>,

    /// Key prefix inside the bucket
    #[serde(default)]
    pub prefix: String,

    /// Explicit credentials file, checked before any other source
    #[serde(default)]
    pub credentials: Option<PathBuf>,
}

/// Thresholds for the publish guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Maximum tolerated shrink of a published collection (0-100)
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Prior size below which the shrink check is skipped
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Source defaults
    pub fn base_url() -> String {
        "https://api.jolpi.ca/ergast/f1".into()
    }
    pub fn roster_url() -> String {
        "https://api.openf1.org/v1".into()
    }
    pub fn user_agent() -> String {
        "F1FanHub/1.0 (daily-driver-project)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        500
    }
    pub fn max_concurrent() -> usize {
        4
    }

    // Run defaults
    pub fn season() -> u16 {
        2024
    }
    pub fn run_timeout() -> u64 {
        120
    }

    // Path defaults
    pub fn artifact() -> PathBuf {
        PathBuf::from("web/src/data/standings.ts")
    }
    pub fn store_root() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn export_dir() -> PathBuf {
        PathBuf::from("computed_data")
    }

    // Guard defaults
    pub fn max_drop_percent() -> u8 {
        50
    }
    pub fn min_baseline() -> usize {
        5
    }
}
