// src/config.rs

//! Configuration loading utilities.
//!
//! Loads the run configuration and reference tables, and decides which
//! credential source the store client is built from.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{Config, ReferenceTables};

/// Environment variable naming a credentials file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Files searched next to the config, in priority order.
pub const WELL_KNOWN_CREDENTIALS: [&str; 3] = [
    "firebase-key.json",
    "firebase-credentials.json",
    "service-account.json",
];

/// Where the store client takes its credentials from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Path given on the command line or in the config file
    ExplicitFile(PathBuf),
    /// Path named by [`CREDENTIALS_ENV`]
    EnvFile(PathBuf),
    /// One of [`WELL_KNOWN_CREDENTIALS`]
    WellKnownFile(PathBuf),
    /// Whatever the SDK finds in its own environment
    AmbientDefault,
}

impl CredentialSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::ExplicitFile(p) | Self::EnvFile(p) | Self::WellKnownFile(p) => Some(p),
            Self::AmbientDefault => None,
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExplicitFile(p) => write!(f, "explicit file {}", p.display()),
            Self::EnvFile(p) => write!(f, "{} ({})", CREDENTIALS_ENV, p.display()),
            Self::WellKnownFile(p) => write!(f, "well-known file {}", p.display()),
            Self::AmbientDefault => f.write_str("ambient default"),
        }
    }
}

/// Pick the first usable credential source.
///
/// Order: explicit path, then the environment variable, then the
/// well-known files in `search_dir`, then the SDK's ambient default. A
/// path only counts when it points to an existing file.
pub fn resolve_credentials(
    explicit: Option<&Path>,
    env_value: Option<&str>,
    search_dir: &Path,
) -> CredentialSource {
    if let Some(path) = explicit {
        if path.is_file() {
            return CredentialSource::ExplicitFile(path.to_path_buf());
        }
        log::warn!("Credentials file {} not found, ignoring", path.display());
    }

    if let Some(value) = env_value.map(str::trim).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(value);
        if path.is_file() {
            return CredentialSource::EnvFile(path);
        }
        log::warn!("{} points to missing file {}", CREDENTIALS_ENV, value);
    }

    WELL_KNOWN_CREDENTIALS
        .iter()
        .map(|name| search_dir.join(name))
        .find(|path| path.is_file())
        .map(CredentialSource::WellKnownFile)
        .unwrap_or(CredentialSource::AmbientDefault)
}

/// Load and validate the configuration and the reference tables.
///
/// A missing config file yields defaults; an invalid one is an error.
pub fn load_all(config_path: &Path) -> Result<(Config, ReferenceTables)> {
    let config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        log::info!(
            "No config at {}, using defaults",
            config_path.display()
        );
        Config::default()
    };
    config.validate()?;

    let reference = config.paths.reference.as_ref().map(|p| resolve_relative(config_path, p));
    let tables = ReferenceTables::load_or_default(reference.as_deref())?;
    tables
        .validate()
        .map_err(|e| AppError::config(format!("Invalid reference tables: {e}")))?;

    Ok((config, tables))
}

/// Resolve a path from the config file relative to the file's directory.
pub fn resolve_relative(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    config_path
        .parent()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_file_wins() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("mine.json");
        let env = tmp.path().join("env.json");
        std::fs::write(&explicit, "{}").unwrap();
        std::fs::write(&env, "{}").unwrap();
        std::fs::write(tmp.path().join("firebase-key.json"), "{}").unwrap();

        let source = resolve_credentials(Some(&explicit), env.to_str(), tmp.path());
        assert_eq!(source, CredentialSource::ExplicitFile(explicit));
    }

    #[test]
    fn test_missing_explicit_falls_through_to_env() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path().join("env.json");
        std::fs::write(&env, "{}").unwrap();

        let source =
            resolve_credentials(Some(&tmp.path().join("nope.json")), env.to_str(), tmp.path());
        assert_eq!(source, CredentialSource::EnvFile(env));
    }

    #[test]
    fn test_well_known_files_in_order() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("service-account.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("firebase-credentials.json"), "{}").unwrap();

        let source = resolve_credentials(None, None, tmp.path());
        assert_eq!(
            source,
            CredentialSource::WellKnownFile(tmp.path().join("firebase-credentials.json"))
        );
    }

    #[test]
    fn test_ambient_default() {
        let tmp = TempDir::new().unwrap();
        let source = resolve_credentials(None, Some("  "), tmp.path());
        assert_eq!(source, CredentialSource::AmbientDefault);
        assert!(source.path().is_none());
    }

    #[test]
    fn test_load_all_defaults_when_missing() {
        let tmp = TempDir::new().unwrap();
        let (config, tables) = load_all(&tmp.path().join("pitwall.toml")).unwrap();
        assert_eq!(config.run.season, 2024);
        assert!(!tables.teams.is_empty());
    }

    #[test]
    fn test_load_all_rejects_invalid_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pitwall.toml");
        std::fs::write(&path, "[source]\nmax_attempts = 0\n").unwrap();
        assert!(load_all(&path).is_err());
    }

    #[test]
    fn test_reference_path_is_relative_to_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pitwall.toml");
        std::fs::write(&path, "[paths]\nreference = \"teams.toml\"\n").unwrap();
        std::fs::write(
            tmp.path().join("teams.toml"),
            "team_aliases = {}\n[[teams]]\nid = \"andretti\"\nname = \"Andretti\"\ncolor = \"#123456\"\n",
        )
        .unwrap();

        let (_, tables) = load_all(&path).unwrap();
        assert_eq!(tables.teams.len(), 1);
        assert!(tables.team("andretti").is_some());
    }

    #[test]
    fn test_broken_reference_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pitwall.toml");
        std::fs::write(&path, "[paths]\nreference = \"teams.toml\"\n").unwrap();
        std::fs::write(tmp.path().join("teams.toml"), "[[teams]\nid = \"andretti\"\n").unwrap();

        let err = load_all(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("teams.toml"));
    }

    #[test]
    fn test_missing_reference_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pitwall.toml");
        std::fs::write(&path, "[paths]\nreference = \"nope.toml\"\n").unwrap();

        assert!(matches!(load_all(&path), Err(AppError::Config(_))));
    }
}
