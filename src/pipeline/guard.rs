//! Publish guard.
//!
//! Refuses to replace a published collection with an empty one, or with one
//! that shrank by more than the configured share of the prior size.

use crate::error::{AppError, Result};
use crate::models::GuardConfig;

/// Publish guard over collection sizes.
#[derive(Debug, Clone)]
pub struct PublishGuard {
    config: GuardConfig,
    force: bool,
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardResult {
    /// Safe to publish
    Safe { current: usize, previous: usize },
    /// Nothing published before, or the prior size is below the baseline
    ColdStart { current: usize },
    /// Collection shrank too much
    Triggered {
        current: usize,
        previous: usize,
        drop_percent: f64,
    },
    /// Nothing to publish
    EmptyResult,
}

impl PublishGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            force: false,
        }
    }

    /// Skip the shrink check. Empty collections are still refused.
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Compare a collection size against the previously published one.
    pub fn check(&self, current: usize, previous: Option<usize>) -> GuardResult {
        if current == 0 {
            return GuardResult::EmptyResult;
        }

        let previous = match previous {
            Some(p) if p >= self.config.min_baseline => p,
            _ => return GuardResult::ColdStart { current },
        };

        if current < previous {
            let drop_percent = ((previous - current) as f64 / previous as f64) * 100.0;
            if drop_percent > f64::from(self.config.max_drop_percent) {
                return GuardResult::Triggered {
                    current,
                    previous,
                    drop_percent,
                };
            }
        }

        GuardResult::Safe { current, previous }
    }

    /// Check one collection and turn a refusal into `AppError::Aborted`.
    pub fn validate(&self, collection: &str, current: usize, previous: Option<usize>) -> Result<()> {
        match self.check(current, previous) {
            GuardResult::Safe { current, previous } => {
                log::info!(
                    "Publish guard: SAFE for {} ({} entries, was {})",
                    collection,
                    current,
                    previous
                );
                Ok(())
            }
            GuardResult::ColdStart { current } => {
                log::info!(
                    "Publish guard: COLD START for {} ({} entries, no usable baseline)",
                    collection,
                    current
                );
                Ok(())
            }
            GuardResult::Triggered {
                current,
                previous,
                drop_percent,
            } => {
                if self.force {
                    log::warn!(
                        "Publish guard: forced past {} → {} entries for {} ({:.1}% drop)",
                        previous,
                        current,
                        collection,
                        drop_percent
                    );
                    return Ok(());
                }
                log::error!(
                    "Publish guard: TRIGGERED for {}! {} → {} entries ({:.1}% drop > {}% threshold)",
                    collection,
                    previous,
                    current,
                    drop_percent,
                    self.config.max_drop_percent
                );
                Err(AppError::aborted(
                    collection,
                    format!(
                        "collection shrank from {previous} to {current} ({drop_percent:.1}% drop)"
                    ),
                ))
            }
            GuardResult::EmptyResult => {
                log::error!("Publish guard: EMPTY {} - aborting publish", collection);
                Err(AppError::aborted(collection, "empty result set"))
            }
        }
    }
}

impl PublishGuard {
    /// Decide a run whose prior sizes could not be read. Only a forced
    /// guard publishes without a baseline.
    pub fn baseline_unavailable(&self, sink: &str, error: &AppError) -> Result<()> {
        if self.force {
            log::warn!(
                "Publish guard: forced past unreadable baseline for {}: {}",
                sink,
                error
            );
            return Ok(());
        }
        log::error!("Publish guard: no baseline for {}: {}", sink, error);
        Err(AppError::aborted(
            sink,
            format!("previous sizes unavailable: {error}"),
        ))
    }
}

impl Default for PublishGuard {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_no_drop() {
        let guard = PublishGuard::default();
        assert!(matches!(guard.check(20, Some(20)), GuardResult::Safe { .. }));
    }

    #[test]
    fn test_safe_small_drop() {
        let guard = PublishGuard::default();
        assert!(matches!(guard.check(15, Some(20)), GuardResult::Safe { .. }));
    }

    #[test]
    fn test_triggered_large_drop() {
        let guard = PublishGuard::default();
        assert!(matches!(
            guard.check(4, Some(20)),
            GuardResult::Triggered { previous: 20, .. }
        ));
    }

    #[test]
    fn test_cold_start() {
        let guard = PublishGuard::default();
        assert!(matches!(guard.check(20, None), GuardResult::ColdStart { .. }));
        assert!(matches!(guard.check(1, Some(3)), GuardResult::ColdStart { .. }));
    }

    #[test]
    fn test_empty_result_even_without_baseline() {
        let guard = PublishGuard::default();
        assert_eq!(guard.check(0, None), GuardResult::EmptyResult);
        assert_eq!(guard.check(0, Some(20)), GuardResult::EmptyResult);
    }

    #[test]
    fn test_increase_is_safe() {
        let guard = PublishGuard::default();
        assert!(matches!(guard.check(24, Some(20)), GuardResult::Safe { .. }));
    }

    #[test]
    fn test_validate_returns_abort() {
        let guard = PublishGuard::default();
        let err = guard.validate("driver_standings", 2, Some(20)).unwrap_err();
        assert!(matches!(err, AppError::Aborted { .. }));
        assert!(err.is_mandatory_failure());
    }

    #[test]
    fn test_force_skips_shrink_but_not_empty() {
        let guard = PublishGuard::default().forced(true);
        assert!(guard.validate("drivers", 2, Some(20)).is_ok());
        assert!(guard.validate("drivers", 0, Some(20)).is_err());
    }

    #[test]
    fn test_unreadable_baseline_aborts_unless_forced() {
        let error = AppError::publish("artifact", "permission denied");
        let err = PublishGuard::default()
            .baseline_unavailable("artifact", &error)
            .unwrap_err();
        assert!(matches!(err, AppError::Aborted { .. }));
        assert!(err.to_string().contains("permission denied"));

        let forced = PublishGuard::default().forced(true);
        assert!(forced.baseline_unavailable("artifact", &error).is_ok());
    }
}
