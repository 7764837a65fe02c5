// src/pipeline/orchestrator.rs

//! Run sequencing: fetch → normalize/deduplicate → sanitize → publish.
//!
//! Mandatory fetches run concurrently and are joined under a run timeout.
//! Any mandatory failure, an empty mandatory collection, a timeout or a
//! cancellation ends the run in `Aborted` before a sink is touched.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use futures::future::try_join_all;
use tokio::sync::watch;

use crate::error::{AppError, Result};
use crate::models::{
    Category, Config, Keyed, RaceRef, RawRecord, RecencyMarker, ReferenceTables,
};
use crate::pipeline::dedup::Deduplicator;
use crate::pipeline::guard::PublishGuard;
use crate::pipeline::normalize::{self, NormalizeContext};
use crate::pipeline::publish::{PublishBatch, PublishReceipt, Sink};
use crate::pipeline::sanitize::{self, finite};
use crate::services::{self, Resource, Source};
use crate::utils::progress;

/// Field carrying the roster's recency marker.
const SESSION_KEY: &str = "session_key";

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Normalizing,
    Sanitizing,
    Publishing,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State machine of a single run.
#[derive(Debug, Clone)]
pub struct RunTracker {
    history: Vec<RunState>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self {
            history: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> RunState {
        self.history.last().copied().unwrap_or(RunState::Idle)
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Move to `next`, rejecting transitions the run may not take.
    pub fn advance(&mut self, next: RunState) -> Result<()> {
        use RunState::*;

        let allowed = matches!(
            (self.state(), next),
            (Idle, Fetching)
                | (Fetching, Normalizing)
                | (Normalizing, Sanitizing)
                | (Sanitizing, Publishing)
                | (Publishing, Done)
                | (Fetching, Aborted)
                | (Normalizing, Aborted)
        );
        if !allowed {
            return Err(AppError::validation(format!(
                "illegal run transition {} -> {}",
                self.state(),
                next
            )));
        }
        log::debug!("Run state: {} -> {}", self.state(), next);
        self.history.push(next);
        Ok(())
    }

    /// Enter `Aborted` and hand back the error that caused it.
    fn abort(&mut self, error: AppError) -> AppError {
        if let Err(e) = self.advance(RunState::Aborted) {
            log::error!("{}", e);
        }
        log::error!("Run aborted: {}", error);
        error
    }
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub fetched: usize,
    /// Records dropped by the normalizer
    pub skipped: usize,
    /// Records collapsed by the deduplicator
    pub duplicates: usize,
    pub published: usize,
    pub receipts: Vec<PublishReceipt>,
    pub history: Vec<RunState>,
}

impl RunReport {
    fn new(tracker: &RunTracker) -> Self {
        Self {
            fetched: 0,
            skipped: 0,
            duplicates: 0,
            published: 0,
            receipts: Vec::new(),
            history: tracker.history().to_vec(),
        }
    }

    pub fn state(&self) -> RunState {
        self.history.last().copied().unwrap_or(RunState::Idle)
    }

    fn log_summary(&self, title: &str) {
        progress::summary(
            title,
            &[
                ("fetched", self.fetched.to_string()),
                ("skipped", self.skipped.to_string()),
                ("duplicates", self.duplicates.to_string()),
                ("published", self.published.to_string()),
                (
                    "written",
                    self.receipts.iter().map(|r| r.written).sum::<usize>().to_string(),
                ),
                (
                    "failed",
                    self.receipts.iter().map(|r| r.failed).sum::<usize>().to_string(),
                ),
            ],
        );
    }
}

/// Sequences one run against a source and a set of sinks.
pub struct Orchestrator<'a> {
    source: &'a dyn Source,
    sinks: Vec<&'a dyn Sink>,
    tables: &'a ReferenceTables,
    config: &'a Config,
    guard: PublishGuard,
    run_timeout: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(source: &'a dyn Source, tables: &'a ReferenceTables, config: &'a Config) -> Self {
        Self {
            source,
            sinks: Vec::new(),
            tables,
            config,
            guard: PublishGuard::new(config.guard.clone()),
            run_timeout: Duration::from_secs(config.run.run_timeout_secs),
            cancel: None,
        }
    }

    pub fn with_sink(mut self, sink: &'a dyn Sink) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_guard(mut self, guard: PublishGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Abort the run once the channel carries `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Publish the drivers' and constructors' championships of a season.
    pub async fn run_standings(&self, season: u16) -> Result<RunReport> {
        progress::header(&format!("Standings {season}"));
        let mut tracker = RunTracker::new();
        let resources = [
            services::driver_standings(&self.config.source, season)?,
            services::constructor_standings(&self.config.source, season)?,
        ];

        tracker.advance(RunState::Fetching)?;
        progress::step(1, 4, "Fetching standings");
        let mut streams = match self.fetch_all(&resources).await {
            Ok(streams) => streams,
            Err(e) => return Err(tracker.abort(e)),
        };
        let constructor_raw = streams.pop().unwrap_or_default();
        let driver_raw = streams.pop().unwrap_or_default();

        tracker.advance(RunState::Normalizing)?;
        progress::step(2, 4, "Normalizing standings");
        let ctx = NormalizeContext::new(season, self.tables);
        let mut report = RunReport::new(&tracker);
        report.fetched = driver_raw.len() + constructor_raw.len();

        let drivers = collect(
            &driver_raw,
            season,
            |raw| normalize::driver_standing(raw, &ctx),
            |_| RecencyMarker::ABSENT,
            &mut report,
        );
        let mut constructors = collect(
            &constructor_raw,
            season,
            |raw| normalize::constructor_standing(raw, &ctx),
            |_| RecencyMarker::ABSENT,
            &mut report,
        );
        normalize::link_constructor_drivers(&mut constructors, &drivers);

        let batch = PublishBatch::Standings {
            season,
            drivers,
            constructors,
        };
        if let Err(e) = self.check_complete(&batch, &resources).await {
            return Err(tracker.abort(e));
        }

        self.finish(tracker, report, batch, "Standings run").await
    }

    /// Publish the driver, team and car documents of a season.
    pub async fn run_roster(&self, season: u16, session_key: &str) -> Result<RunReport> {
        progress::header(&format!("Roster {season} (session {session_key})"));
        let mut tracker = RunTracker::new();
        let resources = [services::roster_drivers(&self.config.source, session_key)?];

        tracker.advance(RunState::Fetching)?;
        progress::step(1, 4, "Fetching roster");
        let raw = match self.fetch_all(&resources).await {
            Ok(mut streams) => streams.pop().unwrap_or_default(),
            Err(e) => return Err(tracker.abort(e)),
        };

        tracker.advance(RunState::Normalizing)?;
        progress::step(2, 4, "Normalizing roster");
        let ctx = NormalizeContext::new(season, self.tables);
        let mut report = RunReport::new(&tracker);
        report.fetched = raw.len();

        let drivers = collect(
            &raw,
            season,
            |r| normalize::driver(r, &ctx),
            |r| r.recency(SESSION_KEY),
            &mut report,
        );

        // Drivers without a team only lack the team document.
        let mut teams = Deduplicator::new(season);
        for driver in &drivers {
            if let Ok(team) = normalize::team(driver, &ctx) {
                teams.offer(team, RecencyMarker::ABSENT);
            }
        }
        let teams = teams.into_sorted();
        let cars = normalize::cars(&ctx);

        let batch = PublishBatch::Roster {
            season,
            drivers,
            teams,
            cars,
        };
        if let Err(e) = self.check_complete(&batch, &resources).await {
            return Err(tracker.abort(e));
        }

        self.finish(tracker, report, batch, "Roster run").await
    }

    /// Publish one telemetry export.
    pub async fn run_telemetry(&self, race: RaceRef, input: Option<&Path>) -> Result<RunReport> {
        progress::header(&format!("Telemetry {}", race.record_id()));
        let mut tracker = RunTracker::new();
        let resource = services::telemetry(&self.config.source, race, input)?;

        tracker.advance(RunState::Fetching)?;
        progress::step(1, 4, "Fetching telemetry");
        let fetch = async {
            self.source
                .fetch_document(&resource)
                .await
                .map_err(|e| AppError::aborted(&resource.name, e))
        };
        let document = match self.bounded(fetch).await {
            Ok(document) => document,
            Err(e) => return Err(tracker.abort(e)),
        };

        tracker.advance(RunState::Normalizing)?;
        progress::step(2, 4, "Normalizing telemetry");
        let mut report = RunReport::new(&tracker);
        report.fetched = 1;
        let export = match normalize::telemetry(document, race, Utc::now()) {
            Ok(export) => export,
            Err(e) => return Err(tracker.abort(AppError::aborted(&resource.name, e))),
        };

        let batch = PublishBatch::Telemetry(Box::new(export));
        if let Err(e) = self.check_complete(&batch, std::slice::from_ref(&resource)).await {
            return Err(tracker.abort(e));
        }

        self.finish(tracker, report, batch, "Telemetry run").await
    }

    /// Fetch every resource concurrently under the run timeout.
    ///
    /// Mandatory failures and empty mandatory results fail the whole join,
    /// which drops the fetches still in flight. Optional failures yield an
    /// empty stream.
    async fn fetch_all(&self, resources: &[Resource]) -> Result<Vec<Vec<RawRecord>>> {
        let fetches = try_join_all(resources.iter().map(|resource| async move {
            match self.source.fetch(resource).await {
                Ok(records) if records.is_empty() && resource.mandatory => {
                    Err(AppError::aborted(&resource.name, "empty result set"))
                }
                Ok(records) => {
                    log::info!("{}: {} records", resource.name, records.len());
                    Ok(records)
                }
                Err(e) if resource.mandatory => Err(AppError::aborted(&resource.name, e)),
                Err(e) => {
                    log::warn!("{}: optional fetch failed: {}", resource.name, e);
                    Ok(Vec::new())
                }
            }
        }));
        self.bounded(fetches).await
    }

    /// Race a fetch phase against the run timeout and the cancel signal.
    async fn bounded<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.run_timeout;
        tokio::select! {
            outcome = tokio::time::timeout(timeout, work) => match outcome {
                Ok(result) => result,
                Err(_) => Err(AppError::aborted(
                    "run",
                    format!("timed out after {}s", timeout.as_secs()),
                )),
            },
            _ = self.cancelled() => Err(AppError::aborted("run", "cancelled")),
        }
    }

    async fn cancelled(&self) {
        if let Some(cancel) = &self.cancel {
            let mut cancel = cancel.clone();
            if cancel.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await
    }

    /// Completeness checks that gate the publish step.
    async fn check_complete(&self, batch: &PublishBatch, resources: &[Resource]) -> Result<()> {
        let any_mandatory = resources.iter().any(|r| r.mandatory);

        if let PublishBatch::Standings {
            drivers,
            constructors,
            ..
        } = batch
        {
            unique_positions(Category::DriverStandings, drivers.iter().map(|d| d.position))?;
            unique_positions(
                Category::ConstructorStandings,
                constructors.iter().map(|c| c.position),
            )?;
        }

        for sink in &self.sinks {
            let previous = match sink.previous_sizes(batch).await {
                Ok(previous) => previous,
                Err(e) => {
                    self.guard.baseline_unavailable(sink.name(), &e)?;
                    Default::default()
                }
            };
            for (category, current) in batch.sizes() {
                if current == 0 && !any_mandatory {
                    continue;
                }
                self.guard
                    .validate(category.as_str(), current, previous.get(&category).copied())?;
            }
        }

        if self.sinks.is_empty() {
            for (category, current) in batch.sizes() {
                self.guard.validate(category.as_str(), current, None)?;
            }
        }
        Ok(())
    }

    /// Sanitize and publish, then close the run.
    async fn finish(
        &self,
        mut tracker: RunTracker,
        mut report: RunReport,
        mut batch: PublishBatch,
        title: &str,
    ) -> Result<RunReport> {
        tracker.advance(RunState::Sanitizing)?;
        progress::step(3, 4, "Sanitizing");
        sanitize_batch(&mut batch);
        report.published = batch.sizes().iter().map(|(_, n)| n).sum();

        tracker.advance(RunState::Publishing)?;
        progress::step(4, 4, &format!("Publishing {}", batch.describe()));
        for sink in &self.sinks {
            let receipt = sink.publish(&batch).await?;
            log::info!(
                "Published to {} at {} ({} written, {} unchanged, {} failed)",
                receipt.sink,
                receipt.location,
                receipt.written,
                receipt.unchanged,
                receipt.failed
            );
            report.receipts.push(receipt);
        }

        tracker.advance(RunState::Done)?;
        report.history = tracker.history().to_vec();
        report.log_summary(title);
        Ok(report)
    }
}

/// Normalize and deduplicate one record stream.
fn collect<T, N, M>(
    raw: &[RawRecord],
    season: u16,
    normalize: N,
    marker: M,
    report: &mut RunReport,
) -> Vec<T>
where
    T: Keyed,
    N: Fn(&RawRecord) -> Result<T>,
    M: Fn(&RawRecord) -> RecencyMarker,
{
    let mut dedup = Deduplicator::new(season);
    for record in raw {
        match normalize(record) {
            Ok(entity) => {
                dedup.offer(entity, marker(record));
            }
            Err(e) => {
                report.skipped += 1;
                log::warn!("Skipping record: {}", e);
            }
        }
    }
    report.duplicates += dedup.duplicates();
    dedup.into_sorted()
}

fn unique_positions(category: Category, positions: impl Iterator<Item = u32>) -> Result<()> {
    let mut seen = HashSet::new();
    for position in positions {
        if !seen.insert(position) {
            return Err(AppError::aborted(
                category.as_str(),
                format!("position {position} appears more than once"),
            ));
        }
    }
    Ok(())
}

/// Final pass guaranteeing every number in the batch is finite or absent.
fn sanitize_batch(batch: &mut PublishBatch) {
    match batch {
        PublishBatch::Standings {
            drivers,
            constructors,
            ..
        } => {
            for d in drivers.iter_mut() {
                d.points = d.points.and_then(finite);
            }
            for c in constructors.iter_mut() {
                c.points = c.points.and_then(finite);
            }
        }
        PublishBatch::Roster { .. } => {}
        PublishBatch::Telemetry(export) => {
            for list in [
                &mut export.frames,
                &mut export.track_layout,
                &mut export.track_statuses,
            ] {
                for item in list.iter_mut() {
                    *item = sanitize::sanitize(&sanitize::Value::from(item.take()));
                }
            }
        }
    }
}
