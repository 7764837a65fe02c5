//! Publishing of normalized collections to sinks.
//!
//! - `ArtifactSink`: the generated standings module
//! - `ExportSink`: local telemetry exports
//! - `StoreSink`: merge-upsert into a document store, plus blobs for telemetry
//!
//! Every sink is idempotent: publishing the same batch twice leaves the
//! second run with nothing to write.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{
    Car, Category, ConstructorStanding, Driver, DriverStanding, Keyed, PointsHistoryRow, Team,
    TelemetryExport,
};
use crate::storage::artifact::digest;
use crate::storage::local::{read_optional, write_atomic};
use crate::storage::{BlobStore, DocumentStore, StandingsArtifact, render_standings_module};

/// Collection holding one standings document per season.
pub const STANDINGS_COLLECTION: &str = "standings";

/// Field stamped on a document whenever its content changes.
pub const UPDATED_AT: &str = "updated_at";

/// Fully normalized, deduplicated and sanitized payload of one run.
#[derive(Debug, Clone)]
pub enum PublishBatch {
    Standings {
        season: u16,
        drivers: Vec<DriverStanding>,
        constructors: Vec<ConstructorStanding>,
    },
    Roster {
        season: u16,
        drivers: Vec<Driver>,
        teams: Vec<Team>,
        cars: Vec<Car>,
    },
    Telemetry(Box<TelemetryExport>),
}

impl PublishBatch {
    /// Entry count per mandatory collection, for the publish guard.
    pub fn sizes(&self) -> Vec<(Category, usize)> {
        match self {
            PublishBatch::Standings {
                drivers,
                constructors,
                ..
            } => vec![
                (Category::DriverStandings, drivers.len()),
                (Category::ConstructorStandings, constructors.len()),
            ],
            PublishBatch::Roster { drivers, .. } => vec![(Category::Drivers, drivers.len())],
            PublishBatch::Telemetry(export) => vec![(Category::Races, export.frames.len())],
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PublishBatch::Standings { season, .. } => format!("standings {season}"),
            PublishBatch::Roster { season, .. } => format!("roster {season}"),
            PublishBatch::Telemetry(export) => format!("telemetry {}", export.race().record_id()),
        }
    }
}

/// Proof of a completed publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReceipt {
    pub sink: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    /// Documents or files actually written
    pub written: usize,
    /// Documents whose content was already current
    pub unchanged: usize,
    /// Independent documents that failed to write
    pub failed: usize,
}

impl PublishReceipt {
    fn new(sink: &str, location: impl Into<String>) -> Self {
        Self {
            sink: sink.to_string(),
            location: location.into(),
            timestamp: Utc::now(),
            written: 0,
            unchanged: 0,
            failed: 0,
        }
    }
}

/// A publish destination.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    /// Sizes of the collections this sink published last time.
    async fn previous_sizes(&self, _batch: &PublishBatch) -> Result<BTreeMap<Category, usize>> {
        Ok(BTreeMap::new())
    }

    async fn publish(&self, batch: &PublishBatch) -> Result<PublishReceipt>;
}

/// Deep-merge `incoming` over `existing`.
///
/// Objects merge key by key; any other value, arrays included, replaces
/// what was there. Keys absent from `incoming` are kept.
pub fn merge_upsert(existing: Option<Value>, incoming: Value) -> Value {
    match (existing, incoming) {
        (Some(Value::Object(mut base)), Value::Object(patch)) => {
            for (key, value) in patch {
                let merged = merge_upsert(base.remove(&key), value);
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, incoming) => incoming,
    }
}

fn now_stamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn unsupported(sink: &str, batch: &PublishBatch) -> AppError {
    AppError::publish(sink, format!("cannot publish {}", batch.describe()))
}

// ---------------------------------------------------------------------------
// Artifact sink
// ---------------------------------------------------------------------------

/// Writes standings into the generated module.
#[derive(Debug, Clone)]
pub struct ArtifactSink {
    artifact: StandingsArtifact,
    points_history: Vec<PointsHistoryRow>,
}

impl ArtifactSink {
    pub fn new(artifact: StandingsArtifact, points_history: Vec<PointsHistoryRow>) -> Self {
        Self {
            artifact,
            points_history,
        }
    }
}

#[async_trait]
impl Sink for ArtifactSink {
    fn name(&self) -> &str {
        "artifact"
    }

    async fn previous_sizes(&self, batch: &PublishBatch) -> Result<BTreeMap<Category, usize>> {
        let PublishBatch::Standings { season, .. } = batch else {
            return Ok(BTreeMap::new());
        };
        Ok(self
            .artifact
            .previous_sizes(*season)
            .await?
            .map(|(drivers, constructors)| {
                BTreeMap::from([
                    (Category::DriverStandings, drivers),
                    (Category::ConstructorStandings, constructors),
                ])
            })
            .unwrap_or_default())
    }

    async fn publish(&self, batch: &PublishBatch) -> Result<PublishReceipt> {
        let PublishBatch::Standings {
            season,
            drivers,
            constructors,
        } = batch
        else {
            return Err(unsupported(self.name(), batch));
        };

        let module = render_standings_module(*season, drivers, constructors, &self.points_history)?;
        let written = self
            .artifact
            .write_if_changed(&module)
            .await
            .map_err(|e| AppError::publish(self.name(), e))?;

        let mut receipt = PublishReceipt::new(self.name(), self.artifact.path().display().to_string());
        if written {
            receipt.written = 1;
        } else {
            receipt.unchanged = 1;
        }
        Ok(receipt)
    }
}

// ---------------------------------------------------------------------------
// Local export sink
// ---------------------------------------------------------------------------

/// Writes telemetry exports to `<dir>/<year>_<round>.json`.
#[derive(Debug, Clone)]
pub struct ExportSink {
    dir: PathBuf,
}

impl ExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Sink for ExportSink {
    fn name(&self) -> &str {
        "export"
    }

    async fn publish(&self, batch: &PublishBatch) -> Result<PublishReceipt> {
        let PublishBatch::Telemetry(export) = batch else {
            return Err(unsupported(self.name(), batch));
        };

        let path = self
            .dir
            .join(format!("{}.json", export.race().record_id()));
        let bytes = serde_json::to_vec(&**export)?;
        let mut receipt = PublishReceipt::new(self.name(), path.display().to_string());

        let current = read_optional(&path)
            .await
            .map_err(|e| AppError::publish(self.name(), e))?;
        if current.is_some_and(|c| digest(&c) == digest(&bytes)) {
            receipt.unchanged = 1;
            return Ok(receipt);
        }

        write_atomic(&path, &bytes)
            .await
            .map_err(|e| AppError::publish(self.name(), e))?;
        log::info!("Exported {} bytes to {}", bytes.len(), path.display());
        receipt.written = 1;
        Ok(receipt)
    }
}

// ---------------------------------------------------------------------------
// Store sink
// ---------------------------------------------------------------------------

/// Outcome of one merge write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Written,
    Unchanged,
}

/// Merge-upserts documents into a store; telemetry also needs a blob store.
#[derive(Clone)]
pub struct StoreSink {
    documents: Arc<dyn DocumentStore>,
    blobs: Option<Arc<dyn BlobStore>>,
    concurrency: usize,
}

impl StoreSink {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents,
            blobs: None,
            concurrency: 4,
        }
    }

    pub fn with_blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Merge `incoming` into `<collection>/<id>` and stamp `stamp_field`
    /// when the merged document differs from what is stored.
    pub async fn merge_document(
        &self,
        collection: &str,
        id: &str,
        incoming: Value,
        stamp_field: &str,
    ) -> Result<MergeOutcome> {
        let existing = self.documents.get_document(collection, id).await?;
        let mut merged = merge_upsert(existing.clone(), incoming);

        if existing.as_ref() == Some(&merged) {
            log::debug!("{}/{} unchanged", collection, id);
            return Ok(MergeOutcome::Unchanged);
        }

        if let Value::Object(map) = &mut merged {
            map.insert(stamp_field.to_string(), now_stamp());
        }
        self.documents.put_document(collection, id, &merged).await?;
        log::debug!("{}/{} written", collection, id);
        Ok(MergeOutcome::Written)
    }

    async fn publish_standings(
        &self,
        season: u16,
        drivers: &[DriverStanding],
        constructors: &[ConstructorStanding],
    ) -> Result<PublishReceipt> {
        let id = season.to_string();
        let incoming = json!({
            "season": season,
            "driver_standings": drivers,
            "constructor_standings": constructors,
        });

        let outcome = self
            .merge_document(STANDINGS_COLLECTION, &id, incoming, UPDATED_AT)
            .await
            .map_err(|e| AppError::publish(self.name(), e))?;

        let mut receipt =
            PublishReceipt::new(self.name(), self.documents.location(STANDINGS_COLLECTION, &id));
        match outcome {
            MergeOutcome::Written => receipt.written = 1,
            MergeOutcome::Unchanged => receipt.unchanged = 1,
        }
        Ok(receipt)
    }

    async fn publish_roster(
        &self,
        drivers: &[Driver],
        teams: &[Team],
        cars: &[Car],
    ) -> Result<PublishReceipt> {
        let mut jobs = Vec::with_capacity(drivers.len() + teams.len() + cars.len());
        push_jobs(&mut jobs, drivers)?;
        push_jobs(&mut jobs, teams)?;
        push_jobs(&mut jobs, cars)?;

        let total = jobs.len();
        let mut receipt = PublishReceipt::new(self.name(), self.documents.location("drivers", "*"));
        let mut results = stream::iter(jobs)
            .map(|(collection, id, doc)| async move {
                let result = self.merge_document(&collection, &id, doc, UPDATED_AT).await;
                (collection, id, result)
            })
            .buffer_unordered(self.concurrency);

        while let Some((collection, id, result)) = results.next().await {
            match result {
                Ok(MergeOutcome::Written) => receipt.written += 1,
                Ok(MergeOutcome::Unchanged) => receipt.unchanged += 1,
                Err(e) => {
                    receipt.failed += 1;
                    log::warn!("Failed to write {}/{}: {}", collection, id, e);
                }
            }
        }

        if total > 0 && receipt.failed == total {
            return Err(AppError::publish(
                self.name(),
                format!("all {total} roster documents failed"),
            ));
        }
        Ok(receipt)
    }

    async fn publish_telemetry(&self, export: &TelemetryExport) -> Result<PublishReceipt> {
        let blobs = self
            .blobs
            .as_ref()
            .ok_or_else(|| AppError::publish(self.name(), "no blob store configured"))?;
        let race = export.race();
        let path = race.blob_path();
        let bytes = serde_json::to_vec(export)?;

        let current = blobs
            .get_blob(&path)
            .await
            .map_err(|e| AppError::publish(self.name(), e))?;
        // `Some(previous)` once this publish has replaced the blob.
        let mut replaced = None;
        let storage_url = match current {
            Some(c) if digest(&c) == digest(&bytes) => {
                log::info!("Blob {} unchanged", path);
                blobs.blob_url(&path)
            }
            previous => {
                let url = blobs
                    .put_blob(&path, bytes, "application/json")
                    .await
                    .map_err(|e| AppError::publish(self.name(), e))?;
                replaced = Some(previous);
                url
            }
        };

        let id = race.record_id();
        let incoming = json!({
            "year": race.year,
            "round": race.round,
            "event_name": export.metadata.event_name,
            "session_type": race.session_type,
            "storage_url": storage_url,
            "status": "available",
        });
        let outcome = match self
            .merge_document(Category::Races.as_str(), &id, incoming, "uploaded_at")
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(previous) = replaced {
                    restore_blob(&**blobs, &path, previous).await;
                }
                return Err(AppError::publish(self.name(), e));
            }
        };

        let mut receipt = PublishReceipt::new(self.name(), storage_url);
        match outcome {
            MergeOutcome::Written => receipt.written = 1,
            MergeOutcome::Unchanged => receipt.unchanged = 1,
        }
        Ok(receipt)
    }
}

/// Put back the blob a failed telemetry publish replaced.
async fn restore_blob(blobs: &dyn BlobStore, path: &str, previous: Option<Vec<u8>>) {
    let result = match previous {
        Some(bytes) => blobs
            .put_blob(path, bytes, "application/json")
            .await
            .map(|_| ()),
        None => blobs.delete_blob(path).await,
    };
    match result {
        Ok(()) => log::warn!("Rolled back blob {} after metadata write failed", path),
        Err(e) => log::error!("Failed to roll back blob {}: {}", path, e),
    }
}

fn push_jobs<T: Keyed + Serialize>(
    jobs: &mut Vec<(String, String, Value)>,
    items: &[T],
) -> Result<()> {
    for item in items {
        jobs.push((
            item.category().as_str().to_string(),
            item.document_id(),
            serde_json::to_value(item)?,
        ));
    }
    Ok(())
}

#[async_trait]
impl Sink for StoreSink {
    fn name(&self) -> &str {
        "store"
    }

    async fn previous_sizes(&self, batch: &PublishBatch) -> Result<BTreeMap<Category, usize>> {
        let PublishBatch::Standings { season, .. } = batch else {
            return Ok(BTreeMap::new());
        };
        let Some(doc) = self
            .documents
            .get_document(STANDINGS_COLLECTION, &season.to_string())
            .await?
        else {
            return Ok(BTreeMap::new());
        };

        let len = |field: &str| doc.get(field).and_then(Value::as_array).map(Vec::len);
        let mut sizes = BTreeMap::new();
        if let Some(n) = len("driver_standings") {
            sizes.insert(Category::DriverStandings, n);
        }
        if let Some(n) = len("constructor_standings") {
            sizes.insert(Category::ConstructorStandings, n);
        }
        Ok(sizes)
    }

    async fn publish(&self, batch: &PublishBatch) -> Result<PublishReceipt> {
        match batch {
            PublishBatch::Standings {
                season,
                drivers,
                constructors,
            } => self.publish_standings(*season, drivers, constructors).await,
            PublishBatch::Roster {
                drivers,
                teams,
                cars,
                ..
            } => self.publish_roster(drivers, teams, cars).await,
            PublishBatch::Telemetry(export) => self.publish_telemetry(export).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CarSpecs, DriverStats, RaceMetadata, SessionType, Trend};
    use crate::storage::LocalStore;
    use tempfile::TempDir;

    fn standing(position: u32, id: &str, points: Option<f64>) -> DriverStanding {
        DriverStanding {
            position,
            driver_id: id.to_string(),
            constructor_id: "mclaren".to_string(),
            name: id.to_string(),
            team: "McLaren".to_string(),
            points,
            wins: 0,
            podiums: 0,
            trend: Trend::Same,
            trend_pos: None,
            avatar_url: String::new(),
            team_color: "#FF8700".to_string(),
        }
    }

    fn constructor(position: u32, id: &str) -> ConstructorStanding {
        ConstructorStanding {
            position,
            constructor_id: id.to_string(),
            name: id.to_string(),
            points: Some(10.0),
            wins: 0,
            podiums: 0,
            trend: Trend::Same,
            logo_url: String::new(),
            team_color: "#000000".to_string(),
            drivers: Vec::new(),
        }
    }

    fn roster_driver(id: &str, code: &str) -> Driver {
        Driver {
            id: id.to_string(),
            code: code.to_string(),
            driver_number: None,
            full_name: id.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            team_id: "mclaren".to_string(),
            team_name: "McLaren".to_string(),
            team_color: "#FF8700".to_string(),
            country_code: "GBR".to_string(),
            headshot_url: String::new(),
            bio: String::new(),
            stats: DriverStats::default(),
            season: 2024,
        }
    }

    fn store(tmp: &TempDir) -> (Arc<LocalStore>, StoreSink) {
        let local = Arc::new(LocalStore::new(tmp.path()));
        let sink = StoreSink::new(local.clone()).with_blobs(local.clone());
        (local, sink)
    }

    #[test]
    fn test_merge_upsert_keeps_absent_fields() {
        let merged = merge_upsert(Some(json!({ "points": 5, "wins": 2 })), json!({ "points": 10 }));
        assert_eq!(merged, json!({ "points": 10, "wins": 2 }));
    }

    #[test]
    fn test_merge_upsert_is_deep_and_replaces_arrays() {
        let existing = json!({ "stats": { "poles": 3, "wins": 1 }, "tags": [1, 2, 3] });
        let merged = merge_upsert(Some(existing), json!({ "stats": { "wins": 2 }, "tags": [4] }));
        assert_eq!(merged, json!({ "stats": { "poles": 3, "wins": 2 }, "tags": [4] }));
    }

    #[test]
    fn test_merge_upsert_without_existing() {
        assert_eq!(merge_upsert(None, json!({ "a": 1 })), json!({ "a": 1 }));
    }

    #[test]
    fn test_batch_sizes() {
        let batch = PublishBatch::Standings {
            season: 2024,
            drivers: vec![standing(1, "a", None), standing(2, "b", None)],
            constructors: vec![constructor(1, "mclaren")],
        };
        assert_eq!(
            batch.sizes(),
            vec![
                (Category::DriverStandings, 2),
                (Category::ConstructorStandings, 1)
            ]
        );
    }

    #[tokio::test]
    async fn test_store_standings_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let (local, sink) = store(&tmp);
        let batch = PublishBatch::Standings {
            season: 2024,
            drivers: vec![standing(1, "norris", Some(50.0)), standing(2, "piastri", Some(48.5))],
            constructors: vec![constructor(1, "mclaren")],
        };

        let first = sink.publish(&batch).await.unwrap();
        assert_eq!(first.written, 1);
        let doc = local.get_document("standings", "2024").await.unwrap().unwrap();
        assert_eq!(doc["driver_standings"][0]["driverId"], "norris");
        assert_eq!(doc["driver_standings"][1]["points"], 48.5);
        assert!(doc["updated_at"].is_string());

        let second = sink.publish(&batch).await.unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(second.unchanged, 1);
        let again = local.get_document("standings", "2024").await.unwrap().unwrap();
        assert_eq!(doc, again);

        let sizes = sink.previous_sizes(&batch).await.unwrap();
        assert_eq!(sizes[&Category::DriverStandings], 2);
    }

    #[tokio::test]
    async fn test_store_merge_preserves_foreign_fields() {
        let tmp = TempDir::new().unwrap();
        let (local, sink) = store(&tmp);
        local
            .put_document("drivers", "lando_norris", &json!({ "bio": "Written by hand", "points": 5 }))
            .await
            .unwrap();

        let batch = PublishBatch::Roster {
            season: 2024,
            drivers: vec![roster_driver("lando_norris", "NOR")],
            teams: Vec::new(),
            cars: Vec::new(),
        };
        let receipt = sink.publish(&batch).await.unwrap();
        assert_eq!(receipt.written, 1);

        let doc = local.get_document("drivers", "lando_norris").await.unwrap().unwrap();
        assert_eq!(doc["points"], 5);
        assert_eq!(doc["code"], "NOR");
        // empty bio from the roster overwrites
        assert_eq!(doc["bio"], "");
    }

    #[tokio::test]
    async fn test_roster_counts_per_document_failures() {
        let tmp = TempDir::new().unwrap();
        let (_, sink) = store(&tmp);
        let car = Car {
            id: "mclaren_mcl38".to_string(),
            team_id: "mclaren".to_string(),
            team_name: "McLaren".to_string(),
            name: "MCL38".to_string(),
            season: 2024,
            image_url: String::new(),
            specs: CarSpecs {
                power_unit: "Mercedes".to_string(),
                chassis: String::new(),
                weight: String::new(),
                transmission: String::new(),
                brakes: String::new(),
                suspension: String::new(),
            },
        };
        let batch = PublishBatch::Roster {
            season: 2024,
            drivers: vec![roster_driver("bad/id", "BAD"), roster_driver("oscar_piastri", "PIA")],
            teams: Vec::new(),
            cars: vec![car],
        };

        let receipt = sink.publish(&batch).await.unwrap();
        assert_eq!(receipt.written, 2);
        assert_eq!(receipt.failed, 1);
        assert!(tmp.path().join("drivers/oscar_piastri.json").is_file());
        assert!(tmp.path().join("cars/mclaren_mcl38.json").is_file());
    }

    #[tokio::test]
    async fn test_telemetry_blob_and_record() {
        let tmp = TempDir::new().unwrap();
        let (local, sink) = store(&tmp);
        let export = TelemetryExport {
            frames: vec![json!({ "t": 0.0, "x": null })],
            track_layout: Vec::new(),
            track_statuses: Vec::new(),
            driver_colors: BTreeMap::from([("VER".to_string(), [54, 113, 198])]),
            total_laps: Some(57),
            metadata: RaceMetadata {
                year: 2024,
                round: 1,
                event_name: "Bahrain Grand Prix".to_string(),
                session_type: SessionType::R,
                exported_at: Utc::now(),
            },
        };
        let batch = PublishBatch::Telemetry(Box::new(export));

        let receipt = sink.publish(&batch).await.unwrap();
        assert!(receipt.location.ends_with("1.json"));
        assert!(local.get_blob("races/2024/1.json").await.unwrap().is_some());

        let record = local.get_document("races", "2024_1").await.unwrap().unwrap();
        assert_eq!(record["status"], "available");
        assert_eq!(record["storage_url"], receipt.location.as_str());
        assert!(record["uploaded_at"].is_string());

        let second = sink.publish(&batch).await.unwrap();
        assert_eq!(second.unchanged, 1);
    }

    /// Document store whose writes always fail.
    struct ReadOnlyDocuments(LocalStore);

    #[async_trait]
    impl DocumentStore for ReadOnlyDocuments {
        fn location(&self, collection: &str, id: &str) -> String {
            self.0.location(collection, id)
        }

        async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
            self.0.get_document(collection, id).await
        }

        async fn put_document(&self, _collection: &str, _id: &str, _document: &Value) -> Result<()> {
            Err(AppError::validation("store is read-only"))
        }
    }

    fn telemetry_batch(event_name: &str) -> PublishBatch {
        PublishBatch::Telemetry(Box::new(TelemetryExport {
            frames: vec![json!({ "t": 0.0 })],
            track_layout: Vec::new(),
            track_statuses: Vec::new(),
            driver_colors: BTreeMap::new(),
            total_laps: Some(57),
            metadata: RaceMetadata {
                year: 2024,
                round: 1,
                event_name: event_name.to_string(),
                session_type: SessionType::R,
                exported_at: Utc::now(),
            },
        }))
    }

    #[tokio::test]
    async fn test_telemetry_removes_new_blob_when_record_fails() {
        let tmp = TempDir::new().unwrap();
        let blobs = Arc::new(LocalStore::new(tmp.path()));
        let sink = StoreSink::new(Arc::new(ReadOnlyDocuments(LocalStore::new(tmp.path()))))
            .with_blobs(blobs.clone());

        let err = sink.publish(&telemetry_batch("Bahrain Grand Prix")).await.unwrap_err();
        assert!(matches!(err, AppError::Publish { .. }));
        assert!(blobs.get_blob("races/2024/1.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_telemetry_restores_previous_blob_when_record_fails() {
        let tmp = TempDir::new().unwrap();
        let blobs = Arc::new(LocalStore::new(tmp.path()));
        blobs
            .put_blob("races/2024/1.json", b"{\"old\":true}".to_vec(), "application/json")
            .await
            .unwrap();
        let sink = StoreSink::new(Arc::new(ReadOnlyDocuments(LocalStore::new(tmp.path()))))
            .with_blobs(blobs.clone());

        assert!(sink.publish(&telemetry_batch("Bahrain Grand Prix")).await.is_err());
        let kept = blobs.get_blob("races/2024/1.json").await.unwrap().unwrap();
        assert_eq!(kept, b"{\"old\":true}".to_vec());
    }

    #[tokio::test]
    async fn test_export_sink_rejects_other_batches() {
        let tmp = TempDir::new().unwrap();
        let sink = ExportSink::new(tmp.path());
        let batch = PublishBatch::Standings {
            season: 2024,
            drivers: Vec::new(),
            constructors: Vec::new(),
        };
        assert!(matches!(
            sink.publish(&batch).await.unwrap_err(),
            AppError::Publish { .. }
        ));
    }

    #[tokio::test]
    async fn test_artifact_sink_skips_identical_content() {
        let tmp = TempDir::new().unwrap();
        let sink = ArtifactSink::new(StandingsArtifact::new(tmp.path().join("standings.ts")), Vec::new());
        let batch = PublishBatch::Standings {
            season: 2024,
            drivers: vec![standing(1, "norris", Some(50.0))],
            constructors: vec![constructor(1, "mclaren")],
        };

        assert_eq!(sink.publish(&batch).await.unwrap().written, 1);
        assert_eq!(sink.publish(&batch).await.unwrap().unchanged, 1);
        let sizes = sink.previous_sizes(&batch).await.unwrap();
        assert_eq!(sizes[&Category::ConstructorStandings], 1);
    }
}
