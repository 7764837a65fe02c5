//! Run pipeline: normalize, deduplicate, sanitize, guard and publish.
//!
//! - `Orchestrator`: sequences a standings, roster or telemetry run
//! - `publish`: sinks and the merge-upsert rule
//! - `guard`: refuses publishes that would shrink a collection sharply

pub mod dedup;
pub mod guard;
pub mod normalize;
pub mod orchestrator;
pub mod publish;
pub mod sanitize;

pub use guard::{GuardResult, PublishGuard};
pub use orchestrator::{Orchestrator, RunReport, RunState, RunTracker};
pub use publish::{ArtifactSink, ExportSink, PublishBatch, PublishReceipt, Sink, StoreSink};
