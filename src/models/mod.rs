// src/models/mod.rs

//! Domain models for the publishing pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod entity;
mod record;
mod reference;
mod telemetry;

// Re-export all public types
pub use config::{Config, GuardConfig, PathsConfig, RunConfig, SourceConfig, StoreConfig};
pub use entity::{
    Car, CarSpecs, Category, ConstructorStanding, Driver, DriverStanding, EntityKey, Keyed, Team,
    Trend,
};
pub use record::{RawRecord, RecencyMarker};
pub use reference::{
    DEFAULT_ROSTER_COLOR, DriverStats, PointsHistoryRow, ReferenceTables, TeamInfo,
    UNKNOWN_TEAM_COLOR,
};
pub use telemetry::{RaceMetadata, RaceRef, SessionType, TelemetryExport};
