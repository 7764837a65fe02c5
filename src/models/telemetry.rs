//! Race replay export structures.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Session the telemetry was recorded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    /// Race
    #[default]
    R,
    /// Sprint
    S,
    /// Qualifying
    Q,
    /// Sprint qualifying
    SQ,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::R => "R",
            SessionType::S => "S",
            SessionType::Q => "Q",
            SessionType::SQ => "SQ",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "R" => Ok(SessionType::R),
            "S" => Ok(SessionType::S),
            "Q" => Ok(SessionType::Q),
            "SQ" => Ok(SessionType::SQ),
            other => Err(AppError::validation(format!(
                "Unknown session type '{other}' (expected R, S, Q or SQ)"
            ))),
        }
    }
}

/// Identifies one telemetry export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceRef {
    pub year: u16,
    pub round: u32,
    pub session_type: SessionType,
}

impl RaceRef {
    /// Blob path of the export.
    pub fn blob_path(&self) -> String {
        format!("races/{}/{}.json", self.year, self.round)
    }

    /// Metadata record id.
    pub fn record_id(&self) -> String {
        format!("{}_{}", self.year, self.round)
    }
}

/// Export header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceMetadata {
    pub year: u16,
    pub round: u32,
    pub event_name: String,
    pub session_type: SessionType,
    pub exported_at: DateTime<Utc>,
}

/// A fully sanitized replay document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryExport {
    /// Ordered frames; every number is finite or null
    pub frames: Vec<Value>,
    pub track_layout: Vec<Value>,
    pub track_statuses: Vec<Value>,
    /// Driver code to RGB triple
    pub driver_colors: BTreeMap<String, [u8; 3]>,
    pub total_laps: Option<u32>,
    pub metadata: RaceMetadata,
}

impl TelemetryExport {
    pub fn race(&self) -> RaceRef {
        RaceRef {
            year: self.metadata.year,
            round: self.metadata.round,
            session_type: self.metadata.session_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_type_parse() {
        assert_eq!("sq".parse::<SessionType>().unwrap(), SessionType::SQ);
        assert_eq!("R".parse::<SessionType>().unwrap(), SessionType::R);
        assert!("FP1".parse::<SessionType>().is_err());
    }

    #[test]
    fn test_race_paths() {
        let race = RaceRef {
            year: 2024,
            round: 7,
            session_type: SessionType::R,
        };
        assert_eq!(race.blob_path(), "races/2024/7.json");
        assert_eq!(race.record_id(), "2024_7");
    }
}
