//! Generated standings module.
//!
//! Renders the current standings into a TypeScript module consumed by the
//! web client. The document is fully determined by its inputs, so a content
//! digest tells whether a rewrite is needed.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{ConstructorStanding, DriverStanding, PointsHistoryRow};
use crate::storage::local::{read_optional, write_atomic};

const INTERFACES: &str = "\
export interface StandingItem {
    position: number;
    driverId: string;
    constructorId: string;
    name: string;
    team: string;
    points: number | null;
    wins: number;
    podiums: number;
    trend: 'UP' | 'DOWN' | 'SAME';
    trendPos?: number;
    avatarUrl: string;
    teamColor: string;
}

export interface ConstructorStandingItem {
    position: number;
    constructorId: string;
    name: string;
    points: number | null;
    wins: number;
    podiums: number;
    trend: 'UP' | 'DOWN' | 'SAME';
    logoUrl: string;
    teamColor: string;
    drivers: string[];
}
";

/// Render the standings module.
///
/// Both arrays keep the order they are given in; callers pass them sorted
/// by position.
pub fn render_standings_module(
    season: u16,
    drivers: &[DriverStanding],
    constructors: &[ConstructorStanding],
    points_history: &[PointsHistoryRow],
) -> Result<String> {
    let mut out = String::with_capacity(16 * 1024);
    out.push_str(INTERFACES);

    let _ = write!(
        out,
        "\nexport const DRIVER_STANDINGS_{season}: StandingItem[] = {};\n",
        to_json_4(drivers)?
    );
    let _ = write!(
        out,
        "\nexport const CONSTRUCTOR_STANDINGS_{season}: ConstructorStandingItem[] = {};\n",
        to_json_4(constructors)?
    );

    out.push_str("\nexport const POINTS_HISTORY_DATA = [\n");
    let rows: Vec<String> = points_history.iter().map(history_row).collect();
    out.push_str(&rows.join(",\n"));
    out.push_str("\n];\n");

    Ok(out)
}

fn to_json_4<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn history_row(row: &PointsHistoryRow) -> String {
    let mut line = format!("    {{ round: {}", ts_string(&row.round));
    for (code, points) in &row.points {
        let _ = write!(line, ", {}: {points}", ts_key(code));
    }
    line.push_str(" }");
    line
}

/// Object key, quoted unless it is a plain identifier.
fn ts_key(key: &str) -> String {
    let mut chars = key.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if plain { key.to_string() } else { ts_string(key) }
}

/// Single-quoted string literal.
fn ts_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Hex-encoded SHA-256 of a rendered document.
pub fn digest(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// The standings module on disk.
#[derive(Debug, Clone)]
pub struct StandingsArtifact {
    path: PathBuf,
}

impl StandingsArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the module unless the rendered content is already on disk.
    ///
    /// Returns `true` when the file was written.
    pub async fn write_if_changed(&self, content: &str) -> Result<bool> {
        let fresh = digest(content.as_bytes());
        if let Some(existing) = read_optional(&self.path).await? {
            if digest(&existing) == fresh {
                log::info!("Artifact unchanged ({}), skipping write", &fresh[..12]);
                return Ok(false);
            }
        }

        write_atomic(&self.path, content.as_bytes()).await?;
        log::info!("Artifact written to {} ({})", self.path.display(), &fresh[..12]);
        Ok(true)
    }

    /// Entry count of the `*_STANDINGS_<season>` arrays currently on disk.
    ///
    /// Counts top-level `"position"` keys per array, which is enough for the
    /// publish guard; `None` when the file or the array is missing.
    pub async fn previous_sizes(&self, season: u16) -> Result<Option<(usize, usize)>> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        let drivers = array_size(&text, &format!("DRIVER_STANDINGS_{season}"));
        let constructors = array_size(&text, &format!("CONSTRUCTOR_STANDINGS_{season}"));
        Ok(drivers.zip(constructors))
    }
}

fn array_size(text: &str, name: &str) -> Option<usize> {
    let start = text.find(&format!("export const {name}"))?;
    let body = &text[start..];
    let end = body.find("];").unwrap_or(body.len());
    Some(body[..end].matches("\"position\":").count())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::{ReferenceTables, Trend};
    use tempfile::TempDir;

    fn driver(position: u32, id: &str, points: Option<f64>) -> DriverStanding {
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

    fn constructor() -> ConstructorStanding {
        ConstructorStanding {
            position: 1,
            constructor_id: "mclaren".to_string(),
            name: "McLaren".to_string(),
            points: Some(98.5),
            wins: 0,
            podiums: 0,
            trend: Trend::Same,
            logo_url: String::new(),
            team_color: "#FF8700".to_string(),
            drivers: vec!["norris".to_string(), "piastri".to_string()],
        }
    }

    #[test]
    fn test_render_keeps_input_order() {
        let drivers = vec![driver(1, "norris", Some(50.0)), driver(2, "piastri", Some(48.5))];
        let module = render_standings_module(2024, &drivers, &[constructor()], &[]).unwrap();

        let first = module.find("\"driverId\": \"norris\"").unwrap();
        let second = module.find("\"driverId\": \"piastri\"").unwrap();
        assert!(first < second);
        assert!(module.contains("\"points\": 50.0"));
        assert!(module.contains("\"points\": 48.5"));
        assert!(module.contains("export const DRIVER_STANDINGS_2024: StandingItem[] = ["));
        assert!(module.contains("export const CONSTRUCTOR_STANDINGS_2024"));
    }

    #[test]
    fn test_render_uses_four_space_indent() {
        let module = render_standings_module(2024, &[driver(1, "norris", None)], &[], &[]).unwrap();
        assert!(module.contains("\n    {\n        \"position\": 1,"));
        assert!(module.contains("\"points\": null"));
    }

    #[test]
    fn test_render_points_history() {
        let tables = ReferenceTables::default();
        let module = render_standings_module(2024, &[], &[], &tables.points_history).unwrap();
        assert!(module.contains("    { round: 'BHR', HAM: 8, LEC: 12, NOR: 10, VER: 25 },"));
        assert!(module.trim_end().ends_with("];"));
    }

    #[test]
    fn test_history_keys_quoted_when_not_identifiers() {
        let row = PointsHistoryRow {
            round: "São Paulo's".to_string(),
            points: BTreeMap::from([
                ("DE VRIES".to_string(), 1),
                ("1A".to_string(), 2),
                ("HAM".to_string(), 8),
            ]),
        };
        assert_eq!(
            history_row(&row),
            "    { round: 'São Paulo\\'s', '1A': 2, 'DE VRIES': 1, HAM: 8 }"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let drivers = vec![driver(1, "norris", Some(1.0))];
        let a = render_standings_module(2024, &drivers, &[], &[]).unwrap();
        let b = render_standings_module(2024, &drivers, &[], &[]).unwrap();
        assert_eq!(digest(a.as_bytes()), digest(b.as_bytes()));
    }

    #[tokio::test]
    async fn test_write_if_changed() {
        let tmp = TempDir::new().unwrap();
        let artifact = StandingsArtifact::new(tmp.path().join("data/standings.ts"));
        let module =
            render_standings_module(2024, &[driver(1, "norris", None)], &[constructor()], &[])
                .unwrap();

        assert!(artifact.write_if_changed(&module).await.unwrap());
        assert!(!artifact.write_if_changed(&module).await.unwrap());
        assert_eq!(artifact.previous_sizes(2024).await.unwrap(), Some((1, 1)));
        assert_eq!(artifact.previous_sizes(2023).await.unwrap(), None);
    }
}
