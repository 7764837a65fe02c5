//! Static reference tables used to enrich source records.
//!
//! The Source APIs only carry identity and results. Colors, logos, portraits,
//! car names and career numbers come from these tables, which default to the
//! built-in 2024 grid and can be overridden from a TOML file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Color used when a team is missing from the reference tables.
pub const UNKNOWN_TEAM_COLOR: &str = "#000000";

/// Roster color used when the source omits `team_colour`.
pub const DEFAULT_ROSTER_COLOR: &str = "#ffffff";

const PORTRAIT_BASE: &str = "https://media.formula1.com/content/dam/fom-website/drivers";
const CAR_IMAGE_BASE: &str =
    "https://media.formula1.com/d_team_car_fallback_image.png/content/dam/fom-website/teams/2025";

/// Root reference data handed to the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceTables {
    /// Known teams keyed by internal id
    #[serde(default = "defaults::teams")]
    pub teams: Vec<TeamInfo>,

    /// Source constructor ids that map onto a different internal id
    #[serde(default = "defaults::team_aliases")]
    pub team_aliases: BTreeMap<String, String>,

    /// Driver code to portrait path segment (e.g. `MAXVER01_Max_Verstappen`)
    #[serde(default = "defaults::portraits")]
    pub portraits: BTreeMap<String, String>,

    /// Career numbers keyed by driver code
    #[serde(default = "defaults::driver_stats")]
    pub driver_stats: BTreeMap<String, DriverStats>,

    /// Static points history rendered into the standings artifact
    #[serde(default = "defaults::points_history")]
    pub points_history: Vec<PointsHistoryRow>,
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self {
            teams: defaults::teams(),
            team_aliases: defaults::team_aliases(),
            portraits: defaults::portraits(),
            driver_stats: defaults::driver_stats(),
            points_history: defaults::points_history(),
        }
    }
}

impl ReferenceTables {
    /// Load reference tables from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load reference tables from `path`, or the built-in grid when none is
    /// configured. A configured file that fails to load is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).map_err(|e| {
                AppError::config(format!(
                    "Reference tables load failed from {}: {e}",
                    path.display()
                ))
            }),
            None => Ok(Self::default()),
        }
    }

    /// Validate that team ids are unique and aliases resolve to known teams.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for team in &self.teams {
            if team.id.trim().is_empty() {
                return Err(AppError::validation("Team with empty id in reference tables"));
            }
            if !seen.insert(team.id.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate team id '{}' in reference tables",
                    team.id
                )));
            }
        }
        for (alias, target) in &self.team_aliases {
            if !seen.contains(target.as_str()) {
                return Err(AppError::validation(format!(
                    "Team alias '{alias}' points to unknown team '{target}'"
                )));
            }
        }
        Ok(())
    }

    /// Map a source constructor id onto the internal team id.
    pub fn canonical_team_id(&self, source_id: &str) -> String {
        self.team_aliases
            .get(source_id)
            .cloned()
            .unwrap_or_else(|| source_id.to_string())
    }

    /// Look up a team by internal id.
    pub fn team(&self, id: &str) -> Option<&TeamInfo> {
        self.teams.iter().find(|t| t.id == id)
    }

    /// Look up a team by the display name the live-timing source uses.
    pub fn team_by_name(&self, name: &str) -> Option<&TeamInfo> {
        self.teams.iter().find(|t| t.name == name)
    }

    /// High-resolution portrait for a driver code, if the code is known.
    pub fn portrait_url(&self, code: &str) -> Option<String> {
        let path_name = self.portraits.get(code)?;
        let file_id = path_name.split('_').next()?.to_lowercase();
        let first_letter = path_name.chars().next()?;
        Some(format!(
            "{PORTRAIT_BASE}/{first_letter}/{path_name}/{file_id}.png"
        ))
    }

    /// Car render for a team id, empty when the team has no image slug.
    pub fn car_image_url(&self, team_id: &str) -> String {
        self.team(team_id)
            .and_then(|t| t.car_image_slug.as_deref())
            .map(|slug| format!("{CAR_IMAGE_BASE}/{slug}.png"))
            .unwrap_or_default()
    }

    /// Career numbers for a driver code, zeros when unknown.
    pub fn stats_for(&self, code: &str) -> DriverStats {
        self.driver_stats.get(code).cloned().unwrap_or_default()
    }
}

/// Static metadata for one team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamInfo {
    /// Internal id (e.g. `red_bull`)
    pub id: String,
    /// Display name, also the name the live-timing source reports
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    /// Hex color with leading `#`
    pub color: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub team_principal: String,
    #[serde(default)]
    pub car_name: String,
    #[serde(default)]
    pub engine: String,
    /// Path segment of the car render, if one exists
    #[serde(default)]
    pub car_image_slug: Option<String>,
}

/// Career numbers for one driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriverStats {
    pub championships: u32,
    pub race_wins: u32,
    pub podiums: u32,
    pub poles: u32,
}

/// One round of the cumulative points chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointsHistoryRow {
    pub round: String,
    #[serde(flatten)]
    pub points: BTreeMap<String, u32>,
}

mod defaults {
    use std::collections::BTreeMap;

    use super::{DriverStats, PointsHistoryRow, TeamInfo};

    const LOGO_BASE: &str = "https://media.formula1.com/content/dam/fom-website/teams/2024";

    #[allow(clippy::too_many_arguments)]
    fn team(
        id: &str,
        name: &str,
        full_name: &str,
        color: &str,
        logo: &str,
        base: &str,
        principal: &str,
        car_name: &str,
        engine: &str,
        car_slug: &str,
    ) -> TeamInfo {
        TeamInfo {
            id: id.into(),
            name: name.into(),
            full_name: full_name.into(),
            color: color.into(),
            logo_url: format!("{LOGO_BASE}/{logo}-logo.png"),
            base: base.into(),
            team_principal: principal.into(),
            car_name: car_name.into(),
            engine: engine.into(),
            car_image_slug: Some(car_slug.into()),
        }
    }

    pub fn teams() -> Vec<TeamInfo> {
        vec![
            team(
                "red_bull",
                "Red Bull Racing",
                "Oracle Red Bull Racing",
                "#3671C6",
                "red-bull-racing",
                "Milton Keynes, United Kingdom",
                "Christian Horner",
                "RB20",
                "Honda RBPT",
                "red-bull-racing",
            ),
            team(
                "ferrari",
                "Ferrari",
                "Scuderia Ferrari",
                "#E8002D",
                "ferrari",
                "Maranello, Italy",
                "Frédéric Vasseur",
                "SF-24",
                "Ferrari",
                "ferrari",
            ),
            team(
                "mclaren",
                "McLaren",
                "McLaren F1 Team",
                "#FF8700",
                "mclaren",
                "Woking, United Kingdom",
                "Andrea Stella",
                "MCL38",
                "Mercedes",
                "mclaren",
            ),
            team(
                "mercedes",
                "Mercedes",
                "Mercedes-AMG Petronas F1 Team",
                "#00D2BE",
                "mercedes",
                "Brackley, United Kingdom",
                "Toto Wolff",
                "W15",
                "Mercedes",
                "mercedes",
            ),
            team(
                "aston_martin",
                "Aston Martin",
                "Aston Martin Aramco F1 Team",
                "#006F62",
                "aston-martin",
                "Silverstone, United Kingdom",
                "Mike Krack",
                "AMR24",
                "Mercedes",
                "aston-martin",
            ),
            team(
                "rb",
                "RB",
                "Visa Cash App RB F1 Team",
                "#6692FF",
                "rb",
                "Faenza, Italy",
                "Laurent Mekies",
                "VCARB 01",
                "Honda RBPT",
                "rb",
            ),
            team(
                "haas",
                "Haas F1 Team",
                "MoneyGram Haas F1 Team",
                "#B6BABD",
                "haas-f1-team",
                "Kannapolis, USA",
                "Ayao Komatsu",
                "VF-24",
                "Ferrari",
                "haas",
            ),
            team(
                "williams",
                "Williams",
                "Williams Racing",
                "#64C4FF",
                "williams",
                "Grove, United Kingdom",
                "James Vowles",
                "FW46",
                "Mercedes",
                "williams",
            ),
            team(
                "alpine",
                "Alpine",
                "BWT Alpine F1 Team",
                "#0093CC",
                "alpine",
                "Enstone, United Kingdom",
                "Bruno Famin",
                "A524",
                "Renault",
                "alpine",
            ),
            team(
                "sauber",
                "Kick Sauber",
                "Stake F1 Team Kick Sauber",
                "#52E252",
                "kick-sauber",
                "Hinwil, Switzerland",
                "Alessandro Alunni Bravi",
                "C44",
                "Ferrari",
                "kick-sauber",
            ),
        ]
    }

    pub fn team_aliases() -> BTreeMap<String, String> {
        BTreeMap::from([("kick_sauber".to_string(), "sauber".to_string())])
    }

    pub fn portraits() -> BTreeMap<String, String> {
        [
            ("VER", "MAXVER01_Max_Verstappen"),
            ("PER", "SERPER01_Sergio_Perez"),
            ("LEC", "CHALEC01_Charles_Leclerc"),
            ("SAI", "CARSAI01_Carlos_Sainz"),
            ("NOR", "LANNOR01_Lando_Norris"),
            ("PIA", "OSCPIA01_Oscar_Piastri"),
            ("HAM", "LEWHAM01_Lewis_Hamilton"),
            ("RUS", "GEORUS01_George_Russell"),
            ("ALO", "FERALO01_Fernando_Alonso"),
            ("STR", "LANSTR01_Lance_Stroll"),
            ("GAS", "PIEGAS01_Pierre_Gasly"),
            ("OCO", "ESTOCO01_Esteban_Ocon"),
            ("ALB", "ALEALB01_Alexander_Albon"),
            ("SAR", "LOGSAR01_Logan_Sargeant"),
            ("COL", "FRACOL01_Franco_Colapinto"),
            ("TSU", "YUKTSU01_Yuki_Tsunoda"),
            ("RIC", "DANRIC01_Daniel_Ricciardo"),
            ("LAW", "LIALAW01_Liam_Lawson"),
            ("BOT", "VALBOT01_Valtteri_Bottas"),
            ("ZHO", "GUAZHO01_Guanyu_Zhou"),
            ("HUL", "NICHUL01_Nico_Hulkenberg"),
            ("MAG", "KEVMAG01_Kevin_Magnussen"),
            ("BEA", "OLIBEA01_Oliver_Bearman"),
            ("ANT", "KIMANT01_Kimi_Antonelli"),
            ("BOR", "GABBOR01_Gabriel_Bortoleto"),
            ("HAD", "ISAHAD01_Isack_Hadjar"),
            ("DOO", "JACDOO01_Jack_Doohan"),
        ]
        .into_iter()
        .map(|(code, path)| (code.to_string(), path.to_string()))
        .collect()
    }

    pub fn driver_stats() -> BTreeMap<String, DriverStats> {
        [
            ("VER", 4, 62, 111, 40),
            ("NOR", 0, 4, 26, 7),
            ("LEC", 0, 8, 40, 26),
            ("SAI", 0, 4, 24, 6),
            ("HAM", 7, 105, 201, 104),
            ("RUS", 0, 3, 16, 4),
            ("PIA", 0, 2, 9, 2),
            ("PER", 0, 6, 39, 3),
            ("ALO", 2, 32, 106, 22),
            ("OCO", 0, 1, 4, 0),
            ("GAS", 0, 1, 4, 0),
            ("RIC", 0, 8, 32, 3),
            ("HUL", 0, 0, 0, 1),
            ("MAG", 0, 0, 1, 1),
            ("BOT", 0, 10, 67, 20),
        ]
        .into_iter()
        .map(|(code, championships, race_wins, podiums, poles)| {
            (
                code.to_string(),
                DriverStats {
                    championships,
                    race_wins,
                    podiums,
                    poles,
                },
            )
        })
        .collect()
    }

    pub fn points_history() -> Vec<PointsHistoryRow> {
        [
            ("BHR", [25, 12, 10, 8]),
            ("SAU", [50, 27, 18, 14]),
            ("AUS", [50, 45, 33, 20]),
            ("JPN", [76, 57, 45, 26]),
            ("CHN", [101, 72, 60, 36]),
            ("MIA", [120, 90, 85, 40]),
            ("EMI", [145, 108, 103, 50]),
            ("MON", [155, 133, 113, 60]),
            ("CAN", [180, 133, 128, 75]),
            ("ESP", [205, 145, 146, 85]),
        ]
        .into_iter()
        .map(|(round, [ver, lec, nor, ham])| PointsHistoryRow {
            round: round.to_string(),
            points: BTreeMap::from([
                ("VER".to_string(), ver),
                ("LEC".to_string(), lec),
                ("NOR".to_string(), nor),
                ("HAM".to_string(), ham),
            ]),
        })
        .collect()
    }
}
