//! Canonical entities produced by the normalizer.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::reference::DriverStats;

/// Entity family, also the store collection a family is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    DriverStandings,
    ConstructorStandings,
    Drivers,
    Teams,
    Cars,
    Races,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DriverStandings => "driver_standings",
            Category::ConstructorStandings => "constructor_standings",
            Category::Drivers => "drivers",
            Category::Teams => "teams",
            Category::Cars => "cars",
            Category::Races => "races",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identity used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub category: Category,
    pub season: u16,
    pub natural_code: String,
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.category, self.season, self.natural_code)
    }
}

/// Common identity surface of every canonical entity.
pub trait Keyed {
    fn category(&self) -> Category;

    /// Source short code, or a slug of the display name when there is none.
    fn natural_code(&self) -> &str;

    /// Document id under the entity's store collection.
    fn document_id(&self) -> String {
        self.natural_code().to_string()
    }

    /// Stable listing order for sinks that need one.
    fn listing_cmp(&self, other: &Self) -> Ordering {
        self.natural_code().cmp(other.natural_code())
    }

    fn key(&self, season: u16) -> EntityKey {
        EntityKey {
            category: self.category(),
            season,
            natural_code: self.natural_code().to_string(),
        }
    }
}

/// Position movement since the previous round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Same,
}

/// One row of the drivers' championship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStanding {
    pub position: u32,
    pub driver_id: String,
    pub constructor_id: String,
    pub name: String,
    pub team: String,
    /// `None` when the source value was missing or not finite
    pub points: Option<f64>,
    pub wins: u32,
    /// Not exposed by the standings source; always zero
    pub podiums: u32,
    pub trend: Trend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_pos: Option<i32>,
    pub avatar_url: String,
    pub team_color: String,
}

impl Keyed for DriverStanding {
    fn category(&self) -> Category {
        Category::DriverStandings
    }

    fn natural_code(&self) -> &str {
        &self.driver_id
    }

    fn listing_cmp(&self, other: &Self) -> Ordering {
        self.position
            .cmp(&other.position)
            .then_with(|| self.driver_id.cmp(&other.driver_id))
    }
}

/// One row of the constructors' championship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructorStanding {
    pub position: u32,
    pub constructor_id: String,
    pub name: String,
    pub points: Option<f64>,
    pub wins: u32,
    pub podiums: u32,
    pub trend: Trend,
    pub logo_url: String,
    pub team_color: String,
    /// Driver ids scoring for this constructor, in championship order
    pub drivers: Vec<String>,
}

impl Keyed for ConstructorStanding {
    fn category(&self) -> Category {
        Category::ConstructorStandings
    }

    fn natural_code(&self) -> &str {
        &self.constructor_id
    }

    fn listing_cmp(&self, other: &Self) -> Ordering {
        self.position
            .cmp(&other.position)
            .then_with(|| self.constructor_id.cmp(&other.constructor_id))
    }
}

/// Driver roster document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_number: Option<u32>,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub team_id: String,
    pub team_name: String,
    pub team_color: String,
    pub country_code: String,
    pub headshot_url: String,
    pub bio: String,
    pub stats: DriverStats,
    pub season: u16,
}

impl Keyed for Driver {
    fn category(&self) -> Category {
        Category::Drivers
    }

    fn natural_code(&self) -> &str {
        if self.code.is_empty() { &self.id } else { &self.code }
    }

    fn document_id(&self) -> String {
        self.id.clone()
    }
}

/// Team roster document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub base: String,
    pub team_principal: String,
    pub color: String,
    pub logo_url: String,
    pub season: u16,
}

impl Keyed for Team {
    fn category(&self) -> Category {
        Category::Teams
    }

    fn natural_code(&self) -> &str {
        &self.id
    }
}

/// Technical specification block of a car.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarSpecs {
    pub power_unit: String,
    pub chassis: String,
    pub weight: String,
    pub transmission: String,
    pub brakes: String,
    pub suspension: String,
}

/// Car roster document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    /// `<team id>_<car slug>`
    pub id: String,
    pub team_id: String,
    pub team_name: String,
    pub name: String,
    pub season: u16,
    pub image_url: String,
    pub specs: CarSpecs,
}

impl Keyed for Car {
    fn category(&self) -> Category {
        Category::Cars
    }

    fn natural_code(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(position: u32, id: &str, points: Option<f64>) -> DriverStanding {
        DriverStanding {
            position,
            driver_id: id.to_string(),
            constructor_id: "ferrari".to_string(),
            name: id.to_string(),
            team: "Ferrari".to_string(),
            points,
            wins: 0,
            podiums: 0,
            trend: Trend::Same,
            trend_pos: None,
            avatar_url: String::new(),
            team_color: "#E8002D".to_string(),
        }
    }

    #[test]
    fn test_standing_serializes_camel_case() {
        let json = serde_json::to_value(standing(1, "leclerc", Some(50.0))).unwrap();
        assert_eq!(json["driverId"], "leclerc");
        assert_eq!(json["teamColor"], "#E8002D");
        assert_eq!(json["trend"], "SAME");
        assert!(json.get("trendPos").is_none());
    }

    #[test]
    fn test_missing_points_serialize_as_null() {
        let json = serde_json::to_value(standing(1, "leclerc", None)).unwrap();
        assert!(json["points"].is_null());
    }

    #[test]
    fn test_standings_listed_by_position() {
        let a = standing(2, "aaa", None);
        let b = standing(1, "zzz", None);
        assert_eq!(a.listing_cmp(&b), Ordering::Greater);
    }

    #[test]
    fn test_driver_key_prefers_code() {
        let mut driver = Driver {
            id: "max_verstappen".into(),
            code: "VER".into(),
            driver_number: Some(1),
            full_name: "Max Verstappen".into(),
            first_name: "Max".into(),
            last_name: "Verstappen".into(),
            team_id: "red_bull".into(),
            team_name: "Red Bull Racing".into(),
            team_color: "#3671C6".into(),
            country_code: "NED".into(),
            headshot_url: String::new(),
            bio: String::new(),
            stats: DriverStats::default(),
            season: 2024,
        };
        assert_eq!(driver.key(2024).natural_code, "VER");
        assert_eq!(driver.document_id(), "max_verstappen");

        driver.code.clear();
        assert_eq!(driver.key(2024).to_string(), "drivers/2024/max_verstappen");
    }
}
