//! Service layer: Source API access and the resources each run fetches.
//!
//! - `Source` / `HttpSource`: bounded-retry document fetching
//! - resource builders for standings, roster and telemetry runs

mod source;

use std::path::Path;

use url::Url;

use crate::error::{AppError, Result};
use crate::models::{RaceRef, SourceConfig};

pub use source::{HttpSource, Resource, Source};

/// Drivers' championship of a season.
pub fn driver_standings(config: &SourceConfig, season: u16) -> Result<Resource> {
    let url = season_url(&config.base_url, season, "driverStandings.json")?;
    Ok(Resource::new("driverStandings", url)
        .at("MRData.StandingsTable.StandingsLists.0.DriverStandings"))
}

/// Constructors' championship of a season.
pub fn constructor_standings(config: &SourceConfig, season: u16) -> Result<Resource> {
    let url = season_url(&config.base_url, season, "constructorStandings.json")?;
    Ok(Resource::new("constructorStandings", url)
        .at("MRData.StandingsTable.StandingsLists.0.ConstructorStandings"))
}

/// Live-timing driver list of one session (`latest` by default).
pub fn roster_drivers(config: &SourceConfig, session_key: &str) -> Result<Resource> {
    let mut url = Url::parse(&format!(
        "{}/drivers",
        config.roster_url.trim_end_matches('/')
    ))?;
    url.query_pairs_mut().append_pair("session_key", session_key);
    Ok(Resource::new("drivers", url))
}

/// Raw telemetry document, from a local file or the configured endpoint.
///
/// The endpoint may carry `{year}`, `{round}` and `{session}` placeholders.
pub fn telemetry(config: &SourceConfig, race: RaceRef, input: Option<&Path>) -> Result<Resource> {
    let url = match input {
        Some(path) => {
            let absolute = std::path::absolute(path)?;
            Url::from_file_path(&absolute).map_err(|_| {
                AppError::config(format!("Cannot address {} as a file URL", absolute.display()))
            })?
        }
        None => {
            let template = config.telemetry_url.as_deref().ok_or_else(|| {
                AppError::config("source.telemetry_url is not set and no --input was given")
            })?;
            Url::parse(
                &template
                    .replace("{year}", &race.year.to_string())
                    .replace("{round}", &race.round.to_string())
                    .replace("{session}", race.session_type.as_str()),
            )?
        }
    };
    Ok(Resource::new(format!("telemetry {}", race.record_id()), url))
}

fn season_url(base: &str, season: u16, file: &str) -> Result<Url> {
    Ok(Url::parse(&format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        season,
        file
    ))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionType;

    #[test]
    fn test_standings_urls() {
        let config = SourceConfig::default();
        let res = driver_standings(&config, 2024).unwrap();
        assert_eq!(
            res.url.as_str(),
            "https://api.jolpi.ca/ergast/f1/2024/driverStandings.json"
        );
        assert!(res.mandatory);

        let res = constructor_standings(&config, 2024).unwrap();
        assert!(res.url.as_str().ends_with("/2024/constructorStandings.json"));
        assert!(res.payload_path.ends_with("ConstructorStandings"));
    }

    #[test]
    fn test_roster_url() {
        let res = roster_drivers(&SourceConfig::default(), "latest").unwrap();
        assert_eq!(
            res.url.as_str(),
            "https://api.openf1.org/v1/drivers?session_key=latest"
        );
    }

    #[test]
    fn test_telemetry_url_template() {
        let config = SourceConfig {
            telemetry_url: Some("https://replays.example.com/{year}/{round}/{session}.json".into()),
            ..SourceConfig::default()
        };
        let race = RaceRef {
            year: 2024,
            round: 5,
            session_type: SessionType::SQ,
        };
        let res = telemetry(&config, race, None).unwrap();
        assert_eq!(res.url.as_str(), "https://replays.example.com/2024/5/SQ.json");
        assert!(telemetry(&SourceConfig::default(), race, None).is_err());
    }

    #[test]
    fn test_telemetry_file_input() {
        let race = RaceRef {
            year: 2024,
            round: 1,
            session_type: SessionType::R,
        };
        let res = telemetry(&SourceConfig::default(), race, Some(Path::new("replay.json"))).unwrap();
        assert_eq!(res.url.scheme(), "file");
        assert!(res.url.path().ends_with("/replay.json"));
    }
}
