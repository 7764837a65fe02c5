//! Mapping of raw source records onto canonical entities.
//!
//! Every function here is pure over its inputs. Missing optional fields get
//! documented defaults; only a record with no usable identity (neither a
//! name nor a code) is rejected with `AppError::Normalize`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value as Json;

use crate::error::{AppError, Result};
use crate::models::{
    Car, CarSpecs, ConstructorStanding, DEFAULT_ROSTER_COLOR, Driver, DriverStanding, RaceMetadata,
    RaceRef, RawRecord, ReferenceTables, Team, TelemetryExport, Trend, UNKNOWN_TEAM_COLOR,
};
use crate::pipeline::sanitize::{self, finite};
use crate::utils::{car_slug, hex_color, parse_rgb, slugify};

/// Static context shared by every record of a run.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub season: u16,
    pub tables: &'a ReferenceTables,
}

impl<'a> NormalizeContext<'a> {
    pub fn new(season: u16, tables: &'a ReferenceTables) -> Self {
        Self { season, tables }
    }
}

/// Derive a stable identifier.
///
/// Prefers the source's canonical id when present and non-empty, otherwise
/// slugs the display name. Returns `None` when neither is usable.
pub fn derive_id(canonical: Option<&str>, display_name: Option<&str>) -> Option<String> {
    canonical
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| {
            display_name
                .map(slugify)
                .filter(|slug| !slug.is_empty())
        })
}

/// Normalize one row of the drivers' championship.
pub fn driver_standing(raw: &RawRecord, ctx: &NormalizeContext<'_>) -> Result<DriverStanding> {
    let driver = raw.child("Driver").unwrap_or_default();
    let given = driver.str("givenName").unwrap_or("");
    let family = driver.str("familyName").unwrap_or("");
    let full_name = join_name(given, family);
    let code = driver.str("code").map(str::to_uppercase);

    let driver_id = derive_id(driver.str("driverId"), full_name.as_deref())
        .or_else(|| code.as_deref().map(slugify))
        .ok_or_else(|| AppError::normalize(describe(raw), "driver has neither name nor code"))?;

    let position = position(raw, &driver_id)?;
    let constructor = raw.first_child("Constructors").unwrap_or_default();
    let constructor_id = constructor
        .str("constructorId")
        .map(|id| ctx.tables.canonical_team_id(id))
        .unwrap_or_default();
    let team_info = ctx.tables.team(&constructor_id);

    let avatar_url = code
        .as_deref()
        .and_then(|c| ctx.tables.portrait_url(c))
        .or_else(|| pattern_portrait(given, family, code.as_deref()))
        .unwrap_or_default();

    Ok(DriverStanding {
        position,
        name: full_name.unwrap_or_else(|| driver_id.clone()),
        team: team_info
            .map(|t| t.name.clone())
            .or_else(|| constructor.str("name").map(str::to_string))
            .unwrap_or_default(),
        team_color: team_info
            .map(|t| t.color.clone())
            .unwrap_or_else(|| UNKNOWN_TEAM_COLOR.to_string()),
        driver_id,
        constructor_id,
        points: points(raw),
        wins: count(raw, "wins"),
        podiums: 0,
        trend: Trend::Same,
        trend_pos: None,
        avatar_url,
    })
}

/// Normalize one row of the constructors' championship.
///
/// `drivers` is left empty; the orchestrator fills it from the drivers'
/// standings once both streams are complete.
pub fn constructor_standing(
    raw: &RawRecord,
    ctx: &NormalizeContext<'_>,
) -> Result<ConstructorStanding> {
    let constructor = raw.child("Constructor").unwrap_or_default();
    let source_name = constructor.str("name");

    let constructor_id = derive_id(constructor.str("constructorId"), source_name)
        .map(|id| ctx.tables.canonical_team_id(&id))
        .ok_or_else(|| AppError::normalize(describe(raw), "constructor has neither id nor name"))?;

    let position = position(raw, &constructor_id)?;
    let team_info = ctx.tables.team(&constructor_id);

    Ok(ConstructorStanding {
        position,
        name: team_info
            .map(|t| t.name.clone())
            .or_else(|| source_name.map(str::to_string))
            .unwrap_or_else(|| constructor_id.clone()),
        logo_url: team_info.map(|t| t.logo_url.clone()).unwrap_or_default(),
        team_color: team_info
            .map(|t| t.color.clone())
            .unwrap_or_else(|| UNKNOWN_TEAM_COLOR.to_string()),
        constructor_id,
        points: points(raw),
        wins: count(raw, "wins"),
        podiums: 0,
        trend: Trend::Same,
        drivers: Vec::new(),
    })
}

/// Attach each constructor's drivers, in championship order.
pub fn link_constructor_drivers(
    constructors: &mut [ConstructorStanding],
    drivers: &[DriverStanding],
) {
    let mut by_team: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for driver in drivers {
        by_team
            .entry(driver.constructor_id.as_str())
            .or_default()
            .push(driver.driver_id.clone());
    }
    for constructor in constructors.iter_mut() {
        constructor.drivers = by_team
            .get(constructor.constructor_id.as_str())
            .cloned()
            .unwrap_or_default();
    }
}

/// Normalize a live-timing driver record into a roster document.
pub fn driver(raw: &RawRecord, ctx: &NormalizeContext<'_>) -> Result<Driver> {
    let code = raw.str("name_acronym").map(str::to_uppercase);
    let full_name = raw.str("full_name").or_else(|| raw.str("broadcast_name"));

    let id = derive_id(None, full_name)
        .or_else(|| code.as_deref().map(slugify))
        .ok_or_else(|| AppError::normalize(describe(raw), "driver has neither full_name nor code"))?;
    let full_name = full_name
        .map(str::to_string)
        .or_else(|| code.clone())
        .unwrap_or_default();

    let (first_name, last_name) = split_name(&full_name);
    let team_name = raw.str("team_name").unwrap_or("");
    let team_id = team_id(team_name, ctx);
    let code = code.unwrap_or_default();

    let headshot_url = ctx
        .tables
        .portrait_url(&code)
        .or_else(|| raw.str("headshot_url").map(str::to_string))
        .unwrap_or_default();

    Ok(Driver {
        id,
        driver_number: raw
            .integer("driver_number")
            .and_then(|n| u32::try_from(n).ok()),
        full_name,
        first_name,
        last_name,
        team_id,
        team_name: team_name.to_string(),
        team_color: roster_color(raw),
        country_code: raw.str("country_code").unwrap_or("").to_string(),
        headshot_url,
        bio: String::new(),
        stats: ctx.tables.stats_for(&code),
        season: ctx.season,
        code,
    })
}

/// Team document implied by a normalized roster driver.
///
/// Built from the deduplicated driver so the team reflects the driver's
/// latest session.
pub fn team(driver: &Driver, ctx: &NormalizeContext<'_>) -> Result<Team> {
    let team_name = driver.team_name.as_str();
    if team_name.is_empty() {
        return Err(AppError::normalize(&driver.id, "driver has no team_name"));
    }
    let info = ctx.tables.team_by_name(team_name);

    Ok(Team {
        id: driver.team_id.clone(),
        name: team_name.to_string(),
        full_name: info
            .map(|t| t.full_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| team_name.to_string()),
        base: info.map(|t| t.base.clone()).unwrap_or_default(),
        team_principal: info.map(|t| t.team_principal.clone()).unwrap_or_default(),
        color: driver.team_color.clone(),
        logo_url: info.map(|t| t.logo_url.clone()).unwrap_or_default(),
        season: ctx.season,
    })
}

/// Car documents for every team in the reference tables.
pub fn cars(ctx: &NormalizeContext<'_>) -> Vec<Car> {
    ctx.tables
        .teams
        .iter()
        .filter(|t| !t.car_name.is_empty())
        .map(|t| Car {
            id: format!("{}_{}", t.id, car_slug(&t.car_name)),
            team_id: t.id.clone(),
            team_name: t.name.clone(),
            name: t.car_name.clone(),
            season: ctx.season,
            image_url: ctx.tables.car_image_url(&t.id),
            specs: CarSpecs {
                power_unit: t.engine.clone(),
                chassis: format!("Carbon-fibre composite monocoque ({})", t.car_name),
                weight: "798 kg (minimum)".to_string(),
                transmission: "8-speed + reverse, semi-automatic".to_string(),
                brakes: "Carbon discs and pads, fly-by-wire rear brakes".to_string(),
                suspension: "Carbon-fibre wishbones, pushrod/pullrod activated springs"
                    .to_string(),
            },
        })
        .collect()
}

/// Normalize a raw telemetry document into a sanitized export.
pub fn telemetry(
    raw: Json,
    race: RaceRef,
    exported_at: DateTime<Utc>,
) -> Result<TelemetryExport> {
    let label = format!("telemetry {}", race.record_id());
    let Json::Object(mut doc) = raw else {
        return Err(AppError::normalize(label, "telemetry document is not an object"));
    };

    let frames = match doc.remove("frames") {
        Some(Json::Array(frames)) => frames,
        _ => return Err(AppError::normalize(label, "telemetry document has no frames")),
    };

    let event_name = doc
        .get("event_name")
        .or_else(|| doc.get("metadata").and_then(|m| m.get("event_name")))
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string();

    let driver_colors = match doc.remove("driver_colors") {
        Some(Json::Object(colors)) => colors
            .into_iter()
            .filter_map(|(code, color)| match rgb(&color) {
                Some(rgb) => Some((code, rgb)),
                None => {
                    log::warn!("Dropping unreadable color for {}: {}", code, color);
                    None
                }
            })
            .collect(),
        _ => BTreeMap::new(),
    };

    let total_laps = doc
        .get("total_laps")
        .and_then(Json::as_f64)
        .and_then(finite)
        .filter(|laps| *laps >= 0.0)
        .map(|laps| laps as u32);

    Ok(TelemetryExport {
        frames: sanitized_list(Json::Array(frames)),
        track_layout: sanitized_list(doc.remove("track_layout").unwrap_or(Json::Null)),
        track_statuses: sanitized_list(doc.remove("track_statuses").unwrap_or(Json::Null)),
        driver_colors,
        total_laps,
        metadata: RaceMetadata {
            year: race.year,
            round: race.round,
            event_name,
            session_type: race.session_type,
            exported_at,
        },
    })
}

fn sanitized_list(value: Json) -> Vec<Json> {
    match sanitize::sanitize(&sanitize::Value::from(value)) {
        Json::Array(items) => items,
        _ => Vec::new(),
    }
}

fn rgb(value: &Json) -> Option<[u8; 3]> {
    match value {
        Json::String(hex) => parse_rgb(hex),
        Json::Array(channels) if channels.len() == 3 => {
            let mut out = [0u8; 3];
            for (slot, channel) in out.iter_mut().zip(channels) {
                let c = channel.as_f64().and_then(finite)?;
                *slot = c.round().clamp(0.0, 255.0) as u8;
            }
            Some(out)
        }
        _ => None,
    }
}

fn position(raw: &RawRecord, id: &str) -> Result<u32> {
    raw.integer("position")
        .and_then(|p| u32::try_from(p).ok())
        .filter(|p| *p > 0)
        .ok_or_else(|| AppError::normalize(id, "missing or non-positive position"))
}

/// Finite, non-negative points; anything else is reported as absent.
fn points(raw: &RawRecord) -> Option<f64> {
    let value = raw.number("points")?;
    match finite(value) {
        Some(p) if p >= 0.0 => Some(p),
        Some(p) => {
            log::warn!("Negative points {} treated as missing", p);
            None
        }
        None => None,
    }
}

fn count(raw: &RawRecord, key: &str) -> u32 {
    raw.integer(key)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn team_id(team_name: &str, ctx: &NormalizeContext<'_>) -> String {
    ctx.tables
        .team_by_name(team_name)
        .map(|t| t.id.clone())
        .unwrap_or_else(|| slugify(team_name))
}

fn roster_color(raw: &RawRecord) -> String {
    raw.str("team_colour")
        .map(hex_color)
        .unwrap_or_else(|| DEFAULT_ROSTER_COLOR.to_string())
}

fn join_name(given: &str, family: &str) -> Option<String> {
    let name = format!("{given} {family}").trim().to_string();
    (!name.is_empty()).then_some(name)
}

fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or("").to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Portrait path guessed from the media site's naming convention.
fn pattern_portrait(given: &str, family: &str, code: Option<&str>) -> Option<String> {
    let code = code?;
    let initial = given.chars().next()?.to_uppercase();
    if family.is_empty() {
        return None;
    }
    Some(format!(
        "https://media.formula1.com/content/dam/fom-website/drivers/{initial}/{}01_{given}_{family}/{}01.png",
        code.to_uppercase(),
        code.to_lowercase()
    ))
}

/// Short label for log lines and errors.
fn describe(raw: &RawRecord) -> String {
    ["driverId", "constructorId", "name_acronym", "position", "driver_number"]
        .iter()
        .find_map(|key| raw.text(key).map(|v| format!("{key}={v}")))
        .unwrap_or_else(|| "record without identity".to_string())
}
