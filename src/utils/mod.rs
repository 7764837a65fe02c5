//! Utility functions and helpers.

pub mod http;
pub mod progress;

use std::sync::LazyLock;

use regex::Regex;

static SEPARATOR_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-]+").expect("separator pattern compiles"));

/// Derive a stable identifier slug from a display name.
///
/// Lower-cases the name and replaces every run of whitespace and hyphens
/// with a single `_`. Leading and trailing separators are dropped.
pub fn slugify(name: &str) -> String {
    SEPARATOR_RUN
        .replace_all(name.trim(), "_")
        .trim_matches('_')
        .to_lowercase()
}

/// Slug used in car document ids: spaces become `_`, hyphens are dropped.
pub fn car_slug(car_name: &str) -> String {
    car_name
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace('-', "")
}

/// Ensure a hex color carries a leading `#`.
pub fn hex_color(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('#') {
        trimmed.to_string()
    } else {
        format!("#{trimmed}")
    }
}

/// Parse `#RRGGBB` (with or without `#`) into an RGB triple.
pub fn parse_rgb(raw: &str) -> Option<[u8; 3]> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Max Verstappen"), "max_verstappen");
        assert_eq!(slugify("Jean-Éric  Vergne"), "jean_éric_vergne");
        assert_eq!(slugify("Haas F1 Team"), "haas_f1_team");
        assert_eq!(slugify("  - Zhou -  "), "zhou");
    }

    #[test]
    fn test_slugify_is_deterministic() {
        let name = "Andrea Kimi Antonelli";
        assert_eq!(slugify(name), slugify(name));
    }

    #[test]
    fn test_car_slug() {
        assert_eq!(car_slug("VCARB 01"), "vcarb_01");
        assert_eq!(car_slug("SF-24"), "sf24");
        assert_eq!(car_slug("RB20"), "rb20");
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color("3671C6"), "#3671C6");
        assert_eq!(hex_color("#3671C6"), "#3671C6");
    }

    #[test]
    fn test_parse_rgb() {
        assert_eq!(parse_rgb("#3671C6"), Some([0x36, 0x71, 0xC6]));
        assert_eq!(parse_rgb("ff8700"), Some([255, 135, 0]));
        assert_eq!(parse_rgb("#fff"), None);
        assert_eq!(parse_rgb("zzzzzz"), None);
    }
}
