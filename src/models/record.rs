//! Raw source records and recency markers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One loosely-typed object as returned by a Source API.
///
/// Fields may be missing, or carry numbers encoded as strings. Accessors
/// make presence explicit instead of relying on truthiness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value, returning `None` when it is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Non-blank string field, trimmed.
    pub fn str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    /// String field, with numbers rendered as text.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Numeric field, accepting numbers encoded as strings.
    ///
    /// The result may be non-finite (`"NaN"`, `"Infinity"`); callers pass it
    /// through the sanitizer rather than guessing a value.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Integral field, accepting strings and whole floats.
    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Nested object field.
    pub fn child(&self, key: &str) -> Option<RawRecord> {
        match self.0.get(key) {
            Some(Value::Object(map)) => Some(Self(map.clone())),
            _ => None,
        }
    }

    /// First object of an array field.
    pub fn first_child(&self, key: &str) -> Option<RawRecord> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items.iter().find_map(|v| Self::from_value(v.clone())),
            _ => None,
        }
    }

    /// Recency marker read from the given field, absent when missing.
    pub fn recency(&self, key: &str) -> RecencyMarker {
        self.integer(key)
            .map(RecencyMarker)
            .unwrap_or(RecencyMarker::ABSENT)
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Comparable marker used to pick the freshest of duplicate records.
///
/// Source-issued session/sequence numbers; a record without one compares
/// lower than any record that carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecencyMarker(pub i64);

impl RecencyMarker {
    pub const ABSENT: RecencyMarker = RecencyMarker(i64::MIN);
}

impl Default for RecencyMarker {
    fn default() -> Self {
        Self::ABSENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        RawRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_string_numbers() {
        let r = record(json!({ "points": "50.5", "wins": "3", "position": 2 }));
        assert_eq!(r.number("points"), Some(50.5));
        assert_eq!(r.integer("wins"), Some(3));
        assert_eq!(r.integer("position"), Some(2));
        assert_eq!(r.text("position").as_deref(), Some("2"));
    }

    #[test]
    fn test_nan_string_is_kept_non_finite() {
        let r = record(json!({ "points": "NaN" }));
        assert!(r.number("points").unwrap().is_nan());
    }

    #[test]
    fn test_blank_strings_are_absent() {
        let r = record(json!({ "name": "   ", "code": null }));
        assert!(r.str("name").is_none());
        assert!(r.str("code").is_none());
        assert!(r.str("missing").is_none());
    }

    #[test]
    fn test_children() {
        let r = record(json!({
            "Driver": { "code": "VER" },
            "Constructors": [ { "constructorId": "red_bull" } ]
        }));
        assert_eq!(r.child("Driver").unwrap().str("code"), Some("VER"));
        assert_eq!(
            r.first_child("Constructors").unwrap().str("constructorId"),
            Some("red_bull")
        );
        assert!(r.first_child("Driver").is_none());
    }

    #[test]
    fn test_recency_ordering() {
        let old = record(json!({ "session_key": 9158 }));
        let new = record(json!({ "session_key": 9165 }));
        let none = record(json!({}));
        assert!(old.recency("session_key") < new.recency("session_key"));
        assert!(none.recency("session_key") < old.recency("session_key"));
    }

    #[test]
    fn test_zero_and_negative_markers_beat_absent() {
        let zero = record(json!({ "session_key": 0 }));
        let negative = record(json!({ "session_key": -1 }));
        let none = record(json!({}));
        assert!(none.recency("session_key") < zero.recency("session_key"));
        assert!(none.recency("session_key") < negative.recency("session_key"));
        assert_eq!(none.recency("session_key"), RecencyMarker::default());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(RawRecord::from_value(json!([1, 2])).is_none());
    }
}
