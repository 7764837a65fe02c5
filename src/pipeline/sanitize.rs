//! JSON-safe value sanitizer.
//!
//! Converts nested numeric/structural data into `serde_json::Value`, which
//! cannot hold NaN or infinities. Policy:
//!
//! 1. Non-finite floats become `null`. Zero is a measurement, never a
//!    stand-in for "missing".
//! 2. Integers and booleans keep their value.
//! 3. Maps and lists are sanitized element-wise; keys and order are kept.
//! 4. Foreign values are tried as a list first, then rendered as-is.
//!
//! `sanitize` is total: it has no error path.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Number};

/// Array-like or otherwise foreign value the sanitizer can unwrap.
pub trait ForeignValue: fmt::Debug + Send + Sync {
    /// Sequence view, when the value is array-like.
    fn to_list(&self) -> Option<Vec<Value>>;

    /// Scalar rendering used when there is no sequence view.
    fn to_json(&self) -> serde_json::Value;
}

impl ForeignValue for Vec<f32> {
    fn to_list(&self) -> Option<Vec<Value>> {
        Some(self.iter().copied().map(Value::from).collect())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

impl ForeignValue for [u8; 3] {
    fn to_list(&self) -> Option<Vec<Value>> {
        Some(self.iter().map(|c| Value::Int(i64::from(*c))).collect())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Unsanitized value tree.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Foreign(Arc<dyn ForeignValue>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Foreign(a), Value::Foreign(b)) => sanitize_foreign(a.as_ref()) == sanitize_foreign(b.as_ref()),
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Sanitize a value tree into JSON-safe output.
pub fn sanitize(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number(Number::from(*i)),
        Value::UInt(u) => serde_json::Value::Number(Number::from(*u)),
        Value::Float(f) => float(*f),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(sanitize).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize(v)))
                .collect::<Map<String, serde_json::Value>>(),
        ),
        Value::Foreign(foreign) => sanitize_foreign(foreign.as_ref()),
    }
}

fn sanitize_foreign(foreign: &dyn ForeignValue) -> serde_json::Value {
    match foreign.to_list() {
        Some(items) => serde_json::Value::Array(items.iter().map(sanitize).collect()),
        None => foreign.to_json(),
    }
}

fn float(f: f64) -> serde_json::Value {
    Number::from_f64(f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Keep a float only when it is finite.
pub fn finite(f: f64) -> Option<f64> {
    f.is_finite().then_some(f)
}

/// Replace bare `NaN`, `Infinity` and `-Infinity` tokens with `null`.
///
/// Upstream exporters emit these non-standard literals; strict JSON parsers
/// reject them. Tokens inside string literals are left alone.
pub fn relax_non_finite(text: &str) -> Cow<'_, str> {
    const TOKENS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];

    if !TOKENS.iter().any(|t| text.contains(t)) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(token) = TOKENS.iter().find(|t| rest.starts_with(*t)) {
            out.push_str("null");
            rest = &rest[token.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_finite_becomes_null() {
        assert_eq!(sanitize(&Value::Float(f64::NAN)), json!(null));
        assert_eq!(sanitize(&Value::Float(f64::INFINITY)), json!(null));
        assert_eq!(sanitize(&Value::Float(f64::NEG_INFINITY)), json!(null));
        assert_eq!(sanitize(&Value::from(f32::NAN)), json!(null));
    }

    #[test]
    fn test_zero_is_not_missing() {
        assert_eq!(sanitize(&Value::Float(0.0)), json!(0.0));
        assert_eq!(sanitize(&Value::Int(0)), json!(0));
    }

    #[test]
    fn test_finite_scalars_pass_through() {
        assert_eq!(sanitize(&Value::Float(48.5)), json!(48.5));
        assert_eq!(sanitize(&Value::Int(-3)), json!(-3));
        assert_eq!(sanitize(&Value::UInt(u64::MAX)), json!(u64::MAX));
        assert_eq!(sanitize(&Value::Bool(true)), json!(true));
        assert_eq!(sanitize(&Value::from("VER")), json!("VER"));
    }

    #[test]
    fn test_nested_structures_keep_shape() {
        let value = Value::Map(BTreeMap::from([
            ("t".to_string(), Value::Float(12.5)),
            (
                "drivers".to_string(),
                Value::Map(BTreeMap::from([(
                    "VER".to_string(),
                    Value::List(vec![Value::Float(f64::NAN), Value::Int(7), Value::Null]),
                )])),
            ),
        ]));

        assert_eq!(
            sanitize(&value),
            json!({ "t": 12.5, "drivers": { "VER": [null, 7, null] } })
        );
    }

    #[test]
    fn test_foreign_values_unwrap_as_lists() {
        let samples: Arc<dyn ForeignValue> = Arc::new(vec![1.5f32, f32::INFINITY]);
        let color: Arc<dyn ForeignValue> = Arc::new([54u8, 113, 198]);

        assert_eq!(sanitize(&Value::Foreign(samples)), json!([1.5, null]));
        assert_eq!(sanitize(&Value::Foreign(color)), json!([54, 113, 198]));
    }

    #[test]
    fn test_foreign_scalar_passes_through() {
        #[derive(Debug)]
        struct Compound(&'static str);

        impl ForeignValue for Compound {
            fn to_list(&self) -> Option<Vec<Value>> {
                None
            }

            fn to_json(&self) -> serde_json::Value {
                json!(self.0)
            }
        }

        assert_eq!(sanitize(&Value::Foreign(Arc::new(Compound("SOFT")))), json!("SOFT"));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let value = Value::List(vec![
            Value::Float(f64::NAN),
            Value::Float(1.25),
            Value::Int(3),
            Value::Map(BTreeMap::from([("x".to_string(), Value::Float(f64::INFINITY))])),
        ]);

        let once = sanitize(&value);
        let twice = sanitize(&Value::from(once.clone()));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_relax_non_finite() {
        let raw = r#"{"speed": NaN, "x": -Infinity, "y": Infinity, "name": "NaN"}"#;
        let relaxed = relax_non_finite(raw);
        let parsed: serde_json::Value = serde_json::from_str(&relaxed).unwrap();

        assert_eq!(
            parsed,
            json!({ "speed": null, "x": null, "y": null, "name": "NaN" })
        );
    }

    #[test]
    fn test_relax_non_finite_borrows_clean_input() {
        assert!(matches!(relax_non_finite(r#"{"a": 1}"#), Cow::Borrowed(_)));
    }

    #[test]
    fn test_finite_helper() {
        assert_eq!(finite(2.0), Some(2.0));
        assert_eq!(finite(f64::NAN), None);
    }
}
