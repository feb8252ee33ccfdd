//! Typed values for parameters, defaults, and audit metadata.
//!
//! A closed tagged union replaces free-form JSON so that every consumer
//! (renderer, diff projections, persistence) handles exactly five shapes.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Parameter values passed to the renderer, keyed by parameter name.
pub type ParamMap = BTreeMap<String, Value>;

/// Opaque key/value bag attached to version log entries.
pub type Metadata = BTreeMap<String, Value>;

/// A typed value.
///
/// Maps use `BTreeMap` so that serialization is canonical (sorted keys).
/// Stored numbers are finite: NaN and infinities are refused on input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    #[serde(deserialize_with = "finite_number")]
    Number(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Truthiness used by `{{ if }}` sections.
    ///
    /// Empty strings, zero, NaN, `false`, and empty collections are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::String(s) => !s.is_empty(),
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Bool(b) => *b,
            Self::List(items) => !items.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
        }
    }

    /// Whether every number in the value, nested ones included, is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Number(n) => n.is_finite(),
            Self::String(_) | Self::Bool(_) => true,
            Self::List(items) => items.iter().all(Self::is_finite),
            Self::Map(entries) => entries.values().all(Self::is_finite),
        }
    }

    /// Name of the variant as used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::List(_) => "array",
            Self::Map(_) => "object",
        }
    }

    /// Walk a dotted path (`user.name`) into nested maps.
    pub fn lookup_path<'a>(&'a self, segments: &[&str]) -> Option<&'a Value> {
        let mut current = self;
        for segment in segments {
            match current {
                Self::Map(entries) => current = entries.get(*segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Canonical compact JSON text (sorted keys, integral numbers without `.0`).
    pub fn to_canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Convert from untyped JSON. `null` has no counterpart and yields `None`.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Array(items) => {
                Some(Self::List(items.iter().filter_map(Self::from_json).collect()))
            }
            serde_json::Value::Object(entries) => Some(Self::Map(
                entries
                    .iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }
}

fn finite_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let n = f64::deserialize(deserializer)?;
    if n.is_finite() {
        Ok(n)
    } else {
        Err(D::Error::custom(format!("number must be finite, got {n}")))
    }
}

/// Integral numbers inside `i64` range are rendered without a fractional part.
fn integral(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        Some(n as i64)
    } else {
        None
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Textual form substituted for a `{{placeholder}}`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => match integral(*n) {
                Some(i) => write!(f, "{i}"),
                None => write!(f, "{n}"),
            },
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(_) | Self::Map(_) => f.write_str(&self.to_canonical_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self::Map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn truthiness() {
        assert!(Value::from(true).is_truthy());
        assert!(!Value::from(false).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from(2).is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::List(vec![Value::from(1)]).is_truthy());
        assert!(!Value::Map(BTreeMap::new()).is_truthy());
    }

    #[test]
    fn display_integral_and_fractional_numbers() {
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from(-7.0).to_string(), "-7");
    }

    #[test]
    fn collections_display_as_canonical_json() {
        let value = map(&[
            ("zeta", Value::from(1)),
            ("alpha", Value::List(vec![Value::from("a"), Value::from(true)])),
        ]);
        assert_eq!(value.to_string(), r#"{"alpha":["a",true],"zeta":1}"#);
    }

    #[test]
    fn deserializes_untagged_json() {
        let parsed: Value = serde_json::from_str(r#"{"n": 4, "tags": ["a"], "ok": false}"#).unwrap();
        assert_eq!(
            parsed,
            map(&[
                ("n", Value::Number(4.0)),
                ("tags", Value::List(vec![Value::from("a")])),
                ("ok", Value::Bool(false)),
            ])
        );
    }

    #[test]
    fn lookup_dotted_path() {
        let value = map(&[("user", map(&[("name", Value::from("Bob"))]))]);
        assert_eq!(
            value.lookup_path(&["user", "name"]),
            Some(&Value::from("Bob"))
        );
        assert_eq!(value.lookup_path(&["user", "missing"]), None);
        assert_eq!(value.lookup_path(&["user", "name", "deeper"]), None);
    }

    #[test]
    fn from_json_drops_nulls() {
        let json = serde_json::json!({"a": null, "b": [1, null]});
        let value = Value::from_json(&json).unwrap();
        assert_eq!(
            value,
            map(&[("b", Value::List(vec![Value::Number(1.0)]))])
        );
        assert_eq!(Value::from_json(&serde_json::Value::Null), None);
    }

    #[test]
    fn non_finite_numbers_are_detected_in_nested_values() {
        assert!(Value::from(1.5).is_finite());
        assert!(!Value::from(f64::NAN).is_finite());
        assert!(!Value::List(vec![Value::from(1), Value::from(f64::INFINITY)]).is_finite());
        assert!(!map(&[("ratio", Value::from(f64::NEG_INFINITY))]).is_finite());
    }

    #[test]
    fn deserializing_non_finite_number_fails() {
        use serde::de::value::{Error, F64Deserializer};
        use serde::de::IntoDeserializer;

        let nan: F64Deserializer<Error> = f64::NAN.into_deserializer();
        assert!(Value::deserialize(nan).is_err());
        let finite: F64Deserializer<Error> = 2.5f64.into_deserializer();
        assert_eq!(Value::deserialize(finite).unwrap(), Value::Number(2.5));
    }
}
