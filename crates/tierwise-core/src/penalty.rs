//! Penalty-weight normalization.
//!
//! Level configurations store the 2nd/3rd-attempt multipliers in several
//! shapes: a map (`{"2": 0.7, "3": 0.4}`), a two-element list
//! (`[0.7, 0.4]`), a JSON-encoded string of either, or a comma-separated
//! string (`"0.7, 0.4"`). They are all normalized here, once, into the
//! canonical map the scoring models read.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Default multiplier for a first success on the 2nd attempt.
pub const DEFAULT_SECOND_ATTEMPT_WEIGHT: f64 = 0.7;
/// Default multiplier for a first success on the 3rd attempt.
pub const DEFAULT_THIRD_ATTEMPT_WEIGHT: f64 = 0.4;

/// Canonical attempt-ordinal → multiplier mapping (`"2"`, `"3"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PenaltyWeights(BTreeMap<String, f64>);

impl PenaltyWeights {
    /// `{"2": 0.7, "3": 0.4}`.
    pub fn standard() -> Self {
        Self::from_pair(DEFAULT_SECOND_ATTEMPT_WEIGHT, DEFAULT_THIRD_ATTEMPT_WEIGHT)
    }

    pub fn from_pair(second: f64, third: f64) -> Self {
        let mut map = BTreeMap::new();
        map.insert("2".to_string(), second);
        map.insert("3".to_string(), third);
        Self(map)
    }

    /// Multiplier for a first success on attempt `ordinal`.
    ///
    /// Ordinal 1 is always 1.0 and anything past 3 is always 0.0. Missing
    /// keys fall back to the defaults. The result is always within [0, 1].
    pub fn weight_for(&self, ordinal: u32) -> f64 {
        let raw = match ordinal {
            0 | 1 => 1.0,
            2 => self.get("2").unwrap_or(DEFAULT_SECOND_ATTEMPT_WEIGHT),
            3 => self.get("3").unwrap_or(DEFAULT_THIRD_ATTEMPT_WEIGHT),
            _ => 0.0,
        };
        bounded(raw).unwrap_or(0.0)
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.0
    }

    /// Normalize any stored representation into the canonical map.
    ///
    /// Unknown shapes yield an empty map. Non-finite values count as
    /// unparseable and finite ones are clamped to [0, 1].
    pub fn normalize(raw: &Value) -> Self {
        match raw {
            Value::Object(map) => Self(
                map.iter()
                    .filter_map(|(k, v)| value_as_f64(v).map(|f| (k.clone(), f)))
                    .collect(),
            ),
            Value::Array(items) => {
                Self::from_ordered(items.iter().map(|v| value_as_f64(v).unwrap_or(0.0)))
            }
            Value::String(s) => Self::parse_str(s),
            _ => Self::default(),
        }
    }

    /// Normalize a string: JSON first, comma-separated values otherwise.
    pub fn parse_str(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<Value>(s) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => Self::normalize(&value),
            Ok(Value::Null) | Ok(Value::Bool(_)) => Self::default(),
            // Bare numbers and JSON strings are treated like CSV input.
            Ok(Value::String(inner)) => Self::parse_csv(&inner),
            Ok(Value::Number(_)) | Err(_) => Self::parse_csv(s),
        }
    }

    fn parse_csv(s: &str) -> Self {
        Self::from_ordered(
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| p.parse::<f64>().ok().and_then(bounded).unwrap_or(0.0)),
        )
    }

    /// Index 0 → `"2"`, index 1 → `"3"`; extra values are ignored.
    fn from_ordered(values: impl Iterator<Item = f64>) -> Self {
        let map = ["2", "3"]
            .iter()
            .zip(values)
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self(map)
    }
}

fn value_as_f64(v: &Value) -> Option<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    bounded(f)
}

/// A multiplier in [0, 1], or `None` for NaN and infinities.
fn bounded(f: f64) -> Option<f64> {
    f.is_finite().then(|| f.clamp(0.0, 1.0))
}

impl<'de> Deserialize<'de> for PenaltyWeights {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::normalize(&raw))
    }
}

impl From<BTreeMap<String, f64>> for PenaltyWeights {
    fn from(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }
}
