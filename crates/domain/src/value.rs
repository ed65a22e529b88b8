//! Characteristic values: the tagged payload carried by every read, write
//! and remote report.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single characteristic value.
///
/// The concrete variant is fixed per characteristic but not known statically
/// to the generic components (store, bus, matcher). Enumerated mode names
/// (e.g. alarm modes) travel as [`String`](Self::String).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl CharacteristicValue {
    /// Numeric view used for tolerance matching and averaging.
    ///
    /// Booleans map to `1.0` / `0.0`; strings have no numeric view.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::String(_) => None,
        }
    }

    /// Integer view; floats are truncated toward zero.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Float(_) | Self::String(_) => None,
        }
    }

    /// Boolean view: non-zero numbers are `true`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Float(f) => Some(*f != 0.0),
            Self::String(_) => None,
        }
    }

    /// Loose equality across numeric encodings: `Int(80)`, `Float(80.0)`
    /// and (for 0/1) `Bool` compare equal, strings compare exactly.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => self == other,
        }
    }

    /// String view, only for [`String`](Self::String) values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for CharacteristicValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for CharacteristicValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for CharacteristicValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for CharacteristicValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CharacteristicValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => b.fmt(f),
            Self::Int(i) => i.fmt(f),
            Self::Float(x) => x.fmt(f),
            Self::String(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_bool_to_one_or_zero_when_viewed_as_f64() {
        assert_eq!(CharacteristicValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(CharacteristicValue::Bool(false).as_f64(), Some(0.0));
    }

    #[test]
    fn should_have_no_numeric_view_for_strings() {
        let val = CharacteristicValue::from("armed_home");
        assert_eq!(val.as_f64(), None);
        assert_eq!(val.as_i64(), None);
        assert_eq!(val.as_bool(), None);
        assert_eq!(val.as_str(), Some("armed_home"));
    }

    #[test]
    fn should_truncate_float_when_viewed_as_i64() {
        assert_eq!(CharacteristicValue::Float(79.9).as_i64(), Some(79));
        assert_eq!(CharacteristicValue::Float(f64::NAN).as_i64(), None);
    }

    #[test]
    fn should_treat_non_zero_int_as_true() {
        assert_eq!(CharacteristicValue::Int(0).as_bool(), Some(false));
        assert_eq!(CharacteristicValue::Int(2).as_bool(), Some(true));
    }

    #[test]
    fn should_compare_int_and_float_encodings_as_same() {
        assert!(CharacteristicValue::Int(80).same_as(&CharacteristicValue::Float(80.0)));
        assert!(CharacteristicValue::Bool(true).same_as(&CharacteristicValue::Int(1)));
        assert!(!CharacteristicValue::Int(80).same_as(&CharacteristicValue::Int(45)));
        assert!(!CharacteristicValue::from("1").same_as(&CharacteristicValue::Int(1)));
    }

    #[test]
    fn should_serialize_untagged() {
        assert_eq!(
            serde_json::to_string(&CharacteristicValue::Int(42)).unwrap(),
            "42"
        );
        assert_eq!(
            serde_json::to_string(&CharacteristicValue::Bool(true)).unwrap(),
            "true"
        );
        assert_eq!(
            serde_json::to_string(&CharacteristicValue::from("open")).unwrap(),
            "\"open\""
        );
    }

    #[test]
    fn should_deserialize_whole_number_as_int() {
        let val: CharacteristicValue = serde_json::from_str("80").unwrap();
        assert_eq!(val, CharacteristicValue::Int(80));
        let val: CharacteristicValue = serde_json::from_str("21.5").unwrap();
        assert_eq!(val, CharacteristicValue::Float(21.5));
    }

    #[test]
    fn should_display_inner_value() {
        assert_eq!(CharacteristicValue::Int(3).to_string(), "3");
        assert_eq!(CharacteristicValue::from("closed").to_string(), "closed");
    }
}
