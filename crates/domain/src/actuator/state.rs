//! Transition state of an actuator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::CharacteristicValue;

/// Exactly one of these holds per actuator at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum TransitionState {
    /// Steady state confirmed by (or assumed from) the device.
    Stable(CharacteristicValue),
    /// A command was issued and the device has not yet confirmed it.
    Transitioning(CharacteristicValue),
    /// Mechanical fault reported by the device.
    Jammed,
    /// Physical blockage reported by the device.
    Obstructed,
}

impl TransitionState {
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Jammed | Self::Obstructed)
    }

    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Transitioning(_))
    }
}

impl fmt::Display for TransitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable(v) => write!(f, "stable({v})"),
            Self::Transitioning(v) => write!(f, "transitioning({v})"),
            Self::Jammed => f.write_str("jammed"),
            Self::Obstructed => f.write_str("obstructed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_classify_faults() {
        assert!(TransitionState::Jammed.is_fault());
        assert!(TransitionState::Obstructed.is_fault());
        assert!(!TransitionState::Stable(1_i64.into()).is_fault());
    }

    #[test]
    fn should_display_state_with_value() {
        assert_eq!(
            TransitionState::Transitioning(1_i64.into()).to_string(),
            "transitioning(1)"
        );
        assert_eq!(TransitionState::Obstructed.to_string(), "obstructed");
    }

    #[test]
    fn should_serialize_with_state_tag() {
        let json = serde_json::to_string(&TransitionState::Stable(1_i64.into())).unwrap();
        assert_eq!(json, r#"{"state":"stable","value":1}"#);
    }
}
