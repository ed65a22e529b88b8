//! Actuator kinds and how each one encodes its state on the wire.
//!
//! Integer encodings follow the `HomeKit` characteristic values; string
//! encodings follow Home Assistant entity states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::CharacteristicValue;

const LOCK_UNSECURED: i64 = 0;
const LOCK_SECURED: i64 = 1;
const LOCK_JAMMED: i64 = 2;

const DOOR_OPEN: i64 = 0;
const DOOR_CLOSED: i64 = 1;
const DOOR_OPENING: i64 = 2;
const DOOR_CLOSING: i64 = 3;
const DOOR_STOPPED: i64 = 4;

/// Class of actuator with real-world latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    /// Door lock: target 0 = unsecured, 1 = secured.
    Lock,
    /// Garage door opener: target 0 = open, 1 = closed.
    GarageDoor,
    /// Water valve: command on `active`, state on `in_use`.
    Valve,
    /// Blinds, shades, awnings: target/current position 0–100.
    WindowCovering,
}

/// A decoded report from an actuator's state characteristic.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// The device is at rest at this (normalized) value.
    Settled(CharacteristicValue),
    /// The device reports it is moving toward this (normalized) target.
    Moving(CharacteristicValue),
    /// The device reports a mechanical fault.
    Jammed,
    /// The value could not be interpreted.
    Unknown,
}

impl ActuatorKind {
    /// Whether a second command must be refused while one is in flight.
    ///
    /// Locks and doors run a physical cycle that cannot be reversed
    /// halfway; positional sliders and valves accept re-commands.
    #[must_use]
    pub fn forbids_concurrent_commands(self) -> bool {
        matches!(self, Self::Lock | Self::GarageDoor)
    }

    /// Normalize a requested target, rejecting values this kind cannot take.
    ///
    /// Binary kinds accept booleans and `0`/`1`; coverings accept `0..=100`.
    #[must_use]
    pub fn normalize_target(self, target: &CharacteristicValue) -> Option<CharacteristicValue> {
        match self {
            Self::Lock | Self::GarageDoor | Self::Valve => match target {
                CharacteristicValue::Bool(b) => Some(CharacteristicValue::Int(i64::from(*b))),
                other => other
                    .as_i64()
                    .filter(|v| *v == 0 || *v == 1)
                    .map(CharacteristicValue::Int),
            },
            Self::WindowCovering => target
                .as_i64()
                .filter(|v| (0..=100).contains(v))
                .map(CharacteristicValue::Int),
        }
    }

    /// Value written to the state characteristic while a command toward
    /// `target` is in flight.
    ///
    /// Garage doors report dedicated opening/closing codes; every other
    /// kind shows the target straight away.
    #[must_use]
    pub fn optimistic_state(self, target: &CharacteristicValue) -> CharacteristicValue {
        match self {
            Self::GarageDoor => {
                if target.as_i64() == Some(DOOR_CLOSED) {
                    CharacteristicValue::Int(DOOR_CLOSING)
                } else {
                    CharacteristicValue::Int(DOOR_OPENING)
                }
            }
            Self::Lock | Self::Valve | Self::WindowCovering => target.clone(),
        }
    }

    /// Decode a raw state report into a normalized [`Reading`].
    #[must_use]
    pub fn decode(self, value: &CharacteristicValue) -> Reading {
        match self {
            Self::Lock => decode_lock(value),
            Self::GarageDoor => decode_door(value),
            Self::Valve => value
                .as_bool()
                .map_or(Reading::Unknown, |b| {
                    Reading::Settled(CharacteristicValue::Int(i64::from(b)))
                }),
            Self::WindowCovering => value
                .as_i64()
                .map_or(Reading::Unknown, |p| Reading::Settled(CharacteristicValue::Int(p))),
        }
    }
}

fn decode_lock(value: &CharacteristicValue) -> Reading {
    if let Some(state) = value.as_str() {
        return match state {
            "locked" => Reading::Settled(LOCK_SECURED.into()),
            "unlocked" => Reading::Settled(LOCK_UNSECURED.into()),
            "locking" => Reading::Moving(LOCK_SECURED.into()),
            "unlocking" => Reading::Moving(LOCK_UNSECURED.into()),
            "jammed" => Reading::Jammed,
            _ => Reading::Unknown,
        };
    }
    match value.as_i64() {
        Some(LOCK_UNSECURED) => Reading::Settled(LOCK_UNSECURED.into()),
        Some(LOCK_SECURED) => Reading::Settled(LOCK_SECURED.into()),
        Some(LOCK_JAMMED) => Reading::Jammed,
        _ => Reading::Unknown,
    }
}

fn decode_door(value: &CharacteristicValue) -> Reading {
    if let Some(state) = value.as_str() {
        return match state {
            "open" => Reading::Settled(DOOR_OPEN.into()),
            "closed" => Reading::Settled(DOOR_CLOSED.into()),
            "opening" => Reading::Moving(DOOR_OPEN.into()),
            "closing" => Reading::Moving(DOOR_CLOSED.into()),
            "stopped" => Reading::Settled(DOOR_STOPPED.into()),
            _ => Reading::Unknown,
        };
    }
    match value.as_i64() {
        Some(DOOR_OPEN) => Reading::Settled(DOOR_OPEN.into()),
        Some(DOOR_CLOSED) => Reading::Settled(DOOR_CLOSED.into()),
        Some(DOOR_OPENING) => Reading::Moving(DOOR_OPEN.into()),
        Some(DOOR_CLOSING) => Reading::Moving(DOOR_CLOSED.into()),
        Some(DOOR_STOPPED) => Reading::Settled(DOOR_STOPPED.into()),
        _ => Reading::Unknown,
    }
}

impl fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lock => f.write_str("lock"),
            Self::GarageDoor => f.write_str("garage door"),
            Self::Valve => f.write_str("valve"),
            Self::WindowCovering => f.write_str("window covering"),
        }
    }
}
