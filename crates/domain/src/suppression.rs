//! Suppression windows: time-boxed filters that reject remote updates
//! arriving shortly after a local write.
//!
//! A device often keeps reporting its *old* value for a while after it has
//! been commanded (a blind still reports 45% while it travels to 80%).
//! Opening a window on every local write imposes a local ordering guarantee:
//! the user's own recent command wins over a delayed stale report.
//!
//! Expiry is evaluated lazily: there is no timer, only a timestamp
//! comparison performed whenever a remote update arrives.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::CharacteristicId;
use crate::time::{Duration, Timestamp, seconds};
use crate::value::CharacteristicValue;

/// An open (or expired) window for one characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionEntry {
    pub characteristic_id: CharacteristicId,
    pub expires_at: Timestamp,
}

impl SuppressionEntry {
    /// Whether the window still suppresses at `now`.
    #[must_use]
    pub fn is_active(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// Window duration class, chosen by the caller per actuator class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionPolicy {
    /// Continuous positional controls and mode/state toggles whose reporting
    /// lags physical movement.
    Positional,
    /// Security-system arming, where the backend blinks through
    /// intermediate states while arming.
    SecurityCode,
    /// Immediate numeric writes (brightness, hue, …): the echo is expected
    /// to match, so no window is opened.
    Immediate,
}

/// Configured durations for each [`SuppressionPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionDurations {
    pub positional: Duration,
    pub security_code: Duration,
}

impl Default for SuppressionDurations {
    fn default() -> Self {
        Self {
            positional: seconds(60),
            security_code: seconds(10),
        }
    }
}

impl SuppressionDurations {
    /// Duration for `policy`, or `None` when no window should be opened.
    #[must_use]
    pub fn duration_for(&self, policy: SuppressionPolicy) -> Option<Duration> {
        match policy {
            SuppressionPolicy::Positional => Some(self.positional),
            SuppressionPolicy::SecurityCode => Some(self.security_code),
            SuppressionPolicy::Immediate => None,
        }
    }
}

/// Per-characteristic suppression windows.
#[derive(Debug, Default, Clone)]
pub struct SuppressionWindow {
    entries: HashMap<CharacteristicId, SuppressionEntry>,
}

impl SuppressionWindow {
    /// Create an empty set of windows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or overwrite) the window for `id` so that it expires at
    /// `now + duration`. Windows never stack: the latest call wins, even
    /// if it shortens an earlier window.
    pub fn open(&mut self, id: CharacteristicId, duration: Duration, now: Timestamp) {
        self.entries.insert(
            id,
            SuppressionEntry {
                characteristic_id: id,
                expires_at: now + duration,
            },
        );
    }

    /// Whether remote updates for `id` are currently suppressed.
    #[must_use]
    pub fn is_suppressed(&self, id: CharacteristicId, now: Timestamp) -> bool {
        self.entries.get(&id).is_some_and(|e| e.is_active(now))
    }

    /// Decide whether a remote `incoming` value may be applied.
    ///
    /// Outside a window everything is admitted. Inside a window only the
    /// echo of the locally-held value (`current`) is admitted.
    #[must_use]
    pub fn admits(
        &self,
        id: CharacteristicId,
        incoming: &CharacteristicValue,
        current: Option<&CharacteristicValue>,
        now: Timestamp,
    ) -> bool {
        if !self.is_suppressed(id, now) {
            return true;
        }
        current.is_some_and(|held| held.same_as(incoming))
    }

    /// Inspect the window for `id`, expired or not.
    #[must_use]
    pub fn entry(&self, id: CharacteristicId) -> Option<&SuppressionEntry> {
        self.entries.get(&id)
    }
}
