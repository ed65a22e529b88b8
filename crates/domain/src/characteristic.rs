//! Characteristic records and change notifications.

use serde::{Deserialize, Serialize};

use crate::id::CharacteristicId;
use crate::time::Timestamp;
use crate::value::CharacteristicValue;

/// The last-known state of one characteristic.
///
/// `last_known_value` is either a remote-confirmed value or a locally
/// written value not yet contradicted by an accepted remote update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicRecord {
    pub id: CharacteristicId,
    pub last_known_value: CharacteristicValue,
    pub last_local_write_at: Option<Timestamp>,
    pub last_updated: Timestamp,
}

impl CharacteristicRecord {
    /// Create a record from a first remote observation.
    #[must_use]
    pub fn observed(id: CharacteristicId, value: CharacteristicValue, ts: Timestamp) -> Self {
        Self {
            id,
            last_known_value: value,
            last_local_write_at: None,
            last_updated: ts,
        }
    }

    /// Create a record from a first local write.
    #[must_use]
    pub fn written(id: CharacteristicId, value: CharacteristicValue, ts: Timestamp) -> Self {
        Self {
            id,
            last_known_value: value,
            last_local_write_at: Some(ts),
            last_updated: ts,
        }
    }

    /// Record a locally-originated value and stamp the write time.
    pub fn record_local(&mut self, value: CharacteristicValue, ts: Timestamp) {
        self.last_known_value = value;
        self.last_local_write_at = Some(ts);
        self.last_updated = ts;
    }

    /// Record an accepted remote value.
    ///
    /// Returns `true` when the stored value actually changed.
    pub fn record_remote(&mut self, value: CharacteristicValue, ts: Timestamp) -> bool {
        let changed = !self.last_known_value.same_as(&value);
        self.last_known_value = value;
        self.last_updated = ts;
        changed
    }
}

/// A value change fanned out on the change bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicChange {
    pub characteristic_id: CharacteristicId,
    pub value: CharacteristicValue,
    /// `true` when the change originated from a local user action.
    pub is_local_change: bool,
    pub timestamp: Timestamp,
}

impl CharacteristicChange {
    /// A change caused by a local user action.
    #[must_use]
    pub fn local(id: CharacteristicId, value: CharacteristicValue, ts: Timestamp) -> Self {
        Self {
            characteristic_id: id,
            value,
            is_local_change: true,
            timestamp: ts,
        }
    }

    /// A change confirmed by the remote device.
    #[must_use]
    pub fn remote(id: CharacteristicId, value: CharacteristicValue, ts: Timestamp) -> Self {
        Self {
            characteristic_id: id,
            value,
            is_local_change: false,
            timestamp: ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{now, seconds};

    #[test]
    fn should_stamp_local_write_time_when_recording_local_value() {
        let ts = now();
        let mut record =
            CharacteristicRecord::observed(CharacteristicId::new(), 10_i64.into(), ts);
        assert!(record.last_local_write_at.is_none());

        let later = ts + seconds(1);
        record.record_local(80_i64.into(), later);
        assert_eq!(record.last_known_value, CharacteristicValue::Int(80));
        assert_eq!(record.last_local_write_at, Some(later));
    }

    #[test]
    fn should_report_no_change_when_remote_value_matches() {
        let ts = now();
        let mut record = CharacteristicRecord::written(CharacteristicId::new(), 80_i64.into(), ts);
        assert!(!record.record_remote(CharacteristicValue::Float(80.0), ts));
        assert!(record.record_remote(45_i64.into(), ts));
    }

    #[test]
    fn should_keep_local_write_stamp_when_remote_value_arrives() {
        let ts = now();
        let mut record = CharacteristicRecord::written(CharacteristicId::new(), true.into(), ts);
        record.record_remote(false.into(), ts + seconds(5));
        assert_eq!(record.last_local_write_at, Some(ts));
    }

    #[test]
    fn should_tag_origin_of_change() {
        let id = CharacteristicId::new();
        assert!(CharacteristicChange::local(id, true.into(), now()).is_local_change);
        assert!(!CharacteristicChange::remote(id, true.into(), now()).is_local_change);
    }
}
