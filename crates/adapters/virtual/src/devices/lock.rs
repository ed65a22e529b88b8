//! Door locks: report the intermediate `locking` / `unlocking` state
//! before settling, using Home Assistant state names.

use homesync_domain::id::CharacteristicId;
use homesync_domain::value::CharacteristicValue;

use super::Report;
use crate::SimulationConfig;

#[derive(Debug, Clone)]
pub struct Lock {
    pub target_id: CharacteristicId,
    pub current_id: CharacteristicId,
    pub secured: bool,
}

impl Lock {
    #[must_use]
    pub fn new(target_id: CharacteristicId, current_id: CharacteristicId, secured: bool) -> Self {
        Self {
            target_id,
            current_id,
            secured,
        }
    }

    pub(crate) fn respond(&mut self, value: &CharacteristicValue, config: &SimulationConfig) -> Vec<Report> {
        let Some(secure) = value.as_i64().filter(|v| *v == 0 || *v == 1).map(|v| v == 1) else {
            return Vec::new();
        };
        self.secured = secure;
        let (moving, settled) = if secure {
            ("locking", "locked")
        } else {
            ("unlocking", "unlocked")
        };
        vec![
            Report::after(config.latency, self.target_id, i64::from(secure)),
            Report::after(config.latency, self.current_id, moving),
            Report::after(config.latency, self.current_id, settled),
        ]
    }
}
