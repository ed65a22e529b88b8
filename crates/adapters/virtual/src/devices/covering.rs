//! Window coverings: travel slowly and keep reporting the old position
//! for a while after being commanded.

use std::time::Duration;

use homesync_domain::id::CharacteristicId;
use homesync_domain::value::CharacteristicValue;

use super::Report;
use crate::SimulationConfig;

#[derive(Debug, Clone)]
pub struct Covering {
    pub target_id: CharacteristicId,
    pub current_id: CharacteristicId,
    pub position: i64,
}

impl Covering {
    #[must_use]
    pub fn new(target_id: CharacteristicId, current_id: CharacteristicId, position: i64) -> Self {
        Self {
            target_id,
            current_id,
            position,
        }
    }

    pub(crate) fn respond(&mut self, value: &CharacteristicValue, config: &SimulationConfig) -> Vec<Report> {
        let Some(target) = value.as_i64().filter(|p| (0..=100).contains(p)) else {
            return Vec::new();
        };
        let previous = std::mem::replace(&mut self.position, target);

        let mut reports = Vec::new();
        let mut final_delay = config.latency;
        if config.stale_echo && previous != target {
            reports.push(Report::after(config.latency, self.current_id, previous));
            final_delay = travel_time(previous, target, config.latency);
        }
        reports.push(Report::after(Duration::ZERO, self.target_id, target));
        reports.push(Report::after(final_delay, self.current_id, target));
        reports
    }
}

/// One latency per 10% of travel.
fn travel_time(from: i64, to: i64, latency: Duration) -> Duration {
    let steps = u32::try_from(from.abs_diff(to).div_ceil(10)).unwrap_or(u32::MAX).max(1);
    latency.saturating_mul(steps)
}
