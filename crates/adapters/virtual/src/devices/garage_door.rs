//! Garage door openers: report opening/closing codes while travelling,
//! or stop on an obstruction.

use homesync_domain::id::CharacteristicId;
use homesync_domain::value::CharacteristicValue;

use super::Report;
use crate::SimulationConfig;

const OPEN: i64 = 0;
const CLOSED: i64 = 1;
const OPENING: i64 = 2;
const CLOSING: i64 = 3;
const STOPPED: i64 = 4;

const TRAVEL_STEPS: u32 = 4;

#[derive(Debug, Clone)]
pub struct GarageDoor {
    pub target_id: CharacteristicId,
    pub current_id: CharacteristicId,
    pub obstruction_id: CharacteristicId,
    pub closed: bool,
    /// Block the next movement halfway.
    pub obstruct_next: bool,
}

impl GarageDoor {
    #[must_use]
    pub fn new(
        target_id: CharacteristicId,
        current_id: CharacteristicId,
        obstruction_id: CharacteristicId,
        closed: bool,
    ) -> Self {
        Self {
            target_id,
            current_id,
            obstruction_id,
            closed,
            obstruct_next: false,
        }
    }

    pub(crate) fn respond(&mut self, value: &CharacteristicValue, config: &SimulationConfig) -> Vec<Report> {
        let Some(target) = value.as_i64().filter(|v| *v == OPEN || *v == CLOSED) else {
            return Vec::new();
        };
        let moving = if target == CLOSED { CLOSING } else { OPENING };
        let mut reports = vec![
            Report::after(config.latency, self.target_id, target),
            Report::after(config.latency, self.current_id, moving),
        ];

        if std::mem::take(&mut self.obstruct_next) {
            reports.push(Report::after(config.latency, self.obstruction_id, true));
            reports.push(Report::after(config.latency, self.current_id, STOPPED));
            return reports;
        }

        self.closed = target == CLOSED;
        reports.push(Report::after(
            config.latency.saturating_mul(TRAVEL_STEPS),
            self.current_id,
            target,
        ));
        reports
    }
}
