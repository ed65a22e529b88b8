//! Switches and valves: echo the written value after one latency.

use homesync_domain::id::CharacteristicId;
use homesync_domain::value::CharacteristicValue;

use super::Report;
use crate::SimulationConfig;

/// Power, active or dimmer level read and written through one characteristic.
#[derive(Debug, Clone)]
pub struct Switch {
    pub id: CharacteristicId,
    pub on: bool,
}

impl Switch {
    #[must_use]
    pub fn new(id: CharacteristicId) -> Self {
        Self { id, on: false }
    }

    pub(crate) fn respond(&mut self, value: &CharacteristicValue, config: &SimulationConfig) -> Vec<Report> {
        let Some(on) = value.as_bool() else {
            return Vec::new();
        };
        self.on = on;
        vec![Report::after(config.latency, self.id, value.clone())]
    }
}

/// Water valve: commanded through `active`, reports through `in_use`.
#[derive(Debug, Clone)]
pub struct Valve {
    pub active_id: CharacteristicId,
    pub in_use_id: CharacteristicId,
    pub in_use: bool,
}

impl Valve {
    #[must_use]
    pub fn new(active_id: CharacteristicId, in_use_id: CharacteristicId) -> Self {
        Self {
            active_id,
            in_use_id,
            in_use: false,
        }
    }

    pub(crate) fn respond(&mut self, value: &CharacteristicValue, config: &SimulationConfig) -> Vec<Report> {
        let Some(active) = value.as_bool() else {
            return Vec::new();
        };
        self.in_use = active;
        vec![
            Report::after(config.latency, self.active_id, i64::from(active)),
            Report::after(config.latency, self.in_use_id, i64::from(active)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_echo_switch_value_after_latency() {
        let mut switch = Switch::new(CharacteristicId::new());
        let config = SimulationConfig::default();

        let reports = switch.respond(&true.into(), &config);

        assert!(switch.on);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].delay, config.latency);
        assert_eq!(reports[0].update.value, CharacteristicValue::Bool(true));
    }

    #[test]
    fn should_report_in_use_after_valve_opens() {
        let mut valve = Valve::new(CharacteristicId::new(), CharacteristicId::new());
        let reports = valve.respond(&1_i64.into(), &SimulationConfig::default());

        assert!(valve.in_use);
        assert_eq!(reports[1].update.characteristic_id, valve.in_use_id);
        assert_eq!(reports[1].update.value, CharacteristicValue::Int(1));
    }

    #[test]
    fn should_ignore_non_boolean_writes() {
        let mut switch = Switch::new(CharacteristicId::new());
        assert!(switch.respond(&"on".into(), &SimulationConfig::default()).is_empty());
    }
}
