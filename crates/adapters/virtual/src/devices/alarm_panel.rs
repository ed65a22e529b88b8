//! Alarm panels: accept a mode name or a `{"mode", "code"}` payload and
//! blink through `arming` before settling.

use homesync_domain::alarm::AlarmMode;
use homesync_domain::id::CharacteristicId;
use homesync_domain::value::CharacteristicValue;

use super::Report;
use crate::SimulationConfig;

#[derive(Debug, Clone)]
pub struct AlarmPanel {
    pub target_id: CharacteristicId,
    pub current_id: CharacteristicId,
    pub mode: AlarmMode,
    /// Code accepted for arming; `None` accepts anything.
    pub code: Option<String>,
}

impl AlarmPanel {
    #[must_use]
    pub fn new(target_id: CharacteristicId, current_id: CharacteristicId, code: Option<String>) -> Self {
        Self {
            target_id,
            current_id,
            mode: AlarmMode::Disarmed,
            code,
        }
    }

    pub(crate) fn respond(&mut self, value: &CharacteristicValue, config: &SimulationConfig) -> Vec<Report> {
        let Some((mode, code)) = parse_payload(value) else {
            return Vec::new();
        };
        let code_ok = self.code.is_none() || code == self.code;
        if mode.is_armed() && !code_ok {
            tracing::debug!(%mode, "simulated panel refused wrong code");
            return vec![Report::after(config.latency, self.current_id, self.mode)];
        }

        self.mode = mode;
        let mut reports = Vec::new();
        if mode.is_armed() {
            reports.push(Report::after(config.latency, self.current_id, "arming"));
        }
        reports.push(Report::after(config.latency, self.current_id, mode));
        reports
    }
}

fn parse_payload(value: &CharacteristicValue) -> Option<(AlarmMode, Option<String>)> {
    let raw = value.as_str()?;
    if !raw.starts_with('{') {
        return AlarmMode::from_value(value).map(|mode| (mode, None));
    }
    let json: serde_json::Value = serde_json::from_str(raw).ok()?;
    let mode = AlarmMode::from_value(&json.get("mode")?.as_str()?.into())?;
    let code = json.get("code").and_then(|c| c.as_str()).map(str::to_string);
    Some((mode, code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_arm_through_arming_state_when_code_matches() {
        let mut panel = AlarmPanel::new(CharacteristicId::new(), CharacteristicId::new(), Some("1234".into()));
        let payload = serde_json::json!({"mode": "armed_away", "code": "1234"}).to_string();

        let reports = panel.respond(&payload.into(), &SimulationConfig::default());

        let values: Vec<_> = reports.iter().map(|r| r.update.value.clone()).collect();
        assert_eq!(values, vec![CharacteristicValue::from("arming"), CharacteristicValue::from("armed_away")]);
        assert_eq!(panel.mode, AlarmMode::ArmedAway);
    }

    #[test]
    fn should_stay_in_current_mode_when_code_is_wrong() {
        let mut panel = AlarmPanel::new(CharacteristicId::new(), CharacteristicId::new(), Some("1234".into()));
        let payload = serde_json::json!({"mode": "armed_home", "code": "0000"}).to_string();

        let reports = panel.respond(&payload.into(), &SimulationConfig::default());

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].update.value, CharacteristicValue::from("disarmed"));
        assert_eq!(panel.mode, AlarmMode::Disarmed);
    }

    #[test]
    fn should_disarm_from_plain_mode_name() {
        let mut panel = AlarmPanel::new(CharacteristicId::new(), CharacteristicId::new(), None);
        panel.mode = AlarmMode::ArmedNight;

        let reports = panel.respond(&"disarmed".into(), &SimulationConfig::default());

        assert_eq!(reports.len(), 1);
        assert_eq!(panel.mode, AlarmMode::Disarmed);
    }
}
