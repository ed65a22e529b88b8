//! Security system arming: the one flow where a command failure is
//! surfaced back to the user instead of being silently reconciled.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::CharacteristicId;
use crate::value::CharacteristicValue;

/// Alarm panel mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmMode {
    Disarmed,
    ArmedHome,
    ArmedAway,
    ArmedNight,
    ArmedVacation,
    ArmedCustomBypass,
    Triggered,
}

impl AlarmMode {
    /// Mode name as carried in a [`CharacteristicValue::String`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::ArmedHome => "armed_home",
            Self::ArmedAway => "armed_away",
            Self::ArmedNight => "armed_night",
            Self::ArmedVacation => "armed_vacation",
            Self::ArmedCustomBypass => "armed_custom_bypass",
            Self::Triggered => "triggered",
        }
    }

    #[must_use]
    pub fn is_armed(self) -> bool {
        !matches!(self, Self::Disarmed | Self::Triggered)
    }

    /// Decode a reported value (mode name or `HomeKit` code).
    ///
    /// The intermediate `arming` and `pending` states read as disarmed.
    #[must_use]
    pub fn from_value(value: &CharacteristicValue) -> Option<Self> {
        if let Some(name) = value.as_str() {
            return match name {
                "disarmed" | "arming" | "pending" => Some(Self::Disarmed),
                "armed_home" => Some(Self::ArmedHome),
                "armed_away" => Some(Self::ArmedAway),
                "armed_night" => Some(Self::ArmedNight),
                "armed_vacation" => Some(Self::ArmedVacation),
                "armed_custom_bypass" => Some(Self::ArmedCustomBypass),
                "triggered" => Some(Self::Triggered),
                _ => None,
            };
        }
        match value.as_i64()? {
            0 => Some(Self::ArmedHome),
            1 => Some(Self::ArmedAway),
            2 => Some(Self::ArmedNight),
            3 => Some(Self::Disarmed),
            4 => Some(Self::Triggered),
            _ => None,
        }
    }
}

impl fmt::Display for AlarmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AlarmMode> for CharacteristicValue {
    fn from(mode: AlarmMode) -> Self {
        Self::String(mode.as_str().to_string())
    }
}

/// Errors raised by [`SecuritySystem`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlarmError {
    #[error("a code is required to switch to {mode}")]
    CodeRequired { mode: AlarmMode },

    #[error("no alarm command is awaiting confirmation")]
    NoPendingCommand,

    /// The backend refused the command; the panel reverted to disarmed and
    /// the user should be prompted for `mode` again.
    #[error("switching to {mode} was rejected")]
    Rejected { mode: AlarmMode },
}

/// Write produced by an accepted arming command.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmCommand {
    pub write_id: CharacteristicId,
    /// Mode name, or a `{"mode", "code"}` JSON object when a code was given.
    pub payload: CharacteristicValue,
    /// Characteristic to update optimistically and suppress.
    pub state_id: CharacteristicId,
    pub optimistic_state: CharacteristicValue,
}

/// One alarm control panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySystem {
    pub target_id: CharacteristicId,
    pub current_id: CharacteristicId,
    pub requires_code: bool,
    mode: AlarmMode,
    #[serde(skip)]
    pending: Option<AlarmMode>,
}

impl SecuritySystem {
    #[must_use]
    pub fn new(target_id: CharacteristicId, current_id: CharacteristicId, requires_code: bool) -> Self {
        Self {
            target_id,
            current_id,
            requires_code,
            mode: AlarmMode::Disarmed,
            pending: None,
        }
    }

    #[must_use]
    pub fn mode(&self) -> AlarmMode {
        self.mode
    }

    /// Mode of the last command that has not been confirmed yet.
    ///
    /// After [`Self::command_failed`] this is the mode the user should be
    /// prompted for again.
    #[must_use]
    pub fn pending(&self) -> Option<AlarmMode> {
        self.pending
    }

    /// Switch to `mode`, optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`AlarmError::CodeRequired`] when arming a panel that requires
    /// a code without one. Disarming never requires a code.
    pub fn command(&mut self, mode: AlarmMode, code: Option<&str>) -> Result<AlarmCommand, AlarmError> {
        let code = code.filter(|c| !c.is_empty());
        if mode != AlarmMode::Disarmed && self.requires_code && code.is_none() {
            return Err(AlarmError::CodeRequired { mode });
        }

        let payload = match code {
            Some(code) => serde_json::json!({ "mode": mode.as_str(), "code": code })
                .to_string()
                .into(),
            None => mode.into(),
        };

        self.mode = mode;
        self.pending = Some(mode);

        Ok(AlarmCommand {
            write_id: self.target_id,
            payload,
            state_id: self.current_id,
            optimistic_state: mode.into(),
        })
    }

    /// The backend rejected the last command: revert to disarmed and
    /// return the attempted mode so the user can be re-prompted.
    ///
    /// # Errors
    ///
    /// Returns [`AlarmError::NoPendingCommand`] when nothing is in flight.
    pub fn command_failed(&mut self) -> Result<AlarmMode, AlarmError> {
        let attempted = self.pending.ok_or(AlarmError::NoPendingCommand)?;
        self.mode = AlarmMode::Disarmed;
        Ok(attempted)
    }

    /// Abandon the re-prompt for a failed command.
    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    /// Apply an accepted report from the current-state characteristic.
    ///
    /// Returns `true` when the mode changed.
    pub fn apply_report(&mut self, value: &CharacteristicValue) -> bool {
        let Some(reported) = AlarmMode::from_value(value) else {
            return false;
        };
        if self.pending == Some(reported) {
            self.pending = None;
        }
        let changed = self.mode != reported;
        self.mode = reported;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(requires_code: bool) -> SecuritySystem {
        SecuritySystem::new(CharacteristicId::new(), CharacteristicId::new(), requires_code)
    }

    #[test]
    fn should_decode_intermediate_states_as_disarmed() {
        assert_eq!(AlarmMode::from_value(&"arming".into()), Some(AlarmMode::Disarmed));
        assert_eq!(AlarmMode::from_value(&"pending".into()), Some(AlarmMode::Disarmed));
        assert_eq!(AlarmMode::from_value(&2_i64.into()), Some(AlarmMode::ArmedNight));
        assert_eq!(AlarmMode::from_value(&"bogus".into()), None);
    }

    #[test]
    fn should_require_code_when_arming_protected_panel() {
        let mut panel = panel(true);
        let result = panel.command(AlarmMode::ArmedAway, None);
        assert_eq!(result, Err(AlarmError::CodeRequired { mode: AlarmMode::ArmedAway }));
        assert_eq!(panel.mode(), AlarmMode::Disarmed);
    }

    #[test]
    fn should_treat_empty_code_as_missing() {
        let mut panel = panel(true);
        assert!(panel.command(AlarmMode::ArmedHome, Some("")).is_err());
    }

    #[test]
    fn should_disarm_without_code() {
        let mut panel = panel(true);
        let cmd = panel.command(AlarmMode::Disarmed, None).unwrap();
        assert_eq!(cmd.payload, CharacteristicValue::String("disarmed".into()));
    }

    #[test]
    fn should_send_mode_and_code_as_json_payload() {
        let mut panel = panel(true);
        let cmd = panel.command(AlarmMode::ArmedNight, Some("1234")).unwrap();

        let CharacteristicValue::String(raw) = &cmd.payload else {
            panic!("expected string payload");
        };
        let json: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert_eq!(json["mode"], "armed_night");
        assert_eq!(json["code"], "1234");
        assert_eq!(cmd.optimistic_state, CharacteristicValue::String("armed_night".into()));
        assert_eq!(panel.mode(), AlarmMode::ArmedNight);
    }

    #[test]
    fn should_revert_to_disarmed_and_keep_attempt_when_command_fails() {
        let mut panel = panel(false);
        panel.command(AlarmMode::ArmedAway, None).unwrap();

        let attempted = panel.command_failed().unwrap();

        assert_eq!(attempted, AlarmMode::ArmedAway);
        assert_eq!(panel.mode(), AlarmMode::Disarmed);
        assert_eq!(panel.pending(), Some(AlarmMode::ArmedAway));
    }

    #[test]
    fn should_reject_failure_when_nothing_pending() {
        let mut panel = panel(false);
        assert_eq!(panel.command_failed(), Err(AlarmError::NoPendingCommand));
    }

    #[test]
    fn should_clear_pending_when_backend_confirms_mode() {
        let mut panel = panel(false);
        panel.command(AlarmMode::ArmedHome, None).unwrap();
        let changed = panel.apply_report(&0_i64.into());
        assert!(!changed);
        assert_eq!(panel.pending(), None);
    }
}
