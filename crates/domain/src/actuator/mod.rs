//! Transitional actuators: state machines for locks, garage doors, valves
//! and coverings that must show an in-progress physical transition before
//! the device confirms completion.
//!
//! A user command moves the actuator to
//! [`Transitioning`](TransitionState::Transitioning) immediately. Only remote
//! reports move it back to [`Stable`](TransitionState::Stable) or into a
//! fault ([`Jammed`](TransitionState::Jammed) /
//! [`Obstructed`](TransitionState::Obstructed)); faults are never inferred
//! locally.
//!
//! A transition that never receives a confirming report is bounded by
//! [`TransitionalActuator::poll_timeout`]: once the timeout elapses the
//! actuator reverts to the last stable value and the caller receives
//! [`ActuatorError::TransitionTimedOut`] to surface to the user.

mod kind;
mod state;

pub use kind::{ActuatorKind, Reading};
pub use state::TransitionState;

use serde::{Deserialize, Serialize};

use crate::id::CharacteristicId;
use crate::time::{Duration, Timestamp};
use crate::value::CharacteristicValue;

/// Errors raised by [`TransitionalActuator`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActuatorError {
    /// Input is disabled while the actuator is mid-cycle or faulted.
    #[error("input is disabled while the actuator is {state}")]
    InputDisabled { state: TransitionState },

    /// No confirming report arrived in time; the actuator reverted.
    #[error("transition toward {target} timed out, reverted to {previous}")]
    TransitionTimedOut {
        target: CharacteristicValue,
        previous: CharacteristicValue,
    },

    /// The requested target is not valid for this kind of actuator.
    #[error("{value} is not a valid target for a {kind}")]
    UnsupportedValue {
        value: CharacteristicValue,
        kind: ActuatorKind,
    },
}

/// What the caller must do after a command was accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorCommand {
    /// Characteristic to write through the transport.
    pub write_id: CharacteristicId,
    /// Value to write.
    pub write_value: CharacteristicValue,
    /// State characteristic to update optimistically and suppress.
    pub state_id: CharacteristicId,
    /// Value to show on the state characteristic while in flight.
    pub optimistic_state: CharacteristicValue,
}

/// Characteristic bindings of one actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorBindings {
    pub kind: ActuatorKind,
    /// Write target (lock target state, target door state, active, target position).
    pub command_id: CharacteristicId,
    /// Observed state (lock current state, current door state, in use, current position).
    pub state_id: CharacteristicId,
    /// Optional obstruction sensor (garage doors).
    pub obstruction_id: Option<CharacteristicId>,
}

/// State machine wrapping one physical actuator.
#[derive(Debug, Clone)]
pub struct TransitionalActuator {
    bindings: ActuatorBindings,
    state: TransitionState,
    last_stable: CharacteristicValue,
    last_reading: Option<Reading>,
    transition_started_at: Option<Timestamp>,
}

impl TransitionalActuator {
    /// Create an actuator in `Stable(initial)`.
    #[must_use]
    pub fn new(bindings: ActuatorBindings, initial: CharacteristicValue) -> Self {
        Self {
            bindings,
            state: TransitionState::Stable(initial.clone()),
            last_stable: initial,
            last_reading: None,
            transition_started_at: None,
        }
    }

    #[must_use]
    pub fn bindings(&self) -> &ActuatorBindings {
        &self.bindings
    }

    #[must_use]
    pub fn kind(&self) -> ActuatorKind {
        self.bindings.kind
    }

    #[must_use]
    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    /// Every characteristic this actuator listens to.
    #[must_use]
    pub fn characteristic_ids(&self) -> Vec<CharacteristicId> {
        let mut ids = vec![self.bindings.state_id];
        ids.extend(self.bindings.obstruction_id);
        ids
    }

    /// Whether the control should currently accept user input.
    #[must_use]
    pub fn input_enabled(&self) -> bool {
        match &self.state {
            TransitionState::Stable(_) => true,
            TransitionState::Transitioning(_) => !self.kind().forbids_concurrent_commands(),
            TransitionState::Jammed | TransitionState::Obstructed => false,
        }
    }

    /// Issue a user command toward `target`.
    ///
    /// # Errors
    ///
    /// - [`ActuatorError::InputDisabled`] when faulted, or mid-cycle for a
    ///   kind that forbids concurrent commands
    /// - [`ActuatorError::UnsupportedValue`] when `target` is not a valid
    ///   target for this kind
    pub fn command(
        &mut self,
        target: &CharacteristicValue,
        now: Timestamp,
    ) -> Result<ActuatorCommand, ActuatorError> {
        if !self.input_enabled() {
            return Err(ActuatorError::InputDisabled {
                state: self.state.clone(),
            });
        }
        let kind = self.kind();
        let target = kind
            .normalize_target(target)
            .ok_or_else(|| ActuatorError::UnsupportedValue {
                value: target.clone(),
                kind,
            })?;

        self.begin_transition(target.clone(), now);

        Ok(ActuatorCommand {
            write_id: self.bindings.command_id,
            write_value: target.clone(),
            state_id: self.bindings.state_id,
            optimistic_state: kind.optimistic_state(&target),
        })
    }

    /// Whether a remote report on `id` must bypass suppression: it
    /// confirms the in-flight target, reports a fault, or clears a jam.
    #[must_use]
    pub fn confirms(&self, id: CharacteristicId, value: &CharacteristicValue) -> bool {
        if Some(id) == self.bindings.obstruction_id {
            return true;
        }
        if id != self.bindings.state_id {
            return false;
        }
        match (self.kind().decode(value), &self.state) {
            (Reading::Jammed, _) | (Reading::Settled(_), TransitionState::Jammed) => true,
            (Reading::Settled(reported), TransitionState::Transitioning(target)) => {
                reported.same_as(target)
            }
            _ => false,
        }
    }

    /// Apply an accepted remote report.
    ///
    /// Returns `true` when the transition state changed.
    pub fn apply_report(
        &mut self,
        id: CharacteristicId,
        value: &CharacteristicValue,
        now: Timestamp,
    ) -> bool {
        let before = self.state.clone();
        if Some(id) == self.bindings.obstruction_id {
            self.apply_obstruction(value.as_bool().unwrap_or(false), now);
        } else if id == self.bindings.state_id {
            let reading = self.kind().decode(value);
            if reading != Reading::Unknown {
                self.last_reading = Some(reading.clone());
            }
            if self.state != TransitionState::Obstructed {
                self.apply_reading(reading, now);
            }
        }
        before != self.state
    }

    /// Revert a transition that has been pending for at least `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::TransitionTimedOut`] when the transition was
    /// abandoned; the actuator is then back in `Stable(previous)`.
    pub fn poll_timeout(&mut self, now: Timestamp, timeout: Duration) -> Result<(), ActuatorError> {
        let TransitionState::Transitioning(target) = &self.state else {
            return Ok(());
        };
        let Some(started) = self.transition_started_at else {
            return Ok(());
        };
        if now < started + timeout {
            return Ok(());
        }
        let err = ActuatorError::TransitionTimedOut {
            target: target.clone(),
            previous: self.last_stable.clone(),
        };
        self.settle(self.last_stable.clone());
        Err(err)
    }

    fn apply_reading(&mut self, reading: Reading, now: Timestamp) {
        match reading {
            Reading::Settled(value) => self.settle(value),
            Reading::Moving(toward) => {
                let already = matches!(&self.state, TransitionState::Transitioning(t) if t.same_as(&toward));
                if !already {
                    self.begin_transition(toward, now);
                }
            }
            Reading::Jammed => {
                self.state = TransitionState::Jammed;
                self.transition_started_at = None;
            }
            Reading::Unknown => {}
        }
    }

    fn apply_obstruction(&mut self, obstructed: bool, now: Timestamp) {
        if obstructed {
            self.state = TransitionState::Obstructed;
            self.transition_started_at = None;
            return;
        }
        if self.state == TransitionState::Obstructed {
            match self.last_reading.clone() {
                Some(reading @ (Reading::Settled(_) | Reading::Moving(_))) => {
                    self.apply_reading(reading, now);
                }
                _ => self.settle(self.last_stable.clone()),
            }
        }
    }

    fn begin_transition(&mut self, target: CharacteristicValue, now: Timestamp) {
        self.state = TransitionState::Transitioning(target);
        self.transition_started_at = Some(now);
    }

    fn settle(&mut self, value: CharacteristicValue) {
        self.last_stable = value.clone();
        self.state = TransitionState::Stable(value);
        self.transition_started_at = None;
    }
}
