//! Actuator service: drives transitional actuators through the store and
//! the transport.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use homesync_domain::actuator::{ActuatorBindings, ActuatorError, TransitionState, TransitionalActuator};
use homesync_domain::error::{HomeSyncError, NotFoundError};
use homesync_domain::id::{CharacteristicId, DeviceId};
use homesync_domain::suppression::SuppressionPolicy;
use homesync_domain::time::Duration;
use homesync_domain::value::CharacteristicValue;

use crate::ports::{ChangePublisher, Clock, Transport};
use crate::services::dispatch;
use crate::store::CharacteristicStore;

/// A transition state change caused by a remote report.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorUpdate {
    pub device_id: DeviceId,
    pub state: TransitionState,
}

#[derive(Default)]
struct Registry {
    actuators: HashMap<DeviceId, TransitionalActuator>,
    by_characteristic: HashMap<CharacteristicId, DeviceId>,
}

/// Owns every transitional actuator of the home.
pub struct ActuatorService<T, P, C> {
    store: Arc<CharacteristicStore<P, C>>,
    transport: T,
    timeout: Option<Duration>,
    registry: Mutex<Registry>,
}

impl<T, P, C> ActuatorService<T, P, C>
where
    T: Transport + Clone + Send + Sync + 'static,
    P: ChangePublisher,
    C: Clock,
{
    /// `timeout` bounds how long a transition may wait for confirmation;
    /// `None` waits forever.
    pub fn new(store: Arc<CharacteristicStore<P, C>>, transport: T, timeout: Option<Duration>) -> Self {
        Self {
            store,
            transport,
            timeout,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Register an actuator in `Stable(initial)`.
    pub fn register(&self, bindings: ActuatorBindings, initial: CharacteristicValue) -> DeviceId {
        let id = DeviceId::new();
        let actuator = TransitionalActuator::new(bindings, initial);
        let mut registry = self.lock();
        for characteristic in actuator.characteristic_ids() {
            registry.by_characteristic.insert(characteristic, id);
        }
        registry.actuators.insert(id, actuator);
        id
    }

    /// Current transition state of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`HomeSyncError::NotFound`] for an unknown actuator.
    pub fn state(&self, id: DeviceId) -> Result<TransitionState, HomeSyncError> {
        let registry = self.lock();
        let actuator = registry.actuators.get(&id).ok_or_else(|| not_found(id))?;
        Ok(actuator.state().clone())
    }

    /// Whether the control for `id` should accept input.
    ///
    /// # Errors
    ///
    /// Returns [`HomeSyncError::NotFound`] for an unknown actuator.
    pub fn input_enabled(&self, id: DeviceId) -> Result<bool, HomeSyncError> {
        let registry = self.lock();
        let actuator = registry.actuators.get(&id).ok_or_else(|| not_found(id))?;
        Ok(actuator.input_enabled())
    }

    /// Characteristics whose reports the actuators consume.
    pub fn watched_ids(&self) -> Vec<CharacteristicId> {
        self.lock().by_characteristic.keys().copied().collect()
    }

    /// Command `id` toward `target`.
    ///
    /// The actuator enters `Transitioning`, the store is updated
    /// optimistically and a positional window is opened over the state
    /// characteristic, all while the registry is locked. The write is then
    /// dispatched without waiting for the transport; a device that never
    /// confirms is handled by the transition timeout.
    ///
    /// # Errors
    ///
    /// - [`HomeSyncError::NotFound`] for an unknown actuator
    /// - [`HomeSyncError::Actuator`] when input is disabled or `target` is
    ///   invalid for this kind of actuator
    #[tracing::instrument(skip(self, target), fields(%target))]
    pub fn command(&self, id: DeviceId, target: CharacteristicValue) -> Result<TransitionState, HomeSyncError> {
        let (command, state, changes) = {
            let mut registry = self.lock();
            let now = self.store.now();
            let actuator = registry.actuators.get_mut(&id).ok_or_else(|| not_found(id))?;
            if let Some(timeout) = self.timeout {
                if let Err(err) = actuator.poll_timeout(now, timeout) {
                    tracing::warn!(device = %id, error = %err, "transition abandoned");
                }
            }
            let command = actuator.command(&target, now)?;
            let mut changes = Vec::with_capacity(2);
            if command.write_id != command.state_id {
                changes.push(self.store.stage_local(
                    command.write_id,
                    command.write_value.clone(),
                    SuppressionPolicy::Immediate,
                ));
            }
            changes.push(self.store.stage_local(
                command.state_id,
                command.optimistic_state.clone(),
                SuppressionPolicy::Positional,
            ));
            (command, actuator.state().clone(), changes)
        };
        for change in changes {
            self.store.publish(change);
        }
        tracing::info!(device = %id, %state, "actuator command issued");

        dispatch(&self.transport, command.write_id, command.write_value, "actuator");
        Ok(state)
    }

    /// Apply a remote report for a characteristic owned by an actuator.
    ///
    /// A report that confirms the in-flight target or reports a fault
    /// bypasses the suppression window. The window check, the store update
    /// and the state change happen under the registry lock, so a command
    /// cannot slip in between them.
    ///
    /// Returns `None` when no actuator owns `characteristic`, otherwise
    /// whether the report was accepted.
    pub fn ingest(&self, characteristic: CharacteristicId, value: &CharacteristicValue) -> Option<bool> {
        let (change, update) = {
            let mut registry = self.lock();
            let now = self.store.now();
            let device_id = *registry.by_characteristic.get(&characteristic)?;
            let actuator = registry.actuators.get_mut(&device_id)?;
            let bypass = actuator.confirms(characteristic, value);
            let Some(change) = self.store.stage_remote(characteristic, value.clone(), bypass) else {
                return Some(false);
            };
            let update = actuator
                .apply_report(characteristic, value, now)
                .then(|| ActuatorUpdate {
                    device_id,
                    state: actuator.state().clone(),
                });
            (change, update)
        };
        self.store.publish(change);

        if let Some(ActuatorUpdate { device_id, state }) = update {
            if state.is_fault() {
                tracing::warn!(device = %device_id, %state, "actuator reported fault");
            } else {
                tracing::info!(device = %device_id, %state, "actuator state changed");
            }
        }
        Some(true)
    }

    /// Revert every transition pending longer than the timeout and put the
    /// previous value back in the store.
    pub fn poll_timeouts(&self) -> Vec<(DeviceId, ActuatorError)> {
        let Some(timeout) = self.timeout else {
            return Vec::new();
        };
        let mut expired = Vec::new();
        let mut changes = Vec::new();
        {
            let mut registry = self.lock();
            let now = self.store.now();
            for (id, actuator) in &mut registry.actuators {
                if let Err(err) = actuator.poll_timeout(now, timeout) {
                    if let ActuatorError::TransitionTimedOut { previous, .. } = &err {
                        let state_id = actuator.bindings().state_id;
                        changes.push(self.store.stage_local(state_id, previous.clone(), SuppressionPolicy::Immediate));
                    }
                    expired.push((*id, err));
                }
            }
        }
        for change in changes {
            self.store.publish(change);
        }
        for (id, err) in &expired {
            tracing::warn!(device = %id, error = %err, "transition timed out");
        }
        expired
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(id: DeviceId) -> NotFoundError {
    NotFoundError {
        entity: "Actuator",
        id: id.to_string(),
    }
}
