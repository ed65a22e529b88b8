//! Security service: alarm arming with codes.
//!
//! Unlike every other controller, a rejected command is surfaced back to
//! the caller: the panel reverts to disarmed and the attempted mode stays
//! pending so the user can be prompted again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use homesync_domain::alarm::{AlarmError, AlarmMode, SecuritySystem};
use homesync_domain::error::{HomeSyncError, NotFoundError};
use homesync_domain::id::{CharacteristicId, DeviceId};
use homesync_domain::suppression::SuppressionPolicy;
use homesync_domain::value::CharacteristicValue;

use crate::ports::{ChangePublisher, Clock, Transport};
use crate::store::CharacteristicStore;

pub struct SecurityService<T, P, C> {
    store: Arc<CharacteristicStore<P, C>>,
    transport: T,
    panels: Mutex<HashMap<DeviceId, SecuritySystem>>,
}

impl<T, P, C> SecurityService<T, P, C>
where
    T: Transport,
    P: ChangePublisher,
    C: Clock,
{
    pub fn new(store: Arc<CharacteristicStore<P, C>>, transport: T) -> Self {
        Self {
            store,
            transport,
            panels: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, panel: SecuritySystem) -> DeviceId {
        let id = DeviceId::new();
        self.lock().insert(id, panel);
        id
    }

    /// # Errors
    ///
    /// Returns [`HomeSyncError::NotFound`] for an unknown panel.
    pub fn mode(&self, id: DeviceId) -> Result<AlarmMode, HomeSyncError> {
        self.with_panel(id, |panel| panel.mode())
    }

    /// Mode the user should be re-prompted for after a rejection.
    ///
    /// # Errors
    ///
    /// Returns [`HomeSyncError::NotFound`] for an unknown panel.
    pub fn pending(&self, id: DeviceId) -> Result<Option<AlarmMode>, HomeSyncError> {
        self.with_panel(id, |panel| panel.pending())
    }

    /// Switch panel `id` to `mode`.
    ///
    /// # Errors
    ///
    /// - [`HomeSyncError::NotFound`] for an unknown panel
    /// - [`AlarmError::CodeRequired`] when arming without a required code
    /// - [`AlarmError::Rejected`] when the transport refused the command;
    ///   the panel is back to disarmed
    #[tracing::instrument(skip(self, code))]
    pub async fn command(&self, id: DeviceId, mode: AlarmMode, code: Option<&str>) -> Result<(), HomeSyncError> {
        let (command, change) = {
            let mut panels = self.lock();
            let panel = panels.get_mut(&id).ok_or_else(|| not_found(id))?;
            let command = panel.command(mode, code)?;
            let change = self.store.stage_local(
                command.state_id,
                command.optimistic_state.clone(),
                SuppressionPolicy::SecurityCode,
            );
            (command, change)
        };
        self.store.publish(change);
        tracing::info!(panel = %id, %mode, "alarm command issued");

        if let Err(err) = self.transport.write(command.write_id, command.payload).await {
            tracing::warn!(panel = %id, %mode, error = %err, "alarm command rejected");
            self.command_failed(id)?;
            return Err(AlarmError::Rejected { mode }.into());
        }
        Ok(())
    }

    /// Record that the backend rejected the last command.
    ///
    /// Returns the attempted mode for the re-prompt.
    ///
    /// # Errors
    ///
    /// - [`HomeSyncError::NotFound`] for an unknown panel
    /// - [`AlarmError::NoPendingCommand`] when nothing was in flight
    pub fn command_failed(&self, id: DeviceId) -> Result<AlarmMode, HomeSyncError> {
        let (attempted, change) = {
            let mut panels = self.lock();
            let panel = panels.get_mut(&id).ok_or_else(|| not_found(id))?;
            let attempted = panel.command_failed()?;
            let change = self.store.stage_local(
                panel.current_id,
                AlarmMode::Disarmed.into(),
                SuppressionPolicy::Immediate,
            );
            (attempted, change)
        };
        self.store.publish(change);
        Ok(attempted)
    }

    /// The user declined to retry a rejected command.
    ///
    /// # Errors
    ///
    /// Returns [`HomeSyncError::NotFound`] for an unknown panel.
    pub fn dismiss_prompt(&self, id: DeviceId) -> Result<(), HomeSyncError> {
        let mut panels = self.lock();
        let panel = panels.get_mut(&id).ok_or_else(|| not_found(id))?;
        panel.cancel_pending();
        Ok(())
    }

    /// Apply a remote report for a panel's current-state characteristic.
    ///
    /// The window check, the store update and the mode change happen under
    /// the panel lock. Returns `None` when no panel owns `characteristic`,
    /// otherwise whether the report was accepted.
    pub fn ingest(&self, characteristic: CharacteristicId, value: &CharacteristicValue) -> Option<bool> {
        let (change, changed) = {
            let mut panels = self.lock();
            let (id, panel) = panels
                .iter_mut()
                .find(|(_, panel)| panel.current_id == characteristic)?;
            let Some(change) = self.store.stage_remote(characteristic, value.clone(), false) else {
                return Some(false);
            };
            let changed = panel.apply_report(value).then(|| (*id, panel.mode()));
            (change, changed)
        };
        self.store.publish(change);

        match changed {
            Some((id, AlarmMode::Triggered)) => tracing::warn!(panel = %id, "alarm triggered"),
            Some((id, mode)) => tracing::info!(panel = %id, %mode, "alarm mode changed"),
            None => {}
        }
        Some(true)
    }

    fn with_panel<R>(&self, id: DeviceId, f: impl FnOnce(&SecuritySystem) -> R) -> Result<R, HomeSyncError> {
        self.lock().get(&id).map(f).ok_or_else(|| not_found(id))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DeviceId, SecuritySystem>> {
        self.panels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(id: DeviceId) -> HomeSyncError {
    NotFoundError {
        entity: "Security system",
        id: id.to_string(),
    }
    .into()
}
