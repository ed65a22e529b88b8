//! # homesync-adapter-virtual
//!
//! A simulated home that stands in for the real device transport.
//!
//! Writes are answered asynchronously on the remote update feed, the way
//! real accessories answer: after a latency, sometimes echoing the old
//! value first, sometimes passing through an intermediate state.
//!
//! | Device | Written characteristic | Reports |
//! |--------|------------------------|---------|
//! | [`Switch`] | power | power echo |
//! | [`Valve`] | active | active, in use |
//! | [`Covering`] | target position | stale current position, target, final position |
//! | [`Lock`] | lock target | `unlocking` / `locking`, then `unlocked` / `locked` |
//! | [`GarageDoor`] | door target | opening / closing code, final code or obstruction |
//! | [`AlarmPanel`] | alarm target | `arming`, then the mode |
//!
//! ## Dependency rule
//!
//! Depends on `homesync-app` (port traits) and `homesync-domain` only.

mod devices;
pub mod error;

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use homesync_app::ports::Transport;
use homesync_app::services::RemoteUpdate;
use homesync_domain::error::HomeSyncError;
use homesync_domain::id::CharacteristicId;
use homesync_domain::value::CharacteristicValue;

pub use devices::{AlarmPanel, Covering, GarageDoor, Lock, Report, SimulatedDevice, Switch, Valve};
pub use error::VirtualError;

/// Timing behaviour of the simulated devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Delay between a write and each report it triggers.
    pub latency: Duration,
    /// Coverings echo their old position before moving.
    pub stale_echo: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(500),
            stale_echo: true,
        }
    }
}

/// Simulated home implementing [`Transport`].
pub struct VirtualHome {
    config: SimulationConfig,
    feed: mpsc::Sender<RemoteUpdate>,
    devices: Mutex<Vec<SimulatedDevice>>,
    unreachable: Mutex<HashSet<CharacteristicId>>,
    writes: Mutex<Vec<(CharacteristicId, CharacteristicValue)>>,
}

impl VirtualHome {
    /// Create an empty home whose reports go to `feed`.
    #[must_use]
    pub fn new(config: SimulationConfig, feed: mpsc::Sender<RemoteUpdate>) -> Self {
        Self {
            config,
            feed,
            devices: Mutex::new(Vec::new()),
            unreachable: Mutex::new(HashSet::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, device: impl Into<SimulatedDevice>) {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(device.into());
    }

    /// Every write received so far, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(CharacteristicId, CharacteristicValue)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make writes to `id` fail until [`Self::set_reachable`] is called.
    pub fn set_unreachable(&self, id: CharacteristicId) {
        self.unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
    }

    pub fn set_reachable(&self, id: CharacteristicId) {
        self.unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Push an unsolicited report, such as a jam or a manual change.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::FeedClosed`] when nobody reads the feed.
    pub async fn inject(&self, update: RemoteUpdate) -> Result<(), VirtualError> {
        self.feed
            .send(update)
            .await
            .map_err(|_| VirtualError::FeedClosed)
    }

    fn reports_for(
        &self,
        id: CharacteristicId,
        value: &CharacteristicValue,
    ) -> Result<Vec<Report>, VirtualError> {
        let mut devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        let device = devices
            .iter_mut()
            .find(|d| d.accepts(id))
            .ok_or(VirtualError::UnknownCharacteristic(id))?;
        Ok(device.respond(value, &self.config))
    }
}

impl Transport for VirtualHome {
    async fn write(&self, id: CharacteristicId, value: CharacteristicValue) -> Result<(), HomeSyncError> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, value.clone()));

        if self
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
        {
            return Err(VirtualError::Unreachable(id).into());
        }

        let reports = self.reports_for(id, &value)?;
        tracing::debug!(%id, %value, reports = reports.len(), "simulated write");

        let feed = self.feed.clone();
        tokio::spawn(async move {
            for report in reports {
                tokio::time::sleep(report.delay).await;
                if feed.send(report.update).await.is_err() {
                    tracing::debug!("remote update feed closed, dropping simulated reports");
                    break;
                }
            }
        });
        Ok(())
    }
}
