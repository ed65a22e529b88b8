//! Simulated devices and the remote reports they produce when written.

mod alarm_panel;
mod covering;
mod garage_door;
mod lock;
mod switch;

use std::time::Duration;

use homesync_app::services::RemoteUpdate;
use homesync_domain::id::CharacteristicId;
use homesync_domain::value::CharacteristicValue;

pub use alarm_panel::AlarmPanel;
pub use covering::Covering;
pub use garage_door::GarageDoor;
pub use lock::Lock;
pub use switch::{Switch, Valve};

use crate::SimulationConfig;

/// A remote report to emit `delay` after the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub delay: Duration,
    pub update: RemoteUpdate,
}

impl Report {
    pub(crate) fn after(
        delay: Duration,
        id: CharacteristicId,
        value: impl Into<CharacteristicValue>,
    ) -> Self {
        Self {
            delay,
            update: RemoteUpdate::new(id, value),
        }
    }
}

/// Any device the simulated home can hold.
#[derive(Debug, Clone)]
pub enum SimulatedDevice {
    Switch(Switch),
    Valve(Valve),
    Covering(Covering),
    Lock(Lock),
    GarageDoor(GarageDoor),
    AlarmPanel(AlarmPanel),
}

impl SimulatedDevice {
    /// Whether writes to `id` are handled by this device.
    #[must_use]
    pub fn accepts(&self, id: CharacteristicId) -> bool {
        match self {
            Self::Switch(d) => d.id == id,
            Self::Valve(d) => d.active_id == id,
            Self::Covering(d) => d.target_id == id,
            Self::Lock(d) => d.target_id == id,
            Self::GarageDoor(d) => d.target_id == id,
            Self::AlarmPanel(d) => d.target_id == id,
        }
    }

    /// Apply a write and return the reports the device sends back.
    pub fn respond(&mut self, value: &CharacteristicValue, config: &SimulationConfig) -> Vec<Report> {
        match self {
            Self::Switch(d) => d.respond(value, config),
            Self::Valve(d) => d.respond(value, config),
            Self::Covering(d) => d.respond(value, config),
            Self::Lock(d) => d.respond(value, config),
            Self::GarageDoor(d) => d.respond(value, config),
            Self::AlarmPanel(d) => d.respond(value, config),
        }
    }
}

impl From<Switch> for SimulatedDevice {
    fn from(d: Switch) -> Self {
        Self::Switch(d)
    }
}

impl From<Valve> for SimulatedDevice {
    fn from(d: Valve) -> Self {
        Self::Valve(d)
    }
}

impl From<Covering> for SimulatedDevice {
    fn from(d: Covering) -> Self {
        Self::Covering(d)
    }
}

impl From<Lock> for SimulatedDevice {
    fn from(d: Lock) -> Self {
        Self::Lock(d)
    }
}

impl From<GarageDoor> for SimulatedDevice {
    fn from(d: GarageDoor) -> Self {
        Self::GarageDoor(d)
    }
}

impl From<AlarmPanel> for SimulatedDevice {
    fn from(d: AlarmPanel) -> Self {
        Self::AlarmPanel(d)
    }
}
