//! Service graph: one store, one change bus and one transport shared by
//! every service.

use std::sync::Arc;

use tokio::sync::mpsc;

use homesync_adapter_virtual::VirtualHome;
use homesync_app::change_bus::ChangeBus;
use homesync_app::ports::SystemClock;
use homesync_app::services::{
    ActuatorService, DerivedStateWatcher, GroupService, Reconciler, RemoteUpdate, SceneService,
    SecurityService,
};
use homesync_app::store::CharacteristicStore;

use crate::config::Config;

pub type Bus = Arc<ChangeBus>;
pub type Remote = Arc<VirtualHome>;
pub type Store = CharacteristicStore<Bus, SystemClock>;

#[derive(Clone)]
pub struct Services {
    pub bus: Bus,
    pub store: Arc<Store>,
    pub home: Remote,
    pub actuators: Arc<ActuatorService<Remote, Bus, SystemClock>>,
    pub groups: Arc<GroupService<Remote, Bus, SystemClock>>,
    pub scenes: Arc<SceneService<Remote, Bus, SystemClock>>,
    pub security: Arc<SecurityService<Remote, Bus, SystemClock>>,
    pub reconciler: Arc<Reconciler<Remote, Bus, SystemClock>>,
    pub watcher: Arc<DerivedStateWatcher<Remote, Bus, SystemClock>>,
}

impl Services {
    /// Build the service graph. The returned receiver is the remote update
    /// feed the simulated home reports on.
    pub fn build(config: &Config) -> (Self, mpsc::Receiver<RemoteUpdate>) {
        let (feed_tx, feed_rx) = mpsc::channel(config.bus.capacity);

        let bus = Arc::new(ChangeBus::new(config.bus.capacity));
        let store = Arc::new(CharacteristicStore::new(
            Arc::clone(&bus),
            SystemClock,
            config.suppression_durations(),
        ));
        let home = Arc::new(VirtualHome::new(config.simulation(), feed_tx));

        let actuators = Arc::new(ActuatorService::new(
            Arc::clone(&store),
            Arc::clone(&home),
            config.transition_timeout(),
        ));
        let groups = Arc::new(GroupService::new(Arc::clone(&store), Arc::clone(&home)));
        let scenes = Arc::new(SceneService::new(Arc::clone(&store), Arc::clone(&home)));
        let security = Arc::new(SecurityService::new(Arc::clone(&store), Arc::clone(&home)));
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&store),
            Arc::clone(&actuators),
            Arc::clone(&security),
        ));
        let watcher = Arc::new(DerivedStateWatcher::new(Arc::clone(&groups), Arc::clone(&scenes)));

        let services = Self {
            bus,
            store,
            home,
            actuators,
            groups,
            scenes,
            security,
            reconciler,
            watcher,
        };
        (services, feed_rx)
    }
}
