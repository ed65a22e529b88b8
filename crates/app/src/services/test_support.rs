//! Spy ports shared by the service tests.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use homesync_domain::error::HomeSyncError;
use homesync_domain::id::CharacteristicId;
use homesync_domain::suppression::SuppressionDurations;
use homesync_domain::value::CharacteristicValue;

use crate::change_bus::ChangeBus;
use crate::ports::{ManualClock, Transport};
use crate::store::CharacteristicStore;

pub type TestStore = CharacteristicStore<Arc<ChangeBus>, Arc<ManualClock>>;

/// Records every write; fails writes to ids marked unreachable.
#[derive(Default)]
pub struct SpyTransport {
    writes: Mutex<Vec<(CharacteristicId, CharacteristicValue)>>,
    unreachable: Mutex<HashSet<CharacteristicId>>,
}

impl SpyTransport {
    pub fn writes(&self) -> Vec<(CharacteristicId, CharacteristicValue)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_to(&self, id: CharacteristicId) -> Vec<CharacteristicValue> {
        self.writes()
            .into_iter()
            .filter(|(w, _)| *w == id)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn fail(&self, id: CharacteristicId) {
        self.unreachable.lock().unwrap().insert(id);
    }
}

impl Transport for SpyTransport {
    fn write(
        &self,
        id: CharacteristicId,
        value: CharacteristicValue,
    ) -> impl Future<Output = Result<(), HomeSyncError>> + Send {
        self.writes.lock().unwrap().push((id, value));
        let failed = self.unreachable.lock().unwrap().contains(&id);
        async move {
            if failed {
                Err(HomeSyncError::Transport(Box::new(std::io::Error::other(
                    "device unreachable",
                ))))
            } else {
                Ok(())
            }
        }
    }
}

/// Accepts writes but never acknowledges them.
#[derive(Default)]
pub struct StalledTransport {
    started: AtomicUsize,
}

impl StalledTransport {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl Transport for StalledTransport {
    fn write(
        &self,
        _id: CharacteristicId,
        _value: CharacteristicValue,
    ) -> impl Future<Output = Result<(), HomeSyncError>> + Send {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending()
    }
}

/// Let spawned transport writes run to completion.
pub async fn flush() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

pub struct Harness {
    pub bus: Arc<ChangeBus>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<TestStore>,
    pub transport: Arc<SpyTransport>,
}

pub fn harness() -> Harness {
    let bus = Arc::new(ChangeBus::new(64));
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(CharacteristicStore::new(
        Arc::clone(&bus),
        Arc::clone(&clock),
        SuppressionDurations::default(),
    ));
    Harness {
        bus,
        clock,
        store,
        transport: Arc::new(SpyTransport::default()),
    }
}
