//! Reconciler: applies the remote update feed to the store.
//!
//! Remote updates arrive in arbitrary order, possibly duplicated. Each one
//! is filtered by the suppression window unless it confirms an in-flight
//! actuator target or reports a fault. Reports for characteristics owned
//! by an actuator or a security panel go through that owner, which
//! filters, stores and applies them under its own lock.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use homesync_domain::id::CharacteristicId;
use homesync_domain::value::CharacteristicValue;

use crate::ports::{ChangePublisher, Clock, Transport};
use crate::services::{ActuatorService, SecurityService};
use crate::store::CharacteristicStore;

/// One item of the remote update feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUpdate {
    pub characteristic_id: CharacteristicId,
    pub value: CharacteristicValue,
    /// Echo of a change made through this process.
    #[serde(default)]
    pub is_local_change: bool,
}

impl RemoteUpdate {
    #[must_use]
    pub fn new(characteristic_id: CharacteristicId, value: impl Into<CharacteristicValue>) -> Self {
        Self {
            characteristic_id,
            value: value.into(),
            is_local_change: false,
        }
    }
}

pub struct Reconciler<T, P, C> {
    store: Arc<CharacteristicStore<P, C>>,
    actuators: Arc<ActuatorService<T, P, C>>,
    security: Arc<SecurityService<T, P, C>>,
}

impl<T, P, C> Reconciler<T, P, C>
where
    T: Transport + Clone + Send + Sync + 'static,
    P: ChangePublisher,
    C: Clock,
{
    pub fn new(
        store: Arc<CharacteristicStore<P, C>>,
        actuators: Arc<ActuatorService<T, P, C>>,
        security: Arc<SecurityService<T, P, C>>,
    ) -> Self {
        Self {
            store,
            actuators,
            security,
        }
    }

    /// Apply one update. Returns whether it was accepted.
    pub fn handle(&self, update: RemoteUpdate) -> bool {
        let RemoteUpdate {
            characteristic_id: id,
            value,
            is_local_change,
        } = update;

        if is_local_change {
            self.store.set_local(id, value);
            return true;
        }

        self.actuators
            .ingest(id, &value)
            .or_else(|| self.security.ingest(id, &value))
            .unwrap_or_else(|| self.store.apply_remote(id, value))
    }

    /// Consume the feed until every sender is dropped.
    pub async fn run(&self, mut feed: mpsc::Receiver<RemoteUpdate>) {
        let mut received = 0_u64;
        let mut rejected = 0_u64;
        while let Some(update) = feed.recv().await {
            received += 1;
            if !self.handle(update) {
                rejected += 1;
            }
        }
        tracing::info!(received, rejected, "remote feed closed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;
    use homesync_domain::actuator::{ActuatorBindings, ActuatorKind, TransitionState};
    use homesync_domain::alarm::{AlarmMode, SecuritySystem};
    use homesync_domain::characteristic::CharacteristicChange;
    use homesync_domain::suppression::SuppressionDurations;
    use homesync_domain::time::seconds;

    use crate::change_bus::ChangeBus;
    use crate::ports::ManualClock;
    use crate::services::test_support::{Harness, SpyTransport, harness};

    type Bus = Arc<ChangeBus>;
    type Clk = Arc<ManualClock>;
    type Spy = Arc<SpyTransport>;

    struct Fixture {
        h: Harness,
        actuators: Arc<ActuatorService<Spy, Bus, Clk>>,
        security: Arc<SecurityService<Spy, Bus, Clk>>,
        reconciler: Reconciler<Spy, Bus, Clk>,
    }

    fn fixture() -> Fixture {
        let h = harness();
        let actuators = Arc::new(ActuatorService::new(
            Arc::clone(&h.store),
            Arc::clone(&h.transport),
            Some(seconds(120)),
        ));
        let security = Arc::new(SecurityService::new(Arc::clone(&h.store), Arc::clone(&h.transport)));
        let reconciler = Reconciler::new(Arc::clone(&h.store), Arc::clone(&actuators), Arc::clone(&security));
        Fixture {
            h,
            actuators,
            security,
            reconciler,
        }
    }

    fn lock_bindings() -> ActuatorBindings {
        ActuatorBindings {
            kind: ActuatorKind::Lock,
            command_id: CharacteristicId::new(),
            state_id: CharacteristicId::new(),
            obstruction_id: None,
        }
    }

    #[tokio::test]
    async fn should_reject_stale_report_and_accept_after_window() {
        let f = fixture();
        let id = CharacteristicId::new();
        f.h.store
            .set_local_suppressed(id, 80_i64.into(), homesync_domain::suppression::SuppressionPolicy::Positional);

        f.h.clock.advance(seconds(2));
        assert!(!f.reconciler.handle(RemoteUpdate::new(id, 45_i64)));
        assert_eq!(f.h.store.get(id), Some(80_i64.into()));

        f.h.clock.advance(seconds(59));
        assert!(f.reconciler.handle(RemoteUpdate::new(id, 80_i64)));
        assert_eq!(f.h.store.get(id), Some(80_i64.into()));
    }

    /// Hands a queued report to the reconciler as soon as a local change is
    /// published, the way the feed task can on another worker thread.
    #[derive(Default)]
    struct ReportOnLocalChange {
        reconciler: OnceLock<Arc<Reconciler<Spy, Arc<ReportOnLocalChange>, Clk>>>,
        queued: Mutex<Option<RemoteUpdate>>,
        outcomes: Mutex<Vec<bool>>,
    }

    impl ChangePublisher for ReportOnLocalChange {
        fn publish(&self, change: CharacteristicChange) {
            if !change.is_local_change {
                return;
            }
            let queued = self.queued.lock().unwrap().take();
            if let (Some(update), Some(reconciler)) = (queued, self.reconciler.get()) {
                let accepted = reconciler.handle(update);
                self.outcomes.lock().unwrap().push(accepted);
            }
        }
    }

    #[tokio::test]
    async fn should_reject_stale_report_racing_with_command() {
        let clock = Arc::new(ManualClock::default());
        let hook = Arc::new(ReportOnLocalChange::default());
        let store = Arc::new(CharacteristicStore::new(
            Arc::clone(&hook),
            Arc::clone(&clock),
            SuppressionDurations::default(),
        ));
        let transport = Arc::new(SpyTransport::default());
        let actuators = Arc::new(ActuatorService::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            Some(seconds(120)),
        ));
        let security = Arc::new(SecurityService::new(Arc::clone(&store), Arc::clone(&transport)));
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&store), Arc::clone(&actuators), security));
        assert!(hook.reconciler.set(Arc::clone(&reconciler)).is_ok());

        let b = ActuatorBindings {
            kind: ActuatorKind::WindowCovering,
            command_id: CharacteristicId::new(),
            state_id: CharacteristicId::new(),
            obstruction_id: None,
        };
        store.apply_remote(b.state_id, 45_i64.into());
        let blind = actuators.register(b, 45_i64.into());
        *hook.queued.lock().unwrap() = Some(RemoteUpdate::new(b.state_id, 45_i64));

        actuators.command(blind, 80_i64.into()).unwrap();

        assert_eq!(*hook.outcomes.lock().unwrap(), vec![false]);
        assert_eq!(store.get(b.state_id), Some(80_i64.into()));
        assert_eq!(
            actuators.state(blind).unwrap(),
            TransitionState::Transitioning(80_i64.into())
        );

        clock.advance(seconds(5));
        assert!(reconciler.handle(RemoteUpdate::new(b.state_id, 80_i64)));
        assert_eq!(store.get(b.state_id), Some(80_i64.into()));
        assert_eq!(actuators.state(blind).unwrap(), TransitionState::Stable(80_i64.into()));
    }

    #[tokio::test]
    async fn should_let_confirmation_through_open_window() {
        let f = fixture();
        let b = lock_bindings();
        let device = f.actuators.register(b, 1_i64.into());
        f.actuators.command(device, 0_i64.into()).unwrap();

        assert!(!f.reconciler.handle(RemoteUpdate::new(b.state_id, "unlocking")));
        assert!(f.reconciler.handle(RemoteUpdate::new(b.state_id, "unlocked")));

        assert_eq!(
            f.actuators.state(device).unwrap(),
            TransitionState::Stable(0_i64.into())
        );
    }

    #[tokio::test]
    async fn should_let_fault_through_open_window() {
        let f = fixture();
        let b = lock_bindings();
        let device = f.actuators.register(b, 1_i64.into());
        f.actuators.command(device, 0_i64.into()).unwrap();

        assert!(f.reconciler.handle(RemoteUpdate::new(b.state_id, 2_i64)));

        assert_eq!(f.actuators.state(device).unwrap(), TransitionState::Jammed);
        assert!(!f.actuators.input_enabled(device).unwrap());
    }

    #[tokio::test]
    async fn should_record_local_tagged_updates_as_local() {
        let f = fixture();
        let id = CharacteristicId::new();
        let update = RemoteUpdate {
            characteristic_id: id,
            value: true.into(),
            is_local_change: true,
        };

        assert!(f.reconciler.handle(update));
        assert!(f.h.store.record(id).unwrap().last_local_write_at.is_some());
    }

    #[tokio::test]
    async fn should_feed_alarm_reports_to_panel() {
        let f = fixture();
        let panel = SecuritySystem::new(CharacteristicId::new(), CharacteristicId::new(), false);
        let current = panel.current_id;
        let id = f.security.register(panel);

        f.reconciler.handle(RemoteUpdate::new(current, "armed_home"));

        assert_eq!(f.security.mode(id).unwrap(), AlarmMode::ArmedHome);
    }

    #[tokio::test]
    async fn should_drain_feed_until_closed() {
        let f = fixture();
        let id = CharacteristicId::new();
        let (tx, rx) = mpsc::channel(8);
        tx.send(RemoteUpdate::new(id, 1_i64)).await.unwrap();
        tx.send(RemoteUpdate::new(id, 2_i64)).await.unwrap();
        drop(tx);

        f.reconciler.run(rx).await;

        assert_eq!(f.h.store.get(id), Some(2_i64.into()));
    }
}
