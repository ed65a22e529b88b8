//! Characteristic store: the process-wide cache of last-known values.
//!
//! All mutation goes through the store so that every change is published.
//! Records and suppression windows sit behind one mutex; the change is
//! published after the lock is released.
//!
//! The `stage_*` operations decide and record under the store lock but
//! leave publishing to the caller. Controllers use them while holding
//! their own lock, so a remote report can never be applied between a
//! controller's state change and the matching store update.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use homesync_domain::characteristic::{CharacteristicChange, CharacteristicRecord};
use homesync_domain::id::CharacteristicId;
use homesync_domain::suppression::{SuppressionDurations, SuppressionPolicy, SuppressionWindow};
use homesync_domain::time::Timestamp;
use homesync_domain::value::CharacteristicValue;

use crate::ports::{ChangePublisher, Clock};

#[derive(Default)]
struct StoreState {
    records: HashMap<CharacteristicId, CharacteristicRecord>,
    suppression: SuppressionWindow,
}

/// Cache of characteristic values with suppression of stale remote echoes.
pub struct CharacteristicStore<P, C> {
    state: Mutex<StoreState>,
    durations: SuppressionDurations,
    publisher: P,
    clock: C,
}

impl<P: ChangePublisher, C: Clock> CharacteristicStore<P, C> {
    /// Create an empty store.
    pub fn new(publisher: P, clock: C, durations: SuppressionDurations) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            durations,
            publisher,
            clock,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Last known value, or `None` if `id` was never observed.
    pub fn get(&self, id: CharacteristicId) -> Option<CharacteristicValue> {
        self.lock().records.get(&id).map(|r| r.last_known_value.clone())
    }

    /// Full record for `id`.
    pub fn record(&self, id: CharacteristicId) -> Option<CharacteristicRecord> {
        self.lock().records.get(&id).cloned()
    }

    /// Record a locally-originated value and publish it as a local change.
    pub fn set_local(&self, id: CharacteristicId, value: CharacteristicValue) {
        let change = self.stage_local(id, value, SuppressionPolicy::Immediate);
        self.publish(change);
    }

    /// Record a locally-originated value and open its suppression window
    /// in one step, then publish the change.
    pub fn set_local_suppressed(&self, id: CharacteristicId, value: CharacteristicValue, policy: SuppressionPolicy) {
        let change = self.stage_local(id, value, policy);
        self.publish(change);
    }

    /// Record a local value and open the window for `policy` without
    /// publishing. [`SuppressionPolicy::Immediate`] opens nothing.
    #[must_use = "the staged change must be published"]
    pub fn stage_local(
        &self,
        id: CharacteristicId,
        value: CharacteristicValue,
        policy: SuppressionPolicy,
    ) -> CharacteristicChange {
        let now = self.clock.now();
        let mut state = self.lock();
        match state.records.get_mut(&id) {
            Some(record) => record.record_local(value.clone(), now),
            None => {
                state
                    .records
                    .insert(id, CharacteristicRecord::written(id, value.clone(), now));
            }
        }
        if let Some(duration) = self.durations.duration_for(policy) {
            state.suppression.open(id, duration, now);
        }
        tracing::debug!(characteristic = %id, %value, ?policy, "local write");
        CharacteristicChange::local(id, value, now)
    }

    /// Whether remote updates for `id` are suppressed right now.
    pub fn is_suppressed(&self, id: CharacteristicId) -> bool {
        let now = self.clock.now();
        self.lock().suppression.is_suppressed(id, now)
    }

    /// Apply a remote update, subject to the suppression window.
    ///
    /// Returns `false` (and changes nothing) when the update is suppressed.
    pub fn apply_remote(&self, id: CharacteristicId, value: CharacteristicValue) -> bool {
        let Some(change) = self.stage_remote(id, value, false) else {
            return false;
        };
        self.publish(change);
        true
    }

    /// Apply a remote update without publishing. `bypass` ignores the
    /// suppression window, for reports that can never be a stale echo such
    /// as an actuator confirmation or fault.
    ///
    /// Returns `None` when the update is suppressed.
    #[must_use = "the staged change must be published"]
    pub fn stage_remote(
        &self,
        id: CharacteristicId,
        value: CharacteristicValue,
        bypass: bool,
    ) -> Option<CharacteristicChange> {
        let now = self.clock.now();
        let mut state = self.lock();
        let current = state.records.get(&id).map(|r| &r.last_known_value);
        if !bypass && !state.suppression.admits(id, &value, current, now) {
            tracing::debug!(characteristic = %id, %value, "remote update suppressed");
            return None;
        }
        match state.records.get_mut(&id) {
            Some(record) => {
                record.record_remote(value.clone(), now);
            }
            None => {
                state
                    .records
                    .insert(id, CharacteristicRecord::observed(id, value.clone(), now));
            }
        }
        tracing::debug!(characteristic = %id, %value, bypass, "remote update accepted");
        Some(CharacteristicChange::remote(id, value, now))
    }

    /// Publish a change staged by [`Self::stage_local`] or
    /// [`Self::stage_remote`].
    pub fn publish(&self, change: CharacteristicChange) {
        self.publisher.publish(change);
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
