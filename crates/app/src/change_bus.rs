//! Typed publish/subscribe bus keyed by characteristic id.
//!
//! Subscribers register only for the ids they care about instead of
//! filtering one global stream. Each id gets its own tokio [`broadcast`]
//! channel, created on first subscription. [`ChangeBus::watch`] merges
//! several ids into one stream for aggregators and matchers.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt, StreamMap};

use homesync_domain::characteristic::CharacteristicChange;
use homesync_domain::id::CharacteristicId;

use crate::ports::ChangePublisher;

/// In-process change bus.
///
/// Publishing succeeds even when nobody listens (the change is simply
/// dropped) and never blocks: a subscriber that falls more than
/// `capacity` changes behind skips ahead.
pub struct ChangeBus {
    capacity: usize,
    channels: Mutex<HashMap<CharacteristicId, broadcast::Sender<CharacteristicChange>>>,
    all: broadcast::Sender<CharacteristicChange>,
}

impl ChangeBus {
    /// Create a bus whose per-id channels hold `capacity` pending changes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity);
        Self {
            capacity,
            channels: Mutex::new(HashMap::new()),
            all,
        }
    }

    /// Subscribe to changes of one characteristic.
    ///
    /// Returns a receiver that gets every change published *after* the
    /// subscription is created.
    #[must_use]
    pub fn subscribe(&self, id: CharacteristicId) -> broadcast::Receiver<CharacteristicChange> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to every change on the bus.
    #[must_use]
    pub fn subscribe_all(&self) -> broadcast::Receiver<CharacteristicChange> {
        self.all.subscribe()
    }

    /// Merge the changes of several characteristics into one stream.
    ///
    /// The stream ends immediately when `ids` is empty. Changes missed
    /// because the watcher lagged are skipped.
    pub fn watch<I>(&self, ids: I) -> impl Stream<Item = CharacteristicChange> + Send + Unpin + 'static
    where
        I: IntoIterator<Item = CharacteristicId>,
    {
        let mut streams = StreamMap::new();
        for id in ids {
            streams.insert(id, BroadcastStream::new(self.subscribe(id)));
        }
        streams.filter_map(|(id, item)| match item {
            Ok(change) => Some(change),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(characteristic = %id, skipped, "change watcher lagged");
                None
            }
        })
    }

    /// Number of live subscribers for `id`.
    #[must_use]
    pub fn subscriber_count(&self, id: CharacteristicId) -> usize {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.get(&id).map_or(0, broadcast::Sender::receiver_count)
    }
}

impl ChangePublisher for ChangeBus {
    fn publish(&self, change: CharacteristicChange) {
        let id = change.characteristic_id;
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        // send fails only when every receiver is gone
        let closed = channels
            .get(&id)
            .is_some_and(|sender| sender.send(change.clone()).is_err());
        if closed {
            channels.remove(&id);
        }
        drop(channels);
        let _ = self.all.send(change);
    }
}
