//! Derived state watcher: recomputes group aggregates and scene
//! activation whenever a characteristic they depend on changes, whether
//! the change is local or remote.

use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};

use homesync_domain::characteristic::CharacteristicChange;
use homesync_domain::id::CharacteristicId;
use homesync_domain::scene::SceneTransition;

use crate::ports::{ChangePublisher, Clock, Transport};
use crate::services::{GroupService, GroupUpdate, SceneService};

/// A recomputed piece of derived state.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedChange {
    Group(GroupUpdate),
    Scene(SceneTransition),
}

pub struct DerivedStateWatcher<T, P, C> {
    groups: Arc<GroupService<T, P, C>>,
    scenes: Arc<SceneService<T, P, C>>,
}

impl<T, P, C> DerivedStateWatcher<T, P, C>
where
    T: Transport + Clone + Send + Sync + 'static,
    P: ChangePublisher,
    C: Clock,
{
    pub fn new(groups: Arc<GroupService<T, P, C>>, scenes: Arc<SceneService<T, P, C>>) -> Self {
        Self { groups, scenes }
    }

    /// Characteristics to watch on the change bus.
    pub fn watched_ids(&self) -> Vec<CharacteristicId> {
        CharacteristicId::watch_set(
            self.groups
                .watched_ids()
                .into_iter()
                .chain(self.scenes.watched_ids()),
        )
    }

    /// Recompute everything that depends on `change`.
    pub fn process(&self, change: &CharacteristicChange) -> Vec<DerivedChange> {
        let id = change.characteristic_id;
        let mut derived: Vec<DerivedChange> = self
            .groups
            .on_change(id)
            .into_iter()
            .map(DerivedChange::Group)
            .collect();
        derived.extend(self.scenes.on_change(id).into_iter().map(DerivedChange::Scene));
        derived
    }

    /// Process `changes` until the stream ends.
    pub async fn run<S>(&self, mut changes: S)
    where
        S: Stream<Item = CharacteristicChange> + Unpin,
    {
        while let Some(change) = changes.next().await {
            for derived in self.process(&change) {
                match derived {
                    DerivedChange::Group(update) => tracing::debug!(
                        group = %update.group_id,
                        on = update.state.on_count,
                        total = update.state.total_count,
                        label = update.state.fraction_label().as_deref().unwrap_or(""),
                        "group aggregate updated"
                    ),
                    DerivedChange::Scene(transition) => tracing::info!(
                        scene = %transition.scene_id,
                        active = transition.active,
                        "scene activation changed"
                    ),
                }
            }
        }
    }
}
