//! Scene service: live activation tracking, activation and reversal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use homesync_domain::error::{HomeSyncError, NotFoundError};
use homesync_domain::id::{CharacteristicId, SceneId};
use homesync_domain::scene::{Scene, SceneMatcher, SceneTransition, SceneWrite};

use crate::ports::{ChangePublisher, Clock, Transport};
use crate::services::dispatch;
use crate::store::CharacteristicStore;

pub struct SceneService<T, P, C> {
    store: Arc<CharacteristicStore<P, C>>,
    transport: T,
    matcher: Mutex<SceneMatcher>,
}

impl<T, P, C> SceneService<T, P, C>
where
    T: Transport + Clone + Send + Sync + 'static,
    P: ChangePublisher,
    C: Clock,
{
    pub fn new(store: Arc<CharacteristicStore<P, C>>, transport: T) -> Self {
        Self {
            store,
            transport,
            matcher: Mutex::new(SceneMatcher::new()),
        }
    }

    /// Register an externally defined scene and return whether it is
    /// active right now.
    ///
    /// # Errors
    ///
    /// Returns [`HomeSyncError::Validation`] if the scene is invalid.
    #[tracing::instrument(skip(self, scene), fields(scene_name = %scene.name))]
    pub fn register(&self, scene: Scene) -> Result<bool, HomeSyncError> {
        scene.validate()?;
        Ok(self.lock().insert(scene, |id| self.store.get(id)))
    }

    pub fn is_active(&self, id: SceneId) -> bool {
        self.lock().is_active(id)
    }

    /// Every characteristic any scene depends on.
    pub fn watched_ids(&self) -> Vec<CharacteristicId> {
        self.lock().watched_ids().collect()
    }

    /// Write every target of the scene.
    ///
    /// # Errors
    ///
    /// Returns [`HomeSyncError::NotFound`] for an unknown scene.
    #[tracing::instrument(skip(self))]
    pub fn activate(&self, id: SceneId) -> Result<Vec<SceneTransition>, HomeSyncError> {
        let scene = self.scene(id)?;
        tracing::info!(scene = %scene.name, "activating scene");
        Ok(self.apply(scene.activation_writes()))
    }

    /// Undo the reversible part of the scene. Locks are never unlocked and
    /// nothing the scene did not turn on is turned on.
    ///
    /// # Errors
    ///
    /// Returns [`HomeSyncError::NotFound`] for an unknown scene.
    #[tracing::instrument(skip(self))]
    pub fn deactivate(&self, id: SceneId) -> Result<Vec<SceneTransition>, HomeSyncError> {
        let scene = self.scene(id)?;
        tracing::info!(scene = %scene.name, "reversing scene");
        Ok(self.apply(scene.reversal_writes()))
    }

    /// Activate an inactive scene, reverse an active one.
    ///
    /// Returns whether the scene is active afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`HomeSyncError::NotFound`] for an unknown scene.
    pub fn toggle(&self, id: SceneId) -> Result<bool, HomeSyncError> {
        if self.is_active(id) {
            self.deactivate(id)?;
        } else {
            self.activate(id)?;
        }
        Ok(self.is_active(id))
    }

    /// Recompute the scenes that reference `changed`.
    pub fn on_change(&self, changed: CharacteristicId) -> Vec<SceneTransition> {
        self.lock().recompute(changed, |id| self.store.get(id))
    }

    /// Update the store and the matcher, then dispatch the writes without
    /// waiting for the transport.
    fn apply(&self, writes: Vec<SceneWrite>) -> Vec<SceneTransition> {
        for write in &writes {
            self.store.set_local(write.characteristic_id, write.value.clone());
        }
        let transitions: Vec<SceneTransition> = {
            let mut matcher = self.lock();
            writes
                .iter()
                .flat_map(|w| matcher.recompute(w.characteristic_id, |id| self.store.get(id)))
                .collect()
        };
        for write in writes {
            dispatch(&self.transport, write.characteristic_id, write.value, "scene");
        }
        transitions
    }

    fn scene(&self, id: SceneId) -> Result<Scene, HomeSyncError> {
        self.lock().get(id).cloned().ok_or_else(|| {
            NotFoundError {
                entity: "Scene",
                id: id.to_string(),
            }
            .into()
        })
    }

    fn lock(&self) -> MutexGuard<'_, SceneMatcher> {
        self.matcher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homesync_domain::scene::{SceneAction, ValueKind};
    use homesync_domain::value::CharacteristicValue;

    use crate::services::test_support::{Harness, SpyTransport, flush, harness};

    type Service = SceneService<Arc<SpyTransport>, Arc<crate::change_bus::ChangeBus>, Arc<crate::ports::ManualClock>>;

    fn make_service(h: &Harness) -> Service {
        SceneService::new(Arc::clone(&h.store), Arc::clone(&h.transport))
    }

    #[tokio::test]
    async fn should_track_activation_from_live_values() {
        let h = harness();
        let svc = make_service(&h);
        let blind = CharacteristicId::new();
        let scene = Scene::new(
            "Morning",
            vec![SceneAction::new(blind, ValueKind::TargetPosition, 100_i64)],
        );
        let scene_id = scene.id;
        assert!(!svc.register(scene).unwrap());

        h.store.apply_remote(blind, 96_i64.into());
        assert_eq!(
            svc.on_change(blind),
            vec![SceneTransition { scene_id, active: true }]
        );

        h.store.apply_remote(blind, 90_i64.into());
        svc.on_change(blind);
        assert!(!svc.is_active(scene_id));
    }

    #[tokio::test]
    async fn should_write_targets_and_become_active_on_activation() {
        let h = harness();
        let svc = make_service(&h);
        let light = CharacteristicId::new();
        let level = CharacteristicId::new();
        let scene = Scene::new(
            "Reading",
            vec![
                SceneAction::new(light, ValueKind::PowerState, true),
                SceneAction::new(level, ValueKind::Brightness, 70_i64),
            ],
        );
        let scene_id = scene.id;
        svc.register(scene).unwrap();

        let transitions = svc.activate(scene_id).unwrap();
        flush().await;

        assert_eq!(transitions, vec![SceneTransition { scene_id, active: true }]);
        assert_eq!(h.transport.writes().len(), 2);
        assert_eq!(h.store.get(level), Some(70_i64.into()));
    }

    #[tokio::test]
    async fn should_not_unlock_when_scene_is_deactivated() {
        let h = harness();
        let svc = make_service(&h);
        let lock = CharacteristicId::new();
        let light = CharacteristicId::new();
        let scene = Scene::new(
            "Goodnight",
            vec![
                SceneAction::new(lock, ValueKind::LockTargetState, 1_i64),
                SceneAction::new(light, ValueKind::PowerState, true),
            ],
        );
        let scene_id = scene.id;
        svc.register(scene).unwrap();
        svc.activate(scene_id).unwrap();
        flush().await;

        let active = svc.toggle(scene_id).unwrap();
        flush().await;

        assert!(!active);
        assert_eq!(h.transport.writes_to(lock), vec![CharacteristicValue::Int(1)]);
        assert_eq!(
            h.transport.writes_to(light),
            vec![CharacteristicValue::Bool(true), CharacteristicValue::Bool(false)]
        );
        assert_eq!(h.store.get(lock), Some(1_i64.into()));
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_scene() {
        let h = harness();
        let svc = make_service(&h);
        let result = svc.activate(SceneId::new());
        assert!(matches!(result, Err(HomeSyncError::NotFound(_))));
    }
}
