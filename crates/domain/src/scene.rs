//! Scenes: named sets of target characteristic values.
//!
//! [`Scene::is_active`] classifies a scene against live values with a
//! per-kind tolerance. Deactivation is asymmetric: a reversal never turns
//! something on, never unlocks, and never opens a door.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{CharacteristicId, SceneId};
use crate::value::CharacteristicValue;

const PERCENT_TOLERANCE: f64 = 5.0;
const EXACT_TOLERANCE: f64 = 0.01;

const DOOR_OPEN: i64 = 0;
const DOOR_CLOSED: i64 = 1;

/// Kind of value a scene action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    PowerState,
    Active,
    Brightness,
    RotationSpeed,
    TargetPosition,
    CurrentPosition,
    LockTargetState,
    TargetDoorState,
    /// Any other discrete or numeric characteristic.
    Other,
}

impl ValueKind {
    /// Largest absolute difference still considered a match.
    #[must_use]
    pub fn tolerance(self) -> f64 {
        match self {
            Self::TargetPosition | Self::CurrentPosition | Self::Brightness | Self::RotationSpeed => {
                PERCENT_TOLERANCE
            }
            _ => EXACT_TOLERANCE,
        }
    }

    /// Value that undoes `target` on deactivation, or `None` when the
    /// action must be left alone.
    #[must_use]
    pub fn reversal(self, target: &CharacteristicValue) -> Option<CharacteristicValue> {
        let level = target.as_f64()?;
        match self {
            Self::PowerState => (level > 0.5).then_some(CharacteristicValue::Bool(false)),
            Self::Active => (level > 0.5).then_some(CharacteristicValue::Int(0)),
            Self::Brightness | Self::RotationSpeed => (level > 0.0).then_some(CharacteristicValue::Int(0)),
            Self::TargetPosition => (level > 50.0).then_some(CharacteristicValue::Int(0)),
            Self::TargetDoorState => (target.as_i64() == Some(DOOR_OPEN))
                .then_some(CharacteristicValue::Int(DOOR_CLOSED)),
            Self::LockTargetState | Self::CurrentPosition | Self::Other => None,
        }
    }
}

/// One target value of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAction {
    pub characteristic_id: CharacteristicId,
    pub value_kind: ValueKind,
    pub target_value: CharacteristicValue,
}

impl SceneAction {
    #[must_use]
    pub fn new(
        characteristic_id: CharacteristicId,
        value_kind: ValueKind,
        target_value: impl Into<CharacteristicValue>,
    ) -> Self {
        Self {
            characteristic_id,
            value_kind,
            target_value: target_value.into(),
        }
    }

    /// Whether `current` is within tolerance of the target.
    #[must_use]
    pub fn matches(&self, current: &CharacteristicValue) -> bool {
        match (current.as_f64(), self.target_value.as_f64()) {
            (Some(current), Some(target)) => (current - target).abs() < self.value_kind.tolerance(),
            _ => current == &self.target_value,
        }
    }
}

/// A single write issued when activating or deactivating a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneWrite {
    pub characteristic_id: CharacteristicId,
    pub value: CharacteristicValue,
}

/// A named collection of target values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub name: String,
    #[serde(default)]
    pub actions: Vec<SceneAction>,
}

impl Scene {
    #[must_use]
    pub fn new(name: impl Into<String>, actions: Vec<SceneAction>) -> Self {
        Self {
            id: SceneId::new(),
            name: name.into(),
            actions,
        }
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for a blank name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }

    /// Whether every action holds. An empty scene is never active, and an
    /// action on a characteristic with no known value does not hold.
    pub fn is_active<F>(&self, lookup: F) -> bool
    where
        F: Fn(CharacteristicId) -> Option<CharacteristicValue>,
    {
        !self.actions.is_empty()
            && self.actions.iter().all(|action| {
                lookup(action.characteristic_id).is_some_and(|current| action.matches(&current))
            })
    }

    #[must_use]
    pub fn activation_writes(&self) -> Vec<SceneWrite> {
        self.actions
            .iter()
            .map(|action| SceneWrite {
                characteristic_id: action.characteristic_id,
                value: action.target_value.clone(),
            })
            .collect()
    }

    /// Writes that undo the reversible part of the scene.
    #[must_use]
    pub fn reversal_writes(&self) -> Vec<SceneWrite> {
        self.actions
            .iter()
            .filter_map(|action| {
                action
                    .value_kind
                    .reversal(&action.target_value)
                    .map(|value| SceneWrite {
                        characteristic_id: action.characteristic_id,
                        value,
                    })
            })
            .collect()
    }

    /// Characteristics the activation state depends on.
    pub fn characteristic_ids(&self) -> impl Iterator<Item = CharacteristicId> + '_ {
        self.actions.iter().map(|a| a.characteristic_id)
    }
}

/// A change of a scene's activation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTransition {
    pub scene_id: SceneId,
    pub active: bool,
}

/// Tracks the activation state of a set of scenes.
///
/// Recomputation is triggered per changed characteristic and only touches
/// the scenes that reference it.
#[derive(Debug, Default, Clone)]
pub struct SceneMatcher {
    scenes: HashMap<SceneId, Scene>,
    active: HashMap<SceneId, bool>,
    by_characteristic: HashMap<CharacteristicId, HashSet<SceneId>>,
}

impl SceneMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `scene` and compute its initial state.
    pub fn insert<F>(&mut self, scene: Scene, lookup: F) -> bool
    where
        F: Fn(CharacteristicId) -> Option<CharacteristicValue>,
    {
        for id in scene.characteristic_ids() {
            self.by_characteristic.entry(id).or_default().insert(scene.id);
        }
        let active = scene.is_active(lookup);
        self.active.insert(scene.id, active);
        self.scenes.insert(scene.id, scene);
        active
    }

    #[must_use]
    pub fn get(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(&id)
    }

    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }

    #[must_use]
    pub fn is_active(&self, id: SceneId) -> bool {
        self.active.get(&id).copied().unwrap_or(false)
    }

    /// Every characteristic referenced by at least one scene.
    pub fn watched_ids(&self) -> impl Iterator<Item = CharacteristicId> + '_ {
        self.by_characteristic.keys().copied()
    }

    /// Recompute the scenes that reference `changed` and return the ones
    /// whose activation state flipped.
    pub fn recompute<F>(&mut self, changed: CharacteristicId, lookup: F) -> Vec<SceneTransition>
    where
        F: Fn(CharacteristicId) -> Option<CharacteristicValue>,
    {
        let Some(scene_ids) = self.by_characteristic.get(&changed) else {
            return Vec::new();
        };
        let mut transitions = Vec::new();
        for scene_id in scene_ids {
            let Some(scene) = self.scenes.get(scene_id) else {
                continue;
            };
            let now_active = scene.is_active(&lookup);
            let previous = self.active.insert(*scene_id, now_active);
            if previous != Some(now_active) {
                transitions.push(SceneTransition {
                    scene_id: *scene_id,
                    active: now_active,
                });
            }
        }
        transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(kind: ValueKind, target: impl Into<CharacteristicValue>) -> (Scene, CharacteristicId) {
        let id = CharacteristicId::new();
        (Scene::new("Evening", vec![SceneAction::new(id, kind, target)]), id)
    }

    #[test]
    fn should_match_position_within_tolerance() {
        let (scene, id) = single(ValueKind::TargetPosition, 100_i64);
        assert!(scene.is_active(|_| Some(96_i64.into())));
        assert!(!scene.is_active(|_| Some(90_i64.into())));
        assert!(!scene.is_active(|other| (other != id).then(|| 100_i64.into())));
    }

    #[test]
    fn should_require_exact_match_for_discrete_kinds() {
        let (scene, _) = single(ValueKind::PowerState, true);
        assert!(scene.is_active(|_| Some(true.into())));
        assert!(scene.is_active(|_| Some(1_i64.into())));
        assert!(!scene.is_active(|_| Some(false.into())));
    }

    #[test]
    fn should_never_activate_empty_scene() {
        let scene = Scene::new("Nothing", Vec::new());
        assert!(!scene.is_active(|_| Some(true.into())));
    }

    #[test]
    fn should_compare_strings_exactly() {
        let (scene, _) = single(ValueKind::Other, "armed_home");
        assert!(scene.is_active(|_| Some("armed_home".into())));
        assert!(!scene.is_active(|_| Some("armed_away".into())));
    }

    #[test]
    fn should_never_reverse_lock_target() {
        let (scene, _) = single(ValueKind::LockTargetState, 1_i64);
        assert!(scene.reversal_writes().is_empty());
    }

    #[test]
    fn should_only_reverse_power_when_scene_turned_it_on() {
        let (on, id) = single(ValueKind::PowerState, true);
        assert_eq!(
            on.reversal_writes(),
            vec![SceneWrite {
                characteristic_id: id,
                value: CharacteristicValue::Bool(false),
            }]
        );
        let (off, _) = single(ValueKind::PowerState, false);
        assert!(off.reversal_writes().is_empty());
    }

    #[test]
    fn should_only_reverse_position_when_target_was_open() {
        let (open, _) = single(ValueKind::TargetPosition, 80_i64);
        assert_eq!(open.reversal_writes()[0].value, CharacteristicValue::Int(0));
        let (half, _) = single(ValueKind::TargetPosition, 50_i64);
        assert!(half.reversal_writes().is_empty());
    }

    #[test]
    fn should_close_door_only_when_scene_opened_it() {
        let (opened, _) = single(ValueKind::TargetDoorState, 0_i64);
        assert_eq!(opened.reversal_writes()[0].value, CharacteristicValue::Int(1));
        let (closed, _) = single(ValueKind::TargetDoorState, 1_i64);
        assert!(closed.reversal_writes().is_empty());
    }

    #[test]
    fn should_zero_brightness_and_speed_only_when_non_zero() {
        let (bright, _) = single(ValueKind::Brightness, 70_i64);
        assert_eq!(bright.reversal_writes()[0].value, CharacteristicValue::Int(0));
        let (dark, _) = single(ValueKind::RotationSpeed, 0_i64);
        assert!(dark.reversal_writes().is_empty());
    }

    #[test]
    fn should_write_every_target_on_activation() {
        let scene = Scene::new(
            "Movie",
            vec![
                SceneAction::new(CharacteristicId::new(), ValueKind::PowerState, true),
                SceneAction::new(CharacteristicId::new(), ValueKind::Brightness, 20_i64),
            ],
        );
        assert_eq!(scene.activation_writes().len(), 2);
    }

    #[test]
    fn should_report_transition_when_scene_becomes_active() {
        let (scene, id) = single(ValueKind::Brightness, 60_i64);
        let scene_id = scene.id;
        let mut matcher = SceneMatcher::new();
        assert!(!matcher.insert(scene, |_| None));

        let transitions = matcher.recompute(id, |_| Some(58_i64.into()));
        assert_eq!(transitions, vec![SceneTransition { scene_id, active: true }]);
        assert!(matcher.is_active(scene_id));

        assert!(matcher.recompute(id, |_| Some(61_i64.into())).is_empty());
    }

    #[test]
    fn should_ignore_changes_to_unrelated_characteristics() {
        let (scene, _) = single(ValueKind::Brightness, 60_i64);
        let mut matcher = SceneMatcher::new();
        matcher.insert(scene, |_| None);
        assert!(matcher.recompute(CharacteristicId::new(), |_| Some(60_i64.into())).is_empty());
    }

    #[test]
    fn should_reject_blank_name() {
        let scene = Scene::new("", Vec::new());
        assert_eq!(scene.validate(), Err(ValidationError::EmptyName));
    }
}
