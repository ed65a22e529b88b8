//! Typed identifier newtypes backed by UUIDs.
//!
//! Identifiers are opaque. They only need to be unique, hashable and
//! totally ordered so that watch sets can be sorted and deduplicated.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

define_id!(
    /// Identifies one controllable/observable attribute of one device
    /// (e.g. "power state of light X").
    CharacteristicId
);

define_id!(
    /// Identifies a stateful device controller: a transitional actuator or
    /// a security system panel.
    DeviceId
);

define_id!(
    /// Unique identifier for a [`DeviceGroup`](crate::group::DeviceGroup).
    GroupId
);

define_id!(
    /// Unique identifier for a [`Scene`](crate::scene::Scene).
    SceneId
);

impl CharacteristicId {
    /// Sorted, duplicate-free list of the characteristics several
    /// controls depend on, subscribed to once each.
    #[must_use]
    pub fn watch_set(ids: impl IntoIterator<Item = Self>) -> Vec<Self> {
        let mut ids: Vec<Self> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
