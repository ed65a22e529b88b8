//! Application services: controllers that orchestrate domain objects.
//!
//! Each service accepts port implementations via generic parameters
//! (constructor injection) and shares the [`CharacteristicStore`] through
//! an `Arc`, keeping this layer decoupled from concrete adapters.
//!
//! [`CharacteristicStore`]: crate::store::CharacteristicStore

use tracing::Instrument;

use homesync_domain::id::CharacteristicId;
use homesync_domain::value::CharacteristicValue;

use crate::ports::Transport;

pub mod actuator_service;
pub mod group_service;
pub mod reconciler;
pub mod scene_service;
pub mod security_service;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use actuator_service::{ActuatorService, ActuatorUpdate};
pub use group_service::{GroupService, GroupUpdate};
pub use reconciler::{Reconciler, RemoteUpdate};
pub use scene_service::SceneService;
pub use security_service::SecurityService;
pub use watcher::{DerivedChange, DerivedStateWatcher};

/// Hand a write to the transport without waiting for it.
///
/// Failures are logged only: the remote feed stays the source of truth.
/// Must be called from within a tokio runtime.
pub(crate) fn dispatch<T>(transport: &T, id: CharacteristicId, value: CharacteristicValue, origin: &'static str)
where
    T: Transport + Clone + Send + Sync + 'static,
{
    let transport = transport.clone();
    tokio::spawn(
        async move {
            if let Err(err) = transport.write(id, value).await {
                tracing::warn!(characteristic = %id, error = %err, origin, "write failed");
            }
        }
        .in_current_span(),
    );
}
