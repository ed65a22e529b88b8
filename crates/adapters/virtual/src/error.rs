//! Virtual adapter error types.

use homesync_domain::error::HomeSyncError;
use homesync_domain::id::CharacteristicId;

/// Errors specific to the simulated home.
#[derive(Debug, thiserror::Error)]
pub enum VirtualError {
    /// The characteristic was marked unreachable.
    #[error("characteristic {0} is unreachable")]
    Unreachable(CharacteristicId),

    /// No simulated device accepts writes to this characteristic.
    #[error("no simulated device owns characteristic {0}")]
    UnknownCharacteristic(CharacteristicId),

    /// The remote update feed has no receiver any more.
    #[error("remote update feed closed")]
    FeedClosed,
}

impl From<VirtualError> for HomeSyncError {
    fn from(err: VirtualError) -> Self {
        Self::Transport(Box::new(err))
    }
}
