//! Transport port: the opaque boundary that carries writes to devices.

use std::future::Future;

use homesync_domain::error::HomeSyncError;
use homesync_domain::id::CharacteristicId;
use homesync_domain::value::CharacteristicValue;

/// Sends characteristic writes to remote devices.
///
/// Writes carry no delivery or ordering guarantee, and an `Ok` does not
/// correlate with any later remote update. Callers never retry.
pub trait Transport {
    /// Write `value` to the characteristic `id`.
    fn write(
        &self,
        id: CharacteristicId,
        value: CharacteristicValue,
    ) -> impl Future<Output = Result<(), HomeSyncError>> + Send;
}

impl<T: Transport + Send + Sync> Transport for std::sync::Arc<T> {
    fn write(
        &self,
        id: CharacteristicId,
        value: CharacteristicValue,
    ) -> impl Future<Output = Result<(), HomeSyncError>> + Send {
        (**self).write(id, value)
    }
}
