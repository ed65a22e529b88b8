//! Change publisher port: fan-out of characteristic changes.

use homesync_domain::characteristic::CharacteristicChange;

/// Publishes characteristic changes to interested subscribers.
///
/// Publishing never blocks and never fails: a change nobody listens to is
/// dropped.
pub trait ChangePublisher {
    fn publish(&self, change: CharacteristicChange);
}

impl<T: ChangePublisher> ChangePublisher for std::sync::Arc<T> {
    fn publish(&self, change: CharacteristicChange) {
        (**self).publish(change);
    }
}
