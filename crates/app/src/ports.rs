//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the service layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod change_publisher;
pub mod clock;
pub mod transport;

pub use change_publisher::ChangePublisher;
pub use clock::{Clock, ManualClock, SystemClock};
pub use transport::Transport;
