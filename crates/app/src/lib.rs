//! # homesync-app
//!
//! Application layer: ports, in-process infrastructure and controller
//! services.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `Transport`: fire-and-forget writes to devices
//!   - `Clock`: the source of `now` for suppression and timeouts
//!   - `ChangePublisher`: fan-out of characteristic changes
//! - Provide **in-process infrastructure**: the per-characteristic
//!   `ChangeBus` and the `CharacteristicStore`
//! - Orchestrate domain objects in services:
//!   - `ActuatorService`: transitional actuators (locks, doors, valves, coverings)
//!   - `GroupService`: device group aggregation and fan-out
//!   - `SceneService`: scene activation tracking and reversal
//!   - `SecurityService`: alarm arming with codes
//!   - `Reconciler`: the remote update feed
//!   - `DerivedStateWatcher`: recomputes groups and scenes on every change
//!
//! ## Dependency rule
//! Depends on `homesync-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates.

pub mod change_bus;
pub mod ports;
pub mod services;
pub mod store;
