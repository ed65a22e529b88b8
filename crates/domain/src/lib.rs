//! # homesync-domain
//!
//! Pure domain model for keeping locally-rendered smart-home controls
//! consistent with remote devices whose acknowledgements are asynchronous,
//! unordered and sometimes stale.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **characteristic values** and the per-characteristic record
//! - Define **suppression windows** (local writes win over stale echoes)
//! - Define **transitional actuators** (locks, garage doors, valves, coverings)
//! - Define **device groups** and their aggregation rules
//! - Define **scenes**, tolerance matching and asymmetric reversal
//! - Define the **security system** arming flow
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! Time is always passed in explicitly; the `app` crate owns the clock.

pub mod error;
pub mod id;
pub mod time;

pub mod actuator;
pub mod alarm;
pub mod characteristic;
pub mod group;
pub mod scene;
pub mod suppression;
pub mod value;
