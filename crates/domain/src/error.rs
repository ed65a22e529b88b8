//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`HomeSyncError`] via `#[from]`. Transport failures from adapters are
//! boxed into [`HomeSyncError::Transport`].

use crate::actuator::ActuatorError;
use crate::alarm::AlarmError;
use crate::group::GroupRole;
use crate::id::CharacteristicId;

/// Top-level error for every fallible homesync operation.
#[derive(Debug, thiserror::Error)]
pub enum HomeSyncError {
    /// A definition (group, scene, …) violates a domain invariant.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced item does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A transitional actuator refused a command or gave up waiting.
    #[error("actuator error")]
    Actuator(#[from] ActuatorError),

    /// The security system rejected or could not process a command.
    #[error("alarm error")]
    Alarm(#[from] AlarmError),

    /// The transport boundary failed to accept a write.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A group or scene name is empty.
    #[error("name must not be empty")]
    EmptyName,

    /// A device group has no members.
    #[error("group must have at least one member")]
    NoMembers,

    /// The same state characteristic appears twice in a group.
    #[error("characteristic {0} is listed more than once")]
    DuplicateMember(CharacteristicId),

    /// A group action does not apply to the role it targets.
    #[error("{action} does not apply to the {role} role")]
    RoleMismatch {
        role: GroupRole,
        action: &'static str,
    },
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of thing looked up (e.g. `"Scene"`).
    pub entity: &'static str,
    /// Display form of the identifier.
    pub id: String,
}
