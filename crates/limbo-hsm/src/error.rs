use thiserror::Error;

use crate::state::StateId;

/// Misuse of the [`crate::Hsm`] structure or activation API. Nothing is changed when one is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HsmError {
    #[error("state {0} does not exist in this machine")]
    UnknownState(StateId),

    #[error("state {0} cannot hold child states")]
    NotAContainer(StateId),

    #[error("state {0} is not a machine")]
    NotAMachine(StateId),

    #[error("state {state} is not a child of {machine}")]
    NotAChild { machine: StateId, state: StateId },

    #[error("state {0} is not active")]
    Inactive(StateId),

    #[error("state machine is already initialized")]
    AlreadyInitialized,

    #[error("state machine is not initialized")]
    NotInitialized,

    #[error("event name is empty")]
    EmptyEvent,
}
