use thiserror::Error;

use crate::tree::TaskId;

/// Misuse of the [`crate::TaskTree`] structure API. Nothing is changed when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("task {0} does not exist in this tree")]
    UnknownTask(TaskId),

    #[error("task {0} already has a parent")]
    AlreadyHasParent(TaskId),

    #[error("adding {child} under {parent} would create a cycle")]
    WouldCreateCycle { parent: TaskId, child: TaskId },

    #[error("task {child} is not a child of {parent}")]
    NotAChild { parent: TaskId, child: TaskId },

    #[error("child index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BtError {
    #[error("behavior tree has no root task")]
    NoRootTask,

    #[error(transparent)]
    Tree(#[from] TreeError),
}
