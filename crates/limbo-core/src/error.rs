use thiserror::Error;

/// Structural misuse of a [`crate::Blackboard`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlackboardError {
    #[error("can't bind variable that doesn't exist: {0}")]
    BindMissingVar(String),

    #[error("can't unbind variable that doesn't exist: {0}")]
    UnbindMissingVar(String),

    #[error("can't link variable that doesn't exist: {0}")]
    LinkMissingVar(String),

    #[error("target variable doesn't exist in the linked blackboard: {0}")]
    LinkMissingTarget(String),

    #[error("blackboard can't be its own ancestor")]
    ScopeCycle,
}

/// Structural misuse of a [`crate::BlackboardPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("variable name is empty")]
    EmptyName,

    #[error("variable already exists: {0}")]
    DuplicateVar(String),

    #[error("variable not found: {0}")]
    VarNotFound(String),

    #[error("invalid variable name: {0}")]
    InvalidName(String),

    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("derived plans take their variables from the base plan")]
    DerivedPlan,
}
