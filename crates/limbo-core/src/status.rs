use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Execution status of a behavior-tree task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Status {
    /// Never ticked, or reset by an abort.
    #[default]
    Fresh,
    Running,
    Failure,
    Success,
}

impl Status {
    pub fn is_done(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }

    pub fn code(self) -> u64 {
        match self {
            Status::Fresh => 0,
            Status::Running => 1,
            Status::Failure => 2,
            Status::Success => 3,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Status::Fresh),
            1 => Some(Status::Running),
            2 => Some(Status::Failure),
            3 => Some(Status::Success),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Fresh => "FRESH",
            Status::Running => "RUNNING",
            Status::Failure => "FAILURE",
            Status::Success => "SUCCESS",
        })
    }
}

/// Which host notification drives a player or state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UpdateMode {
    Idle,
    #[default]
    Physics,
    /// Only explicit `update` calls advance the runtime.
    Manual,
}
