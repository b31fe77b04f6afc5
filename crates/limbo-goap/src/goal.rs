#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use limbo_core::Value;

use crate::world_state::{Facts, WorldState};

/// Target facts a plan should bring about.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GoapGoal {
    pub name: String,
    pub target_state: Facts,
    /// Higher is more important. Informational; the planner works on one goal at a time.
    pub priority: i32,
}

impl GoapGoal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.target_state.insert(fact.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn create_world_state(&self) -> WorldState {
        WorldState::from_facts(self.target_state.clone())
    }

    pub fn is_satisfied(&self, state: &WorldState) -> bool {
        self.target_state
            .iter()
            .all(|(name, want)| state.fact(name).is_some_and(|have| have.matches(want)))
    }

    pub fn required_facts(&self) -> Vec<String> {
        self.target_state.keys().cloned().collect()
    }
}
