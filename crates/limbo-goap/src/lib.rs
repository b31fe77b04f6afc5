//! Goal-oriented action planning over blackboard facts.
//!
//! [`GoapPlanner`] searches backward from a [`GoapGoal`] through the effects of [`GoapAction`]s
//! until it reaches requirements the current [`WorldState`] already meets. With the `bt`
//! feature, [`RunGoapPlan`] plans from a behavior tree's blackboard and runs each action's own
//! tree.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod action;
pub mod goal;
pub mod planner;
#[cfg(feature = "bt")]
#[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
pub mod run_plan;
pub mod world_state;

pub use action::{AgentCtx, GoapAction};
pub use goal::GoapGoal;
pub use planner::{GoapPlanner, GoapPlannerConfig};
#[cfg(feature = "bt")]
#[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
pub use run_plan::{RunGoapPlan, RunGoapPlanConfig, MAX_NESTING_DEPTH};
pub use world_state::{Facts, WorldState};
