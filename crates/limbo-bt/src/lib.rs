//! Behavior tree runtime built on `limbo-core`.
//!
//! A [`BehaviorTree`] is an authored template. Instantiating it clones the task arena for one
//! agent and runs every task's setup once; the resulting [`BtInstance`] is ticked with
//! [`BtInstance::update`] or driven by a [`BtPlayer`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod actions;
pub mod behavior_tree;
pub mod composites;
pub mod conditions;
pub mod custom;
pub mod decorators;
pub mod error;
pub mod player;
pub mod task;
pub mod tree;

pub use actions::{
    CallMethod, ConsolePrint, Fail, RandomWait, SetAgentProperty, SetVar, Wait, WaitTicks,
};
pub use behavior_tree::{BehaviorTree, BtInstance};
pub use composites::{
    DynamicSelector, DynamicSequence, Parallel, ProbabilitySelector, RandomSelector,
    RandomSequence, Selector, Sequence,
};
pub use conditions::{CheckAgentProperty, CheckTrigger, CheckVar};
pub use custom::{Comment, CustomTask};
pub use decorators::{
    AlwaysFail, AlwaysSucceed, Cooldown, CountPolicy, Delay, ForEach, Invert, NewScope,
    Probability, Repeat, RepeatUntilFailure, RepeatUntilSuccess, RunLimit, Subtree, TimeLimit,
};
pub use error::{BtError, TreeError};
pub use player::{BtPlayer, BtPlayerConfig, UpdateMode};
pub use task::{InitCtx, Task, TaskCategory, TaskCtx};
pub use tree::{CloneMode, TaskId, TaskTree};
