use std::rc::Rc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use limbo_core::UpdateMode;
use limbo_core::{Blackboard, BlackboardPlan, ObjectRef, SharedPlan, Status};

use crate::behavior_tree::{BehaviorTree, BtInstance};
use crate::error::BtError;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BtPlayerConfig {
    pub update_mode: UpdateMode,
    pub active: bool,
    /// Keep ticking after the tree finishes; the next tick starts a new run.
    pub auto_restart: bool,
}

impl Default for BtPlayerConfig {
    fn default() -> Self {
        Self {
            update_mode: UpdateMode::default(),
            active: true,
            auto_restart: true,
        }
    }
}

impl BtPlayerConfig {
    pub fn with_update_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = mode;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_auto_restart(mut self, auto_restart: bool) -> Self {
        self.auto_restart = auto_restart;
        self
    }
}

type StatusListener = Box<dyn FnMut(Status)>;

/// Runs one behavior tree for one agent.
///
/// The player owns the agent's blackboard. Its plan derives from the tree's plan, so variables
/// the tree declares are always present; values set before [`BtPlayer::initialize`] are kept.
pub struct BtPlayer {
    behavior_tree: Option<Rc<BehaviorTree>>,
    config: BtPlayerConfig,
    plan: SharedPlan,
    blackboard: Blackboard,
    instance: Option<BtInstance>,
    finished: Vec<StatusListener>,
    updated: Vec<StatusListener>,
}

impl BtPlayer {
    pub fn new(behavior_tree: Rc<BehaviorTree>) -> Self {
        Self::with_config(behavior_tree, BtPlayerConfig::default())
    }

    pub fn with_config(behavior_tree: Rc<BehaviorTree>, config: BtPlayerConfig) -> Self {
        let mut player = Self {
            behavior_tree: None,
            config,
            plan: BlackboardPlan::new().into_shared(),
            blackboard: Blackboard::new(),
            instance: None,
            finished: Vec::new(),
            updated: Vec::new(),
        };
        player.set_behavior_tree(Some(behavior_tree));
        player
    }

    pub fn behavior_tree(&self) -> Option<Rc<BehaviorTree>> {
        self.behavior_tree.clone()
    }

    /// Replaces the tree. The running instance is dropped; call [`BtPlayer::initialize`] again.
    pub fn set_behavior_tree(&mut self, behavior_tree: Option<Rc<BehaviorTree>>) {
        if let Some(instance) = self.instance.as_mut() {
            instance.abort();
        }
        self.instance = None;
        let base = behavior_tree.as_ref().and_then(|bt| bt.blackboard_plan());
        self.plan.borrow_mut().set_base_plan(base);
        self.behavior_tree = behavior_tree;
    }

    pub fn config(&self) -> &BtPlayerConfig {
        &self.config
    }

    pub fn blackboard_plan(&self) -> SharedPlan {
        self.plan.clone()
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    /// Replaces the blackboard. Takes effect on the next [`BtPlayer::initialize`].
    pub fn set_blackboard(&mut self, blackboard: Blackboard) {
        self.blackboard = blackboard;
    }

    /// Fills the blackboard from the plan and instantiates the tree for `agent`.
    pub fn initialize(
        &mut self,
        agent: Option<ObjectRef>,
        scene_root: Option<ObjectRef>,
    ) -> Result<(), BtError> {
        if let Some(mut previous) = self.instance.take() {
            previous.abort();
        }
        let Some(bt) = self.behavior_tree.clone() else {
            tracing::error!("BtPlayer: needs a valid behavior tree");
            return Err(BtError::NoRootTask);
        };
        let prefetch_root = scene_root.clone().or_else(|| agent.clone());
        self.plan
            .borrow()
            .populate_blackboard(&self.blackboard, false, prefetch_root.as_ref());
        let instance = bt.instantiate(agent, &self.blackboard, scene_root)?;
        self.instance = Some(instance);
        Ok(())
    }

    pub fn update_mode(&self) -> UpdateMode {
        self.config.update_mode
    }

    pub fn set_update_mode(&mut self, mode: UpdateMode) {
        self.config.update_mode = mode;
    }

    pub fn is_active(&self) -> bool {
        self.config.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.config.active = active;
    }

    pub fn auto_restart(&self) -> bool {
        self.config.auto_restart
    }

    pub fn set_auto_restart(&mut self, auto_restart: bool) {
        self.config.auto_restart = auto_restart;
    }

    /// Called with the final status each time the tree finishes a run.
    pub fn on_finished(&mut self, listener: impl FnMut(Status) + 'static) {
        self.finished.push(Box::new(listener));
    }

    /// Called with the status after every tick.
    pub fn on_updated(&mut self, listener: impl FnMut(Status) + 'static) {
        self.updated.push(Box::new(listener));
    }

    /// Ticks the tree once if the player is active. Returns the tick's status, or `None` if
    /// nothing was ticked.
    pub fn update(&mut self, delta: f64) -> Option<Status> {
        let Some(instance) = self.instance.as_mut() else {
            tracing::error!("BtPlayer: no tree instance to update, initialize first");
            return None;
        };
        if !self.config.active {
            return None;
        }
        let status = instance.update(delta);
        for listener in &mut self.updated {
            listener(status);
        }
        if status.is_done() {
            self.config.active = self.config.auto_restart;
            tracing::debug!(status = %status, source = %instance.source(), "behavior tree finished");
            for listener in &mut self.finished {
                listener(status);
            }
        }
        Some(status)
    }

    /// Idle-frame notification from the host.
    pub fn notify_process(&mut self, delta: f64) -> Option<Status> {
        if self.config.update_mode == UpdateMode::Idle {
            self.update(delta)
        } else {
            None
        }
    }

    /// Physics-frame notification from the host.
    pub fn notify_physics_process(&mut self, delta: f64) -> Option<Status> {
        if self.config.update_mode == UpdateMode::Physics {
            self.update(delta)
        } else {
            None
        }
    }

    /// Aborts the current run and reactivates the player.
    pub fn restart(&mut self) {
        if let Some(instance) = self.instance.as_mut() {
            instance.abort();
        }
        self.config.active = true;
    }

    pub fn last_status(&self) -> Status {
        self.instance
            .as_ref()
            .map(|i| i.last_status())
            .unwrap_or_default()
    }

    pub fn instance(&self) -> Option<&BtInstance> {
        self.instance.as_ref()
    }

    pub fn instance_mut(&mut self) -> Option<&mut BtInstance> {
        self.instance.as_mut()
    }
}

impl std::fmt::Debug for BtPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtPlayer")
            .field("config", &self.config)
            .field("instance", &self.instance)
            .finish()
    }
}
