use std::cell::RefCell;
use std::rc::Rc;

use limbo_bt::{BehaviorTree, BtInstance};
use limbo_core::{SharedPlan, Status};

use crate::state::LimboState;

type SharedInstance = Rc<RefCell<Option<BtInstance>>>;

/// Leaf state that ticks a behavior tree on every update.
///
/// The tree is instantiated once, at setup, against the state's blackboard. A tick that ends in
/// success or failure dispatches the matching event; the next update starts a new run.
pub struct BtState {
    name: String,
    behavior_tree: Rc<BehaviorTree>,
    success_event: String,
    failure_event: String,
    blackboard_plan: Option<SharedPlan>,
    instance: SharedInstance,
}

impl BtState {
    pub fn new(name: impl Into<String>, behavior_tree: Rc<BehaviorTree>) -> Self {
        Self {
            name: name.into(),
            behavior_tree,
            success_event: "success".to_string(),
            failure_event: "failure".to_string(),
            blackboard_plan: None,
            instance: Rc::default(),
        }
    }

    pub fn with_success_event(mut self, event: impl Into<String>) -> Self {
        self.success_event = event.into();
        self
    }

    pub fn with_failure_event(mut self, event: impl Into<String>) -> Self {
        self.failure_event = event.into();
        self
    }

    pub fn with_blackboard_plan(mut self, plan: SharedPlan) -> Self {
        self.blackboard_plan = Some(plan);
        self
    }

    /// Observes the tree instance after the state has been built and added.
    pub fn handle(&self) -> BtStateHandle {
        BtStateHandle {
            instance: self.instance.clone(),
        }
    }

    pub fn into_state(self) -> LimboState {
        let mut state = LimboState::leaf(self.name);
        if let Some(plan) = self.blackboard_plan {
            state = state.with_blackboard_plan(plan);
        }

        let (setup_slot, exit_slot, update_slot) = (
            self.instance.clone(),
            self.instance.clone(),
            self.instance,
        );
        let bt = self.behavior_tree;
        let (success, failure) = (self.success_event, self.failure_event);

        state
            .on_setup(move |ctx| {
                let agent = ctx.agent().cloned();
                match bt.instantiate(agent.clone(), ctx.blackboard(), agent) {
                    Ok(instance) => *setup_slot.borrow_mut() = Some(instance),
                    Err(err) => {
                        tracing::error!(state = %ctx.name(), error = %err, "BtState: cannot instantiate behavior tree")
                    }
                }
            })
            .on_exit(move |_| {
                if let Some(instance) = exit_slot.borrow_mut().as_mut() {
                    instance.abort();
                }
            })
            .on_update(move |ctx| {
                let status = match update_slot.borrow_mut().as_mut() {
                    Some(instance) => instance.update(ctx.delta()),
                    None => return,
                };
                match status {
                    Status::Success => ctx.dispatch(success.clone()),
                    Status::Failure => ctx.dispatch(failure.clone()),
                    Status::Fresh | Status::Running => {}
                }
            })
    }
}

/// Read access to a [`BtState`]'s tree instance.
#[derive(Clone)]
pub struct BtStateHandle {
    instance: SharedInstance,
}

impl BtStateHandle {
    pub fn is_instantiated(&self) -> bool {
        self.instance.borrow().is_some()
    }

    pub fn last_status(&self) -> Status {
        self.instance
            .borrow()
            .as_ref()
            .map(|i| i.last_status())
            .unwrap_or_default()
    }
}
