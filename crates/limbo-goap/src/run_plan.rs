use std::rc::Rc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use limbo_bt::{impl_task_any, BehaviorTree, BtInstance, Task, TaskCategory, TaskCtx};
use limbo_core::{Blackboard, ParamDuplicates, Status, Value};
use limbo_tools::TraceEvent;

use crate::action::{AgentCtx, GoapAction};
use crate::goal::GoapGoal;
use crate::planner::{GoapPlanner, GoapPlannerConfig};
use crate::world_state::{Facts, WorldState};

/// Deepest tree nesting at which a [`RunGoapPlan`] still ticks. Guards against fallback trees
/// that run another planner leaf, directly or through further fallbacks.
pub const MAX_NESTING_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RunGoapPlanConfig {
    /// Minimum seconds between two searches.
    pub replan_cooldown: f64,
    /// Seconds the plan's facts must stay unchanged before a pending replan happens.
    pub replan_debounce: f64,
    pub max_iterations: usize,
}

impl Default for RunGoapPlanConfig {
    fn default() -> Self {
        Self {
            replan_cooldown: 0.2,
            replan_debounce: 0.1,
            max_iterations: GoapPlannerConfig::default().max_iterations,
        }
    }
}

impl RunGoapPlanConfig {
    pub fn with_replan_cooldown(mut self, seconds: f64) -> Self {
        self.replan_cooldown = seconds;
        self
    }

    pub fn with_replan_debounce(mut self, seconds: f64) -> Self {
        self.replan_debounce = seconds;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Leaf that plans toward a goal from the blackboard's facts and runs each planned action's
/// behavior tree in turn.
///
/// Planning samples only the facts named by the goal and the actions. While a plan runs, a
/// change to any precondition of its remaining actions schedules a replan once the facts have
/// settled for `replan_debounce` seconds. No two searches happen within `replan_cooldown`
/// seconds of each other. When no plan exists and the goal does not hold, the fallback tree
/// runs instead; without one the leaf fails.
pub struct RunGoapPlan {
    goal: Option<GoapGoal>,
    actions: Vec<Rc<GoapAction>>,
    fallback_tree: Option<Rc<BehaviorTree>>,
    config: RunGoapPlanConfig,
    planner: GoapPlanner,

    plan: Vec<Rc<GoapAction>>,
    action_index: usize,
    action_instance: Option<BtInstance>,
    fallback_instance: Option<BtInstance>,
    executing_fallback: bool,
    plan_active: bool,
    interrupt_requested: bool,
    replan_pending: bool,
    since_replan: f64,
    since_facts_changed: f64,
    cached_facts: Facts,
}

impl Default for RunGoapPlan {
    fn default() -> Self {
        Self {
            goal: None,
            actions: Vec::new(),
            fallback_tree: None,
            config: RunGoapPlanConfig::default(),
            planner: GoapPlanner::new(),
            plan: Vec::new(),
            action_index: 0,
            action_instance: None,
            fallback_instance: None,
            executing_fallback: false,
            plan_active: false,
            interrupt_requested: false,
            replan_pending: false,
            since_replan: 0.0,
            since_facts_changed: 0.0,
            cached_facts: Facts::new(),
        }
    }
}

impl RunGoapPlan {
    pub fn new(goal: GoapGoal) -> Self {
        Self {
            goal: Some(goal),
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: impl Into<Rc<GoapAction>>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn with_actions(mut self, actions: impl IntoIterator<Item = Rc<GoapAction>>) -> Self {
        self.actions.extend(actions);
        self
    }

    pub fn with_fallback_tree(mut self, tree: Rc<BehaviorTree>) -> Self {
        self.fallback_tree = Some(tree);
        self
    }

    pub fn with_config(mut self, config: RunGoapPlanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn goal(&self) -> Option<&GoapGoal> {
        self.goal.as_ref()
    }

    pub fn actions(&self) -> &[Rc<GoapAction>] {
        &self.actions
    }

    pub fn config(&self) -> RunGoapPlanConfig {
        self.config
    }

    /// Forces a replan on the next tick, subject to the cooldown.
    pub fn interrupt(&mut self) {
        self.interrupt_requested = true;
    }

    pub fn current_plan(&self) -> &[Rc<GoapAction>] {
        &self.plan
    }

    pub fn current_action_index(&self) -> usize {
        self.action_index
    }

    pub fn is_plan_active(&self) -> bool {
        self.plan_active
    }

    pub fn planner(&self) -> &GoapPlanner {
        &self.planner
    }

    /// Aborts the running action tree, if any, so its exit callbacks run before it is dropped.
    fn stop_action(&mut self) {
        if let Some(mut instance) = self.action_instance.take() {
            instance.abort();
        }
    }

    fn stop_fallback(&mut self) {
        if let Some(mut instance) = self.fallback_instance.take() {
            instance.abort();
        }
        self.executing_fallback = false;
    }

    fn reset_runtime(&mut self) {
        self.plan.clear();
        self.action_index = 0;
        self.stop_action();
        self.stop_fallback();
        self.plan_active = false;
        self.interrupt_requested = false;
        self.replan_pending = false;
        self.cached_facts.clear();
    }

    fn invalidate_plan(&mut self) {
        self.plan.clear();
        self.action_index = 0;
        self.stop_action();
        self.plan_active = false;
        self.cached_facts.clear();
    }

    /// Goal facts followed by each action's relevant facts, without repeats.
    fn relevant_fact_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .goal
            .as_ref()
            .map(GoapGoal::required_facts)
            .unwrap_or_default();
        for action in &self.actions {
            for name in action.relevant_facts() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn sample_world_state(&self, blackboard: &Blackboard) -> WorldState {
        let mut state = WorldState::new();
        let names = self.relevant_fact_names();
        state.populate_from_blackboard(blackboard, names.iter().map(String::as_str));
        state
    }

    /// Remembers the preconditions of the actions still ahead in the plan.
    fn cache_plan_facts(&mut self, blackboard: &Blackboard) {
        self.cached_facts.clear();
        for action in self.plan.iter().skip(self.action_index) {
            for name in action.preconditions().keys() {
                if !self.cached_facts.contains_key(name) {
                    let value = blackboard.get_var(name, Value::Nil, false);
                    self.cached_facts.insert(name.clone(), value);
                }
            }
        }
    }

    fn plan_facts_changed(&self, blackboard: &Blackboard) -> bool {
        self.cached_facts
            .iter()
            .any(|(name, cached)| !blackboard.get_var(name, Value::Nil, false).matches(cached))
    }

    fn nested_instance(&self, tree: &BehaviorTree, ctx: &TaskCtx<'_>) -> Option<BtInstance> {
        let agent = ctx.agent();
        match tree.instantiate(agent, &ctx.blackboard(), ctx.scene_root()) {
            Ok(mut instance) => {
                instance.set_nesting_depth(ctx.nesting_depth() + 1);
                instance.set_trace_sink(ctx.trace_sink());
                Some(instance)
            }
            Err(err) => {
                tracing::error!(task = %ctx.id(), error = %err, "RunGoapPlan: cannot instantiate tree");
                None
            }
        }
    }

    fn run_fallback(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        let Some(tree) = self.fallback_tree.clone() else {
            return Status::Failure;
        };
        if self.fallback_instance.is_none() {
            let Some(instance) = self.nested_instance(&tree, ctx) else {
                return Status::Failure;
            };
            ctx.trace(TraceEvent::new(0, "goap.fallback").with_label(self.goal_name()));
            self.fallback_instance = Some(instance);
            self.executing_fallback = true;
        }
        let status = match self.fallback_instance.as_mut() {
            Some(instance) => instance.update(ctx.delta()),
            None => Status::Failure,
        };
        if status != Status::Running {
            self.stop_fallback();
        }
        status
    }

    fn goal_name(&self) -> String {
        self.goal
            .as_ref()
            .map(|g| g.name.clone())
            .unwrap_or_default()
    }

    /// Searches from the sampled facts. Returns a status when the tick ends here.
    fn replan(&mut self, ctx: &mut TaskCtx<'_>, blackboard: &Blackboard) -> Option<Status> {
        self.stop_action();
        let world = self.sample_world_state(blackboard);
        let agent = ctx.agent();
        let agent_ctx = AgentCtx::new(agent.as_ref(), Some(blackboard));
        let goal = self.goal.clone().unwrap_or_default();

        self.plan = self.planner.plan(&self.actions, &world, &goal, &agent_ctx);
        self.action_index = 0;
        self.interrupt_requested = false;
        self.since_replan = 0.0;
        self.replan_pending = false;

        tracing::debug!(
            task = %ctx.id(),
            goal = %goal.name,
            steps = self.plan.len(),
            iterations = self.planner.last_iterations(),
            "RunGoapPlan: replanned"
        );
        ctx.trace(
            TraceEvent::new(0, "goap.replan")
                .with_a(self.plan.len() as u64)
                .with_b(self.planner.last_iterations() as u64)
                .with_label(goal.name.clone()),
        );

        if self.plan.is_empty() {
            self.plan_active = false;
            if self.goal.is_some() && goal.is_satisfied(&world) {
                return Some(Status::Success);
            }
            return Some(self.run_fallback(ctx));
        }
        self.plan_active = true;
        self.cache_plan_facts(blackboard);
        None
    }
}

impl Task for RunGoapPlan {
    fn category(&self) -> TaskCategory {
        TaskCategory::Action
    }

    fn type_name(&self) -> &'static str {
        "RunGoapPlan"
    }

    fn generated_name(&self) -> String {
        match &self.goal {
            Some(goal) => format!("RunGoapPlan: {}", goal.name),
            None => "RunGoapPlan".to_string(),
        }
    }

    fn setup(&mut self, _ctx: &mut TaskCtx<'_>) {
        self.planner
            .set_max_iterations(self.config.max_iterations);
    }

    fn enter(&mut self, _ctx: &mut TaskCtx<'_>) {
        self.reset_runtime();
        // The first tick may plan right away.
        self.since_replan = self.config.replan_cooldown;
        self.since_facts_changed = self.config.replan_debounce;
    }

    fn exit(&mut self, _ctx: &mut TaskCtx<'_>) {
        self.stop_action();
        self.stop_fallback();
        self.plan_active = false;
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if ctx.nesting_depth() >= MAX_NESTING_DEPTH {
            tracing::error!(
                task = %ctx.id(),
                depth = ctx.nesting_depth(),
                "RunGoapPlan: maximum nesting depth exceeded, the fallback tree may recurse"
            );
            return Status::Failure;
        }

        self.since_replan += ctx.delta();
        self.since_facts_changed += ctx.delta();

        if self.executing_fallback {
            let status = self.run_fallback(ctx);
            if status != Status::Running {
                self.invalidate_plan();
            }
            return status;
        }

        let blackboard = ctx.blackboard();
        if self.plan_active && self.plan_facts_changed(&blackboard) {
            self.since_facts_changed = 0.0;
            self.replan_pending = true;
            self.cache_plan_facts(&blackboard);
        }

        let need_immediate = !self.plan_active || self.plan.is_empty() || self.interrupt_requested;
        let debounce_ready =
            self.replan_pending && self.since_facts_changed >= self.config.replan_debounce;
        let cooldown_ready = self.since_replan >= self.config.replan_cooldown;

        if (need_immediate || debounce_ready) && cooldown_ready {
            if let Some(status) = self.replan(ctx, &blackboard) {
                return status;
            }
        } else if !self.plan_active {
            // A replan is due but the cooldown holds it back.
            return Status::Running;
        }

        let Some(action) = self.plan.get(self.action_index).cloned() else {
            self.plan_active = false;
            return Status::Success;
        };

        if self.action_instance.is_none() {
            let agent = ctx.agent();
            let agent_ctx = AgentCtx::new(agent.as_ref(), Some(&blackboard));
            if !action.check_procedural_preconditions(&agent_ctx) {
                tracing::debug!(task = %ctx.id(), action = action.name(), "RunGoapPlan: procedural precondition failed");
                self.invalidate_plan();
                return Status::Running;
            }
            let Some(tree) = action.execution_tree().cloned() else {
                tracing::error!(task = %ctx.id(), action = action.name(), "RunGoapPlan: action has no execution tree");
                self.invalidate_plan();
                return Status::Failure;
            };
            let Some(instance) = self.nested_instance(&tree, ctx) else {
                self.invalidate_plan();
                return Status::Failure;
            };
            ctx.trace(
                TraceEvent::new(0, "goap.action")
                    .with_a(self.action_index as u64)
                    .with_label(action.name()),
            );
            self.action_instance = Some(instance);
        }

        let status = match self.action_instance.as_mut() {
            Some(instance) => instance.update(ctx.delta()),
            None => Status::Failure,
        };
        match status {
            Status::Success => {
                self.stop_action();
                self.action_index += 1;
                self.cache_plan_facts(&blackboard);
                if self.action_index >= self.plan.len() {
                    self.plan_active = false;
                    return Status::Success;
                }
                Status::Running
            }
            Status::Failure => {
                tracing::debug!(task = %ctx.id(), action = action.name(), "RunGoapPlan: action failed, replanning");
                self.invalidate_plan();
                Status::Running
            }
            Status::Fresh | Status::Running => Status::Running,
        }
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(RunGoapPlan {
            goal: self.goal.clone(),
            actions: self.actions.clone(),
            fallback_tree: self.fallback_tree.clone(),
            config: self.config,
            ..RunGoapPlan::default()
        })
    }

    fn configuration_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.goal.is_none() {
            warnings.push("Goal is not set.".to_string());
        }
        if self.actions.is_empty() {
            warnings.push("No actions available for planning.".to_string());
        }
        if self
            .actions
            .iter()
            .any(|a| a.execution_tree().is_none())
        {
            warnings.push("Some actions have no execution tree.".to_string());
        }
        warnings
    }

    impl_task_any!();
}
