//! Decorator tasks: wrap a single child and reshape its result.

use std::rc::Rc;

use limbo_core::{
    Blackboard, DeterministicRng, ParamDuplicates, SharedPlan, Status, Value,
};

use crate::behavior_tree::BehaviorTree;
use crate::impl_task_any;
use crate::task::{InitCtx, Task, TaskCategory, TaskCtx};

fn no_child(ctx: &TaskCtx<'_>, kind: &str) -> bool {
    if ctx.child_count() == 0 {
        tracing::error!(task = %ctx.id(), kind, "decorator has no child");
        return true;
    }
    false
}

macro_rules! simple_decorator {
    ($(#[$doc:meta])* $name:ident, $label:literal, |$status:ident| $map:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default)]
        pub struct $name;

        impl $name {
            pub fn new() -> Self {
                Self
            }
        }

        impl Task for $name {
            fn category(&self) -> TaskCategory {
                TaskCategory::Decorator
            }

            fn type_name(&self) -> &'static str {
                $label
            }

            fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
                if no_child(ctx, $label) {
                    return Status::Failure;
                }
                let $status = ctx.execute_child(0, ctx.delta());
                $map
            }

            fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
                Box::new(Self)
            }

            impl_task_any!();
        }
    };
}

simple_decorator!(
    /// Fails whenever the child finishes.
    AlwaysFail, "AlwaysFail", |status| match status {
        Status::Running => Status::Running,
        _ => Status::Failure,
    }
);

simple_decorator!(
    /// Succeeds whenever the child finishes.
    AlwaysSucceed, "AlwaysSucceed", |status| match status {
        Status::Running => Status::Running,
        _ => Status::Success,
    }
);

simple_decorator!(
    /// Swaps success and failure.
    Invert, "Invert", |status| match status {
        Status::Success => Status::Failure,
        Status::Failure => Status::Success,
        other => other,
    }
);

simple_decorator!(
    /// Reruns the child until it fails, then succeeds.
    RepeatUntilFailure, "RepeatUntilFailure", |status| match status {
        Status::Failure => Status::Success,
        _ => Status::Running,
    }
);

simple_decorator!(
    /// Reruns the child until it succeeds.
    RepeatUntilSuccess, "RepeatUntilSuccess", |status| match status {
        Status::Success => Status::Success,
        _ => Status::Running,
    }
);

/// Runs the child `times` times, or forever.
#[derive(Debug, Clone)]
pub struct Repeat {
    pub times: u32,
    pub forever: bool,
    pub abort_on_failure: bool,
    iteration: u32,
}

impl Default for Repeat {
    fn default() -> Self {
        Self {
            times: 1,
            forever: false,
            abort_on_failure: false,
            iteration: 0,
        }
    }
}

impl Repeat {
    pub fn times(times: u32) -> Self {
        Self {
            times,
            ..Self::default()
        }
    }

    pub fn forever() -> Self {
        Self {
            forever: true,
            ..Self::default()
        }
    }

    pub fn with_abort_on_failure(mut self, abort: bool) -> Self {
        self.abort_on_failure = abort;
        self
    }
}

impl Task for Repeat {
    fn category(&self) -> TaskCategory {
        TaskCategory::Decorator
    }

    fn type_name(&self) -> &'static str {
        "Repeat"
    }

    fn generated_name(&self) -> String {
        if self.forever {
            "Repeat forever".to_string()
        } else {
            format!("Repeat x{}", self.times)
        }
    }

    fn enter(&mut self, _ctx: &mut TaskCtx<'_>) {
        self.iteration = 1;
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if no_child(ctx, "Repeat") {
            return Status::Failure;
        }
        let status = ctx.execute_child(0, ctx.delta());
        if status == Status::Running {
            Status::Running
        } else if status == Status::Failure && self.abort_on_failure {
            Status::Failure
        } else if !self.forever && self.iteration >= self.times {
            Status::Success
        } else {
            self.iteration += 1;
            Status::Running
        }
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self {
            iteration: 0,
            ..self.clone()
        })
    }

    impl_task_any!();
}

/// Which child results count against a [`RunLimit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountPolicy {
    CountSuccessful,
    CountFailed,
    #[default]
    CountAll,
}

/// Lets the child finish at most `run_limit` times over the life of the instance, then fails.
#[derive(Debug, Clone)]
pub struct RunLimit {
    pub run_limit: u32,
    pub count_policy: CountPolicy,
    num_runs: u32,
}

impl Default for RunLimit {
    fn default() -> Self {
        Self {
            run_limit: 1,
            count_policy: CountPolicy::CountAll,
            num_runs: 0,
        }
    }
}

impl RunLimit {
    pub fn new(run_limit: u32) -> Self {
        Self {
            run_limit,
            ..Self::default()
        }
    }

    pub fn with_count_policy(mut self, policy: CountPolicy) -> Self {
        self.count_policy = policy;
        self
    }

    pub fn num_runs(&self) -> u32 {
        self.num_runs
    }
}

impl Task for RunLimit {
    fn category(&self) -> TaskCategory {
        TaskCategory::Decorator
    }

    fn type_name(&self) -> &'static str {
        "RunLimit"
    }

    fn generated_name(&self) -> String {
        format!("RunLimit x{}", self.run_limit)
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if no_child(ctx, "RunLimit") {
            return Status::Failure;
        }
        if self.num_runs >= self.run_limit {
            return Status::Failure;
        }
        let status = ctx.execute_child(0, ctx.delta());
        let counts = match self.count_policy {
            CountPolicy::CountSuccessful => status == Status::Success,
            CountPolicy::CountFailed => status == Status::Failure,
            CountPolicy::CountAll => status != Status::Running,
        };
        if counts {
            self.num_runs += 1;
        }
        status
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self {
            num_runs: 0,
            ..self.clone()
        })
    }

    impl_task_any!();
}

/// Fails and aborts the child if it is still running after `time_limit` seconds.
#[derive(Debug, Clone)]
pub struct TimeLimit {
    pub time_limit: f64,
}

impl TimeLimit {
    pub fn new(time_limit: f64) -> Self {
        Self { time_limit }
    }
}

impl Task for TimeLimit {
    fn category(&self) -> TaskCategory {
        TaskCategory::Decorator
    }

    fn type_name(&self) -> &'static str {
        "TimeLimit"
    }

    fn generated_name(&self) -> String {
        format!("TimeLimit {}s", self.time_limit)
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if no_child(ctx, "TimeLimit") {
            return Status::Failure;
        }
        let status = ctx.execute_child(0, ctx.delta());
        if status == Status::Running && ctx.elapsed() >= self.time_limit {
            ctx.abort_child(0);
            return Status::Failure;
        }
        status
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(self.clone())
    }

    impl_task_any!();
}

/// After the child succeeds (or fails, with `trigger_on_failure`), fails immediately for
/// `duration` seconds of tree time.
///
/// The cooling state lives in the blackboard variable `cooldown_state_var` so other tasks can
/// observe it. When left empty, a name unique to this task is used.
#[derive(Debug, Clone, Default)]
pub struct Cooldown {
    pub duration: f64,
    pub trigger_on_failure: bool,
    pub start_cooled: bool,
    pub cooldown_state_var: String,
    ready_at: Option<f64>,
}

impl Cooldown {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn with_trigger_on_failure(mut self, trigger: bool) -> Self {
        self.trigger_on_failure = trigger;
        self
    }

    pub fn with_start_cooled(mut self, start_cooled: bool) -> Self {
        self.start_cooled = start_cooled;
        self
    }

    pub fn with_state_var(mut self, name: impl Into<String>) -> Self {
        self.cooldown_state_var = name.into();
        self
    }

    fn chill(&mut self, ctx: &TaskCtx<'_>) {
        ctx.blackboard().set_var(&self.cooldown_state_var, true);
        self.ready_at = Some(ctx.now() + self.duration);
    }

    fn refresh(&mut self, ctx: &TaskCtx<'_>) {
        if let Some(ready_at) = self.ready_at {
            if ctx.now() >= ready_at {
                ctx.blackboard().set_var(&self.cooldown_state_var, false);
                self.ready_at = None;
            }
        }
    }
}

impl Task for Cooldown {
    fn category(&self) -> TaskCategory {
        TaskCategory::Decorator
    }

    fn type_name(&self) -> &'static str {
        "Cooldown"
    }

    fn generated_name(&self) -> String {
        format!("Cooldown {}s", self.duration)
    }

    fn setup(&mut self, ctx: &mut TaskCtx<'_>) {
        if self.cooldown_state_var.is_empty() {
            self.cooldown_state_var = format!("_cd_{}", ctx.id().index());
        }
        ctx.blackboard().set_var(&self.cooldown_state_var, false);
        if self.start_cooled {
            self.chill(ctx);
        }
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if no_child(ctx, "Cooldown") {
            return Status::Failure;
        }
        self.refresh(ctx);
        if ctx
            .blackboard()
            .get_var(&self.cooldown_state_var, Value::Bool(true), true)
            .truthy()
        {
            return Status::Failure;
        }
        let status = ctx.execute_child(0, ctx.delta());
        if status == Status::Success || (self.trigger_on_failure && status == Status::Failure) {
            self.chill(ctx);
        }
        status
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self {
            ready_at: None,
            ..self.clone()
        })
    }

    impl_task_any!();
}

/// Waits `seconds` before running the child.
#[derive(Debug, Clone)]
pub struct Delay {
    pub seconds: f64,
}

impl Delay {
    pub fn new(seconds: f64) -> Self {
        Self { seconds }
    }
}

impl Task for Delay {
    fn category(&self) -> TaskCategory {
        TaskCategory::Decorator
    }

    fn type_name(&self) -> &'static str {
        "Delay"
    }

    fn generated_name(&self) -> String {
        format!("Delay {}s", self.seconds)
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if no_child(ctx, "Delay") {
            return Status::Failure;
        }
        if ctx.elapsed() <= self.seconds {
            return Status::Running;
        }
        ctx.execute_child(0, ctx.delta())
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(self.clone())
    }

    impl_task_any!();
}

/// Runs the child with probability `run_chance` (0..=1), failing otherwise. A running child is
/// always continued.
#[derive(Debug, Clone)]
pub struct Probability {
    pub run_chance: f64,
}

impl Probability {
    pub fn new(run_chance: f64) -> Self {
        Self {
            run_chance: run_chance.clamp(0.0, 1.0),
        }
    }
}

impl Task for Probability {
    fn category(&self) -> TaskCategory {
        TaskCategory::Decorator
    }

    fn type_name(&self) -> &'static str {
        "Probability"
    }

    fn generated_name(&self) -> String {
        format!("Probability {:.1}%", self.run_chance * 100.0)
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if no_child(ctx, "Probability") {
            return Status::Failure;
        }
        if ctx.child_status(0) == Status::Running || ctx.rng().next_f64_unit() < self.run_chance {
            return ctx.execute_child(0, ctx.delta());
        }
        Status::Failure
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(self.clone())
    }

    impl_task_any!();
}

/// Gives its subtree a new blackboard scope, optionally populated from a plan.
#[derive(Debug, Clone, Default)]
pub struct NewScope {
    pub blackboard_plan: Option<SharedPlan>,
}

impl NewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(plan: SharedPlan) -> Self {
        Self {
            blackboard_plan: Some(plan),
        }
    }
}

fn new_scope(ctx: &InitCtx<'_>, plan: Option<&SharedPlan>) -> Blackboard {
    match plan {
        Some(plan) => plan
            .borrow()
            .create_blackboard(ctx.scene_root().as_ref(), Some(ctx.blackboard())),
        None => Blackboard::with_parent(ctx.blackboard()),
    }
}

impl Task for NewScope {
    fn category(&self) -> TaskCategory {
        TaskCategory::Decorator
    }

    fn type_name(&self) -> &'static str {
        "NewScope"
    }

    fn prepare(&mut self, ctx: &mut InitCtx<'_>) -> Option<Blackboard> {
        Some(new_scope(ctx, self.blackboard_plan.as_ref()))
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if no_child(ctx, "NewScope") {
            return Status::Failure;
        }
        ctx.execute_child(0, ctx.delta())
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(self.clone())
    }

    impl_task_any!();
}

/// Runs the child once per element of the array in `array_var`, storing the element in
/// `save_var` first. Fails as soon as the child fails.
#[derive(Debug, Clone, Default)]
pub struct ForEach {
    pub array_var: String,
    pub save_var: String,
    index: usize,
}

impl ForEach {
    pub fn new(array_var: impl Into<String>, save_var: impl Into<String>) -> Self {
        Self {
            array_var: array_var.into(),
            save_var: save_var.into(),
            index: 0,
        }
    }
}

impl Task for ForEach {
    fn category(&self) -> TaskCategory {
        TaskCategory::Decorator
    }

    fn type_name(&self) -> &'static str {
        "ForEach"
    }

    fn generated_name(&self) -> String {
        format!("ForEach ${} in ${}", self.save_var, self.array_var)
    }

    fn enter(&mut self, _ctx: &mut TaskCtx<'_>) {
        self.index = 0;
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if no_child(ctx, "ForEach") {
            return Status::Failure;
        }
        if self.save_var.is_empty() || self.array_var.is_empty() {
            tracing::error!(task = %ctx.id(), "ForEach variables are not set");
            return Status::Failure;
        }
        let bb = ctx.blackboard();
        let array = bb.get_var(&self.array_var, Value::Nil, true);
        let items = array.as_array().unwrap_or(&[]);
        if items.is_empty() {
            return Status::Success;
        }
        let Some(item) = items.get(self.index) else {
            return Status::Success;
        };
        bb.set_var(&self.save_var, item.clone());

        match ctx.execute_child(0, ctx.delta()) {
            Status::Running => Status::Running,
            Status::Failure => Status::Failure,
            _ if self.index + 1 >= items.len() => Status::Success,
            _ => {
                self.index += 1;
                Status::Running
            }
        }
    }

    fn configuration_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.array_var.is_empty() {
            warnings.push("Array variable is not set.".to_string());
        }
        if self.save_var.is_empty() {
            warnings.push("Save variable is not set.".to_string());
        }
        warnings
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self::new(self.array_var.clone(), self.save_var.clone()))
    }

    impl_task_any!();
}

/// Runs a copy of another behavior tree in a new blackboard scope.
///
/// The copy is made when the instance is initialized, so the subtree shows up as this task's
/// only child at runtime. Scope variables follow the subtree's blackboard plan.
#[derive(Clone, Default)]
pub struct Subtree {
    pub subtree: Option<Rc<BehaviorTree>>,
}

impl Subtree {
    pub fn new(subtree: Rc<BehaviorTree>) -> Self {
        Self {
            subtree: Some(subtree),
        }
    }
}

impl Task for Subtree {
    fn category(&self) -> TaskCategory {
        TaskCategory::Decorator
    }

    fn type_name(&self) -> &'static str {
        "Subtree"
    }

    fn generated_name(&self) -> String {
        match &self.subtree {
            None => "Subtree (unassigned)".to_string(),
            Some(bt) if bt.description().is_empty() => "Subtree".to_string(),
            Some(bt) => format!("Subtree \"{}\"", bt.description()),
        }
    }

    fn prepare(&mut self, ctx: &mut InitCtx<'_>) -> Option<Blackboard> {
        let Some(bt) = self.subtree.clone() else {
            tracing::error!(task = %ctx.id(), "subtree is not assigned");
            return None;
        };
        if ctx.child_count() != 0 {
            tracing::error!(task = %ctx.id(), "subtree task shouldn't have children during initialization");
            return None;
        }
        let Some(root) = bt.root() else {
            tracing::error!(task = %ctx.id(), "subtree has no root task");
            return None;
        };
        ctx.graft(bt.tasks(), root);
        Some(new_scope(ctx, bt.blackboard_plan().as_ref()))
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if no_child(ctx, "Subtree") {
            return Status::Failure;
        }
        ctx.execute_child(0, ctx.delta())
    }

    fn checks_child_count(&self) -> bool {
        false
    }

    fn configuration_warnings(&self) -> Vec<String> {
        if self.subtree.is_none() {
            vec!["Subtree needs to be assigned.".to_string()]
        } else {
            Vec::new()
        }
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(self.clone())
    }

    impl_task_any!();
}
