//! Composite tasks: control flow over any number of children.

use limbo_core::{DeterministicRng, ParamDuplicates, Status};

use crate::impl_task_any;
use crate::task::{Task, TaskCategory, TaskCtx};

/// Runs children in order until one fails. Resumes a running child on the next tick.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    last_running: usize,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Task for Sequence {
    fn category(&self) -> TaskCategory {
        TaskCategory::Composite
    }

    fn type_name(&self) -> &'static str {
        "Sequence"
    }

    fn enter(&mut self, _ctx: &mut TaskCtx<'_>) {
        self.last_running = 0;
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        let mut status = Status::Success;
        for i in self.last_running..ctx.child_count() {
            status = ctx.execute_child(i, ctx.delta());
            if status != Status::Success {
                self.last_running = i;
                break;
            }
        }
        status
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self::new())
    }

    impl_task_any!();
}

/// Runs children in order until one succeeds. Resumes a running child on the next tick.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    last_running: usize,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Task for Selector {
    fn category(&self) -> TaskCategory {
        TaskCategory::Composite
    }

    fn type_name(&self) -> &'static str {
        "Selector"
    }

    fn enter(&mut self, _ctx: &mut TaskCtx<'_>) {
        self.last_running = 0;
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        let mut status = Status::Failure;
        for i in self.last_running..ctx.child_count() {
            status = ctx.execute_child(i, ctx.delta());
            if status != Status::Failure {
                self.last_running = i;
                break;
            }
        }
        status
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self::new())
    }

    impl_task_any!();
}

/// Like [`Sequence`], but re-evaluates earlier children every tick. When an earlier child stops
/// the run, the previously running child is aborted.
#[derive(Debug, Clone, Default)]
pub struct DynamicSequence {
    last_running: usize,
}

impl DynamicSequence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Task for DynamicSequence {
    fn category(&self) -> TaskCategory {
        TaskCategory::Composite
    }

    fn type_name(&self) -> &'static str {
        "DynamicSequence"
    }

    fn enter(&mut self, _ctx: &mut TaskCtx<'_>) {
        self.last_running = 0;
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        let mut status = Status::Success;
        let mut i = 0;
        while i < ctx.child_count() {
            status = ctx.execute_child(i, ctx.delta());
            if status != Status::Success {
                break;
            }
            i += 1;
        }
        if self.last_running > i && ctx.child_status(self.last_running) == Status::Running {
            ctx.abort_child(self.last_running);
        }
        self.last_running = i;
        status
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self::new())
    }

    impl_task_any!();
}

/// Like [`Selector`], but re-evaluates earlier children every tick. When an earlier child takes
/// over, the previously running child is aborted.
#[derive(Debug, Clone, Default)]
pub struct DynamicSelector {
    last_running: usize,
}

impl DynamicSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Task for DynamicSelector {
    fn category(&self) -> TaskCategory {
        TaskCategory::Composite
    }

    fn type_name(&self) -> &'static str {
        "DynamicSelector"
    }

    fn enter(&mut self, _ctx: &mut TaskCtx<'_>) {
        self.last_running = 0;
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        let mut status = Status::Failure;
        let mut i = 0;
        while i < ctx.child_count() {
            status = ctx.execute_child(i, ctx.delta());
            if status != Status::Failure {
                break;
            }
            i += 1;
        }
        if self.last_running > i && ctx.child_status(self.last_running) == Status::Running {
            ctx.abort_child(self.last_running);
        }
        self.last_running = i;
        status
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self::new())
    }

    impl_task_any!();
}

fn shuffled_order(ctx: &mut TaskCtx<'_>, order: &mut Vec<usize>) {
    let n = ctx.child_count();
    if order.len() != n {
        *order = (0..n).collect();
    }
    ctx.rng().shuffle(order);
}

/// [`Sequence`] over a permutation of the children drawn on each entry.
#[derive(Debug, Clone, Default)]
pub struct RandomSequence {
    last_running: usize,
    order: Vec<usize>,
}

impl RandomSequence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Task for RandomSequence {
    fn category(&self) -> TaskCategory {
        TaskCategory::Composite
    }

    fn type_name(&self) -> &'static str {
        "RandomSequence"
    }

    fn enter(&mut self, ctx: &mut TaskCtx<'_>) {
        self.last_running = 0;
        shuffled_order(ctx, &mut self.order);
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        let mut status = Status::Success;
        for i in self.last_running..self.order.len() {
            status = ctx.execute_child(self.order[i], ctx.delta());
            if status != Status::Success {
                self.last_running = i;
                break;
            }
        }
        status
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self::new())
    }

    impl_task_any!();
}

/// [`Selector`] over a permutation of the children drawn on each entry.
#[derive(Debug, Clone, Default)]
pub struct RandomSelector {
    last_running: usize,
    order: Vec<usize>,
}

impl RandomSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Task for RandomSelector {
    fn category(&self) -> TaskCategory {
        TaskCategory::Composite
    }

    fn type_name(&self) -> &'static str {
        "RandomSelector"
    }

    fn enter(&mut self, ctx: &mut TaskCtx<'_>) {
        self.last_running = 0;
        shuffled_order(ctx, &mut self.order);
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        let mut status = Status::Failure;
        for i in self.last_running..self.order.len() {
            status = ctx.execute_child(self.order[i], ctx.delta());
            if status != Status::Failure {
                self.last_running = i;
                break;
            }
        }
        status
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self::new())
    }

    impl_task_any!();
}

/// Ticks all children every tick.
///
/// Succeeds once `num_successes_required` children succeeded and fails once
/// `num_failures_required` failed, whichever comes first in child order. Without `repeat`,
/// finished children are not ticked again during the run, and a run where every child finished
/// without meeting either threshold fails.
#[derive(Debug, Clone)]
pub struct Parallel {
    pub num_successes_required: usize,
    pub num_failures_required: usize,
    pub repeat: bool,
}

impl Default for Parallel {
    fn default() -> Self {
        Self {
            num_successes_required: 1,
            num_failures_required: 1,
            repeat: false,
        }
    }
}

impl Parallel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_successes_required(mut self, n: usize) -> Self {
        self.num_successes_required = n;
        self
    }

    pub fn with_failures_required(mut self, n: usize) -> Self {
        self.num_failures_required = n;
        self
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }
}

impl Task for Parallel {
    fn category(&self) -> TaskCategory {
        TaskCategory::Composite
    }

    fn type_name(&self) -> &'static str {
        "Parallel"
    }

    fn enter(&mut self, ctx: &mut TaskCtx<'_>) {
        for i in 0..ctx.child_count() {
            ctx.abort_child(i);
        }
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        let mut succeeded = 0;
        let mut failed = 0;
        let mut result = Status::Running;
        let count = ctx.child_count();
        for i in 0..count {
            let previous = ctx.child_status(i);
            let status = if !self.repeat && previous.is_done() {
                previous
            } else {
                ctx.execute_child(i, ctx.delta())
            };
            match status {
                Status::Failure => {
                    failed += 1;
                    if failed >= self.num_failures_required && result == Status::Running {
                        result = Status::Failure;
                    }
                }
                Status::Success => {
                    succeeded += 1;
                    if succeeded >= self.num_successes_required && result == Status::Running {
                        result = Status::Success;
                    }
                }
                _ => {}
            }
        }
        if !self.repeat && succeeded + failed == count && result == Status::Running {
            result = Status::Failure;
        }
        result
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(self.clone())
    }

    fn generated_name(&self) -> String {
        format!(
            "Parallel (succeed: {}, fail: {})",
            self.num_successes_required, self.num_failures_required
        )
    }

    impl_task_any!();
}

/// Picks one child at random, weighted, and runs it. A failed pick is retried with the
/// remaining children unless `abort_on_failure` is set.
#[derive(Debug, Clone, Default)]
pub struct ProbabilitySelector {
    /// Weight per child index. Missing entries weigh 1.
    pub weights: Vec<f64>,
    pub abort_on_failure: bool,
    selected: Option<usize>,
    failed: Vec<usize>,
}

impl ProbabilitySelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_abort_on_failure(mut self, abort: bool) -> Self {
        self.abort_on_failure = abort;
        self
    }

    pub fn weight(&self, index: usize) -> f64 {
        self.weights.get(index).copied().unwrap_or(1.0)
    }

    pub fn set_weight(&mut self, index: usize, weight: f64) {
        if self.weights.len() <= index {
            self.weights.resize(index + 1, 1.0);
        }
        self.weights[index] = weight.max(0.0);
    }

    /// Chance of child `index` being picked first among `child_count` children.
    pub fn probability(&self, index: usize, child_count: usize) -> f64 {
        let total: f64 = (0..child_count).map(|i| self.weight(i)).sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.weight(index) / total
    }

    fn select(&mut self, ctx: &mut TaskCtx<'_>) {
        self.selected = None;
        let count = ctx.child_count();
        let remaining: f64 = (0..count)
            .filter(|i| !self.failed.contains(i))
            .map(|i| self.weight(i))
            .sum();
        let mut roll = ctx.rng().range_f64(0.0, remaining);
        for i in 0..count {
            if self.failed.contains(&i) {
                continue;
            }
            let weight = self.weight(i);
            if weight == 0.0 {
                continue;
            }
            if roll > weight {
                roll -= weight;
                continue;
            }
            self.selected = Some(i);
            break;
        }
    }
}

impl Task for ProbabilitySelector {
    fn category(&self) -> TaskCategory {
        TaskCategory::Composite
    }

    fn type_name(&self) -> &'static str {
        "ProbabilitySelector"
    }

    fn enter(&mut self, ctx: &mut TaskCtx<'_>) {
        self.failed.clear();
        self.select(ctx);
    }

    fn exit(&mut self, _ctx: &mut TaskCtx<'_>) {
        self.failed.clear();
        self.selected = None;
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        while let Some(index) = self.selected {
            let status = ctx.execute_child(index, ctx.delta());
            if status != Status::Failure {
                return status;
            }
            if self.abort_on_failure {
                return Status::Failure;
            }
            self.failed.push(index);
            self.select(ctx);
        }
        Status::Failure
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self {
            weights: self.weights.clone(),
            abort_on_failure: self.abort_on_failure,
            ..Self::default()
        })
    }

    impl_task_any!();
}
