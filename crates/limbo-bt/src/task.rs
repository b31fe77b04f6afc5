use std::any::Any;

use limbo_core::{Blackboard, ObjectRef, ParamDuplicates, SplitMix64, Status};
use limbo_tools::TraceEvent;

use crate::tree::{CloneMode, TaskId, TaskTree};

/// Structural role of a task. Determines the child-count contract checked by
/// [`TaskTree::configuration_warnings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskCategory {
    Action,
    Condition,
    Composite,
    Decorator,
    /// Authoring-only annotation; dropped from runtime trees.
    Comment,
}

/// Behavior of one node in a [`TaskTree`].
///
/// The tree owns structure and bookkeeping (status, elapsed time, blackboard scope); a `Task`
/// only supplies the hooks. Hooks receive a [`TaskCtx`] for reaching children and shared state.
pub trait Task: 'static {
    fn category(&self) -> TaskCategory;

    fn type_name(&self) -> &'static str;

    /// Display name used when no custom name is set.
    fn generated_name(&self) -> String {
        self.type_name().to_string()
    }

    /// Runs before the task's children are initialized. Returning a blackboard gives this task
    /// and its subtree a new scope.
    fn prepare(&mut self, _ctx: &mut InitCtx<'_>) -> Option<Blackboard> {
        None
    }

    /// Once per instance, after the children are initialized.
    fn setup(&mut self, _ctx: &mut TaskCtx<'_>) {}

    fn enter(&mut self, _ctx: &mut TaskCtx<'_>) {}

    fn exit(&mut self, _ctx: &mut TaskCtx<'_>) {}

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        tracing::error!(task = %ctx.id(), kind = self.type_name(), "tick is not implemented");
        Status::Failure
    }

    /// Copy used when a tree is cloned. BbParam fields go through `params` so that parameters
    /// shared between fields stay shared in the copy.
    fn clone_task(&self, params: &mut ParamDuplicates) -> Box<dyn Task>;

    /// Task-specific lint on top of the category's child-count check.
    fn configuration_warnings(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the category's child-count contract applies at design time.
    fn checks_child_count(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Access handed to task hooks while they run.
pub struct TaskCtx<'a> {
    pub(crate) tree: &'a mut TaskTree,
    pub(crate) id: TaskId,
    pub(crate) delta: f64,
}

impl<'a> TaskCtx<'a> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Time step of the current tick. Zero outside of ticking.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Seconds this task has been running, excluding the entering tick.
    pub fn elapsed(&self) -> f64 {
        self.tree.elapsed(self.id)
    }

    pub fn status(&self) -> Status {
        self.tree.status(self.id)
    }

    pub fn child_count(&self) -> usize {
        self.tree.get_child_count(self.id)
    }

    pub fn child(&self, index: usize) -> Option<TaskId> {
        self.tree.get_child(self.id, index)
    }

    pub fn child_status(&self, index: usize) -> Status {
        self.child(index)
            .map(|c| self.tree.status(c))
            .unwrap_or_default()
    }

    /// Executes child `index`. A missing child fails.
    pub fn execute_child(&mut self, index: usize, delta: f64) -> Status {
        match self.child(index) {
            Some(child) => self.tree.execute(child, delta),
            None => {
                tracing::error!(task = %self.id, index, "no child at index");
                Status::Failure
            }
        }
    }

    pub fn abort_child(&mut self, index: usize) {
        if let Some(child) = self.child(index) {
            self.tree.abort(child);
        }
    }

    pub fn blackboard(&self) -> Blackboard {
        self.tree.blackboard(self.id).unwrap_or_default()
    }

    pub fn agent(&self) -> Option<ObjectRef> {
        self.tree.agent()
    }

    pub fn scene_root(&self) -> Option<ObjectRef> {
        self.tree.scene_root()
    }

    pub fn rng(&mut self) -> &mut SplitMix64 {
        self.tree.rng_mut()
    }

    /// Seconds of simulated time since the tree instance started.
    pub fn now(&self) -> f64 {
        self.tree.clock()
    }

    /// How many tree instances deep this tree is nested inside other running tasks.
    pub fn nesting_depth(&self) -> usize {
        self.tree.nesting_depth()
    }

    pub fn trace_sink(&self) -> Option<limbo_tools::SharedTraceSink> {
        self.tree.trace_sink()
    }

    /// Emits a trace event stamped with the current tick, if a sink is attached.
    pub fn trace(&self, event: TraceEvent) {
        let mut event = event;
        event.tick = self.tree.ticks();
        limbo_tools::emit(self.tree.trace_sink().as_ref(), event);
    }
}

/// Access handed to [`Task::prepare`] during initialization.
pub struct InitCtx<'a> {
    pub(crate) tree: &'a mut TaskTree,
    pub(crate) id: TaskId,
    pub(crate) blackboard: Blackboard,
}

impl<'a> InitCtx<'a> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Scope inherited from the parent task.
    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn agent(&self) -> Option<ObjectRef> {
        self.tree.agent()
    }

    pub fn scene_root(&self) -> Option<ObjectRef> {
        self.tree.scene_root()
    }

    pub fn child_count(&self) -> usize {
        self.tree.get_child_count(self.id)
    }

    /// Copies the subtree at `root` of `source` into this tree as the last child of the task
    /// being prepared. Returns `None` if nothing was copied.
    pub fn graft(&mut self, source: &TaskTree, root: TaskId) -> Option<TaskId> {
        let copy = source.copy_subtree(root, self.tree, CloneMode::Runtime)?;
        match self.tree.add_child(self.id, copy) {
            Ok(()) => Some(copy),
            Err(_) => None,
        }
    }
}

/// Implements [`Task::as_any`] and [`Task::as_any_mut`] inside an `impl Task` block.
#[macro_export]
macro_rules! impl_task_any {
    () => {
        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}
