use limbo_core::{Blackboard, ObjectRef, SharedPlan, Status};
use limbo_tools::{BehaviorTreeData, SharedTraceSink};

use crate::error::BtError;
use crate::task::Task;
use crate::tree::{CloneMode, TaskId, TaskTree};

/// Authored behavior tree: a task template plus metadata.
///
/// The template is never ticked. [`BehaviorTree::instantiate`] produces an independent runtime
/// copy per agent.
#[derive(Debug, Default)]
pub struct BehaviorTree {
    description: String,
    blackboard_plan: Option<SharedPlan>,
    tasks: TaskTree,
    root: Option<TaskId>,
}

impl BehaviorTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn blackboard_plan(&self) -> Option<SharedPlan> {
        self.blackboard_plan.clone()
    }

    pub fn set_blackboard_plan(&mut self, plan: Option<SharedPlan>) {
        self.blackboard_plan = plan;
    }

    pub fn tasks(&self) -> &TaskTree {
        &self.tasks
    }

    /// Task arena for authoring.
    pub fn tasks_mut(&mut self) -> &mut TaskTree {
        &mut self.tasks
    }

    pub fn root(&self) -> Option<TaskId> {
        self.root
    }

    /// Makes `root` the root task. It must belong to [`BehaviorTree::tasks`].
    pub fn set_root(&mut self, root: Option<TaskId>) {
        self.root = root.filter(|id| self.tasks.contains(*id));
    }

    /// Adds `task` to the arena and makes it the root.
    pub fn set_root_task(&mut self, task: impl Task) -> TaskId {
        let id = self.tasks.add(task);
        self.root = Some(id);
        id
    }

    /// Deep authoring copy. Comments and disabled tasks are kept.
    pub fn duplicate(&self) -> BehaviorTree {
        let mut tasks = TaskTree::new();
        let root = self
            .root
            .and_then(|r| self.tasks.copy_subtree(r, &mut tasks, CloneMode::Authoring));
        BehaviorTree {
            description: self.description.clone(),
            blackboard_plan: self.blackboard_plan.clone(),
            tasks,
            root,
        }
    }

    /// Clones the template and initializes the copy for `agent`.
    ///
    /// Every task of the copy uses `blackboard` unless a scope-creating task sits above it.
    pub fn instantiate(
        &self,
        agent: Option<ObjectRef>,
        blackboard: &Blackboard,
        scene_root: Option<ObjectRef>,
    ) -> Result<BtInstance, BtError> {
        let Some(template_root) = self.root else {
            tracing::error!(tree = %self.description, "BehaviorTree: instantiation failed, no root task");
            return Err(BtError::NoRootTask);
        };
        let mut tasks = TaskTree::new();
        let Some(root) = self
            .tasks
            .copy_subtree(template_root, &mut tasks, CloneMode::Runtime)
        else {
            tracing::error!(tree = %self.description, "BehaviorTree: instantiation failed, root task is disabled");
            return Err(BtError::NoRootTask);
        };
        tasks.initialize(root, agent, blackboard, scene_root);
        tracing::debug!(tree = %self.description, tasks = tasks.len(), "behavior tree instantiated");
        Ok(BtInstance {
            tasks,
            root,
            blackboard: blackboard.clone(),
            last_status: Status::Fresh,
            source: self.description.clone(),
        })
    }
}

/// Runtime copy of a [`BehaviorTree`] bound to one agent.
#[derive(Debug)]
pub struct BtInstance {
    tasks: TaskTree,
    root: TaskId,
    blackboard: Blackboard,
    last_status: Status,
    source: String,
}

impl BtInstance {
    /// Advances the tree clock by `delta` and ticks the root.
    pub fn update(&mut self, delta: f64) -> Status {
        self.tasks.advance(delta);
        self.last_status = self.tasks.execute(self.root, delta);
        self.last_status
    }

    /// Aborts every running task and resets the tree to fresh.
    pub fn abort(&mut self) {
        self.tasks.abort(self.root);
        self.last_status = Status::Fresh;
    }

    pub fn last_status(&self) -> Status {
        self.last_status
    }

    pub fn root_task(&self) -> TaskId {
        self.root
    }

    pub fn tasks(&self) -> &TaskTree {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut TaskTree {
        &mut self.tasks
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn agent(&self) -> Option<ObjectRef> {
        self.tasks.agent()
    }

    /// Description of the tree this instance was made from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.tasks.set_seed(seed);
    }

    pub fn set_trace_sink(&mut self, sink: Option<SharedTraceSink>) {
        self.tasks.set_trace_sink(sink);
    }

    /// Marks this instance as running inside a task of another tree `depth` levels down.
    pub fn set_nesting_depth(&mut self, depth: usize) {
        self.tasks.set_nesting_depth(depth);
    }

    pub fn snapshot(&self) -> BehaviorTreeData {
        let mut data = self.tasks.snapshot(self.root);
        data.source_path = self.source.clone();
        data
    }
}
