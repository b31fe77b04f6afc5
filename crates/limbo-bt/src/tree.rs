use std::fmt;
use std::fmt::Write as _;

use limbo_core::{Blackboard, ObjectRef, ParamDuplicates, SplitMix64, Status};
use limbo_tools::{BehaviorTreeData, SharedTraceSink, TaskData};

use crate::error::TreeError;
use crate::task::{InitCtx, Task, TaskCategory, TaskCtx};

/// Handle to a task inside one [`TaskTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How [`TaskTree::copy_subtree`] treats authoring-only tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneMode {
    /// Disabled tasks and comments are left out and the child lists compacted.
    Runtime,
    /// Everything is copied.
    Authoring,
}

struct TaskNode {
    // Taken out while one of its hooks runs.
    behavior: Option<Box<dyn Task>>,
    custom_name: String,
    enabled: bool,
    parent: Option<TaskId>,
    children: Vec<TaskId>,
    status: Status,
    elapsed: f64,
    blackboard: Option<Blackboard>,
}

/// Arena of behavior-tree tasks.
///
/// Tasks are addressed by [`TaskId`]. The arena keeps parent links consistent with child lists:
/// a task is listed by at most one parent, and that parent is the one its link points at.
/// Detached tasks stay in the arena until the tree is dropped.
pub struct TaskTree {
    nodes: Vec<TaskNode>,
    agent: Option<ObjectRef>,
    scene_root: Option<ObjectRef>,
    rng: SplitMix64,
    clock: f64,
    ticks: u64,
    depth: usize,
    trace: Option<SharedTraceSink>,
}

impl Default for TaskTree {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            agent: None,
            scene_root: None,
            rng: SplitMix64::default(),
            clock: 0.0,
            ticks: 0,
            depth: 0,
            trace: None,
        }
    }
}

impl TaskTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Adds a detached task.
    pub fn add(&mut self, task: impl Task) -> TaskId {
        self.add_boxed(Box::new(task))
    }

    pub fn add_boxed(&mut self, task: Box<dyn Task>) -> TaskId {
        let id = TaskId(self.nodes.len());
        self.nodes.push(TaskNode {
            behavior: Some(task),
            custom_name: String::new(),
            enabled: true,
            parent: None,
            children: Vec::new(),
            status: Status::Fresh,
            elapsed: 0.0,
            blackboard: None,
        });
        id
    }

    /// Adds `task` as the last child of `parent`.
    pub fn spawn(&mut self, parent: TaskId, task: impl Task) -> Result<TaskId, TreeError> {
        self.check(parent)?;
        let id = self.add(task);
        self.add_child(parent, id)?;
        Ok(id)
    }

    fn check(&self, id: TaskId) -> Result<(), TreeError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(TreeError::UnknownTask(id))
        }
    }

    fn node(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: TaskId) -> Option<&mut TaskNode> {
        self.nodes.get_mut(id.0)
    }

    // ---- structure -------------------------------------------------------------------------

    pub fn add_child(&mut self, parent: TaskId, child: TaskId) -> Result<(), TreeError> {
        let len = self.get_child_count(parent);
        self.add_child_at_index(parent, child, len)
    }

    /// Inserts `child` at `index` under `parent`. Out-of-range indices append.
    pub fn add_child_at_index(
        &mut self,
        parent: TaskId,
        child: TaskId,
        index: usize,
    ) -> Result<(), TreeError> {
        self.check(parent)?;
        self.check(child)?;
        if self.get_parent(child).is_some() {
            tracing::error!(child = %child, "task already has a parent");
            return Err(TreeError::AlreadyHasParent(child));
        }
        if parent == child || self.is_descendant_of(parent, child) {
            tracing::error!(parent = %parent, child = %child, "refusing to create a cycle");
            return Err(TreeError::WouldCreateCycle { parent, child });
        }
        let Some(p) = self.node_mut(parent) else {
            return Err(TreeError::UnknownTask(parent));
        };
        let index = index.min(p.children.len());
        p.children.insert(index, child);
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        Ok(())
    }

    pub fn remove_child(&mut self, parent: TaskId, child: TaskId) -> Result<(), TreeError> {
        match self.get_child_index(parent, child) {
            Some(index) => self.remove_child_at_index(parent, index).map(|_| ()),
            None => {
                tracing::error!(parent = %parent, child = %child, "not a child of this task");
                Err(TreeError::NotAChild { parent, child })
            }
        }
    }

    /// Detaches and returns the child at `index`.
    pub fn remove_child_at_index(
        &mut self,
        parent: TaskId,
        index: usize,
    ) -> Result<TaskId, TreeError> {
        self.check(parent)?;
        let len = self.get_child_count(parent);
        if index >= len {
            tracing::error!(parent = %parent, index, len, "child index out of range");
            return Err(TreeError::IndexOutOfRange { index, len });
        }
        let Some(p) = self.node_mut(parent) else {
            return Err(TreeError::UnknownTask(parent));
        };
        let child = p.children.remove(index);
        if let Some(c) = self.node_mut(child) {
            c.parent = None;
        }
        Ok(child)
    }

    pub fn get_child(&self, id: TaskId, index: usize) -> Option<TaskId> {
        self.node(id)?.children.get(index).copied()
    }

    pub fn children(&self, id: TaskId) -> &[TaskId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn get_child_count(&self, id: TaskId) -> usize {
        self.children(id).len()
    }

    /// Children not counting comments.
    pub fn get_enabled_child_count(&self, id: TaskId) -> usize {
        self.children(id)
            .iter()
            .filter(|c| self.category(**c) != Some(TaskCategory::Comment))
            .count()
    }

    pub fn get_child_index(&self, id: TaskId, child: TaskId) -> Option<usize> {
        self.children(id).iter().position(|c| *c == child)
    }

    pub fn has_child(&self, id: TaskId, child: TaskId) -> bool {
        self.get_child_index(id, child).is_some()
    }

    pub fn get_parent(&self, id: TaskId) -> Option<TaskId> {
        self.node(id)?.parent
    }

    pub fn is_root(&self, id: TaskId) -> bool {
        self.contains(id) && self.get_parent(id).is_none()
    }

    pub fn get_root(&self, id: TaskId) -> TaskId {
        let mut current = id;
        while let Some(parent) = self.get_parent(current) {
            current = parent;
        }
        current
    }

    /// True if `ancestor` is on the parent chain of `id`.
    pub fn is_descendant_of(&self, id: TaskId, ancestor: TaskId) -> bool {
        let mut current = self.get_parent(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.get_parent(p);
        }
        false
    }

    pub fn next_sibling(&self, id: TaskId) -> Option<TaskId> {
        let parent = self.get_parent(id)?;
        let index = self.get_child_index(parent, id)?;
        self.get_child(parent, index + 1)
    }

    // ---- per-task data ---------------------------------------------------------------------

    pub fn status(&self, id: TaskId) -> Status {
        self.node(id).map(|n| n.status).unwrap_or_default()
    }

    pub fn elapsed(&self, id: TaskId) -> f64 {
        self.node(id).map(|n| n.elapsed).unwrap_or(0.0)
    }

    pub fn blackboard(&self, id: TaskId) -> Option<Blackboard> {
        self.node(id)?.blackboard.clone()
    }

    pub fn category(&self, id: TaskId) -> Option<TaskCategory> {
        Some(self.node(id)?.behavior.as_ref()?.category())
    }

    pub fn type_name(&self, id: TaskId) -> Option<&'static str> {
        Some(self.node(id)?.behavior.as_ref()?.type_name())
    }

    pub fn custom_name(&self, id: TaskId) -> &str {
        self.node(id).map(|n| n.custom_name.as_str()).unwrap_or("")
    }

    pub fn set_custom_name(&mut self, id: TaskId, name: impl Into<String>) {
        if let Some(n) = self.node_mut(id) {
            n.custom_name = name.into();
        }
    }

    /// Custom name if set, otherwise the task's generated name.
    pub fn task_name(&self, id: TaskId) -> String {
        let Some(node) = self.node(id) else {
            return String::new();
        };
        if !node.custom_name.is_empty() {
            return node.custom_name.clone();
        }
        node.behavior
            .as_ref()
            .map(|b| b.generated_name())
            .unwrap_or_default()
    }

    pub fn is_enabled(&self, id: TaskId) -> bool {
        self.node(id).is_some_and(|n| n.enabled)
    }

    /// Disabled tasks are left out when the tree is instantiated.
    pub fn set_enabled(&mut self, id: TaskId, enabled: bool) {
        if let Some(n) = self.node_mut(id) {
            n.enabled = enabled;
        }
    }

    pub fn task(&self, id: TaskId) -> Option<&dyn Task> {
        self.node(id)?.behavior.as_deref()
    }

    /// Typed access to the task at `id`.
    pub fn get<T: Task>(&self, id: TaskId) -> Option<&T> {
        self.task(id)?.as_any().downcast_ref::<T>()
    }

    pub fn get_mut<T: Task>(&mut self, id: TaskId) -> Option<&mut T> {
        self.node_mut(id)?
            .behavior
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    // ---- shared runtime state --------------------------------------------------------------

    pub fn agent(&self) -> Option<ObjectRef> {
        self.agent.clone()
    }

    pub fn scene_root(&self) -> Option<ObjectRef> {
        self.scene_root.clone()
    }

    pub(crate) fn rng_mut(&mut self) -> &mut SplitMix64 {
        &mut self.rng
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.rng = SplitMix64::new(seed);
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn advance(&mut self, delta: f64) {
        self.clock += delta;
        self.ticks += 1;
    }

    pub fn nesting_depth(&self) -> usize {
        self.depth
    }

    pub fn set_nesting_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    pub fn trace_sink(&self) -> Option<SharedTraceSink> {
        self.trace.clone()
    }

    pub fn set_trace_sink(&mut self, sink: Option<SharedTraceSink>) {
        self.trace = sink;
    }

    // ---- lifecycle -------------------------------------------------------------------------

    /// Assigns agent, blackboard and scene root to the subtree at `root` and runs every task's
    /// setup hook, children first.
    pub fn initialize(
        &mut self,
        root: TaskId,
        agent: Option<ObjectRef>,
        blackboard: &Blackboard,
        scene_root: Option<ObjectRef>,
    ) {
        self.agent = agent;
        self.scene_root = scene_root;
        self.initialize_task(root, blackboard);
    }

    fn initialize_task(&mut self, id: TaskId, blackboard: &Blackboard) {
        let Some(mut behavior) = self.node_mut(id).and_then(|n| n.behavior.take()) else {
            return;
        };
        let scope = behavior.prepare(&mut InitCtx {
            tree: self,
            id,
            blackboard: blackboard.clone(),
        });
        let scope = scope.unwrap_or_else(|| blackboard.clone());
        if let Some(n) = self.node_mut(id) {
            n.blackboard = Some(scope.clone());
        }
        for child in self.children(id).to_vec() {
            self.initialize_task(child, &scope);
        }
        behavior.setup(&mut TaskCtx {
            tree: self,
            id,
            delta: 0.0,
        });
        self.restore(id, behavior);
    }

    fn restore(&mut self, id: TaskId, behavior: Box<dyn Task>) {
        if let Some(n) = self.node_mut(id) {
            n.behavior = Some(behavior);
        }
    }

    /// Ticks the task at `id` and returns its new status.
    ///
    /// A task that is not running is entered first; if it had finished before, its children are
    /// aborted so none of them carries a stale status into the new run. A task that stops
    /// running is exited and its elapsed time reset.
    pub fn execute(&mut self, id: TaskId, delta: f64) -> Status {
        let Some(node) = self.node_mut(id) else {
            tracing::error!(task = %id, "execute on unknown task");
            return Status::Failure;
        };
        let previous = node.status;
        let Some(mut behavior) = node.behavior.take() else {
            tracing::error!(task = %id, "task re-entered while its hook is running");
            return Status::Failure;
        };

        if previous != Status::Running {
            if previous != Status::Fresh {
                for child in self.children(id).to_vec() {
                    self.abort(child);
                }
            }
            behavior.enter(&mut TaskCtx {
                tree: self,
                id,
                delta,
            });
        } else if let Some(n) = self.node_mut(id) {
            n.elapsed += delta;
        }

        let status = behavior.tick(&mut TaskCtx {
            tree: self,
            id,
            delta,
        });
        if let Some(n) = self.node_mut(id) {
            n.status = status;
        }
        if status != Status::Running {
            behavior.exit(&mut TaskCtx {
                tree: self,
                id,
                delta,
            });
            if let Some(n) = self.node_mut(id) {
                n.elapsed = 0.0;
            }
        }
        self.restore(id, behavior);
        status
    }

    /// Resets the subtree at `id` to fresh, children first. Running tasks are exited.
    pub fn abort(&mut self, id: TaskId) {
        for child in self.children(id).to_vec() {
            self.abort(child);
        }
        if self.status(id) == Status::Running {
            if let Some(mut behavior) = self.node_mut(id).and_then(|n| n.behavior.take()) {
                behavior.exit(&mut TaskCtx {
                    tree: self,
                    id,
                    delta: 0.0,
                });
                self.restore(id, behavior);
            }
        }
        if let Some(n) = self.node_mut(id) {
            n.status = Status::Fresh;
            n.elapsed = 0.0;
        }
    }

    // ---- cloning ---------------------------------------------------------------------------

    /// Copies the subtree at `id` into `dest` and returns the new root, detached.
    ///
    /// Parameters are duplicated per task, so the copy never shares parameter state with this
    /// tree. In [`CloneMode::Runtime`] a disabled or comment root yields `None`.
    pub fn copy_subtree(&self, id: TaskId, dest: &mut TaskTree, mode: CloneMode) -> Option<TaskId> {
        let node = self.node(id)?;
        let behavior = node.behavior.as_ref()?;
        if mode == CloneMode::Runtime
            && (!node.enabled || behavior.category() == TaskCategory::Comment)
        {
            return None;
        }
        let mut params = ParamDuplicates::new();
        let copy = dest.add_boxed(behavior.clone_task(&mut params));
        dest.set_custom_name(copy, node.custom_name.clone());
        dest.set_enabled(copy, node.enabled);
        for child in &node.children {
            if let Some(child_copy) = self.copy_subtree(*child, dest, mode) {
                // Fresh ids in `dest` can't already have a parent or form a cycle.
                let _ = dest.add_child(copy, child_copy);
            }
        }
        Some(copy)
    }

    // ---- diagnostics -----------------------------------------------------------------------

    /// Design-time lint for one task.
    pub fn configuration_warnings(&self, id: TaskId) -> Vec<String> {
        let Some(behavior) = self.task(id) else {
            return Vec::new();
        };
        let count = self.get_child_count(id);
        let mut warnings = Vec::new();
        if behavior.checks_child_count() {
            match behavior.category() {
                TaskCategory::Composite if count < 1 => {
                    warnings.push("Composite should have at least one child task.".to_string())
                }
                TaskCategory::Decorator if count != 1 => {
                    warnings.push("Decorator should have a single child task.".to_string())
                }
                TaskCategory::Action if count != 0 => {
                    warnings.push("Action shouldn't have child tasks.".to_string())
                }
                TaskCategory::Condition if count != 0 => {
                    warnings.push("Condition task shouldn't have child tasks.".to_string())
                }
                TaskCategory::Comment => {
                    let only_comments = self
                        .children(id)
                        .iter()
                        .all(|c| self.category(*c) == Some(TaskCategory::Comment));
                    if !only_comments {
                        warnings
                            .push("Can only have other comment tasks as children.".to_string());
                    }
                    if self.get_parent(id).is_none() {
                        warnings.push("Can't be the root task.".to_string());
                    }
                }
                _ => {}
            }
        }
        warnings.extend(behavior.configuration_warnings());
        warnings
    }

    /// Warnings for every task of the subtree, in pre-order.
    pub fn collect_warnings(&self, root: TaskId) -> Vec<(TaskId, String)> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for w in self.configuration_warnings(id) {
                out.push((id, w));
            }
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    /// Indented outline of the subtree, one task per line.
    pub fn print_tree(&self, root: TaskId) -> String {
        let mut out = String::new();
        self.print_into(root, 0, &mut out);
        out
    }

    fn print_into(&self, id: TaskId, depth: usize, out: &mut String) {
        let _ = writeln!(
            out,
            "{:indent$}{} : {}",
            "",
            self.task_name(id),
            self.type_name(id).unwrap_or("?"),
            indent = depth * 2
        );
        for child in self.children(id) {
            self.print_into(*child, depth + 1, out);
        }
    }

    /// Pre-order snapshot of the subtree for debugger views.
    pub fn snapshot(&self, root: TaskId) -> BehaviorTreeData {
        let mut data = BehaviorTreeData::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            data.push(TaskData {
                id: id.0 as u64,
                name: self.task_name(id),
                num_children: node.children.len(),
                status: node.status,
                elapsed: node.elapsed,
                type_name: self.type_name(id).unwrap_or("?").to_string(),
            });
            stack.extend(node.children.iter().rev());
        }
        data
    }
}

impl fmt::Debug for TaskTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskTree")
            .field("tasks", &self.nodes.len())
            .field("clock", &self.clock)
            .field("depth", &self.depth)
            .finish()
    }
}
