use std::rc::Rc;

use limbo_core::{ParamDuplicates, Status};

use crate::impl_task_any;
use crate::task::{Task, TaskCategory, TaskCtx};

type Hook = Rc<dyn Fn(&mut TaskCtx<'_>)>;
type TickHook = Rc<dyn Fn(&mut TaskCtx<'_>) -> Status>;

/// Task assembled from closures, for behavior that doesn't warrant its own type.
///
/// Clones share the closures. Per-instance state belongs in the blackboard.
#[derive(Clone)]
pub struct CustomTask {
    name: &'static str,
    category: TaskCategory,
    on_setup: Option<Hook>,
    on_enter: Option<Hook>,
    on_exit: Option<Hook>,
    on_tick: Option<TickHook>,
}

impl CustomTask {
    pub fn action(name: &'static str) -> Self {
        Self::with_category(name, TaskCategory::Action)
    }

    pub fn condition(name: &'static str) -> Self {
        Self::with_category(name, TaskCategory::Condition)
    }

    pub fn with_category(name: &'static str, category: TaskCategory) -> Self {
        Self {
            name,
            category,
            on_setup: None,
            on_enter: None,
            on_exit: None,
            on_tick: None,
        }
    }

    pub fn on_setup(mut self, f: impl Fn(&mut TaskCtx<'_>) + 'static) -> Self {
        self.on_setup = Some(Rc::new(f));
        self
    }

    pub fn on_enter(mut self, f: impl Fn(&mut TaskCtx<'_>) + 'static) -> Self {
        self.on_enter = Some(Rc::new(f));
        self
    }

    pub fn on_exit(mut self, f: impl Fn(&mut TaskCtx<'_>) + 'static) -> Self {
        self.on_exit = Some(Rc::new(f));
        self
    }

    pub fn on_tick(mut self, f: impl Fn(&mut TaskCtx<'_>) -> Status + 'static) -> Self {
        self.on_tick = Some(Rc::new(f));
        self
    }
}

impl Task for CustomTask {
    fn category(&self) -> TaskCategory {
        self.category
    }

    fn type_name(&self) -> &'static str {
        self.name
    }

    fn setup(&mut self, ctx: &mut TaskCtx<'_>) {
        if let Some(f) = &self.on_setup {
            f(ctx);
        }
    }

    fn enter(&mut self, ctx: &mut TaskCtx<'_>) {
        if let Some(f) = &self.on_enter {
            f(ctx);
        }
    }

    fn exit(&mut self, ctx: &mut TaskCtx<'_>) {
        if let Some(f) = &self.on_exit {
            f(ctx);
        }
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        match &self.on_tick {
            Some(f) => f(ctx),
            None => {
                tracing::error!(task = %ctx.id(), name = self.name, "tick is not implemented");
                Status::Failure
            }
        }
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(self.clone())
    }

    impl_task_any!();
}

/// Authoring note. Never part of an instantiated tree.
#[derive(Debug, Clone, Default)]
pub struct Comment {
    pub text: String,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Task for Comment {
    fn category(&self) -> TaskCategory {
        TaskCategory::Comment
    }

    fn type_name(&self) -> &'static str {
        "Comment"
    }

    fn generated_name(&self) -> String {
        if self.text.is_empty() {
            "Comment".to_string()
        } else {
            self.text.clone()
        }
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(self.clone())
    }

    impl_task_any!();
}
