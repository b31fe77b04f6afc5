//! Leaf conditions.

use limbo_core::{BbParam, CheckType, ParamDuplicates, Status, Value};

use crate::impl_task_any;
use crate::task::{Task, TaskCategory, TaskCtx};

fn verdict(pass: bool) -> Status {
    if pass {
        Status::Success
    } else {
        Status::Failure
    }
}

/// Compares blackboard variable `variable` against `value`.
#[derive(Debug, Clone, Default)]
pub struct CheckVar {
    pub variable: String,
    pub check_type: CheckType,
    pub value: BbParam,
}

impl CheckVar {
    pub fn new(variable: impl Into<String>, check_type: CheckType, value: BbParam) -> Self {
        Self {
            variable: variable.into(),
            check_type,
            value,
        }
    }
}

impl Task for CheckVar {
    fn category(&self) -> TaskCategory {
        TaskCategory::Condition
    }

    fn type_name(&self) -> &'static str {
        "CheckVar"
    }

    fn generated_name(&self) -> String {
        format!(
            "Check if: ${} {} {}",
            self.variable,
            self.check_type.symbol(),
            self.value
        )
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if self.variable.is_empty() {
            tracing::error!(task = %ctx.id(), "CheckVar: variable is not set");
            return Status::Failure;
        }
        let bb = ctx.blackboard();
        if !bb.has_var(&self.variable) {
            tracing::warn!(task = %ctx.id(), var = %self.variable, "CheckVar: variable not found");
            return Status::Failure;
        }
        let left = bb.get_var(&self.variable, Value::Nil, false);
        let right = self
            .value
            .get_value(ctx.scene_root().as_ref(), &bb, Value::Nil);
        verdict(self.check_type.evaluate(&left, &right))
    }

    fn configuration_warnings(&self) -> Vec<String> {
        if self.variable.is_empty() {
            vec!["`variable` should be assigned.".to_string()]
        } else {
            Vec::new()
        }
    }

    fn clone_task(&self, params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self {
            variable: self.variable.clone(),
            check_type: self.check_type,
            value: params.duplicate(&self.value),
        })
    }

    impl_task_any!();
}

/// Succeeds if boolean variable `variable` is set, clearing it in the same tick.
#[derive(Debug, Clone, Default)]
pub struct CheckTrigger {
    pub variable: String,
}

impl CheckTrigger {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl Task for CheckTrigger {
    fn category(&self) -> TaskCategory {
        TaskCategory::Condition
    }

    fn type_name(&self) -> &'static str {
        "CheckTrigger"
    }

    fn generated_name(&self) -> String {
        format!("CheckTrigger ${}", self.variable)
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if self.variable.is_empty() {
            tracing::error!(task = %ctx.id(), "CheckTrigger: variable is not set");
            return Status::Failure;
        }
        let bb = ctx.blackboard();
        if bb.get_var(&self.variable, Value::Bool(false), true).truthy() {
            bb.set_var(&self.variable, false);
            Status::Success
        } else {
            Status::Failure
        }
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(self.clone())
    }

    impl_task_any!();
}

/// Compares the agent's `property` against `value`.
#[derive(Debug, Clone, Default)]
pub struct CheckAgentProperty {
    pub property: String,
    pub check_type: CheckType,
    pub value: BbParam,
}

impl CheckAgentProperty {
    pub fn new(property: impl Into<String>, check_type: CheckType, value: BbParam) -> Self {
        Self {
            property: property.into(),
            check_type,
            value,
        }
    }
}

impl Task for CheckAgentProperty {
    fn category(&self) -> TaskCategory {
        TaskCategory::Condition
    }

    fn type_name(&self) -> &'static str {
        "CheckAgentProperty"
    }

    fn generated_name(&self) -> String {
        format!(
            "Check if: agent.{} {} {}",
            self.property,
            self.check_type.symbol(),
            self.value
        )
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if self.property.is_empty() {
            tracing::error!(task = %ctx.id(), "CheckAgentProperty: property is not set");
            return Status::Failure;
        }
        let Some(agent) = ctx.agent() else {
            tracing::error!(task = %ctx.id(), "CheckAgentProperty: no agent");
            return Status::Failure;
        };
        let Some(left) = agent.get_property(&self.property) else {
            tracing::warn!(task = %ctx.id(), property = %self.property, "CheckAgentProperty: property not found");
            return Status::Failure;
        };
        let right = self
            .value
            .get_value(ctx.scene_root().as_ref(), &ctx.blackboard(), Value::Nil);
        verdict(self.check_type.evaluate(&left, &right))
    }

    fn clone_task(&self, params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self {
            property: self.property.clone(),
            check_type: self.check_type,
            value: params.duplicate(&self.value),
        })
    }

    impl_task_any!();
}
