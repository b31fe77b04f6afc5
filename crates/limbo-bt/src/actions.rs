//! Leaf actions.

use limbo_core::{BbParam, DeterministicRng, Operation, ParamDuplicates, Status, Value};

use crate::impl_task_any;
use crate::task::{Task, TaskCategory, TaskCtx};

/// Runs for `duration` seconds, then succeeds.
#[derive(Debug, Clone)]
pub struct Wait {
    pub duration: f64,
}

impl Wait {
    pub fn new(duration: f64) -> Self {
        Self { duration }
    }
}

impl Task for Wait {
    fn category(&self) -> TaskCategory {
        TaskCategory::Action
    }

    fn type_name(&self) -> &'static str {
        "Wait"
    }

    fn generated_name(&self) -> String {
        format!("Wait {}s", self.duration)
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if ctx.elapsed() < self.duration {
            Status::Running
        } else {
            Status::Success
        }
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(self.clone())
    }

    impl_task_any!();
}

/// Runs for `num_ticks` ticks after the entering one, then succeeds.
#[derive(Debug, Clone, Default)]
pub struct WaitTicks {
    pub num_ticks: u32,
    passed: u32,
}

impl WaitTicks {
    pub fn new(num_ticks: u32) -> Self {
        Self {
            num_ticks,
            passed: 0,
        }
    }
}

impl Task for WaitTicks {
    fn category(&self) -> TaskCategory {
        TaskCategory::Action
    }

    fn type_name(&self) -> &'static str {
        "WaitTicks"
    }

    fn generated_name(&self) -> String {
        format!("WaitTicks x{}", self.num_ticks)
    }

    fn enter(&mut self, _ctx: &mut TaskCtx<'_>) {
        self.passed = 0;
    }

    fn tick(&mut self, _ctx: &mut TaskCtx<'_>) -> Status {
        if self.passed < self.num_ticks {
            self.passed += 1;
            Status::Running
        } else {
            Status::Success
        }
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self::new(self.num_ticks))
    }

    impl_task_any!();
}

/// Waits a duration drawn uniformly from `[min_duration, max_duration]` on each entry.
#[derive(Debug, Clone)]
pub struct RandomWait {
    min_duration: f64,
    max_duration: f64,
    duration: f64,
}

impl RandomWait {
    pub fn new(min_duration: f64, max_duration: f64) -> Self {
        let (min_duration, max_duration) = if min_duration <= max_duration {
            (min_duration, max_duration)
        } else {
            (max_duration, min_duration)
        };
        Self {
            min_duration,
            max_duration,
            duration: 0.0,
        }
    }

    pub fn min_duration(&self) -> f64 {
        self.min_duration
    }

    pub fn max_duration(&self) -> f64 {
        self.max_duration
    }

    /// Duration drawn for the current run.
    pub fn duration(&self) -> f64 {
        self.duration
    }
}

impl Task for RandomWait {
    fn category(&self) -> TaskCategory {
        TaskCategory::Action
    }

    fn type_name(&self) -> &'static str {
        "RandomWait"
    }

    fn generated_name(&self) -> String {
        format!("Wait {} to {} sec", self.min_duration, self.max_duration)
    }

    fn enter(&mut self, ctx: &mut TaskCtx<'_>) {
        self.duration = ctx.rng().range_f64(self.min_duration, self.max_duration);
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if ctx.elapsed() < self.duration {
            Status::Running
        } else {
            Status::Success
        }
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self::new(self.min_duration, self.max_duration))
    }

    impl_task_any!();
}

/// Always fails.
#[derive(Debug, Clone, Default)]
pub struct Fail;

impl Task for Fail {
    fn category(&self) -> TaskCategory {
        TaskCategory::Action
    }

    fn type_name(&self) -> &'static str {
        "Fail"
    }

    fn tick(&mut self, _ctx: &mut TaskCtx<'_>) -> Status {
        Status::Failure
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Fail)
    }

    impl_task_any!();
}

const MAX_FORMAT_ARGS: usize = 5;

/// Logs `text` at info level under the `limbo::console` target and succeeds.
///
/// Each `%s` in `text` is replaced by the value of the next variable named in `format_var_args`.
#[derive(Debug, Clone, Default)]
pub struct ConsolePrint {
    pub text: String,
    pub format_var_args: Vec<String>,
}

impl ConsolePrint {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format_var_args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.format_var_args = vars.into_iter().map(Into::into).collect();
        self
    }

    /// The text with every `%s` substituted from `values`.
    pub fn format(text: &str, values: &[Value]) -> String {
        let mut out = String::with_capacity(text.len());
        let mut values = values.iter();
        let mut rest = text;
        while let Some(pos) = rest.find("%s") {
            out.push_str(&rest[..pos]);
            match values.next() {
                Some(v) => out.push_str(&v.to_string()),
                None => out.push_str("%s"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }
}

impl Task for ConsolePrint {
    fn category(&self) -> TaskCategory {
        TaskCategory::Action
    }

    fn type_name(&self) -> &'static str {
        "ConsolePrint"
    }

    fn generated_name(&self) -> String {
        let mut text: String = self.text.chars().take(30).collect();
        if self.text.chars().count() > 30 {
            text.push_str("...");
        }
        let text = text.replace('"', "\\\"");
        if self.format_var_args.is_empty() {
            format!("ConsolePrint \"{text}\"")
        } else {
            format!(
                "ConsolePrint  text: \"{text}\"  format_args: {:?}",
                self.format_var_args
            )
        }
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        let bb = ctx.blackboard();
        let values: Vec<Value> = self
            .format_var_args
            .iter()
            .take(MAX_FORMAT_ARGS)
            .map(|name| bb.get_var(name, Value::String(String::new()), true))
            .collect();
        let line = Self::format(&self.text, &values);
        tracing::info!(target: "limbo::console", "{line}");
        Status::Success
    }

    fn configuration_warnings(&self) -> Vec<String> {
        if self.format_var_args.len() > MAX_FORMAT_ARGS {
            vec![format!(
                "ConsolePrint supports up to {MAX_FORMAT_ARGS} format arguments."
            )]
        } else {
            Vec::new()
        }
    }

    fn clone_task(&self, _params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(self.clone())
    }

    impl_task_any!();
}

/// Writes `value` into blackboard variable `variable`, optionally combined with its current
/// value through `operation`.
#[derive(Debug, Clone, Default)]
pub struct SetVar {
    pub variable: String,
    pub value: BbParam,
    pub operation: Operation,
}

impl SetVar {
    pub fn new(variable: impl Into<String>, value: BbParam) -> Self {
        Self {
            variable: variable.into(),
            value,
            operation: Operation::None,
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }
}

impl Task for SetVar {
    fn category(&self) -> TaskCategory {
        TaskCategory::Action
    }

    fn type_name(&self) -> &'static str {
        "SetVar"
    }

    fn generated_name(&self) -> String {
        format!(
            "Set ${} {} {}",
            self.variable,
            self.operation.symbol(),
            self.value
        )
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if self.variable.is_empty() {
            tracing::error!(task = %ctx.id(), "SetVar: variable is not set");
            return Status::Failure;
        }
        let bb = ctx.blackboard();
        let right = self
            .value
            .get_value(ctx.scene_root().as_ref(), &bb, Value::Nil);
        let result = if self.operation == Operation::None {
            right
        } else {
            let left = bb.get_var(&self.variable, Value::Nil, true);
            match self.operation.apply(&left, &right) {
                Some(v) => v,
                None => {
                    tracing::error!(
                        task = %ctx.id(),
                        op = self.operation.symbol(),
                        "SetVar: operation not supported for these operands"
                    );
                    return Status::Failure;
                }
            }
        };
        bb.set_var(&self.variable, result);
        Status::Success
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
            value: params.duplicate(&self.value),
            operation: self.operation,
        })
    }

    impl_task_any!();
}

/// Writes `value` into the agent's `property`, optionally combined with its current value.
#[derive(Debug, Clone, Default)]
pub struct SetAgentProperty {
    pub property: String,
    pub value: BbParam,
    pub operation: Operation,
}

impl SetAgentProperty {
    pub fn new(property: impl Into<String>, value: BbParam) -> Self {
        Self {
            property: property.into(),
            value,
            operation: Operation::None,
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }
}

impl Task for SetAgentProperty {
    fn category(&self) -> TaskCategory {
        TaskCategory::Action
    }

    fn type_name(&self) -> &'static str {
        "SetAgentProperty"
    }

    fn generated_name(&self) -> String {
        format!(
            "Set agent.{} {} {}",
            self.property,
            self.operation.symbol(),
            self.value
        )
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if self.property.is_empty() {
            tracing::error!(task = %ctx.id(), "SetAgentProperty: property is not set");
            return Status::Failure;
        }
        let Some(agent) = ctx.agent() else {
            tracing::error!(task = %ctx.id(), "SetAgentProperty: no agent");
            return Status::Failure;
        };
        let right = self
            .value
            .get_value(ctx.scene_root().as_ref(), &ctx.blackboard(), Value::Nil);
        let result = if self.operation == Operation::None {
            right
        } else {
            let left = agent.get_property(&self.property).unwrap_or_default();
            match self.operation.apply(&left, &right) {
                Some(v) => v,
                None => {
                    tracing::error!(
                        task = %ctx.id(),
                        op = self.operation.symbol(),
                        "SetAgentProperty: operation not supported for these operands"
                    );
                    return Status::Failure;
                }
            }
        };
        if agent.set_property(&self.property, result) {
            Status::Success
        } else {
            tracing::error!(task = %ctx.id(), property = %self.property, "SetAgentProperty: agent rejected the value");
            Status::Failure
        }
    }

    fn configuration_warnings(&self) -> Vec<String> {
        if self.property.is_empty() {
            vec!["`property` should be assigned.".to_string()]
        } else {
            Vec::new()
        }
    }

    fn clone_task(&self, params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self {
            property: self.property.clone(),
            value: params.duplicate(&self.value),
            operation: self.operation,
        })
    }

    impl_task_any!();
}

/// Calls `method` on the object resolved from `node` and succeeds.
///
/// With `include_delta` the tick's delta is passed before `args`. The return value is stored in
/// `result_var` when one is set.
#[derive(Debug, Clone)]
pub struct CallMethod {
    pub node: BbParam,
    pub method: String,
    pub args: Vec<BbParam>,
    pub include_delta: bool,
    pub result_var: String,
}

impl CallMethod {
    pub fn new(node: BbParam, method: impl Into<String>) -> Self {
        Self {
            node,
            method: method.into(),
            args: Vec::new(),
            include_delta: false,
            result_var: String::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<BbParam>) -> Self {
        self.args = args;
        self
    }

    pub fn with_delta(mut self, include_delta: bool) -> Self {
        self.include_delta = include_delta;
        self
    }

    pub fn with_result_var(mut self, name: impl Into<String>) -> Self {
        self.result_var = name.into();
        self
    }
}

impl Task for CallMethod {
    fn category(&self) -> TaskCategory {
        TaskCategory::Action
    }

    fn type_name(&self) -> &'static str {
        "CallMethod"
    }

    fn generated_name(&self) -> String {
        let mut args: Vec<String> = Vec::new();
        if self.include_delta {
            args.push("delta".to_string());
        }
        args.extend(self.args.iter().map(|a| a.to_string()));
        let call = format!("{}({})", self.method, args.join(", "));
        let call = format!("Call {call}  node: {}", self.node);
        if self.result_var.is_empty() {
            call
        } else {
            format!("{call}  -> ${}", self.result_var)
        }
    }

    fn tick(&mut self, ctx: &mut TaskCtx<'_>) -> Status {
        if self.method.is_empty() {
            tracing::error!(task = %ctx.id(), "CallMethod: method is not set");
            return Status::Failure;
        }
        let bb = ctx.blackboard();
        let scene_root = ctx.scene_root();
        let target = self.node.get_value(scene_root.as_ref(), &bb, Value::Nil);
        let Some(object) = target.as_object() else {
            tracing::error!(task = %ctx.id(), node = %self.node, "CallMethod: target is not an object");
            return Status::Failure;
        };
        if !object.has_method(&self.method) {
            tracing::error!(task = %ctx.id(), method = %self.method, "CallMethod: method not found");
            return Status::Failure;
        }

        let mut call_args = Vec::with_capacity(self.args.len() + 1);
        if self.include_delta {
            call_args.push(Value::Float(ctx.delta()));
        }
        for arg in &self.args {
            call_args.push(arg.get_value(scene_root.as_ref(), &bb, Value::Nil));
        }
        let result = object
            .call_method(&self.method, &call_args)
            .unwrap_or_default();
        if !self.result_var.is_empty() {
            bb.set_var(&self.result_var, result);
        }
        Status::Success
    }

    fn configuration_warnings(&self) -> Vec<String> {
        if self.method.is_empty() {
            vec!["Method Name is not set.".to_string()]
        } else {
            Vec::new()
        }
    }

    fn clone_task(&self, params: &mut ParamDuplicates) -> Box<dyn Task> {
        Box::new(Self {
            node: params.duplicate(&self.node),
            method: self.method.clone(),
            args: self.args.iter().map(|a| params.duplicate(a)).collect(),
            include_delta: self.include_delta,
            result_var: self.result_var.clone(),
        })
    }

    impl_task_any!();
}
