use std::fmt;
use std::rc::Rc;

#[cfg(feature = "bt")]
use limbo_bt::BehaviorTree;
use limbo_core::{Blackboard, ObjectRef, Value};

use crate::world_state::{Facts, WorldState};

/// The live agent an action is evaluated against outside of the symbolic search.
#[derive(Clone, Copy, Default)]
pub struct AgentCtx<'a> {
    pub agent: Option<&'a ObjectRef>,
    pub blackboard: Option<&'a Blackboard>,
}

impl<'a> AgentCtx<'a> {
    pub fn new(agent: Option<&'a ObjectRef>, blackboard: Option<&'a Blackboard>) -> Self {
        Self { agent, blackboard }
    }
}

type CostFn = Rc<dyn Fn(&AgentCtx<'_>, u32) -> u32>;
type PreconditionFn = Rc<dyn Fn(&AgentCtx<'_>) -> bool>;

/// One step a plan can take: symbolic preconditions and effects, a cost, and the behavior tree
/// that carries the step out.
#[derive(Clone)]
pub struct GoapAction {
    name: String,
    preconditions: Facts,
    effects: Facts,
    base_cost: u32,
    dynamic_cost: Option<CostFn>,
    procedural_precondition: Option<PreconditionFn>,
    #[cfg(feature = "bt")]
    execution_tree: Option<Rc<BehaviorTree>>,
}

impl GoapAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preconditions: Facts::new(),
            effects: Facts::new(),
            base_cost: 1,
            dynamic_cost: None,
            procedural_precondition: None,
            #[cfg(feature = "bt")]
            execution_tree: None,
        }
    }

    pub fn with_precondition(mut self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.preconditions.insert(fact.into(), value.into());
        self
    }

    pub fn with_effect(mut self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.effects.insert(fact.into(), value.into());
        self
    }

    pub fn with_cost(mut self, cost: u32) -> Self {
        self.base_cost = cost;
        self
    }

    /// Replaces the base cost while an agent context is available. The callback receives the
    /// base cost.
    pub fn with_dynamic_cost(mut self, f: impl Fn(&AgentCtx<'_>, u32) -> u32 + 'static) -> Self {
        self.dynamic_cost = Some(Rc::new(f));
        self
    }

    /// Non-symbolic check made right before the action starts executing.
    pub fn with_procedural_precondition(
        mut self,
        f: impl Fn(&AgentCtx<'_>) -> bool + 'static,
    ) -> Self {
        self.procedural_precondition = Some(Rc::new(f));
        self
    }

    #[cfg(feature = "bt")]
    #[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
    pub fn with_execution_tree(mut self, tree: Rc<BehaviorTree>) -> Self {
        self.execution_tree = Some(tree);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn preconditions(&self) -> &Facts {
        &self.preconditions
    }

    pub fn effects(&self) -> &Facts {
        &self.effects
    }

    pub fn base_cost(&self) -> u32 {
        self.base_cost
    }

    pub fn set_base_cost(&mut self, cost: u32) {
        self.base_cost = cost;
    }

    #[cfg(feature = "bt")]
    #[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
    pub fn execution_tree(&self) -> Option<&Rc<BehaviorTree>> {
        self.execution_tree.as_ref()
    }

    /// Every precondition holds in `state` with the same type and value. Unknown facts fail.
    pub fn is_valid(&self, state: &WorldState) -> bool {
        self.preconditions.iter().all(|(name, want)| {
            state
                .fact(name)
                .is_some_and(|have| have.get_type() == want.get_type() && have == want)
        })
    }

    pub fn apply_effects_to_state(&self, state: &WorldState) -> WorldState {
        state.apply_effects(&self.effects)
    }

    /// Base cost, or the dynamic cost when both a callback and a blackboard are available.
    pub fn get_cost(&self, ctx: &AgentCtx<'_>) -> u32 {
        match (&self.dynamic_cost, ctx.blackboard) {
            (Some(f), Some(_)) => f(ctx, self.base_cost),
            _ => self.base_cost,
        }
    }

    /// Passes when no procedural precondition is set.
    pub fn check_procedural_preconditions(&self, ctx: &AgentCtx<'_>) -> bool {
        self.procedural_precondition
            .as_ref()
            .is_none_or(|f| f(ctx))
    }

    /// Precondition names followed by effect names, without repeats.
    pub fn relevant_facts(&self) -> Vec<String> {
        let mut names: Vec<String> = self.preconditions.keys().cloned().collect();
        for name in self.effects.keys() {
            if !self.preconditions.contains_key(name) {
                names.push(name.clone());
            }
        }
        names
    }

    pub fn produces_fact(&self, name: &str) -> bool {
        self.effects.contains_key(name)
    }
}

impl fmt::Debug for GoapAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("GoapAction");
        s.field("name", &self.name)
            .field("preconditions", &self.preconditions)
            .field("effects", &self.effects)
            .field("base_cost", &self.base_cost)
            .field("dynamic_cost", &self.dynamic_cost.is_some());
        #[cfg(feature = "bt")]
        s.field("execution_tree", &self.execution_tree.is_some());
        s.finish()
    }
}
