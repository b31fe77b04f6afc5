use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::rc::Rc;
use std::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::action::{AgentCtx, GoapAction};
use crate::goal::GoapGoal;
use crate::world_state::WorldState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GoapPlannerConfig {
    /// Node expansions allowed per search. Running out means no plan.
    pub max_iterations: usize,
}

impl Default for GoapPlannerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
        }
    }
}

impl GoapPlannerConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Backward-chaining A* over symbolic world states.
///
/// The search starts at the goal and regresses through action effects until it reaches a set of
/// requirements the current state already satisfies. Walking back from that node yields the
/// actions in execution order.
#[derive(Debug, Clone, Default)]
pub struct GoapPlanner {
    config: GoapPlannerConfig,
    last_iterations: usize,
    last_plan_time_ms: f64,
}

#[derive(Debug)]
struct Node {
    /// Facts that must hold before `action` runs.
    state: WorldState,
    action: Option<usize>,
    g: u64,
    h: u64,
    parent: Option<usize>,
    closed: bool,
}

impl GoapPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: GoapPlannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> GoapPlannerConfig {
        self.config
    }

    pub fn max_iterations(&self) -> usize {
        self.config.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.config.max_iterations = max_iterations;
    }

    /// Expansions used by the last search.
    pub fn last_iterations(&self) -> usize {
        self.last_iterations
    }

    pub fn last_plan_time_ms(&self) -> f64 {
        self.last_plan_time_ms
    }

    /// Cheapest action sequence taking `current` to a state satisfying `goal`.
    ///
    /// Empty when the goal already holds, when no plan exists within the iteration budget, or
    /// when `actions` is empty.
    pub fn plan(
        &mut self,
        actions: &[Rc<GoapAction>],
        current: &WorldState,
        goal: &GoapGoal,
        ctx: &AgentCtx<'_>,
    ) -> Vec<Rc<GoapAction>> {
        self.plan_to_state(actions, current, &goal.create_world_state(), ctx)
    }

    pub fn plan_to_state(
        &mut self,
        actions: &[Rc<GoapAction>],
        current: &WorldState,
        goal_state: &WorldState,
        ctx: &AgentCtx<'_>,
    ) -> Vec<Rc<GoapAction>> {
        self.last_iterations = 0;
        self.last_plan_time_ms = 0.0;
        if current.satisfies(goal_state) || actions.is_empty() {
            return Vec::new();
        }

        let started = Instant::now();
        let plan = self.search(actions, current, goal_state, ctx);
        self.last_plan_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        tracing::debug!(
            iterations = self.last_iterations,
            time_ms = self.last_plan_time_ms,
            steps = plan.len(),
            "goap search finished"
        );
        plan
    }

    fn search(
        &mut self,
        actions: &[Rc<GoapAction>],
        current: &WorldState,
        goal_state: &WorldState,
        ctx: &AgentCtx<'_>,
    ) -> Vec<Rc<GoapAction>> {
        // Costs are fixed for the duration of one search.
        let costs: Vec<u64> = actions
            .iter()
            .map(|a| u64::from(a.get_cost(ctx)))
            .collect();

        let mut nodes = vec![Node {
            state: goal_state.clone(),
            action: None,
            g: 0,
            h: goal_state.distance_to(current) as u64,
            parent: None,
            closed: false,
        }];
        let mut by_hash: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        by_hash.entry(goal_state.compute_hash()).or_default().push(0);

        // (f, node, g at push time). Node ids follow creation order, so ties go to the node
        // opened first even after relaxation. Superseded entries are skipped on pop.
        let mut open = BinaryHeap::new();
        open.push(Reverse((nodes[0].h, 0usize, 0u64)));

        while self.last_iterations < self.config.max_iterations {
            let Some(Reverse((_, index, g))) = open.pop() else {
                break;
            };
            if nodes[index].closed || nodes[index].g != g {
                continue;
            }
            self.last_iterations += 1;
            nodes[index].closed = true;

            if current.satisfies(&nodes[index].state) {
                return reconstruct(&nodes, index, actions);
            }

            for (action_index, action) in actions.iter().enumerate() {
                let required = &nodes[index].state;
                let useful = action.effects().iter().any(|(name, value)| {
                    required.fact(name).is_some_and(|want| want.matches(value))
                });
                if !useful {
                    continue;
                }

                let mut predecessor = required.clone();
                for name in action.effects().keys() {
                    predecessor.erase_fact(name);
                }
                for (name, value) in action.preconditions() {
                    predecessor.set_fact(name.clone(), value.clone());
                }

                let g = nodes[index].g + costs[action_index];
                let hash = predecessor.compute_hash();
                let existing = by_hash.get(&hash).and_then(|candidates| {
                    candidates
                        .iter()
                        .copied()
                        .find(|&c| nodes[c].state.equals(&predecessor))
                });

                match existing {
                    Some(other) if nodes[other].closed => {}
                    Some(other) => {
                        if g < nodes[other].g {
                            let node = &mut nodes[other];
                            node.g = g;
                            node.action = Some(action_index);
                            node.parent = Some(index);
                            open.push(Reverse((g + node.h, other, g)));
                        }
                    }
                    None => {
                        let h = predecessor.distance_to(current) as u64;
                        let id = nodes.len();
                        nodes.push(Node {
                            state: predecessor,
                            action: Some(action_index),
                            g,
                            h,
                            parent: Some(index),
                            closed: false,
                        });
                        by_hash.entry(hash).or_default().push(id);
                        open.push(Reverse((g + h, id, g)));
                    }
                }
            }
        }

        Vec::new()
    }
}

/// Actions from `solution` back toward the goal node, which is already execution order.
fn reconstruct(nodes: &[Node], solution: usize, actions: &[Rc<GoapAction>]) -> Vec<Rc<GoapAction>> {
    let mut plan = Vec::new();
    let mut cursor = Some(solution);
    while let Some(index) = cursor {
        let node = &nodes[index];
        if let Some(action) = node.action {
            plan.push(actions[action].clone());
        }
        cursor = node.parent;
    }
    plan
}
