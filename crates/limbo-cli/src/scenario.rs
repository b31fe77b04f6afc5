//! YAML scenario files.

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use limbo_core::{Blackboard, Value};
use limbo_goap::{Facts, GoapAction, GoapGoal, GoapPlannerConfig, RunGoapPlanConfig, WorldState};

/// A fact value as written in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&FactValue> for Value {
    fn from(value: &FactValue) -> Self {
        match value {
            FactValue::Bool(b) => Value::Bool(*b),
            FactValue::Int(i) => Value::Int(*i),
            FactValue::Float(f) => Value::Float(*f),
            FactValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl FactValue {
    /// Scalar facts only; anything else is shown as text.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(b) => FactValue::Bool(*b),
            Value::Int(i) => FactValue::Int(*i),
            Value::Float(f) => FactValue::Float(*f),
            Value::String(s) | Value::StringName(s) => FactValue::Text(s.clone()),
            other => FactValue::Text(other.to_string()),
        }
    }
}

fn to_facts(map: &BTreeMap<String, FactValue>) -> Facts {
    map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalSpec {
    pub name: String,
    pub target: BTreeMap<String, FactValue>,
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSpec {
    pub name: String,
    pub cost: u32,
    pub preconditions: BTreeMap<String, FactValue>,
    pub effects: BTreeMap<String, FactValue>,
    /// Simulated seconds the action takes before its effects land.
    pub duration: f64,
}

impl Default for ActionSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            cost: 1,
            preconditions: BTreeMap::new(),
            effects: BTreeMap::new(),
            duration: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    pub planner: GoapPlannerConfig,
    /// Replanning settings used by `simulate`.
    pub run: RunGoapPlanConfig,
    /// Facts that hold before any action runs.
    pub facts: BTreeMap<String, FactValue>,
    pub goal: GoalSpec,
    pub actions: Vec<ActionSpec>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario from {}", path.display()))?;
        let scenario = Self::parse(&content)
            .with_context(|| format!("Failed to parse scenario from {}", path.display()))?;
        Ok(scenario)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Self = serde_yaml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if self.goal.target.is_empty() {
            bail!("goal has no target facts");
        }
        let mut seen = std::collections::BTreeSet::new();
        for action in &self.actions {
            if action.name.is_empty() {
                bail!("every action needs a name");
            }
            if !seen.insert(action.name.as_str()) {
                bail!("duplicate action name `{}`", action.name);
            }
            if action.effects.is_empty() {
                bail!("action `{}` has no effects", action.name);
            }
        }
        Ok(())
    }

    pub fn world_state(&self) -> WorldState {
        WorldState::from_facts(to_facts(&self.facts))
    }

    pub fn goal(&self) -> GoapGoal {
        GoapGoal {
            name: self.goal.name.clone(),
            target_state: to_facts(&self.goal.target),
            priority: self.goal.priority,
        }
    }

    /// Symbolic actions, without execution trees.
    pub fn actions(&self) -> Vec<Rc<GoapAction>> {
        self.actions.iter().map(|spec| Rc::new(symbolic(spec))).collect()
    }

    pub fn blackboard(&self) -> Blackboard {
        let bb = Blackboard::new();
        for (name, value) in &self.facts {
            bb.set_var(name, Value::from(value));
        }
        bb
    }
}

pub fn symbolic(spec: &ActionSpec) -> GoapAction {
    let mut action = GoapAction::new(spec.name.clone()).with_cost(spec.cost);
    for (name, value) in &spec.preconditions {
        action = action.with_precondition(name.clone(), Value::from(value));
    }
    for (name, value) in &spec.effects {
        action = action.with_effect(name.clone(), Value::from(value));
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOOR: &str = r#"
name: door
planner:
  max_iterations: 64
facts:
  door_open: false
  has_key: false
  distance: 2.5
goal:
  name: Enter
  target:
    door_open: true
actions:
  - name: FetchKey
    effects:
      has_key: true
  - name: Unlock
    cost: 2
    preconditions:
      has_key: true
    effects:
      door_open: true
    duration: 0.5
"#;

    #[test]
    fn parses_with_defaults() {
        let scenario = Scenario::parse(DOOR).unwrap();
        assert_eq!(scenario.planner.max_iterations, 64);
        assert_eq!(scenario.run, RunGoapPlanConfig::default());
        assert_eq!(scenario.actions[0].cost, 1);
        assert_eq!(scenario.actions[0].duration, 0.0);
        assert_eq!(scenario.facts["distance"], FactValue::Float(2.5));
        assert_eq!(scenario.world_state().get_fact("door_open", Value::Nil), Value::Bool(false));
        assert_eq!(scenario.goal().required_facts(), ["door_open"]);
    }

    #[test]
    fn rejects_duplicate_actions() {
        let broken = DOOR.replace("FetchKey", "Unlock");
        let err = Scenario::parse(&broken).unwrap_err();
        assert!(err.to_string().contains("duplicate action"), "{err}");
    }

    #[test]
    fn rejects_goal_without_target() {
        let err = Scenario::parse("name: empty\n").unwrap_err();
        assert!(err.to_string().contains("no target"), "{err}");
    }
}
