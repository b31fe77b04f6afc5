use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use limbo_core::{Blackboard, Value};

/// Named facts, in name order.
pub type Facts = BTreeMap<String, Value>;

/// Symbolic snapshot of the world the planner reasons about.
///
/// Facts compare with [`Value::matches`]: types must agree and floats match within
/// [`limbo_core::FLOAT_EPSILON`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct WorldState {
    facts: Facts,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_facts(facts: Facts) -> Self {
        Self { facts }
    }

    pub fn with_fact(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_fact(name, value);
        self
    }

    pub fn set_fact(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.facts.insert(name.into(), value.into());
    }

    /// Value of `name`, or `default` when the fact is unknown.
    pub fn get_fact(&self, name: &str, default: Value) -> Value {
        self.facts.get(name).cloned().unwrap_or(default)
    }

    pub fn fact(&self, name: &str) -> Option<&Value> {
        self.facts.get(name)
    }

    pub fn has_fact(&self, name: &str) -> bool {
        self.facts.contains_key(name)
    }

    pub fn erase_fact(&mut self, name: &str) -> bool {
        self.facts.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.facts.clear();
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn fact_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.facts.keys().map(String::as_str)
    }

    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    /// Copies the named variables from `blackboard` (and its parents). Names the blackboard does
    /// not know are skipped, so they stay unknown here too.
    pub fn populate_from_blackboard<'a>(
        &mut self,
        blackboard: &Blackboard,
        names: impl IntoIterator<Item = &'a str>,
    ) {
        for name in names {
            if blackboard.has_var(name) {
                let value = blackboard.get_var(name, Value::Nil, false);
                self.facts.insert(name.to_string(), value);
            }
        }
    }

    /// Every fact of `goal` is present here with a matching value.
    pub fn satisfies(&self, goal: &WorldState) -> bool {
        goal.facts
            .iter()
            .all(|(name, want)| self.facts.get(name).is_some_and(|have| have.matches(want)))
    }

    /// Number of facts of `goal` that are missing here or hold a different value.
    pub fn distance_to(&self, goal: &WorldState) -> usize {
        goal.facts
            .iter()
            .filter(|(name, want)| !self.facts.get(*name).is_some_and(|have| have.matches(want)))
            .count()
    }

    /// Copy of this state with `effects` written over it.
    pub fn apply_effects(&self, effects: &Facts) -> WorldState {
        let mut next = self.clone();
        for (name, value) in effects {
            next.facts.insert(name.clone(), value.clone());
        }
        next
    }

    /// Order-independent hash of the facts. States that are [`WorldState::equals`] hash
    /// equally, floats within epsilon included; the converse needs `equals`.
    pub fn compute_hash(&self) -> u64 {
        self.facts.iter().fold(0u64, |acc, (name, value)| {
            let mut hasher = DefaultHasher::new();
            name.hash(&mut hasher);
            acc ^ hasher
                .finish()
                .wrapping_mul(31)
                .wrapping_add(value.match_hash())
        })
    }

    /// Same fact names with matching values.
    pub fn equals(&self, other: &WorldState) -> bool {
        self.facts.len() == other.facts.len() && self.satisfies(other) && other.satisfies(self)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for WorldState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            facts: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<Facts> for WorldState {
    fn from(facts: Facts) -> Self {
        Self { facts }
    }
}
