//! Read-only snapshot of a running behavior tree for debugger views.
//!
//! The snapshot is a pre-order walk of the tree. Each task records its child count, so a viewer
//! can rebuild the hierarchy without parent links.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use limbo_core::{Status, Value};

const FIELDS_PER_TASK: usize = 6;
const HEADER_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("flat data too short: expected at least {HEADER_LEN} header entries")]
    MissingHeader,

    #[error("flat data has {0} task entries, which is not a multiple of {FIELDS_PER_TASK}")]
    Truncated(usize),

    #[error("field `{field}` of task #{task} has the wrong type")]
    BadField { task: usize, field: &'static str },

    #[error("child counts don't describe a single tree")]
    MalformedTree,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TaskData {
    pub id: u64,
    pub name: String,
    pub num_children: usize,
    pub status: Status,
    pub elapsed: f64,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BehaviorTreeData {
    /// Path of the player node driving the tree, if known.
    pub player_path: String,
    /// Where the tree was loaded from, if known.
    pub source_path: String,
    pub tasks: Vec<TaskData>,
}

impl BehaviorTreeData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: TaskData) {
        self.tasks.push(task);
    }

    pub fn find(&self, id: u64) -> Option<&TaskData> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// True if the child counts describe exactly one tree rooted at the first task.
    pub fn is_well_formed(&self) -> bool {
        if self.tasks.is_empty() {
            return true;
        }
        let mut pending: usize = 1;
        for task in &self.tasks {
            if pending == 0 {
                return false;
            }
            pending = pending - 1 + task.num_children;
        }
        pending == 0
    }

    /// Flat encoding: two header strings, then six entries per task
    /// (`id, name, num_children, status, elapsed, type_name`).
    pub fn encode(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.tasks.len() * FIELDS_PER_TASK);
        out.push(Value::String(self.player_path.clone()));
        out.push(Value::String(self.source_path.clone()));
        for t in &self.tasks {
            out.push(Value::Int(t.id as i64));
            out.push(Value::String(t.name.clone()));
            out.push(Value::Int(t.num_children as i64));
            out.push(Value::Int(t.status.code() as i64));
            out.push(Value::Float(t.elapsed));
            out.push(Value::String(t.type_name.clone()));
        }
        out
    }

    pub fn decode(flat: &[Value]) -> Result<Self, DataError> {
        if flat.len() < HEADER_LEN {
            return Err(DataError::MissingHeader);
        }
        let body = &flat[HEADER_LEN..];
        if body.len() % FIELDS_PER_TASK != 0 {
            return Err(DataError::Truncated(body.len()));
        }

        let text = |v: &Value, task: usize, field: &'static str| {
            v.as_str()
                .map(str::to_string)
                .ok_or(DataError::BadField { task, field })
        };
        let count = |v: &Value, task: usize, field: &'static str| match v {
            Value::Int(i) if *i >= 0 => Ok(*i as u64),
            _ => Err(DataError::BadField { task, field }),
        };

        let mut data = BehaviorTreeData {
            player_path: text(&flat[0], 0, "player_path")?,
            source_path: text(&flat[1], 0, "source_path")?,
            tasks: Vec::with_capacity(body.len() / FIELDS_PER_TASK),
        };
        for (i, chunk) in body.chunks(FIELDS_PER_TASK).enumerate() {
            let status = count(&chunk[3], i, "status")
                .ok()
                .and_then(Status::from_code)
                .ok_or(DataError::BadField { task: i, field: "status" })?;
            let elapsed = match &chunk[4] {
                Value::Float(f) => *f,
                Value::Int(n) => *n as f64,
                _ => return Err(DataError::BadField { task: i, field: "elapsed" }),
            };
            data.tasks.push(TaskData {
                id: count(&chunk[0], i, "id")?,
                name: text(&chunk[1], i, "name")?,
                num_children: count(&chunk[2], i, "num_children")? as usize,
                status,
                elapsed,
                type_name: text(&chunk[5], i, "type_name")?,
            });
        }
        if !data.is_well_formed() {
            return Err(DataError::MalformedTree);
        }
        Ok(data)
    }
}
