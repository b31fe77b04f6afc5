//! Tooling primitives for the limbo AI runtimes.
//!
//! Engine-agnostic on purpose: editors and debuggers consume these plain data types and never
//! reach into the runtimes directly.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod debugger;
pub mod trace;

pub use debugger::{BehaviorTreeData, DataError, TaskData};
pub use trace::{emit, NullTraceSink, SharedTraceSink, TraceEvent, TraceLog, TraceSink, VecTraceSink};
