//! Values, blackboards and parameter bindings shared by the limbo AI runtimes.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod blackboard;
pub mod error;
pub mod object;
pub mod ops;
pub mod param;
pub mod path;
pub mod plan;
pub mod rng;
pub mod status;
pub mod value;
pub mod variable;

pub use blackboard::Blackboard;
pub use error::{BlackboardError, PlanError};
pub use object::{same_object, HostObject, ObjectRef, PropertyBag};
pub use ops::{CheckType, Operation};
pub use param::{BbParam, ParamDuplicates, ValueSource};
pub use path::NodePath;
pub use plan::{BlackboardPlan, SharedPlan, VarDescriptor};
pub use rng::{mix64, DeterministicRng, SplitMix64};
pub use status::{Status, UpdateMode};
pub use value::{Value, VariantType, Vector2, Vector3, FLOAT_EPSILON};
pub use variable::{BbVariable, PropertyHint};
