//! Umbrella crate that re-exports the `limbo-*` runtimes.
//!
//! Each runtime sits behind a feature of the same name; `full` (the default) enables all of them.
//! The `bt` feature also turns on the behavior-tree integrations of the state machine
//! (`BtState`) and the planner (`RunGoapPlan`).

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

#[cfg(feature = "core")]
#[cfg_attr(docsrs, doc(cfg(feature = "core")))]
pub use limbo_core as core;

#[cfg(feature = "tools")]
#[cfg_attr(docsrs, doc(cfg(feature = "tools")))]
pub use limbo_tools as tools;

#[cfg(feature = "bt")]
#[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
pub use limbo_bt as bt;

#[cfg(feature = "hsm")]
#[cfg_attr(docsrs, doc(cfg(feature = "hsm")))]
pub use limbo_hsm as hsm;

#[cfg(feature = "goap")]
#[cfg_attr(docsrs, doc(cfg(feature = "goap")))]
pub use limbo_goap as goap;
