//! Hierarchical state machines built on `limbo-core`.
//!
//! An [`Hsm`] is an arena of states rooted at one machine. Leaf states run callbacks, machine
//! states keep exactly one active child chosen by event-driven transitions, and parallel states
//! run all of their children together.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

#[cfg(feature = "bt")]
#[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
pub mod bt_state;
pub mod error;
pub mod hsm;
pub mod state;

#[cfg(feature = "bt")]
pub use bt_state::{BtState, BtStateHandle};
pub use error::HsmError;
pub use hsm::{ActiveStateChange, Hsm, TransitionFrom};
pub use limbo_core::UpdateMode;
pub use state::{LimboState, StateCtx, StateId, StateKind};
