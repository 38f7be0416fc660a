//! Marginalia - autonomous margin comments for a flat-file journal
//!
//! Marginalia periodically asks a local model server to comment on
//! user-written notes. A background scheduler decides per model when a
//! comment is due, picks an eligible note under per-model/per-post quotas,
//! generates with a hard wall-clock timeout, and records the result. All
//! state lives in flat JSON documents guarded by advisory lockfiles.

pub mod domain;
pub mod error;
pub mod id;
pub mod llm;
pub mod scheduler;
pub mod store;

pub use error::{MarginaliaError, Result};
