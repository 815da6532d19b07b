// src/engine/mod.rs

//! Execution engine.
//!
//! - [`executor`] is the public entry point: construction from an operation
//!   sequence, `execute`, and introspection.
//! - [`scheduler`] contains the inline and dispatched scheduling loops.
//! - [`state`] holds the per-invocation counters and node states.
//! - [`tracker`] is the completion latch the invoking thread waits on.

pub mod executor;
mod scheduler;
pub(crate) mod state;
pub mod tracker;

pub use executor::Executor;
pub use tracker::CompletionTracker;
