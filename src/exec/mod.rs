// src/exec/mod.rs

//! Operation and dispatch layer.
//!
//! - [`operation`] defines the `Operation` trait the executor runs.
//! - [`dispatcher`] provides the `Dispatcher` trait plus inline and Tokio
//!   implementations used to run ready nodes.
//! - [`simulated`] contains plan-file driven operations used by the CLI.

pub mod dispatcher;
pub mod operation;
pub mod simulated;

pub use dispatcher::{Dispatcher, InlineDispatcher, Task, TokioDispatcher};
pub use operation::Operation;
pub use simulated::{RunParams, SimulatedOperation};
