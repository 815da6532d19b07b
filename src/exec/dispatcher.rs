// src/exec/dispatcher.rs

//! Pluggable work dispatcher abstraction.
//!
//! The executor hands ready nodes to a `Dispatcher` instead of talking to a
//! thread pool directly. This keeps the scheduling core independent of any
//! particular pool and makes it easy to swap in a synchronous dispatcher in
//! tests.
//!
//! - [`InlineDispatcher`] runs every task immediately on the calling thread.
//! - [`TokioDispatcher`] runs tasks on a Tokio runtime's blocking pool.
//! - Any `Fn(Task) + Send + Sync` closure is also a dispatcher.

use tokio::runtime::Handle;

/// A unit of work handed to a dispatcher.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Trait abstracting how dispatched tasks are run.
pub trait Dispatcher: Send + Sync {
    /// Arrange for `task` to run, either inline or asynchronously.
    ///
    /// A task that is dropped without being run is reported by the executor
    /// as a failure of the node it carried.
    fn dispatch(&self, task: Task);
}

impl<F> Dispatcher for F
where
    F: Fn(Task) + Send + Sync,
{
    fn dispatch(&self, task: Task) {
        self(task)
    }
}

/// Runs each task to completion before `dispatch` returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, task: Task) {
        task()
    }
}

/// Runs tasks on the blocking thread pool of a Tokio runtime.
///
/// Operations are synchronous, so they go to `spawn_blocking` rather than
/// onto the async worker threads. The pool size is bounded by the runtime's
/// `max_blocking_threads`.
#[derive(Debug, Clone)]
pub struct TokioDispatcher {
    handle: Handle,
}

impl TokioDispatcher {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Dispatcher for the runtime the caller is currently inside.
    ///
    /// Panics when called outside of a Tokio runtime, like `Handle::current`.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Dispatcher for TokioDispatcher {
    fn dispatch(&self, task: Task) {
        // The join handle is not needed: completion is tracked by the executor.
        drop(self.handle.spawn_blocking(task));
    }
}
