// src/engine/scheduler.rs

//! Run-time scheduling loop.
//!
//! Without a dispatcher, nodes run one at a time on the calling thread in the
//! graph's topological order. With a dispatcher:
//!
//! - the calling thread seeds the ready queue with the source nodes;
//! - whoever holds a ready queue runs its first node inline and hands every
//!   other ready node to the dispatcher as its own task;
//! - after a node succeeds, the thread that ran it decrements the counters of
//!   its out-edges and keeps going with the nodes that reached zero;
//! - the calling thread waits on the completion tracker.
//!
//! A dispatcher may run a task synchronously, on the very thread that is
//! inside the ready loop. Such tasks are parked on a thread-local worklist
//! and drained after that loop returns, so the stack stays flat no matter how
//! long the graph is.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::dag::DependencyGraph;
use crate::engine::state::{ExecuteState, Failures, NodeState};
use crate::errors::Result;
use crate::exec::{Operation, Task};
use crate::types::NodeId;

type ReadyQueue = Vec<NodeId>;

thread_local! {
    /// Number of `execute_ready` frames active on this thread.
    static LOOP_DEPTH: Cell<usize> = const { Cell::new(0) };
    /// Dispatched tasks that arrived while this thread was inside a loop.
    static DEFERRED: RefCell<Vec<Task>> = const { RefCell::new(Vec::new()) };
}

/// Marks the current thread as inside `execute_ready` for its lifetime.
struct LoopGuard;

impl LoopGuard {
    fn enter() -> Self {
        LOOP_DEPTH.with(|d| d.set(d.get() + 1));
        LoopGuard
    }

    fn active() -> bool {
        LOOP_DEPTH.with(|d| d.get() > 0)
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        LOOP_DEPTH.with(|d| d.set(d.get() - 1));
    }
}

fn deferred_len() -> usize {
    DEFERRED.with(|q| q.borrow().len())
}

fn defer(task: Task) {
    DEFERRED.with(|q| q.borrow_mut().push(task));
}

/// Run deferred tasks until the worklist is back to `base` entries.
///
/// Tasks below `base` belong to an enclosing drain further up the stack.
fn drain_deferred(base: usize) {
    loop {
        let next = DEFERRED.with(|q| {
            let mut q = q.borrow_mut();
            if q.len() > base { q.pop() } else { None }
        });
        match next {
            Some(task) => task(),
            None => break,
        }
    }
}

/// Run `op`, turning a panic into an error so that completion accounting
/// still happens.
fn invoke<P>(op: &dyn Operation<P>, params: &P) -> anyhow::Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| op.execute(params))) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("operation panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Execute every node on the calling thread.
///
/// A node whose predecessor failed or was skipped is skipped itself; all
/// other nodes still run, so the outcome matches dispatched execution.
pub(crate) fn execute_inline<P>(
    graph: &DependencyGraph,
    operations: &[Box<dyn Operation<P>>],
    params: &P,
) -> Result<()> {
    let mut states = vec![NodeState::Pending; graph.len()];
    let mut failures = Failures::default();

    for &id in graph.topological_order() {
        let node = &graph.nodes()[id];
        if node.in_edges.iter().any(|&dep| states[dep] != NodeState::Done) {
            debug!(node = id, "upstream failure; skipping");
            states[id] = NodeState::Skipped;
            continue;
        }

        let op = operations[id].as_ref();
        debug!(node = id, op = %op.name(), "running node inline");
        states[id] = NodeState::Running;
        match invoke(op, params) {
            Ok(()) => states[id] = NodeState::Done,
            Err(err) => {
                warn!(node = id, op = %op.name(), error = %err, "operation failed");
                states[id] = NodeState::Failed;
                failures.record(id, err);
            }
        }
    }

    let skipped = states.iter().filter(|s| **s == NodeState::Skipped).count();
    failures.into_result(|id| operations[id].name(), skipped)
}

/// Execute the graph through `state.dispatcher` and block until every node
/// has been accounted for.
pub(crate) fn execute_concurrent<P>(state: Arc<ExecuteState<P>>) -> Result<()>
where
    P: Send + Sync + 'static,
{
    let sources: ReadyQueue = state.graph.source().to_vec();
    for &id in &sources {
        state.set_state(id, NodeState::Ready);
    }

    let base = deferred_len();
    execute_ready(&state, sources);
    drain_deferred(base);
    state.tracker.wait();
    state.take_result()
}

fn execute_ready<P>(state: &Arc<ExecuteState<P>>, mut ready: ReadyQueue)
where
    P: Send + Sync + 'static,
{
    let _guard = LoopGuard::enter();
    while let Some((&id, rest)) = ready.split_first() {
        for &other in rest {
            dispatch_node(state, other);
        }
        ready.clear();
        run_node(state, id, &mut ready);
    }
}

fn run_node<P>(state: &ExecuteState<P>, id: NodeId, ready: &mut ReadyQueue) {
    debug_assert_eq!(state.node_state(id), NodeState::Ready);
    state.set_state(id, NodeState::Running);

    let op = state.operations[id].as_ref();
    debug!(node = id, op = %op.name(), "running node");

    match invoke(op, &state.params) {
        Ok(()) => {
            state.set_state(id, NodeState::Done);
            process_out_edges(state, id, ready);
            state.tracker.count_down(1);
        }
        Err(err) => state.fail_node(id, err),
    }
}

/// Push every out-edge target of `id` that just became ready.
fn process_out_edges<P>(state: &ExecuteState<P>, id: NodeId, ready: &mut ReadyQueue) {
    for &out in &state.graph.nodes()[id].out_edges {
        if state.satisfy_in_edge(out) {
            ready.push(out);
        }
    }
}

fn dispatch_node<P>(state: &Arc<ExecuteState<P>>, id: NodeId)
where
    P: Send + Sync + 'static,
{
    let task = DispatchedNode {
        state: Some(Arc::clone(state)),
        node: id,
    };
    state.dispatcher.dispatch(Box::new(move || task.run()));
}

/// A ready node travelling through the dispatcher.
///
/// If the dispatcher drops the task without running it, the node is failed
/// on drop so the invoking thread is still released.
struct DispatchedNode<P> {
    state: Option<Arc<ExecuteState<P>>>,
    node: NodeId,
}

impl<P> DispatchedNode<P>
where
    P: Send + Sync + 'static,
{
    fn run(self) {
        if LoopGuard::active() {
            debug!(node = self.node, "dispatcher ran task inside a ready loop; deferring");
            defer(Box::new(move || self.execute()));
            return;
        }
        let base = deferred_len();
        self.execute();
        drain_deferred(base);
    }

    fn execute(mut self) {
        if let Some(state) = self.state.take() {
            execute_ready(&state, vec![self.node]);
        }
    }
}

impl<P> Drop for DispatchedNode<P> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.fail_node(
                self.node,
                anyhow!("dispatcher dropped the task without running it"),
            );
        }
    }
}
