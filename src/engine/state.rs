// src/engine/state.rs

//! Per-invocation execution state.
//!
//! One `ExecuteState` is created for every `Executor::execute` call that uses
//! a dispatcher and is dropped once the last task referencing it returns. It
//! is never shared between invocations; the graph and operations it points to
//! are.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::dag::DependencyGraph;
use crate::engine::tracker::CompletionTracker;
use crate::errors::{OpGraphError, Result};
use crate::exec::{Dispatcher, Operation};
use crate::types::NodeId;

/// Lifecycle of a node within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum NodeState {
    /// Waiting for at least one predecessor.
    Pending = 0,
    /// All predecessors finished; queued or handed to the dispatcher.
    Ready = 1,
    Running = 2,
    Done = 3,
    Failed = 4,
    /// Can never run because an ancestor failed.
    Skipped = 5,
}

impl NodeState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => NodeState::Pending,
            1 => NodeState::Ready,
            2 => NodeState::Running,
            3 => NodeState::Done,
            4 => NodeState::Failed,
            5 => NodeState::Skipped,
            _ => unreachable!("invalid node state {raw}"),
        }
    }
}

/// Failures recorded during one execution, keyed by node id.
///
/// The lowest failing node id is reported; the rest are listed as
/// `also_failed`. This makes the result independent of thread timing.
#[derive(Debug, Default)]
pub(crate) struct Failures {
    by_node: BTreeMap<NodeId, anyhow::Error>,
}

impl Failures {
    pub(crate) fn record(&mut self, node: NodeId, err: anyhow::Error) {
        self.by_node.entry(node).or_insert(err);
    }

    pub(crate) fn into_result<'a, F>(mut self, name_of: F, skipped: usize) -> Result<()>
    where
        F: Fn(NodeId) -> &'a str,
    {
        let Some((node, cause)) = self.by_node.pop_first() else {
            return Ok(());
        };
        Err(OpGraphError::OperationFailed {
            node,
            name: name_of(node).to_string(),
            cause,
            also_failed: self.by_node.into_keys().collect(),
            skipped,
        })
    }
}

pub(crate) struct ExecuteState<P> {
    pub(crate) graph: Arc<DependencyGraph>,
    pub(crate) operations: Arc<[Box<dyn Operation<P>>]>,
    pub(crate) params: Arc<P>,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
    /// Unfinished in-edges per node.
    counters: Box<[AtomicUsize]>,
    states: Box<[AtomicU8]>,
    pub(crate) tracker: CompletionTracker,
    failures: Mutex<Failures>,
    skipped: AtomicUsize,
}

impl<P> ExecuteState<P> {
    pub(crate) fn new(
        graph: Arc<DependencyGraph>,
        operations: Arc<[Box<dyn Operation<P>>]>,
        params: Arc<P>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let counters = graph
            .nodes()
            .iter()
            .map(|n| AtomicUsize::new(n.in_edges.len()))
            .collect();
        let states = graph
            .nodes()
            .iter()
            .map(|_| AtomicU8::new(NodeState::Pending as u8))
            .collect();
        let tracker = CompletionTracker::new(graph.len());

        Self {
            graph,
            operations,
            params,
            dispatcher,
            counters,
            states,
            tracker,
            failures: Mutex::new(Failures::default()),
            skipped: AtomicUsize::new(0),
        }
    }

    pub(crate) fn node_state(&self, id: NodeId) -> NodeState {
        NodeState::from_u8(self.states[id].load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, id: NodeId, state: NodeState) {
        self.states[id].store(state as u8, Ordering::Release);
    }

    pub(crate) fn name_of(&self, id: NodeId) -> &str {
        self.operations[id].name()
    }

    /// Mark one in-edge of `id` as satisfied.
    ///
    /// Returns `true` for exactly one caller: the one whose decrement brought
    /// the counter to zero. That caller owns launching the node.
    pub(crate) fn satisfy_in_edge(&self, id: NodeId) -> bool {
        // AcqRel: the launching thread must observe every predecessor's writes.
        if self.counters[id].fetch_sub(1, Ordering::AcqRel) == 1 {
            self.set_state(id, NodeState::Ready);
            true
        } else {
            false
        }
    }

    /// Record a failed node, starve its descendants and account for all of
    /// them on the completion tracker.
    pub(crate) fn fail_node(&self, id: NodeId, err: anyhow::Error) {
        warn!(node = id, op = %self.name_of(id), error = %err, "operation failed");
        self.set_state(id, NodeState::Failed);
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(id, err);

        let starved = self.starve_descendants(id);
        self.tracker.count_down(1 + starved);
    }

    /// Mark every still-pending descendant of `id` as skipped.
    ///
    /// Returns how many nodes this call newly skipped. Descendants shared with
    /// another failed node are counted by whichever failure reaches them first.
    fn starve_descendants(&self, id: NodeId) -> usize {
        let mut newly_skipped = 0;
        for d in self.graph.descendants(id) {
            let swapped = self.states[d].compare_exchange(
                NodeState::Pending as u8,
                NodeState::Skipped as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            if swapped.is_ok() {
                newly_skipped += 1;
            }
        }

        if newly_skipped > 0 {
            warn!(
                node = id,
                skipped = newly_skipped,
                "dependents of failed node will not run"
            );
            self.skipped.fetch_add(newly_skipped, Ordering::AcqRel);
        }
        newly_skipped
    }

    /// Build the invocation result once the tracker has been released.
    pub(crate) fn take_result(&self) -> Result<()> {
        let failures = std::mem::take(
            &mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let skipped = self.skipped.load(Ordering::Acquire);
        failures.into_result(|id| self.name_of(id), skipped)
    }
}
