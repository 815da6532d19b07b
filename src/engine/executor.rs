// src/engine/executor.rs

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::dag::{DependencyGraph, GraphBuilder, NodeDef, render};
use crate::engine::scheduler::{execute_concurrent, execute_inline};
use crate::engine::state::ExecuteState;
use crate::errors::{OpGraphError, Result};
use crate::exec::{Dispatcher, Operation};
use crate::types::NodeId;

/// Dataflow executor for an operation sequence.
///
/// The dependency graph is derived once at construction from the buffers each
/// operation declares, and then shared read-only by every call to
/// [`execute`](Self::execute). Calls may run concurrently from several
/// threads; each gets its own counters, ready queue and completion tracker.
pub struct Executor<P> {
    operations: Arc<[Box<dyn Operation<P>>]>,
    graph: Arc<DependencyGraph>,
}

impl<P> Clone for Executor<P> {
    fn clone(&self) -> Self {
        Self {
            operations: Arc::clone(&self.operations),
            graph: Arc::clone(&self.graph),
        }
    }
}

impl<P> fmt::Debug for Executor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

impl<P> Executor<P>
where
    P: Send + Sync + 'static,
{
    /// Build the dependency graph for `operations` (in program order).
    ///
    /// Fails if any operation has no buffer-use information.
    pub fn new(operations: Vec<Box<dyn Operation<P>>>) -> Result<Self> {
        Self::with_builder(operations, GraphBuilder::new())
    }

    /// Like [`new`](Self::new), with a preconfigured builder (e.g. with
    /// transitive reduction enabled).
    pub fn with_builder(
        operations: Vec<Box<dyn Operation<P>>>,
        mut builder: GraphBuilder,
    ) -> Result<Self> {
        for op in &operations {
            builder.add_operation(op.name(), op.buffer_uses())?;
        }
        let graph = builder.build()?;
        Self::from_parts(operations, graph)
    }

    /// Pair operations with a graph built elsewhere.
    ///
    /// Node `i` of `graph` runs `operations[i]`.
    pub fn from_parts(
        operations: Vec<Box<dyn Operation<P>>>,
        graph: DependencyGraph,
    ) -> Result<Self> {
        if operations.len() != graph.len() {
            return Err(OpGraphError::GraphMismatch {
                operations: operations.len(),
                nodes: graph.len(),
            });
        }

        info!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            sources = ?graph.source(),
            sinks = ?graph.sink(),
            "executor ready"
        );

        Ok(Self {
            operations: operations.into(),
            graph: Arc::new(graph),
        })
    }

    /// Run every operation, respecting data dependencies.
    ///
    /// With `dispatcher == None` all nodes run on the calling thread. With a
    /// dispatcher, independent nodes may run concurrently; the calling thread
    /// runs work too and returns once every node has finished, failed or been
    /// skipped because an ancestor failed.
    ///
    /// On failure the error names the lowest failing node id; nodes that do
    /// not depend on a failed node still run to completion.
    pub fn execute(&self, params: Arc<P>, dispatcher: Option<Arc<dyn Dispatcher>>) -> Result<()> {
        let concurrent = dispatcher.is_some();
        info!(nodes = self.graph.len(), concurrent, "execution started");

        let result = match dispatcher {
            None => execute_inline(&self.graph, &self.operations, &params),
            Some(dispatcher) => {
                let state = ExecuteState::new(
                    Arc::clone(&self.graph),
                    Arc::clone(&self.operations),
                    params,
                    dispatcher,
                );
                execute_concurrent(Arc::new(state))
            }
        };

        match &result {
            Ok(()) => info!(nodes = self.graph.len(), concurrent, "execution finished"),
            Err(err) => warn!(error = %err, concurrent, "execution failed"),
        }
        result
    }
}

impl<P> Executor<P> {
    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn nodes_defs(&self) -> &[NodeDef] {
        self.graph.nodes()
    }

    pub fn node_def(&self, id: NodeId) -> Option<&NodeDef> {
        self.graph.node(id)
    }

    pub fn source(&self) -> &[NodeId] {
        self.graph.source()
    }

    pub fn sink(&self) -> &[NodeId] {
        self.graph.sink()
    }

    pub fn operation(&self, id: NodeId) -> Option<&dyn Operation<P>> {
        self.operations.get(id).map(|op| op.as_ref())
    }

    /// Graphviz DOT rendering labelled with operation names.
    pub fn to_dot(&self) -> String {
        render::to_dot(&self.graph, |id| self.operations.get(id).map(|op| op.name()))
    }
}

impl<P> fmt::Display for Executor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render::write_listing(f, &self.graph, |id| {
            self.operations.get(id).map(|op| op.name())
        })
    }
}
