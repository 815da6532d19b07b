// src/dag/builder.rs

//! Derive a [`DependencyGraph`] from the buffers each operation touches.
//!
//! A single left-to-right pass over the operation sequence keeps, for every
//! buffer, the most recent writer and the readers seen since that writer:
//!
//! - a read of `b` depends on the last writer of `b` (read-after-write);
//! - a write of `b` depends on the last writer of `b` (write-after-write) and
//!   on every reader since that writer (write-after-read), then becomes the
//!   new last writer and clears the reader set.
//!
//! Operations touching disjoint buffers get no edge between them.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::dag::DependencyGraph;
use crate::errors::{OpGraphError, Result};
use crate::types::{BufferId, BufferUse, MemoryAccess, NodeId};

#[derive(Debug, Default)]
struct BufferHistory {
    last_writer: Option<NodeId>,
    readers: Vec<NodeId>,
}

/// Incremental graph builder; add operations in program order.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    buffers: HashMap<BufferId, BufferHistory>,
    in_edges: Vec<BTreeSet<NodeId>>,
    transitive_reduction: bool,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove redundant (transitively implied) edges when building.
    pub fn transitive_reduction(mut self, enabled: bool) -> Self {
        self.transitive_reduction = enabled;
        self
    }

    /// Number of operations added so far.
    pub fn len(&self) -> usize {
        self.in_edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_edges.is_empty()
    }

    /// Append the next operation and return its node id.
    ///
    /// `uses` of `None` means the operation carries no buffer-use information,
    /// which makes the graph impossible to derive. An empty slice is fine and
    /// yields a node without dependencies.
    pub fn add_operation(&mut self, name: &str, uses: Option<&[BufferUse]>) -> Result<NodeId> {
        let id = self.in_edges.len();
        let uses = uses.ok_or_else(|| OpGraphError::MissingBufferUses {
            node: id,
            name: name.to_string(),
        })?;

        // Edges are derived from the history *before* this operation so that an
        // operation reading and writing the same buffer never depends on itself.
        let mut deps = BTreeSet::new();
        for u in uses {
            let Some(history) = self.buffers.get(&u.buffer) else {
                continue;
            };
            deps.extend(history.last_writer);
            if u.access == MemoryAccess::Write {
                deps.extend(history.readers.iter().copied());
            }
        }

        for u in uses.iter().filter(|u| u.access == MemoryAccess::Read) {
            let history = self.buffers.entry(u.buffer.clone()).or_default();
            if history.readers.last() != Some(&id) {
                history.readers.push(id);
            }
        }
        for u in uses.iter().filter(|u| u.access == MemoryAccess::Write) {
            let history = self.buffers.entry(u.buffer.clone()).or_default();
            history.last_writer = Some(id);
            history.readers.clear();
        }

        trace!(node = id, op = %name, deps = ?deps, "derived in-edges");
        self.in_edges.push(deps);
        Ok(id)
    }

    pub fn build(self) -> Result<DependencyGraph> {
        let graph = DependencyGraph::from_in_edges(self.in_edges)?;
        let graph = if self.transitive_reduction {
            graph.transitive_reduction()
        } else {
            graph
        };

        debug!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            sources = graph.source().len(),
            sinks = graph.sink().len(),
            "dependency graph built"
        );
        Ok(graph)
    }
}
