// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{OpGraphError, Result};
use crate::types::NodeId;

/// Edges of a single node, identified by its position in the operation
/// sequence.
///
/// Both edge lists are sorted ascending and contain no duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDef {
    pub id: NodeId,
    /// Nodes that must finish before this one may start.
    pub in_edges: Vec<NodeId>,
    /// Nodes that become (closer to) eligible once this one finishes.
    pub out_edges: Vec<NodeId>,
}

/// Immutable dependency graph over `[0, len)`.
///
/// Built once (see [`GraphBuilder`](crate::dag::GraphBuilder)) and then only
/// read, so it can be shared behind an `Arc` by any number of concurrent
/// executions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: Vec<NodeDef>,
    source: Vec<NodeId>,
    sink: Vec<NodeId>,
    /// Topological order with ascending-id tie break.
    order: Vec<NodeId>,
}

impl DependencyGraph {
    /// Build a graph from an explicit edge list.
    ///
    /// Duplicate edges are collapsed. Fails with [`OpGraphError::InvalidEdge`]
    /// if an edge references a node outside `[0, num_nodes)`, and with
    /// [`OpGraphError::DependencyCycle`] if the edges are not acyclic.
    pub fn from_node_edges(
        num_nodes: usize,
        edges: impl IntoIterator<Item = (NodeId, NodeId)>,
    ) -> Result<Self> {
        let mut in_edges = vec![BTreeSet::new(); num_nodes];
        for (from, to) in edges {
            if from >= num_nodes || to >= num_nodes {
                return Err(OpGraphError::InvalidEdge {
                    from,
                    to,
                    nodes: num_nodes,
                });
            }
            in_edges[to].insert(from);
        }
        Self::from_in_edges(in_edges)
    }

    /// Validate acyclicity and assemble the graph from per-node in-edge sets.
    pub(crate) fn from_in_edges(in_edges: Vec<BTreeSet<NodeId>>) -> Result<Self> {
        ensure_acyclic(&in_edges)?;
        Ok(Self::assemble(in_edges))
    }

    /// Derive out-edges, source/sink sets and the execution order.
    ///
    /// Callers guarantee that `in_edges` is acyclic and in range.
    fn assemble(in_edges: Vec<BTreeSet<NodeId>>) -> Self {
        let mut nodes: Vec<NodeDef> = in_edges
            .iter()
            .enumerate()
            .map(|(id, ins)| NodeDef {
                id,
                in_edges: ins.iter().copied().collect(),
                out_edges: Vec::new(),
            })
            .collect();

        // Visiting targets in ascending order keeps every out-edge list sorted.
        for (to, ins) in in_edges.iter().enumerate() {
            for &from in ins {
                nodes[from].out_edges.push(to);
            }
        }

        let source = nodes
            .iter()
            .filter(|n| n.in_edges.is_empty())
            .map(|n| n.id)
            .collect();
        let sink = nodes
            .iter()
            .filter(|n| n.out_edges.is_empty())
            .map(|n| n.id)
            .collect();
        let order = kahn_order(&nodes);

        Self {
            nodes,
            source,
            sink,
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeDef] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeDef> {
        self.nodes.get(id)
    }

    /// Nodes without in-edges, ascending.
    pub fn source(&self) -> &[NodeId] {
        &self.source
    }

    /// Nodes without out-edges, ascending.
    pub fn sink(&self) -> &[NodeId] {
        &self.sink
    }

    /// A valid execution order; among unordered nodes the lower id comes first.
    pub fn topological_order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.out_edges.len()).sum()
    }

    /// Whether `to` can be reached from `from` by following out-edges.
    ///
    /// A node does not reach itself.
    pub fn is_reachable(&self, from: NodeId, to: NodeId) -> bool {
        if from >= self.len() || to >= self.len() {
            return false;
        }
        let mut visited = vec![false; self.len()];
        let mut stack: Vec<NodeId> = self.nodes[from].out_edges.clone();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !std::mem::replace(&mut visited[id], true) {
                stack.extend(self.nodes[id].out_edges.iter().copied());
            }
        }
        false
    }

    /// All nodes reachable from `id` (excluding `id`), ascending.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut visited = vec![false; self.len()];
        let mut stack: Vec<NodeId> = node.out_edges.clone();
        while let Some(next) = stack.pop() {
            if !std::mem::replace(&mut visited[next], true) {
                stack.extend(self.nodes[next].out_edges.iter().copied());
            }
        }
        visited
            .iter()
            .enumerate()
            .filter_map(|(i, &seen)| seen.then_some(i))
            .collect()
    }

    /// Return a copy of this graph with every edge `u -> v` removed when `v`
    /// is still reachable from `u` through another successor of `u`.
    ///
    /// Reachability, and therefore the execution ordering, is unchanged.
    pub fn transitive_reduction(&self) -> Self {
        let mut in_edges = vec![BTreeSet::new(); self.len()];
        for node in &self.nodes {
            for &to in &node.out_edges {
                let redundant = node
                    .out_edges
                    .iter()
                    .any(|&other| other != to && self.is_reachable(other, to));
                if !redundant {
                    in_edges[to].insert(node.id);
                }
            }
        }
        Self::assemble(in_edges)
    }
}

fn ensure_acyclic(in_edges: &[BTreeSet<NodeId>]) -> Result<()> {
    // Edge direction: dependency -> dependent.
    let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();
    for id in 0..in_edges.len() {
        graph.add_node(id);
    }
    for (to, ins) in in_edges.iter().enumerate() {
        for &from in ins {
            graph.add_edge(from, to, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(OpGraphError::DependencyCycle(format!(
            "cycle detected in dependency graph involving node #{}",
            cycle.node_id()
        ))),
    }
}

fn kahn_order(nodes: &[NodeDef]) -> Vec<NodeId> {
    let mut remaining: Vec<usize> = nodes.iter().map(|n| n.in_edges.len()).collect();
    let mut ready: BinaryHeap<Reverse<NodeId>> = nodes
        .iter()
        .filter(|n| n.in_edges.is_empty())
        .map(|n| Reverse(n.id))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for &out in &nodes[id].out_edges {
            remaining[out] -= 1;
            if remaining[out] == 0 {
                ready.push(Reverse(out));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> DependencyGraph {
        DependencyGraph::from_node_edges(4, [(0, 1), (0, 2), (1, 3), (2, 3)]).unwrap()
    }

    #[test]
    fn derives_out_edges_sources_and_sinks() {
        let g = diamond();
        assert_eq!(g.len(), 4);
        assert_eq!(g.node(0).unwrap().out_edges, vec![1, 2]);
        assert_eq!(g.node(3).unwrap().in_edges, vec![1, 2]);
        assert_eq!(g.source(), &[0]);
        assert_eq!(g.sink(), &[3]);
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn duplicate_edges_are_collapsed() {
        let g = DependencyGraph::from_node_edges(2, [(0, 1), (0, 1), (0, 1)]).unwrap();
        assert_eq!(g.node(0).unwrap().out_edges, vec![1]);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn topological_order_breaks_ties_by_id() {
        // 2 -> 0, 1 is independent.
        let g = DependencyGraph::from_node_edges(3, [(2, 0)]).unwrap();
        assert_eq!(g.topological_order(), &[1, 2, 0]);
        assert_eq!(diamond().topological_order(), &[0, 1, 2, 3]);
    }

    #[test]
    fn cycle_is_rejected() {
        let err = DependencyGraph::from_node_edges(3, [(0, 1), (1, 2), (2, 0)]).unwrap_err();
        match err {
            OpGraphError::DependencyCycle(msg) => assert!(msg.contains("cycle detected")),
            other => panic!("expected DependencyCycle, got {other:?}"),
        }
    }

    #[test]
    fn self_loop_is_rejected() {
        let err = DependencyGraph::from_node_edges(1, [(0, 0)]).unwrap_err();
        assert!(matches!(err, OpGraphError::DependencyCycle(_)));
    }

    #[test]
    fn out_of_range_edge_is_rejected() {
        let err = DependencyGraph::from_node_edges(2, [(0, 5)]).unwrap_err();
        assert!(matches!(
            err,
            OpGraphError::InvalidEdge {
                from: 0,
                to: 5,
                nodes: 2
            }
        ));
    }

    #[test]
    fn reachability_and_descendants() {
        let g = diamond();
        assert!(g.is_reachable(0, 3));
        assert!(!g.is_reachable(3, 0));
        assert!(!g.is_reachable(1, 2));
        assert!(!g.is_reachable(0, 0));
        assert_eq!(g.descendants(0), vec![1, 2, 3]);
        assert_eq!(g.descendants(1), vec![3]);
        assert!(g.descendants(3).is_empty());
    }

    #[test]
    fn transitive_reduction_drops_shortcut_edges() {
        let g = DependencyGraph::from_node_edges(3, [(0, 1), (1, 2), (0, 2)]).unwrap();
        let reduced = g.transitive_reduction();
        assert_eq!(reduced.node(0).unwrap().out_edges, vec![1]);
        assert_eq!(reduced.node(2).unwrap().in_edges, vec![1]);
        assert_eq!(reduced.source(), g.source());
        assert_eq!(reduced.sink(), g.sink());

        // Already minimal graphs are unchanged.
        assert_eq!(diamond().transitive_reduction(), diamond());
    }

    #[test]
    fn empty_graph() {
        let g = DependencyGraph::from_node_edges(0, []).unwrap();
        assert!(g.is_empty());
        assert!(g.source().is_empty());
        assert!(g.sink().is_empty());
        assert!(g.topological_order().is_empty());
    }
}
