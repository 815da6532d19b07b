// src/dag/render.rs

//! Text listing and Graphviz DOT export for [`DependencyGraph`].
//!
//! Rendering is purely diagnostic and never consulted by execution.

use std::fmt::{self, Write};

use crate::dag::DependencyGraph;
use crate::types::NodeId;

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}

/// Write one header line plus one line per node, in id order.
///
/// `label` may attach a human-readable name to each node.
pub fn write_listing<'a, W, F>(out: &mut W, graph: &DependencyGraph, label: F) -> fmt::Result
where
    W: Write,
    F: Fn(NodeId) -> Option<&'a str>,
{
    write!(
        out,
        "DependencyGraph: #nodes={} #source_nodes={} #sink_nodes={}",
        graph.len(),
        graph.source().len(),
        graph.sink().len()
    )?;

    for node in graph.nodes() {
        write!(out, "\n - node #{}", node.id)?;
        if let Some(name) = label(node.id) {
            write!(out, " '{name}'")?;
        }
        write!(
            out,
            ": in_edges=[{}] out_edges=[{}]",
            join_ids(&node.in_edges),
            join_ids(&node.out_edges)
        )?;
    }
    Ok(())
}

/// Render the graph as Graphviz DOT. Source nodes are drawn bold.
pub fn to_dot<'a, F>(graph: &DependencyGraph, label: F) -> String
where
    F: Fn(NodeId) -> Option<&'a str>,
{
    let mut dot = String::from("digraph opgraph {\n  rankdir=TB;\n  node [shape=box];\n");

    for node in graph.nodes() {
        let text = match label(node.id) {
            Some(name) => format!("#{} {}", node.id, escape_label(name)),
            None => format!("#{}", node.id),
        };
        let style = if node.in_edges.is_empty() {
            ", style=bold"
        } else {
            ""
        };
        dot.push_str(&format!("  n{} [label=\"{}\"{}];\n", node.id, text, style));
    }

    for node in graph.nodes() {
        for to in &node.out_edges {
            dot.push_str(&format!("  n{} -> n{};\n", node.id, to));
        }
    }

    dot.push_str("}\n");
    dot
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_listing(f, self, |_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> DependencyGraph {
        DependencyGraph::from_node_edges(3, [(0, 1), (1, 2), (0, 2)]).unwrap()
    }

    #[test]
    fn listing_is_deterministic_and_complete() {
        let text = chain().to_string();
        let expected = "DependencyGraph: #nodes=3 #source_nodes=1 #sink_nodes=1\n \
                        - node #0: in_edges=[] out_edges=[1, 2]\n \
                        - node #1: in_edges=[0] out_edges=[2]\n \
                        - node #2: in_edges=[0, 1] out_edges=[]";
        assert_eq!(text, expected);
        assert_eq!(text, chain().to_string());
    }

    #[test]
    fn listing_with_labels() {
        let names = ["load", "scale", "store"];
        let mut text = String::new();
        write_listing(&mut text, &chain(), |id| names.get(id).copied()).unwrap();
        assert!(text.contains(" - node #1 'scale': in_edges=[0] out_edges=[2]"));
    }

    #[test]
    fn dot_contains_every_node_and_edge() {
        let dot = to_dot(&chain(), |id| (id == 0).then_some("say \"hi\""));
        assert!(dot.starts_with("digraph opgraph {"));
        assert!(dot.contains("n0 [label=\"#0 say \\\"hi\\\"\", style=bold];"));
        assert!(dot.contains("n1 [label=\"#1\"];"));
        assert!(dot.contains("n0 -> n1;"));
        assert!(dot.contains("n0 -> n2;"));
        assert!(dot.contains("n1 -> n2;"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
