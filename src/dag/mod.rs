// src/dag/mod.rs

//! Dependency graph representation.
//!
//! - [`builder`] derives edges from the buffers each operation reads and writes.
//! - [`graph`] holds the immutable graph (nodes, edges, sources, sinks).
//! - [`render`] produces text listings and Graphviz DOT for diagnostics.

pub mod builder;
pub mod graph;
pub mod render;

pub use builder::GraphBuilder;
pub use graph::{DependencyGraph, NodeDef};
