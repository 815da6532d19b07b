// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::types::NodeId;

#[derive(Error, Debug)]
pub enum OpGraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Graph construction needs complete buffer-use information for every
    /// operation.
    #[error("operation #{node} ('{name}') declares no buffer uses")]
    MissingBufferUses { node: NodeId, name: String },

    #[error("edge {from} -> {to} is invalid for a graph with {nodes} nodes")]
    InvalidEdge {
        from: NodeId,
        to: NodeId,
        nodes: usize,
    },

    #[error("graph has {nodes} nodes but {operations} operations were supplied")]
    GraphMismatch { operations: usize, nodes: usize },

    #[error("Cycle detected in dependency graph: {0}")]
    DependencyCycle(String),

    /// An operation failed during `Executor::execute`.
    ///
    /// `node` is the lowest failing node id of the invocation; any other
    /// nodes that failed in the same invocation are listed in `also_failed`.
    /// `skipped` counts nodes that never ran because an ancestor failed.
    #[error("operation #{node} ('{name}') failed: {cause:#}")]
    OperationFailed {
        node: NodeId,
        name: String,
        cause: anyhow::Error,
        also_failed: Vec<NodeId>,
        skipped: usize,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OpGraphError {
    /// The failing node id, if this is an execution error.
    pub fn failed_node(&self) -> Option<NodeId> {
        match self {
            OpGraphError::OperationFailed { node, .. } => Some(*node),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, OpGraphError>;
