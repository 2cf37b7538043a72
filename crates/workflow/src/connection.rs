//! Directed data-flow edges between nodes.

use dagforge_core::NodeId;
use serde::{Deserialize, Serialize};

/// A directed edge: the output of `from` may be read by `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// The upstream node.
    pub from: NodeId,
    /// The downstream node.
    pub to: NodeId,
}

impl Connection {
    /// Create a connection from `from` to `to`.
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Self { from, to }
    }
}
