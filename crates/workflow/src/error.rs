//! Workflow graph construction and validation errors.

use dagforge_core::NodeId;
use thiserror::Error;

/// Errors raised while building or validating a workflow graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// A connection referenced a node id that isn't in the workflow.
    #[error("connection references unknown node: {0}")]
    UnknownNode(NodeId),

    /// A node id was registered twice.
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// The graph contains a cycle.
    #[error("workflow contains a cycle")]
    CycleDetected,

    /// The workflow has no nodes at all.
    #[error("workflow has no nodes")]
    EmptyWorkflow,

    /// The workflow has no source node (a node with no predecessors).
    #[error("workflow has no source node")]
    NoSourceNode,
}
