//! Workflow definitions: identity, node/connection storage, metadata.

use std::collections::HashMap;

use dagforge_core::{NodeId, WorkflowId};
use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::error::WorkflowError;
use crate::node::Node;

/// A named, versioned DAG of nodes and connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique identifier.
    pub id: WorkflowId,
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Nodes, keyed implicitly by their own `id` field.
    pub nodes: Vec<Node>,
    /// Directed edges between node ids in `nodes`.
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Free-form metadata (e.g. author, tags) carried by the loader.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl WorkflowDefinition {
    /// Create an empty workflow.
    pub fn new(id: WorkflowId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            connections: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Add a node, rejecting duplicate ids.
    pub fn add_node(&mut self, node: Node) -> Result<(), WorkflowError> {
        if self.nodes.iter().any(|n| n.id == node.id) {
            return Err(WorkflowError::DuplicateNode(node.id));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Add a connection, rejecting unknown endpoints.
    pub fn add_connection(&mut self, from: NodeId, to: NodeId) -> Result<(), WorkflowError> {
        if !self.has_node(from) {
            return Err(WorkflowError::UnknownNode(from));
        }
        if !self.has_node(to) {
            return Err(WorkflowError::UnknownNode(to));
        }
        self.connections.push(Connection::new(from, to));
        Ok(())
    }

    /// Whether a node with this id exists.
    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
