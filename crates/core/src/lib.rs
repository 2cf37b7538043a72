//! # DagForge Core
//!
//! Shared identifiers used across every DagForge crate. This crate has no
//! knowledge of graphs, execution, or workflows — it exists so that
//! `dagforge-workflow`, `dagforge-context`, `dagforge-registry` and
//! `dagforge-engine` all agree on what a `NodeId` or `WorkflowId` is without
//! depending on each other.

pub mod id;

pub use id::{ConnectionId, ExecutionId, NodeId, UuidParseError, WorkflowId};

/// Common prelude for downstream DagForge crates.
pub mod prelude {
    pub use crate::id::{ConnectionId, ExecutionId, NodeId, WorkflowId};
}
