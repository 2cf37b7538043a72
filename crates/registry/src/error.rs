//! Registry lookup and dependency-tracking errors.

use dagforge_core::WorkflowId;
use thiserror::Error;

/// Errors raised by registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A dependency edge or lookup referenced an unregistered workflow.
    #[error("unknown workflow: {0}")]
    UnknownWorkflow(WorkflowId),
}
