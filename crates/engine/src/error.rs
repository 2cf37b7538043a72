//! Errors that can abort an entire workflow execution, as opposed to the
//! node-local failures captured in a `NodeExecutionResult` (§7).

use dagforge_core::{NodeId, WorkflowId};
use dagforge_context::ContextError;
use dagforge_registry::RegistryError;
use thiserror::Error;

/// Errors surfaced by the Scheduler and Reference Executor.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The workflow failed static validation; execution was refused.
    #[error("workflow failed validation: {0}")]
    ValidationFailed(String),

    /// No `NodeExecutor` is registered for a node's kind.
    #[error("no executor registered for node {0}")]
    NoExecutorRegistered(NodeId),

    /// A reference node's target workflow isn't in the registry.
    #[error("reference target not found: {0}")]
    UnknownTargetWorkflow(WorkflowId),

    /// Propagated from the context/input-resolution layer.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Propagated from the registry layer.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A bounded wait elapsed (workflow timeout, reference-node timeout).
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// Invariant violation discovered at run time; aborts the execution.
    #[error("internal error: {0}")]
    InternalError(String),
}
