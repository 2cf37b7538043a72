//! The shared error-kind taxonomy (§7) and this crate's own error enum.

use dagforge_core::NodeId;
use thiserror::Error;

/// The tagged error kinds a `NodeExecutionResult` carries, per §7. Unlike
/// `ContextError` below, this is not a `thiserror` enum with source chains —
/// it's a small closed tag callers pattern-match on without downcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Validation failed before execution began.
    ConfigError,
    /// The input resolver could not obtain a required input.
    MissingInput,
    /// A node implementation's `execute` failed.
    NodeFailure,
    /// A bounded wait elapsed.
    Timeout,
    /// A cancellation token was observed.
    Cancelled,
    /// An invariant violation; aborts the whole execution.
    InternalError,
}

/// Errors raised by the context store and input resolver.
#[derive(Debug, Error)]
pub enum ContextError {
    /// `set`/`get` was called with an empty key.
    #[error("context key must be non-empty")]
    EmptyKey,

    /// A required input parameter had no value and no default.
    #[error("node {node}: missing required input '{key}' (alias '{alias}')")]
    MissingInput {
        /// The node that failed to resolve its inputs.
        node: NodeId,
        /// The context key that was read.
        key: String,
        /// The alias the value would have been bound to.
        alias: String,
    },
}

impl ContextError {
    /// The `ErrorKind` this error maps onto in a `NodeExecutionResult`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyKey => ErrorKind::InternalError,
            Self::MissingInput { .. } => ErrorKind::MissingInput,
        }
    }
}
