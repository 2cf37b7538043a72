//! Internal parse/evaluate failures. Never surfaced to callers — `evaluate`
//! downgrades every one of these to `false` plus a `tracing::warn!`, per
//! §4.8's "evaluation failures produce false and emit a warning; they MUST
//! NOT raise".

use thiserror::Error;

/// Why a condition string failed to parse or evaluate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    /// Neither a recognised operator nor a bare boolean literal was found.
    #[error("'{0}' is not a comparison or boolean literal")]
    NotAnExpression(String),

    /// A comparison operator's operand wasn't a number.
    #[error("'{0}' is not numeric")]
    NotNumeric(String),
}
