//! The uniform node lifecycle (§4.3): timestamp, validate, run, stamp.

use chrono::Utc;
use dagforge_workflow::Node;

use crate::contract::NodeExecutor;
use crate::error::ErrorKind;
use crate::result::NodeExecutionResult;
use crate::store::ExecutionContext;

/// Wraps any [`NodeExecutor`] with a uniform lifecycle: record a start
/// timestamp, run `validate()`, run `execute()`, and stamp the elapsed
/// duration onto whatever result comes back.
///
/// A genuine Rust panic inside `execute` is not caught here — the Scheduler
/// dispatches each node onto its own `tokio::task::JoinSet` entry, and a
/// panicked task surfaces there as a `JoinError`, which the Scheduler turns
/// into an `InternalError` result. `NodeRuntime` only needs to handle the
/// node-local failure paths that `NodeExecutor` itself can express.
#[derive(Debug, Default)]
pub struct NodeRuntime;

impl NodeRuntime {
    /// A stateless runtime.
    pub fn new() -> Self {
        Self
    }

    /// Run `node` through `executor` against `ctx`, producing a fully
    /// timestamped result.
    pub async fn run(
        &self,
        executor: &dyn NodeExecutor,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> NodeExecutionResult {
        let started_at = Utc::now();
        let start = std::time::Instant::now();

        let validation = executor.validate(node);
        if !validation.is_valid() {
            return NodeExecutionResult::failure(
                node.id,
                ErrorKind::ConfigError,
                validation.errors.join("; "),
                started_at,
                elapsed_ms(start),
            );
        }

        let mut result = executor.execute(node, ctx).await;
        result.started_at = started_at;
        result.duration_ms = elapsed_ms(start);
        result
    }
}

fn elapsed_ms(start: std::time::Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::test_doubles::{EchoExecutor, FailingExecutor};
    use dagforge_core::{ExecutionId, NodeId, WorkflowId};
    use dagforge_workflow::NodeKind;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(WorkflowId::v4(), ExecutionId::v4(), Utc::now())
    }

    #[tokio::test]
    async fn successful_node_is_timestamped() {
        let ctx = ctx();
        let node = Node::new(NodeId::v4(), "echo", NodeKind::Script);
        let result = NodeRuntime::new().run(&EchoExecutor, &node, &ctx).await;
        assert!(result.success());
        assert!(result.duration_ms < 1000);
    }

    #[tokio::test]
    async fn failing_node_reports_node_failure_kind() {
        let ctx = ctx();
        let node = Node::new(NodeId::v4(), "fail", NodeKind::Script);
        let executor = FailingExecutor {
            message: "boom".to_string(),
        };
        let result = NodeRuntime::new().run(&executor, &node, &ctx).await;
        assert!(!result.success());
        assert_eq!(result.error_kind, Some(ErrorKind::NodeFailure));
        assert_eq!(result.message.as_deref(), Some("boom"));
    }
}
