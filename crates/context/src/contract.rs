//! The node-kind contract (§4.10): the sole interface the engine needs to
//! drive an arbitrary node implementation.

use async_trait::async_trait;
use dagforge_workflow::{Node, ValidationResult};

use crate::result::NodeExecutionResult;
use crate::store::ExecutionContext;

/// Implemented once per node kind by an external collaborator (script
/// engine, diagnostic heuristic, notification transport, ...). The Reference
/// kind is the only one this core implements itself, in `dagforge-engine`.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Static configuration check, run before the node is ever dispatched.
    fn validate(&self, node: &Node) -> ValidationResult;

    /// Run the node's computation. Node-local failure is encoded in the
    /// returned result's status, never via `Err` — only a true internal
    /// error should panic or be caught as one by the `NodeRuntime`.
    ///
    /// Implementations need not fill in `started_at`/`duration_ms`; the
    /// `NodeRuntime` that invokes this overwrites both before the result
    /// reaches the scheduler.
    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> NodeExecutionResult;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_doubles {
    //! Test-double executors (§3.1) used only by scheduler/engine tests,
    //! never compiled into the production surface.

    use std::time::Duration;

    use chrono::Utc;

    use super::{ExecutionContext, Node, NodeExecutor, NodeExecutionResult, ValidationResult};
    use crate::error::ErrorKind;
    use async_trait::async_trait;

    /// Echoes its resolved inputs back as its output.
    pub struct EchoExecutor;

    #[async_trait]
    impl NodeExecutor for EchoExecutor {
        fn validate(&self, _node: &Node) -> ValidationResult {
            ValidationResult::default()
        }

        async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> NodeExecutionResult {
            let resolver = crate::resolver::InputResolver::new();
            let resolved = match resolver.resolve(node.id, &node.inputs, ctx) {
                Ok(r) => r,
                Err(err) => {
                    return NodeExecutionResult::failure(
                        node.id,
                        err.kind(),
                        err.to_string(),
                        Utc::now(),
                        0,
                    )
                }
            };
            let data = resolved.into_value(node.inputs.merge_key.as_deref());
            if let Some(key) = &node.output.output_key {
                let _ = ctx.set(key.clone(), data.clone());
            }
            NodeExecutionResult::ok(node.id, Some(data), Utc::now(), 0)
        }
    }

    /// Always fails with a fixed message.
    pub struct FailingExecutor {
        pub message: String,
    }

    #[async_trait]
    impl NodeExecutor for FailingExecutor {
        fn validate(&self, _node: &Node) -> ValidationResult {
            ValidationResult::default()
        }

        async fn execute(&self, node: &Node, _ctx: &ExecutionContext) -> NodeExecutionResult {
            NodeExecutionResult::failure(
                node.id,
                ErrorKind::NodeFailure,
                self.message.clone(),
                Utc::now(),
                0,
            )
        }
    }

    /// Sleeps for a fixed duration, then writes a fixed value.
    pub struct SleepExecutor {
        pub sleep: Duration,
        pub value: serde_json::Value,
    }

    #[async_trait]
    impl NodeExecutor for SleepExecutor {
        fn validate(&self, _node: &Node) -> ValidationResult {
            ValidationResult::default()
        }

        async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> NodeExecutionResult {
            tokio::time::sleep(self.sleep).await;
            if let Some(key) = &node.output.output_key {
                let _ = ctx.set(key.clone(), self.value.clone());
            }
            NodeExecutionResult::ok(node.id, Some(self.value.clone()), Utc::now(), 0)
        }
    }
}
