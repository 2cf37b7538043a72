//! Result types produced by node and workflow execution (§3, §5).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dagforge_core::{ExecutionId, NodeId};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// The outcome of a single node's dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    /// `execute` returned a successful result.
    Success,
    /// `execute` failed, or `validate()` rejected the node.
    Failed,
    /// Never dispatched because an upstream dependency failed.
    Skipped,
    /// Observed cancellation before completing.
    Cancelled,
}

/// The result of running one node through the Node Runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    /// The node this result belongs to.
    pub node_id: NodeId,
    /// Terminal status; `success()` is sugar over `status == Success`.
    pub status: NodeStatus,
    /// The node's primary output, if it produced one.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Human-readable message, populated on non-success statuses.
    #[serde(default)]
    pub message: Option<String>,
    /// Tagged failure kind, per §7, when `status != Success`.
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    /// When this node began running.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the node's own execution.
    pub duration_ms: u64,
    /// Metadata returned alongside the result (e.g. resolver stats).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl NodeExecutionResult {
    /// `true` iff `status == NodeStatus::Success`.
    pub fn success(&self) -> bool {
        self.status == NodeStatus::Success
    }

    /// Build a successful result.
    pub fn ok(
        node_id: NodeId,
        data: Option<serde_json::Value>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        Self {
            node_id,
            status: NodeStatus::Success,
            data,
            message: None,
            error_kind: None,
            started_at,
            duration_ms,
            metadata: HashMap::new(),
        }
    }

    /// Build a failure result with a tagged error kind.
    pub fn failure(
        node_id: NodeId,
        kind: ErrorKind,
        message: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        Self {
            node_id,
            status: NodeStatus::Failed,
            data: None,
            message: Some(message.into()),
            error_kind: Some(kind),
            started_at,
            duration_ms,
            metadata: HashMap::new(),
        }
    }

    /// Build a result for a node that was never dispatched.
    pub fn skipped(node_id: NodeId, started_at: DateTime<Utc>) -> Self {
        Self {
            node_id,
            status: NodeStatus::Skipped,
            data: None,
            message: Some("skipped: upstream dependency failed".to_string()),
            error_kind: None,
            started_at,
            duration_ms: 0,
            metadata: HashMap::new(),
        }
    }

    /// Build a result for a node that observed cancellation.
    pub fn cancelled(node_id: NodeId, started_at: DateTime<Utc>, duration_ms: u64) -> Self {
        Self {
            node_id,
            status: NodeStatus::Cancelled,
            data: None,
            message: Some("cancelled".to_string()),
            error_kind: Some(ErrorKind::Cancelled),
            started_at,
            duration_ms,
            metadata: HashMap::new(),
        }
    }

    /// Attach metadata, e.g. input-resolver counters.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Derived counts over a workflow's node results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Total nodes in the workflow.
    pub total: usize,
    /// Nodes that completed successfully.
    pub succeeded: usize,
    /// Nodes that failed.
    pub failed: usize,
    /// Nodes never dispatched.
    pub skipped: usize,
    /// Nodes that observed cancellation.
    pub cancelled: usize,
    /// Sum of every node's own `duration_ms`.
    pub total_duration_ms: u64,
}

impl Statistics {
    /// Derive statistics from a completed node-result map.
    pub fn from_results(results: &HashMap<NodeId, NodeExecutionResult>) -> Self {
        let mut stats = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results.values() {
            match result.status {
                NodeStatus::Success => stats.succeeded += 1,
                NodeStatus::Failed => stats.failed += 1,
                NodeStatus::Skipped => stats.skipped += 1,
                NodeStatus::Cancelled => stats.cancelled += 1,
            }
            stats.total_duration_ms += result.duration_ms;
        }
        stats
    }

    /// Fraction of nodes that succeeded, `0.0` for an empty workflow.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }
}

/// The packaged outcome of an entire workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionResult {
    /// The execution this result belongs to.
    pub execution_id: ExecutionId,
    /// `true` iff every reachable node completed successfully.
    pub success: bool,
    /// First failure's message, or a summary like "2 nodes failed".
    pub message: Option<String>,
    /// Every node's terminal result.
    pub node_results: HashMap<NodeId, NodeExecutionResult>,
    /// A read-only snapshot of the context's data store at completion.
    pub final_context_snapshot: HashMap<String, serde_json::Value>,
    /// When the workflow began.
    pub started_at: DateTime<Utc>,
    /// Total wall-clock duration of the workflow.
    pub duration_ms: u64,
    /// Derived counts over `node_results`.
    pub statistics: Statistics,
}

impl WorkflowExecutionResult {
    /// Assemble a result from its node results and context snapshot,
    /// deriving `success`, `message`, and `statistics`.
    pub fn assemble(
        execution_id: ExecutionId,
        node_results: HashMap<NodeId, NodeExecutionResult>,
        final_context_snapshot: HashMap<String, serde_json::Value>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let statistics = Statistics::from_results(&node_results);
        let success = statistics.failed == 0 && statistics.cancelled == 0;
        let message = if success {
            None
        } else {
            node_results
                .values()
                .find(|r| r.status == NodeStatus::Failed)
                .and_then(|r| r.message.clone())
                .or_else(|| Some(format!("{} nodes failed", statistics.failed)))
        };
        Self {
            execution_id,
            success,
            message,
            node_results,
            final_context_snapshot,
            started_at,
            duration_ms,
            statistics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statistics_count_each_status() {
        let mut results = HashMap::new();
        let now = Utc::now();
        results.insert(NodeId::v4(), NodeExecutionResult::ok(NodeId::v4(), Some(json!(1)), now, 5));
        results.insert(
            NodeId::v4(),
            NodeExecutionResult::failure(NodeId::v4(), ErrorKind::NodeFailure, "boom", now, 3),
        );
        results.insert(NodeId::v4(), NodeExecutionResult::skipped(NodeId::v4(), now));

        let stats = Statistics::from_results(&results);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.total_duration_ms, 8);
    }

    #[test]
    fn success_rate_of_empty_is_zero() {
        assert_eq!(Statistics::default().success_rate(), 0.0);
    }

    #[test]
    fn assemble_succeeds_with_no_failures() {
        let mut results = HashMap::new();
        let now = Utc::now();
        let id = NodeId::v4();
        results.insert(id, NodeExecutionResult::ok(id, None, now, 1));
        let result = WorkflowExecutionResult::assemble(
            ExecutionId::v4(),
            results,
            HashMap::new(),
            now,
            10,
        );
        assert!(result.success);
        assert!(result.message.is_none());
    }

    #[test]
    fn assemble_reports_first_failure_message() {
        let mut results = HashMap::new();
        let now = Utc::now();
        let id = NodeId::v4();
        results.insert(
            id,
            NodeExecutionResult::failure(id, ErrorKind::NodeFailure, "x broke", now, 1),
        );
        let result = WorkflowExecutionResult::assemble(
            ExecutionId::v4(),
            results,
            HashMap::new(),
            now,
            10,
        );
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("x broke"));
    }
}
