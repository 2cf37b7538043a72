//! Parses a Reference Node's configuration map into a typed structure
//! (§4.7, config schema in §6).

use std::collections::HashMap;

use dagforge_core::WorkflowId;
use dagforge_workflow::Node;
use serde_json::{Map, Value};

/// Which of the five sub-workflow invocation strategies a reference node
/// uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Invoke one target workflow and wait.
    Sync,
    /// Invoke one target workflow on a task; optionally wait.
    Async,
    /// Evaluate a condition before behaving as `Sync`.
    Conditional,
    /// Invoke one target workflow once per loop item/condition pass.
    Loop,
    /// Invoke every target in `workflow_ids` concurrently.
    Parallel,
}

impl ExecutionMode {
    fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("SYNC") {
            "ASYNC" => Self::Async,
            "CONDITIONAL" => Self::Conditional,
            "LOOP" => Self::Loop,
            "PARALLEL" => Self::Parallel,
            _ => Self::Sync,
        }
    }
}

/// A reference node's configuration, parsed once per dispatch.
#[derive(Debug, Clone)]
pub struct ReferenceConfig {
    /// The invocation strategy.
    pub mode: ExecutionMode,
    /// SYNC/ASYNC/CONDITIONAL/LOOP target.
    pub workflow_id: Option<WorkflowId>,
    /// PARALLEL targets.
    pub workflow_ids: Vec<WorkflowId>,
    /// CONDITIONAL's guard expression.
    pub condition: Option<String>,
    /// LOOP's list-valued context key.
    pub loop_data_key: Option<String>,
    /// LOOP's per-iteration continuation expression.
    pub loop_condition: Option<String>,
    /// LOOP's iteration bound.
    pub max_iterations: u64,
    /// outerKey → innerKey, copied from the outer context when preparing
    /// the child's parameters.
    pub input_mappings: HashMap<String, String>,
    /// innerKey → outerKey, copied back from the child's final context.
    pub output_mappings: HashMap<String, String>,
    /// Values overlaid onto the prepared parameters after `input_mappings`.
    pub fixed_parameters: Map<String, Value>,
    /// ASYNC: block for the child's result instead of returning immediately.
    pub wait_for_result: bool,
    /// ASYNC timeout.
    pub timeout_ms: u64,
    /// PARALLEL timeout.
    pub parallel_timeout_ms: u64,
}

impl ReferenceConfig {
    /// Parse a reference node's `config` map. Unknown or malformed fields
    /// are treated as absent rather than causing a parse error — the
    /// Validator is responsible for rejecting incomplete configuration
    /// before the node is ever dispatched.
    pub fn from_node(node: &Node) -> Self {
        let mode = ExecutionMode::parse(node.config_str("executionMode"));
        Self {
            mode,
            workflow_id: node.config_str("workflowId").and_then(|s| WorkflowId::parse(s).ok()),
            workflow_ids: node
                .config
                .get("workflowIds")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .filter_map(|s| WorkflowId::parse(s).ok())
                        .collect()
                })
                .unwrap_or_default(),
            condition: node.config_str("condition").map(str::to_string),
            loop_data_key: node.config_str("loopDataKey").map(str::to_string),
            loop_condition: node.config_str("loopCondition").map(str::to_string),
            max_iterations: node
                .config
                .get("maxIterations")
                .and_then(Value::as_u64)
                .unwrap_or(100),
            input_mappings: string_map(&node.config, "inputMappings"),
            output_mappings: string_map(&node.config, "outputMappings"),
            fixed_parameters: node
                .config
                .get("fixedParameters")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            wait_for_result: node
                .config
                .get("waitForResult")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            timeout_ms: node.config.get("timeoutMs").and_then(Value::as_u64).unwrap_or(30_000),
            parallel_timeout_ms: node
                .config
                .get("parallelTimeoutMs")
                .and_then(Value::as_u64)
                .unwrap_or(60_000),
        }
    }
}

fn string_map(config: &dagforge_workflow::NodeConfig, key: &str) -> HashMap<String, String> {
    config
        .get(key)
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
