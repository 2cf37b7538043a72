//! End-to-end scenarios against the full graph model + scheduler +
//! reference executor + registry stack, matching the concrete scenarios
//! this core's execution semantics are checked against.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dagforge_context::contract::test_doubles::FailingExecutor;
use dagforge_context::{ExecutionContext, NodeExecutionResult, NodeExecutor, NodeStatus};
use dagforge_core::{NodeId, WorkflowId};
use dagforge_engine::Scheduler;
use dagforge_registry::{Registry, WorkflowStatus};
use dagforge_workflow::{
    InputParameter, InputSpec, Node, NodeKind, OutputSpec, ValidationResult, WorkflowDefinition,
};
use serde_json::json;

struct ConstantExecutor {
    value: serde_json::Value,
}

#[async_trait]
impl NodeExecutor for ConstantExecutor {
    fn validate(&self, _node: &Node) -> ValidationResult {
        ValidationResult::default()
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> NodeExecutionResult {
        if let Some(key) = &node.output.output_key {
            ctx.set(key.clone(), self.value.clone()).unwrap();
        }
        NodeExecutionResult::ok(node.id, Some(self.value.clone()), Utc::now(), 0)
    }
}

struct DoubleExecutor {
    input_alias: String,
}

#[async_trait]
impl NodeExecutor for DoubleExecutor {
    fn validate(&self, _node: &Node) -> ValidationResult {
        ValidationResult::default()
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> NodeExecutionResult {
        let resolver = dagforge_context::InputResolver::new();
        let resolved = resolver.resolve(node.id, &node.inputs, ctx).unwrap();
        let input = resolved
            .values()
            .get(&self.input_alias)
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0);
        let doubled = json!(input * 2.0);
        if let Some(key) = &node.output.output_key {
            ctx.set(key.clone(), doubled.clone()).unwrap();
        }
        NodeExecutionResult::ok(node.id, Some(doubled), Utc::now(), 0)
    }
}

/// Doubles `inner_x` and additionally mirrors `_referenceNodeId` into
/// `saw_ref_node_id`, so a test can confirm the auto-injected keys reached
/// the child's context without inspecting the child's snapshot directly.
struct ReferenceAwareDoubleExecutor;

#[async_trait]
impl NodeExecutor for ReferenceAwareDoubleExecutor {
    fn validate(&self, _node: &Node) -> ValidationResult {
        ValidationResult::default()
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> NodeExecutionResult {
        let resolver = dagforge_context::InputResolver::new();
        let resolved = resolver.resolve(node.id, &node.inputs, ctx).unwrap();
        let x = resolved.values().get("inner_x").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
        let ref_node_id = resolved
            .values()
            .get("_referenceNodeId")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        ctx.set("inner_y", json!(x * 2.0)).unwrap();
        ctx.set("saw_ref_node_id", json!(ref_node_id)).unwrap();
        NodeExecutionResult::ok(node.id, Some(json!(x * 2.0)), Utc::now(), 0)
    }
}

fn registry() -> Arc<Registry> {
    Arc::new(Registry::new())
}

#[tokio::test]
async fn linear_chain_propagates_doubled_value() {
    let scheduler = Scheduler::new(4, registry());
    scheduler.register_executor(NodeKind::Input, Arc::new(ConstantExecutor { value: json!(7) }));
    scheduler.register_executor(
        NodeKind::Script,
        Arc::new(DoubleExecutor {
            input_alias: "v".to_string(),
        }),
    );

    let (input_id, x2_id, out_id) = (NodeId::v4(), NodeId::v4(), NodeId::v4());
    let mut wf = WorkflowDefinition::new(WorkflowId::v4(), "linear");
    wf.add_node(Node::new(input_id, "in", NodeKind::Input).with_output(OutputSpec::keyed("v")))
        .unwrap();
    wf.add_node(
        Node::new(x2_id, "x2", NodeKind::Script)
            .with_inputs(InputSpec::new(vec![InputParameter::required("v")]))
            .with_output(OutputSpec::keyed("v2")),
    )
    .unwrap();
    wf.add_node(
        Node::new(out_id, "out", NodeKind::Script)
            .with_inputs(InputSpec::new(vec![InputParameter::required("v2")])),
    )
    .unwrap();
    wf.add_connection(input_id, x2_id).unwrap();
    wf.add_connection(x2_id, out_id).unwrap();

    let result = scheduler.execute_workflow(&wf, HashMap::new()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.final_context_snapshot.get("v"), Some(&json!(7)));
    assert_eq!(result.final_context_snapshot.get("v2"), Some(&json!(14.0)));
    assert_eq!(result.statistics.succeeded, 3);
}

#[tokio::test]
async fn diamond_runs_independent_branches_concurrently() {
    let scheduler = Scheduler::new(2, registry());
    scheduler.register_executor(NodeKind::Input, Arc::new(ConstantExecutor { value: json!(1) }));
    scheduler.register_executor(
        NodeKind::Script,
        Arc::new(TimedConcat {
            sleep: Duration::from_millis(40),
        }),
    );

    let (src, a, b, join) = (NodeId::v4(), NodeId::v4(), NodeId::v4(), NodeId::v4());
    let mut wf = WorkflowDefinition::new(WorkflowId::v4(), "diamond");
    wf.add_node(Node::new(src, "src", NodeKind::Input).with_output(OutputSpec::keyed("seed")))
        .unwrap();
    wf.add_node(
        Node::new(a, "a", NodeKind::Script).with_output(OutputSpec::keyed("a_out")),
    )
    .unwrap();
    wf.add_node(
        Node::new(b, "b", NodeKind::Script).with_output(OutputSpec::keyed("b_out")),
    )
    .unwrap();
    wf.add_node(
        Node::new(join, "join", NodeKind::Script).with_inputs(InputSpec::new(vec![
            InputParameter::required("a_out"),
            InputParameter::required("b_out"),
        ])),
    )
    .unwrap();
    wf.add_connection(src, a).unwrap();
    wf.add_connection(src, b).unwrap();
    wf.add_connection(a, join).unwrap();
    wf.add_connection(b, join).unwrap();

    let result = scheduler.execute_workflow(&wf, HashMap::new()).await.unwrap();
    assert!(result.success);
    // Two sequential 40ms sleeps would take ~80ms+; concurrent dispatch of
    // the independent a/b branches should land well under that.
    assert!(result.duration_ms < 75, "duration_ms = {}", result.duration_ms);
}

struct TimedConcat {
    sleep: Duration,
}

#[async_trait]
impl NodeExecutor for TimedConcat {
    fn validate(&self, _node: &Node) -> ValidationResult {
        ValidationResult::default()
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> NodeExecutionResult {
        if !node.inputs.inputs.is_empty() {
            // join: no sleep, just concatenate whatever is ready.
            let resolver = dagforge_context::InputResolver::new();
            let resolved = resolver.resolve(node.id, &node.inputs, ctx).unwrap();
            let mut joined = String::new();
            for value in resolved.values().values() {
                joined.push_str(&value.to_string());
            }
            return NodeExecutionResult::ok(node.id, Some(json!(joined)), Utc::now(), 0);
        }
        tokio::time::sleep(self.sleep).await;
        if let Some(key) = &node.output.output_key {
            ctx.set(key.clone(), json!(node.name.clone())).unwrap();
        }
        NodeExecutionResult::ok(node.id, Some(json!(node.name.clone())), Utc::now(), 0)
    }
}

#[tokio::test]
async fn failure_isolates_only_its_own_subgraph() {
    let scheduler = Scheduler::new(4, registry());
    scheduler.register_executor(NodeKind::Input, Arc::new(ConstantExecutor { value: json!(1) }));
    scheduler.register_executor(
        NodeKind::Diagnosis,
        Arc::new(FailingExecutor {
            message: "diagnosis exploded".to_string(),
        }),
    );
    scheduler.register_executor(NodeKind::Script, Arc::new(ConstantExecutor { value: json!("ok") }));

    let (src, a, b, sink_a, sink_b) = (NodeId::v4(), NodeId::v4(), NodeId::v4(), NodeId::v4(), NodeId::v4());
    let mut wf = WorkflowDefinition::new(WorkflowId::v4(), "isolated-failure");
    wf.add_node(Node::new(src, "src", NodeKind::Input)).unwrap();
    wf.add_node(Node::new(a, "a", NodeKind::Diagnosis)).unwrap();
    wf.add_node(Node::new(b, "b", NodeKind::Script)).unwrap();
    wf.add_node(Node::new(sink_a, "sinkA", NodeKind::Script)).unwrap();
    wf.add_node(Node::new(sink_b, "sinkB", NodeKind::Script)).unwrap();
    wf.add_connection(src, a).unwrap();
    wf.add_connection(src, b).unwrap();
    wf.add_connection(a, sink_a).unwrap();
    wf.add_connection(b, sink_b).unwrap();

    let result = scheduler.execute_workflow(&wf, HashMap::new()).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.node_results[&a].status, NodeStatus::Failed);
    assert_eq!(result.node_results[&sink_a].status, NodeStatus::Skipped);
    assert_eq!(result.node_results[&b].status, NodeStatus::Success);
    assert_eq!(result.node_results[&sink_b].status, NodeStatus::Success);
}

#[tokio::test]
async fn cyclic_workflow_is_refused_before_execution() {
    let scheduler = Scheduler::new(2, registry());
    let (a, b, c) = (NodeId::v4(), NodeId::v4(), NodeId::v4());
    let mut wf = WorkflowDefinition::new(WorkflowId::v4(), "cyclic");
    wf.add_node(Node::new(a, "a", NodeKind::Script)).unwrap();
    wf.add_node(Node::new(b, "b", NodeKind::Script)).unwrap();
    wf.add_node(Node::new(c, "c", NodeKind::Script)).unwrap();
    wf.add_connection(a, b).unwrap();
    wf.add_connection(b, c).unwrap();
    wf.add_connection(c, a).unwrap();

    let err = scheduler.execute_workflow(&wf, HashMap::new()).await.unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

fn build_child_workflow() -> WorkflowDefinition {
    let inner = NodeId::v4();
    let mut child = WorkflowDefinition::new(WorkflowId::v4(), "child");
    child
        .add_node(
            Node::new(inner, "inner", NodeKind::Script).with_inputs(InputSpec::new(vec![
                InputParameter::required("inner_x"),
                InputParameter::optional("_referenceNodeId", json!("")),
            ])),
        )
        .unwrap();
    child
}

#[tokio::test]
async fn reference_sync_maps_parameters_and_results() {
    let registry = registry();
    let child = build_child_workflow();
    let child_id = child.id;
    registry.register(child, WorkflowStatus::Active, semver::Version::new(1, 0, 0), None);

    let scheduler = Scheduler::new(4, registry);
    scheduler.register_executor(NodeKind::Script, Arc::new(ReferenceAwareDoubleExecutor));

    let ref_id = NodeId::v4();
    let mut parent = WorkflowDefinition::new(WorkflowId::v4(), "parent");
    parent
        .add_node(
            Node::new(ref_id, "ref", NodeKind::Reference)
                .with_config("executionMode", json!("SYNC"))
                .with_config("workflowId", json!(child_id.to_string()))
                .with_config("inputMappings", json!({ "outer_x": "inner_x" }))
                .with_config(
                    "outputMappings",
                    json!({ "inner_y": "outer_y", "saw_ref_node_id": "outer_saw_ref" }),
                ),
        )
        .unwrap();

    let mut initial = HashMap::new();
    initial.insert("outer_x".to_string(), json!(5));

    let result = scheduler.execute_workflow(&parent, initial).await.unwrap();

    assert!(result.success);
    assert_eq!(result.final_context_snapshot.get("outer_y"), Some(&json!(10.0)));
    assert_eq!(
        result.final_context_snapshot.get("outer_saw_ref"),
        Some(&json!(ref_id.to_string()))
    );
}

#[tokio::test]
async fn conditional_reference_skips_child_when_condition_is_false() {
    let registry = registry();
    let child = build_child_workflow();
    let child_id = child.id;
    registry.register(child, WorkflowStatus::Active, semver::Version::new(1, 0, 0), None);

    let scheduler = Scheduler::new(4, registry);
    scheduler.register_executor(NodeKind::Script, Arc::new(ReferenceAwareDoubleExecutor));

    let ref_id = NodeId::v4();
    let mut parent = WorkflowDefinition::new(WorkflowId::v4(), "parent");
    parent
        .add_node(
            Node::new(ref_id, "ref", NodeKind::Reference)
                .with_config("executionMode", json!("CONDITIONAL"))
                .with_config("workflowId", json!(child_id.to_string()))
                .with_config("condition", json!("${err_count} > 0"))
                .with_config("inputMappings", json!({ "outer_x": "inner_x" })),
        )
        .unwrap();

    let mut skipped_run = HashMap::new();
    skipped_run.insert("err_count".to_string(), json!(0));
    skipped_run.insert("outer_x".to_string(), json!(5));
    let skipped = scheduler.execute_workflow(&parent, skipped_run).await.unwrap();
    assert_eq!(skipped.node_results[&ref_id].status, NodeStatus::Skipped);

    let mut invoked_run = HashMap::new();
    invoked_run.insert("err_count".to_string(), json!(3));
    invoked_run.insert("outer_x".to_string(), json!(5));
    let invoked = scheduler.execute_workflow(&parent, invoked_run).await.unwrap();
    assert_eq!(invoked.node_results[&ref_id].status, NodeStatus::Success);
}
