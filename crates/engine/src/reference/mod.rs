//! The built-in executor for `NodeKind::Reference`: sub-workflow invocation
//! in one of five modes (§4.7).

pub mod config;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dagforge_context::{
    ContextError, ErrorKind, ExecutionContext, NodeExecutionResult, NodeExecutor, NodeStatus,
    WorkflowExecutionResult,
};
use dagforge_core::{ExecutionId, NodeId, WorkflowId};
use dagforge_workflow::{Node, ValidationResult, WorkflowDefinition};
use serde_json::{json, Map, Value};
use tokio::task::JoinSet;

use crate::error::EngineError;
use crate::scheduler::Scheduler;
use config::{ExecutionMode, ReferenceConfig};

/// Implements `NodeExecutor` for Reference nodes. Holds a handle back to
/// the `Scheduler` that owns it, so SYNC/CONDITIONAL/LOOP/PARALLEL can
/// recursively invoke the scheduler on the target workflow(s).
pub struct ReferenceNodeExecutor {
    scheduler: Scheduler,
}

impl ReferenceNodeExecutor {
    /// Bind a reference executor to the scheduler that will run its
    /// sub-workflow invocations.
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    /// Build the child's initial parameter map: `inputMappings` copied from
    /// the outer context, `fixedParameters` overlaid, `extra` entries
    /// overlaid (e.g. `loopItem`/`loopIndex`), then the three auto-injected
    /// keys.
    fn prepare_parameters(
        &self,
        ctx: &ExecutionContext,
        node: &Node,
        cfg: &ReferenceConfig,
        extra: &[(&str, Value)],
    ) -> HashMap<String, Value> {
        let mut params = HashMap::new();
        for (outer_key, inner_key) in &cfg.input_mappings {
            if let Some(value) = ctx.get(outer_key) {
                params.insert(inner_key.clone(), value);
            }
        }
        for (key, value) in &cfg.fixed_parameters {
            params.insert(key.clone(), value.clone());
        }
        for (key, value) in extra {
            params.insert((*key).to_string(), value.clone());
        }
        params.insert("_sourceWorkflowId".to_string(), json!(ctx.workflow_id().to_string()));
        params.insert("_sourceExecutionId".to_string(), json!(ctx.execution_id().to_string()));
        params.insert("_referenceNodeId".to_string(), json!(node.id.to_string()));
        params
    }

    /// Copy every `innerKey → outerKey` mapping from the child's final
    /// context snapshot into the outer context.
    fn integrate_outputs(
        &self,
        ctx: &ExecutionContext,
        cfg: &ReferenceConfig,
        child: &WorkflowExecutionResult,
    ) -> Result<(), ContextError> {
        for (inner_key, outer_key) in &cfg.output_mappings {
            if let Some(value) = child.final_context_snapshot.get(inner_key) {
                ctx.set(outer_key.clone(), value.clone())?;
            }
        }
        Ok(())
    }

    async fn invoke(
        &self,
        target: &WorkflowDefinition,
        params: HashMap<String, Value>,
    ) -> Result<WorkflowExecutionResult, EngineError> {
        self.scheduler.execute_workflow(target, params).await
    }

    fn resolve_target(&self, id: WorkflowId) -> Result<std::sync::Arc<WorkflowDefinition>, EngineError> {
        self.scheduler
            .registry()
            .get(id)
            .ok_or(EngineError::UnknownTargetWorkflow(id))
    }

    fn summary(child: &WorkflowExecutionResult) -> Value {
        json!({
            "executionId": child.execution_id.to_string(),
            "success": child.success,
            "durationMs": child.duration_ms,
        })
    }

    async fn run_sync(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
        cfg: &ReferenceConfig,
        started_at: chrono::DateTime<Utc>,
    ) -> NodeExecutionResult {
        let Some(workflow_id) = cfg.workflow_id else {
            return config_error(node.id, "reference node has no workflowId", started_at);
        };
        let target = match self.resolve_target(workflow_id) {
            Ok(target) => target,
            Err(err) => return config_error(node.id, err.to_string(), started_at),
        };
        let params = self.prepare_parameters(ctx, node, cfg, &[]);
        match self.invoke(&target, params).await {
            Ok(child) if child.success => {
                if let Err(err) = self.integrate_outputs(ctx, cfg, &child) {
                    return NodeExecutionResult::failure(
                        node.id,
                        ErrorKind::InternalError,
                        err.to_string(),
                        started_at,
                        0,
                    );
                }
                NodeExecutionResult::ok(node.id, Some(Self::summary(&child)), started_at, 0)
            }
            Ok(child) => NodeExecutionResult::failure(
                node.id,
                ErrorKind::NodeFailure,
                child.message.unwrap_or_else(|| "sub-workflow failed".to_string()),
                started_at,
                0,
            ),
            Err(err) => NodeExecutionResult::failure(
                node.id,
                ErrorKind::NodeFailure,
                err.to_string(),
                started_at,
                0,
            ),
        }
    }

    async fn run_async(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
        cfg: &ReferenceConfig,
        started_at: chrono::DateTime<Utc>,
    ) -> NodeExecutionResult {
        let Some(workflow_id) = cfg.workflow_id else {
            return config_error(node.id, "reference node has no workflowId", started_at);
        };
        let target = match self.resolve_target(workflow_id) {
            Ok(target) => target,
            Err(err) => return config_error(node.id, err.to_string(), started_at),
        };
        let params = self.prepare_parameters(ctx, node, cfg, &[]);

        if !cfg.wait_for_result {
            let handle_id = ExecutionId::v4();
            let scheduler = self.scheduler.clone();
            let target = std::sync::Arc::clone(&target);
            tokio::spawn(async move {
                let _ = scheduler.execute_workflow(&target, params).await;
            });
            return NodeExecutionResult::ok(
                node.id,
                Some(json!({ "dispatched": true, "handle": handle_id.to_string() })),
                started_at,
                0,
            );
        }

        let result = tokio::time::timeout(
            Duration::from_millis(cfg.timeout_ms),
            self.invoke(&target, params),
        )
        .await;
        match result {
            Err(_elapsed) => NodeExecutionResult::failure(
                node.id,
                ErrorKind::Timeout,
                format!("reference node timed out after {}ms", cfg.timeout_ms),
                started_at,
                cfg.timeout_ms,
            ),
            Ok(Ok(child)) if child.success => {
                if let Err(err) = self.integrate_outputs(ctx, cfg, &child) {
                    return NodeExecutionResult::failure(
                        node.id,
                        ErrorKind::InternalError,
                        err.to_string(),
                        started_at,
                        0,
                    );
                }
                NodeExecutionResult::ok(node.id, Some(Self::summary(&child)), started_at, 0)
            }
            Ok(Ok(child)) => NodeExecutionResult::failure(
                node.id,
                ErrorKind::NodeFailure,
                child.message.unwrap_or_else(|| "sub-workflow failed".to_string()),
                started_at,
                0,
            ),
            Ok(Err(err)) => {
                NodeExecutionResult::failure(node.id, ErrorKind::NodeFailure, err.to_string(), started_at, 0)
            }
        }
    }

    async fn run_conditional(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
        cfg: &ReferenceConfig,
        started_at: chrono::DateTime<Utc>,
    ) -> NodeExecutionResult {
        let Some(condition) = &cfg.condition else {
            return config_error(node.id, "CONDITIONAL reference has no condition", started_at);
        };
        if !dagforge_expression::evaluate(condition, ctx) {
            return NodeExecutionResult {
                node_id: node.id,
                status: NodeStatus::Skipped,
                data: None,
                message: Some("condition evaluated to false".to_string()),
                error_kind: None,
                started_at,
                duration_ms: 0,
                metadata: HashMap::new(),
            };
        }
        self.run_sync(node, ctx, cfg, started_at).await
    }

    async fn run_loop(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
        cfg: &ReferenceConfig,
        started_at: chrono::DateTime<Utc>,
    ) -> NodeExecutionResult {
        let Some(workflow_id) = cfg.workflow_id else {
            return config_error(node.id, "LOOP reference has no workflowId", started_at);
        };
        let target = match self.resolve_target(workflow_id) {
            Ok(target) => target,
            Err(err) => return config_error(node.id, err.to_string(), started_at),
        };

        let max_iterations = cfg.max_iterations as usize;
        let mut summaries: Vec<Value> = Vec::new();
        let mut succeeded = 0usize;

        if let Some(items) = cfg
            .loop_data_key
            .as_deref()
            .and_then(|key| ctx.get(key))
            .and_then(|v| v.as_array().cloned())
        {
            for (index, item) in items.into_iter().enumerate().take(max_iterations) {
                let extra = [
                    ("loopItem", item),
                    ("loopIndex", json!(index)),
                ];
                let params = self.prepare_parameters(ctx, node, cfg, &extra);
                match self.invoke(&target, params).await {
                    Ok(child) => {
                        if child.success {
                            succeeded += 1;
                            let _ = self.integrate_outputs(ctx, cfg, &child);
                        }
                        summaries.push(Self::summary(&child));
                    }
                    Err(err) => summaries.push(json!({ "success": false, "error": err.to_string() })),
                }
            }
        } else if let Some(condition) = &cfg.loop_condition {
            let mut index = 0usize;
            while index < max_iterations && dagforge_expression::evaluate(condition, ctx) {
                let extra = [("loopIndex", json!(index))];
                let params = self.prepare_parameters(ctx, node, cfg, &extra);
                match self.invoke(&target, params).await {
                    Ok(child) => {
                        if child.success {
                            succeeded += 1;
                            let _ = self.integrate_outputs(ctx, cfg, &child);
                        }
                        summaries.push(Self::summary(&child));
                    }
                    Err(err) => summaries.push(json!({ "success": false, "error": err.to_string() })),
                }
                index += 1;
            }
        } else {
            return config_error(
                node.id,
                "LOOP reference has neither loopDataKey nor loopCondition",
                started_at,
            );
        }

        if summaries.is_empty() {
            return NodeExecutionResult::ok(node.id, Some(json!([])), started_at, 0);
        }
        if succeeded == 0 {
            return NodeExecutionResult::failure(
                node.id,
                ErrorKind::NodeFailure,
                "every loop iteration failed",
                started_at,
                0,
            );
        }
        NodeExecutionResult::ok(node.id, Some(Value::Array(summaries)), started_at, 0)
    }

    async fn run_parallel(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
        cfg: &ReferenceConfig,
        started_at: chrono::DateTime<Utc>,
    ) -> NodeExecutionResult {
        if cfg.workflow_ids.is_empty() {
            return config_error(node.id, "PARALLEL reference has no workflowIds", started_at);
        }

        let params = self.prepare_parameters(ctx, node, cfg, &[]);
        let mut join_set: JoinSet<(WorkflowId, Result<WorkflowExecutionResult, EngineError>)> =
            JoinSet::new();

        for &target_id in &cfg.workflow_ids {
            let target = match self.resolve_target(target_id) {
                Ok(target) => target,
                Err(err) => return config_error(node.id, err.to_string(), started_at),
            };
            let scheduler = self.scheduler.clone();
            let params = params.clone();
            join_set.spawn(async move {
                let result = scheduler.execute_workflow(&target, params).await;
                (target_id, result)
            });
        }

        let outcome = tokio::time::timeout(
            Duration::from_millis(cfg.parallel_timeout_ms),
            async {
                let mut out = Map::new();
                let mut all_ok = true;
                while let Some(joined) = join_set.join_next().await {
                    if let Ok((id, result)) = joined {
                        match result {
                            Ok(child) => {
                                all_ok &= child.success;
                                let _ = self.integrate_outputs(ctx, cfg, &child);
                                out.insert(id.to_string(), Self::summary(&child));
                            }
                            Err(err) => {
                                all_ok = false;
                                out.insert(id.to_string(), json!({ "success": false, "error": err.to_string() }));
                            }
                        }
                    }
                }
                (all_ok, out)
            },
        )
        .await;

        match outcome {
            Err(_elapsed) => NodeExecutionResult::failure(
                node.id,
                ErrorKind::Timeout,
                format!("parallel reference timed out after {}ms", cfg.parallel_timeout_ms),
                started_at,
                cfg.parallel_timeout_ms,
            ),
            Ok((true, out)) => NodeExecutionResult::ok(node.id, Some(Value::Object(out)), started_at, 0),
            Ok((false, out)) => NodeExecutionResult {
                node_id: node.id,
                status: NodeStatus::Failed,
                data: Some(Value::Object(out)),
                message: Some("one or more parallel targets failed".to_string()),
                error_kind: Some(ErrorKind::NodeFailure),
                started_at,
                duration_ms: 0,
                metadata: HashMap::new(),
            },
        }
    }
}

fn config_error(node_id: NodeId, message: impl Into<String>, started_at: chrono::DateTime<Utc>) -> NodeExecutionResult {
    NodeExecutionResult::failure(node_id, ErrorKind::ConfigError, message, started_at, 0)
}

#[async_trait]
impl NodeExecutor for ReferenceNodeExecutor {
    fn validate(&self, _node: &Node) -> ValidationResult {
        // Reference-specific config checks already run in
        // `dagforge_workflow::Validator` at registration time; nothing
        // further to check per-dispatch.
        ValidationResult::default()
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> NodeExecutionResult {
        let cfg = ReferenceConfig::from_node(node);
        let started_at = Utc::now();
        match cfg.mode {
            ExecutionMode::Sync => self.run_sync(node, ctx, &cfg, started_at).await,
            ExecutionMode::Async => self.run_async(node, ctx, &cfg, started_at).await,
            ExecutionMode::Conditional => self.run_conditional(node, ctx, &cfg, started_at).await,
            ExecutionMode::Loop => self.run_loop(node, ctx, &cfg, started_at).await,
            ExecutionMode::Parallel => self.run_parallel(node, ctx, &cfg, started_at).await,
        }
    }
}
