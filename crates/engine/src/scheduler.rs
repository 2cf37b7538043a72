//! The level-parallel workflow scheduler (§4.6).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dagforge_context::{
    ErrorKind, ExecutionContext, NodeExecutionResult, NodeExecutor, NodeRuntime,
    WorkflowExecutionResult,
};
use dagforge_core::{ExecutionId, NodeId};
use dagforge_registry::Registry;
use dagforge_workflow::{DependencyGraph, Node, NodeKind, Validator, WorkflowDefinition};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::reference::ReferenceNodeExecutor;

/// Executes validated workflows in dependency-respecting parallel waves,
/// bounded by a worker-pool size fixed at construction.
///
/// Cheaply `Clone`: internal state lives behind an `Arc`, which is what lets
/// the built-in Reference Node executor hold its own handle back to the
/// scheduler for recursive sub-workflow invocation.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    max_concurrency: usize,
    executors: RwLock<HashMap<NodeKind, Arc<dyn NodeExecutor>>>,
    registry: Arc<Registry>,
    active: DashMap<ExecutionId, CancellationToken>,
}

impl Scheduler {
    /// Build a scheduler bounded to `max_concurrency` concurrent node
    /// dispatches, with access to `registry` for Reference Node targets.
    /// `max_concurrency = 1` is single-threaded execution, a special case
    /// of the same algorithm.
    pub fn new(max_concurrency: usize, registry: Arc<Registry>) -> Self {
        let inner = Arc::new(SchedulerInner {
            max_concurrency: max_concurrency.max(1),
            executors: RwLock::new(HashMap::new()),
            registry,
            active: DashMap::new(),
        });
        let scheduler = Self { inner };
        let reference_executor: Arc<dyn NodeExecutor> =
            Arc::new(ReferenceNodeExecutor::new(scheduler.clone()));
        scheduler
            .inner
            .executors
            .write()
            .insert(NodeKind::Reference, reference_executor);
        scheduler
    }

    /// Register the executor a non-Reference node kind dispatches to.
    /// Overwrites any prior registration for that kind. Registering
    /// `NodeKind::Reference` overrides the built-in sub-workflow executor
    /// and is not recommended outside of tests.
    pub fn register_executor(&self, kind: NodeKind, executor: Arc<dyn NodeExecutor>) {
        self.inner.executors.write().insert(kind, executor);
    }

    /// The registry this scheduler resolves Reference Node targets against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Request cancellation of a running execution. Returns `false` if no
    /// such execution is currently tracked (already finished, or unknown).
    pub fn cancel(&self, execution_id: ExecutionId) -> bool {
        match self.inner.active.get(&execution_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn executor_for(&self, kind: NodeKind) -> Option<Arc<dyn NodeExecutor>> {
        self.inner.executors.read().get(&kind).cloned()
    }

    /// Validate and execute `workflow` against a fresh `ExecutionContext`
    /// seeded with `initial_data`.
    pub async fn execute_workflow(
        &self,
        workflow: &WorkflowDefinition,
        initial_data: HashMap<String, serde_json::Value>,
    ) -> Result<WorkflowExecutionResult, EngineError> {
        self.execute_workflow_cancellable(workflow, initial_data, CancellationToken::new())
            .await
    }

    /// Same as [`Self::execute_workflow`], but cancellation of `token` (or
    /// a call to [`Self::cancel`] with this execution's id once it starts)
    /// stops further dispatch.
    pub async fn execute_workflow_cancellable(
        &self,
        workflow: &WorkflowDefinition,
        initial_data: HashMap<String, serde_json::Value>,
        token: CancellationToken,
    ) -> Result<WorkflowExecutionResult, EngineError> {
        let validation = Validator::new().validate(workflow);
        if !validation.is_valid() {
            return Err(EngineError::ValidationFailed(validation.errors.join("; ")));
        }

        let graph = DependencyGraph::from_definition(workflow)
            .map_err(|err| EngineError::InternalError(err.to_string()))?;
        let levels = graph
            .levels()
            .map_err(|err| EngineError::InternalError(err.to_string()))?;

        let started_at = Utc::now();
        let wall_clock_start = Instant::now();
        let execution_id = ExecutionId::v4();
        let ctx = Arc::new(ExecutionContext::new(workflow.id, execution_id, started_at));
        for (key, value) in initial_data {
            ctx.set(key, value).map_err(EngineError::Context)?;
        }

        self.inner.active.insert(execution_id, token.clone());
        let _guard = ActiveGuard {
            inner: &self.inner,
            execution_id,
        };

        tracing::info!(
            workflow = %workflow.id,
            nodes = graph.node_count(),
            waves = levels.len(),
            "starting workflow execution"
        );

        let mut results: HashMap<NodeId, NodeExecutionResult> = HashMap::new();

        for level in &levels {
            if token.is_cancelled() {
                for &id in level {
                    results.insert(id, NodeExecutionResult::cancelled(id, Utc::now(), 0));
                }
                continue;
            }

            let mut eligible: Vec<Node> = Vec::new();
            for &id in level {
                let node = workflow
                    .node(id)
                    .expect("graph and workflow agree on node ids")
                    .clone();
                let preds = graph.predecessors(id);
                let runnable = preds.is_empty()
                    || preds
                        .iter()
                        .any(|p| results.get(p).is_some_and(NodeExecutionResult::success));
                if runnable {
                    eligible.push(node);
                } else {
                    results.insert(id, NodeExecutionResult::skipped(id, Utc::now()));
                }
            }

            if eligible.is_empty() {
                continue;
            }

            for (id, result) in self.dispatch_level(eligible, &ctx, &token).await {
                results.insert(id, result);
            }
        }

        let duration_ms = elapsed_ms(wall_clock_start);
        let snapshot = ctx.snapshot();
        tracing::info!(workflow = %workflow.id, duration_ms, "workflow execution finished");
        Ok(WorkflowExecutionResult::assemble(
            execution_id,
            results,
            snapshot,
            started_at,
            duration_ms,
        ))
    }

    /// Dispatch one topological wave onto the worker pool and wait for all
    /// of it to finish, the scheduler's barrier between waves.
    async fn dispatch_level(
        &self,
        nodes: Vec<Node>,
        ctx: &Arc<ExecutionContext>,
        token: &CancellationToken,
    ) -> Vec<(NodeId, NodeExecutionResult)> {
        let semaphore = Arc::new(Semaphore::new(self.inner.max_concurrency));
        let mut join_set: JoinSet<(NodeId, NodeExecutionResult)> = JoinSet::new();
        let mut task_nodes: HashMap<tokio::task::Id, NodeId> = HashMap::new();

        for node in nodes {
            let sema = Arc::clone(&semaphore);
            let executor = self.executor_for(node.kind);
            let ctx = Arc::clone(ctx);
            let child_token = token.child_token();
            let node_id = node.id;

            let handle = join_set.spawn(async move {
                let _permit = sema.acquire_owned().await.expect("semaphore never closes");
                if child_token.is_cancelled() {
                    return (node_id, NodeExecutionResult::cancelled(node_id, Utc::now(), 0));
                }
                let result = match executor {
                    Some(executor) => NodeRuntime::new().run(executor.as_ref(), &node, &ctx).await,
                    None => NodeExecutionResult::failure(
                        node_id,
                        ErrorKind::InternalError,
                        format!("no executor registered for node kind {:?}", node.kind),
                        Utc::now(),
                        0,
                    ),
                };
                (node_id, result)
            });
            task_nodes.insert(handle.id(), node_id);
        }

        let mut out = Vec::with_capacity(task_nodes.len());
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((_, pair)) => out.push(pair),
                Err(join_err) => {
                    if let Some(&node_id) = task_nodes.get(&join_err.id()) {
                        tracing::error!(node = %node_id, error = %join_err, "node task panicked");
                        out.push((
                            node_id,
                            NodeExecutionResult::failure(
                                node_id,
                                ErrorKind::InternalError,
                                format!("node task panicked: {join_err}"),
                                Utc::now(),
                                0,
                            ),
                        ));
                    }
                }
            }
        }
        out
    }
}

/// Removes an execution's cancellation token from the active-set on drop,
/// so `cancel()` can't be called against a stale id after the workflow
/// finishes.
struct ActiveGuard<'a> {
    inner: &'a SchedulerInner,
    execution_id: ExecutionId,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.inner.active.remove(&self.execution_id);
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
