//! The null-preserving keyed store (§4.1) and the `ExecutionContext` that
//! pairs one of these with its identity and a parallel metadata store.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dagforge_core::{ExecutionId, WorkflowId};

use crate::error::ContextError;

/// A thread-safe keyed store where map presence *is* the "present" marker —
/// `Present(Value::Null)` is a legitimate entry, distinct from an absent key.
/// Backed by `dashmap::DashMap`, so the sentinel the teacher's `nebula`
/// context used to track presence separately from value collapses here into
/// "the key is in the map or it isn't".
#[derive(Debug, Default)]
pub struct ContextStore {
    inner: DashMap<String, serde_json::Value>,
}

impl ContextStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `key`. Rejects an empty key.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) -> Result<(), ContextError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ContextError::EmptyKey);
        }
        self.inner.insert(key, value);
        Ok(())
    }

    /// The value at `key`, or `None` if absent. A stored JSON null is
    /// returned as `Some(Value::Null)`, not `None`.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    /// `get`, falling back to `default` only when the key is absent.
    pub fn get_or_default(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        self.get(key).unwrap_or(default)
    }

    /// Whether `key` is present, present-null included.
    pub fn has(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Remove `key`, returning its prior value if any.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    /// An immutable snapshot of the store's current contents. Iteration
    /// order is unspecified.
    pub fn snapshot(&self) -> std::collections::HashMap<String, serde_json::Value> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// `true` if the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Per-execution shared state: identity plus a data store and a parallel
/// metadata store, both safe for concurrent access from multiple node
/// tasks. Created by the Scheduler when a workflow begins; destroyed after
/// the workflow's final result is packaged.
#[derive(Debug)]
pub struct ExecutionContext {
    workflow_id: WorkflowId,
    execution_id: ExecutionId,
    started_at: DateTime<Utc>,
    data: ContextStore,
    metadata: ContextStore,
}

impl ExecutionContext {
    /// Start a fresh context for a workflow execution.
    pub fn new(workflow_id: WorkflowId, execution_id: ExecutionId, started_at: DateTime<Utc>) -> Self {
        Self {
            workflow_id,
            execution_id,
            started_at,
            data: ContextStore::new(),
            metadata: ContextStore::new(),
        }
    }

    /// The workflow this context belongs to.
    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    /// This execution's identity.
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// When this execution began.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Write a value into the data store.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) -> Result<(), ContextError> {
        self.data.set(key, value)
    }

    /// Read a value from the data store.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.get(key)
    }

    /// Read with a fallback for absent keys.
    pub fn get_or_default(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        self.data.get_or_default(key, default)
    }

    /// Whether the data store has `key`.
    pub fn has(&self, key: &str) -> bool {
        self.data.has(key)
    }

    /// Remove a key from the data store.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    /// A snapshot of the data store, e.g. for the final workflow result.
    pub fn snapshot(&self) -> std::collections::HashMap<String, serde_json::Value> {
        self.data.snapshot()
    }

    /// Write to the parallel metadata store (counters, timestamps, ...).
    pub fn set_metadata(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), ContextError> {
        self.metadata.set(key, value)
    }

    /// Read from the metadata store.
    pub fn get_metadata(&self, key: &str) -> Option<serde_json::Value> {
        self.metadata.get(key)
    }
}
