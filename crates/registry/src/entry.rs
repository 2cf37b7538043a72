//! A single registered workflow and its lifecycle/dependency metadata.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dagforge_core::WorkflowId;
use dagforge_workflow::WorkflowDefinition;
use semver::Version;

/// A workflow's lifecycle state within the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Registered but not yet eligible for reference-node targeting.
    Draft,
    /// Eligible for reference-node targeting.
    Active,
    /// Still invokable, but callers should migrate away.
    Deprecated,
    /// No longer invokable.
    Retired,
}

/// One entry in the registry: a workflow plus its status, version, and
/// cross-workflow dependency adjacency.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// The registered workflow. `Arc`-wrapped so an in-flight reference-node
    /// invocation holds a strong reference even if the entry is later
    /// re-registered.
    pub workflow: Arc<WorkflowDefinition>,
    /// Lifecycle status.
    pub status: WorkflowStatus,
    /// Semantic version of this registration.
    pub version: Version,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// When this entry was first registered.
    pub created_at: DateTime<Utc>,
    /// Workflows this one references via Reference Nodes.
    pub depends_on: HashSet<WorkflowId>,
    /// Workflows that reference this one.
    pub depended_on_by: HashSet<WorkflowId>,
}

impl RegistryEntry {
    /// Construct a fresh entry with empty dependency sets.
    pub fn new(
        workflow: WorkflowDefinition,
        status: WorkflowStatus,
        version: Version,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            workflow: Arc::new(workflow),
            status,
            version,
            description,
            created_at,
            depends_on: HashSet::new(),
            depended_on_by: HashSet::new(),
        }
    }
}
