//! The named, versioned workflow registry (§4.9): lookups for reference
//! nodes, cross-workflow dependency tracking, and lifecycle status.

pub mod entry;
pub mod error;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dagforge_core::WorkflowId;
use dagforge_workflow::WorkflowDefinition;
use parking_lot::RwLock;
use semver::Version;

pub use entry::{RegistryEntry, WorkflowStatus};
pub use error::RegistryError;

/// Per-status counts over all registered workflows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Entries in `Draft`.
    pub draft: usize,
    /// Entries in `Active`.
    pub active: usize,
    /// Entries in `Deprecated`.
    pub deprecated: usize,
    /// Entries in `Retired`.
    pub retired: usize,
}

/// In-process map of `WorkflowId → RegistryEntry` with a companion
/// dependency graph. Readers take a shared lock; mutators take an exclusive
/// one — both over the same `parking_lot::RwLock`, matching the single
/// lock-pair the design calls for.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<HashMap<WorkflowId, RegistryEntry>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a workflow's entry. Updating an existing id
    /// preserves its `depended_on_by` set (other workflows' dependencies on
    /// it survive the update) but replaces `depends_on`, status, version,
    /// and description wholesale.
    pub fn register(
        &self,
        workflow: WorkflowDefinition,
        status: WorkflowStatus,
        version: Version,
        description: Option<String>,
    ) {
        let id = workflow.id;
        let mut entries = self.entries.write();
        let depended_on_by = entries
            .get(&id)
            .map(|existing| existing.depended_on_by.clone())
            .unwrap_or_default();
        let created_at = entries
            .get(&id)
            .map_or_else(Utc::now, |existing| existing.created_at);

        let mut entry = RegistryEntry::new(workflow, status, version, description, created_at);
        entry.depended_on_by = depended_on_by;
        let version = entry.version.clone();
        entries.insert(id, entry);
        tracing::info!(workflow = %id, %version, ?status, "workflow registered");
    }

    /// Look up a workflow's definition, if registered.
    pub fn get(&self, id: WorkflowId) -> Option<Arc<WorkflowDefinition>> {
        self.entries.read().get(&id).map(|e| Arc::clone(&e.workflow))
    }

    /// Whether `id` is registered at all, regardless of status.
    pub fn has(&self, id: WorkflowId) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// All ids currently in `Active` status.
    pub fn active_ids(&self) -> Vec<WorkflowId> {
        self.entries
            .read()
            .iter()
            .filter(|(_, e)| e.status == WorkflowStatus::Active)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids whose workflow name contains `substring`, case-insensitive.
    pub fn search(&self, substring: &str) -> Vec<WorkflowId> {
        let needle = substring.to_lowercase();
        self.entries
            .read()
            .iter()
            .filter(|(_, e)| e.workflow.name.to_lowercase().contains(&needle))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Record that `from` depends on `to`. Both must already be registered.
    pub fn add_dependency(&self, from: WorkflowId, to: WorkflowId) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        if !entries.contains_key(&from) {
            return Err(RegistryError::UnknownWorkflow(from));
        }
        if !entries.contains_key(&to) {
            return Err(RegistryError::UnknownWorkflow(to));
        }
        entries.get_mut(&from).unwrap().depends_on.insert(to);
        entries.get_mut(&to).unwrap().depended_on_by.insert(from);
        tracing::info!(from = %from, to = %to, "workflow dependency recorded");
        Ok(())
    }

    /// Workflows that directly depend on `id`.
    pub fn dependents(&self, id: WorkflowId) -> Vec<WorkflowId> {
        self.entries
            .read()
            .get(&id)
            .map(|e| e.depended_on_by.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether following `depends_on` edges from `root` leads back to it.
    pub fn has_dependency_cycle(&self, root: WorkflowId) -> bool {
        let entries = self.entries.read();
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(entry) = entries.get(&id) else {
                continue;
            };
            for &dep in &entry.depends_on {
                if dep == root {
                    return true;
                }
                if visited.insert(dep) {
                    stack.push(dep);
                }
            }
        }
        false
    }

    /// Per-status counts over every registered entry.
    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics::default();
        for entry in self.entries.read().values() {
            match entry.status {
                WorkflowStatus::Draft => stats.draft += 1,
                WorkflowStatus::Active => stats.active += 1,
                WorkflowStatus::Deprecated => stats.deprecated += 1,
                WorkflowStatus::Retired => stats.retired += 1,
            }
        }
        stats
    }

    /// This entry's `created_at`, if registered — mostly useful for tests
    /// asserting that re-registration preserves the original timestamp.
    pub fn created_at(&self, id: WorkflowId) -> Option<DateTime<Utc>> {
        self.entries.read().get(&id).map(|e| e.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn wf(name: &str) -> WorkflowDefinition {
        WorkflowDefinition::new(WorkflowId::v4(), name)
    }

    fn v1() -> Version {
        Version::new(1, 0, 0)
    }

    #[test]
    fn register_then_get() {
        let registry = Registry::new();
        let w = wf("diagnose");
        let id = w.id;
        registry.register(w, WorkflowStatus::Active, v1(), None);
        assert!(registry.has(id));
        assert_eq!(registry.get(id).map(|w| w.name.clone()), Some("diagnose".to_string()));
    }

    #[test]
    fn active_ids_filters_by_status() {
        let registry = Registry::new();
        let active = wf("a");
        let active_id = active.id;
        let draft = wf("b");
        registry.register(active, WorkflowStatus::Active, v1(), None);
        registry.register(draft, WorkflowStatus::Draft, v1(), None);
        assert_eq!(registry.active_ids(), vec![active_id]);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let registry = Registry::new();
        let w = wf("LogDiagnosis");
        let id = w.id;
        registry.register(w, WorkflowStatus::Active, v1(), None);
        assert_eq!(registry.search("diagnosis"), vec![id]);
        assert!(registry.search("nope").is_empty());
    }

    #[test]
    fn dependency_and_dependents_are_symmetric() {
        let registry = Registry::new();
        let a = wf("a");
        let b = wf("b");
        let (id_a, id_b) = (a.id, b.id);
        registry.register(a, WorkflowStatus::Active, v1(), None);
        registry.register(b, WorkflowStatus::Active, v1(), None);
        registry.add_dependency(id_a, id_b).unwrap();
        assert_eq!(registry.dependents(id_b), vec![id_a]);
    }

    #[test]
    fn add_dependency_rejects_unknown_workflow() {
        let registry = Registry::new();
        let a = wf("a");
        let id_a = a.id;
        registry.register(a, WorkflowStatus::Active, v1(), None);
        let err = registry.add_dependency(id_a, WorkflowId::v4()).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownWorkflow(_)));
    }

    #[test]
    fn three_workflow_cycle_is_detected() {
        let registry = Registry::new();
        let a = wf("a");
        let b = wf("b");
        let c = wf("c");
        let (id_a, id_b, id_c) = (a.id, b.id, c.id);
        registry.register(a, WorkflowStatus::Active, v1(), None);
        registry.register(b, WorkflowStatus::Active, v1(), None);
        registry.register(c, WorkflowStatus::Active, v1(), None);
        registry.add_dependency(id_a, id_b).unwrap();
        registry.add_dependency(id_b, id_c).unwrap();
        registry.add_dependency(id_c, id_a).unwrap();
        assert!(registry.has_dependency_cycle(id_a));
    }

    #[test]
    fn re_registration_preserves_depended_on_by_and_created_at() {
        let registry = Registry::new();
        let a = wf("a");
        let b = wf("b");
        let (id_a, id_b) = (a.id, b.id);
        registry.register(a, WorkflowStatus::Active, v1(), None);
        registry.register(b, WorkflowStatus::Active, v1(), None);
        registry.add_dependency(id_b, id_a).unwrap();

        let first_created_at = registry.created_at(id_a);
        let updated = wf("a-renamed");
        let mut updated = updated;
        updated.id = id_a;
        registry.register(updated, WorkflowStatus::Active, Version::new(1, 1, 0), None);

        assert_eq!(registry.dependents(id_a), vec![id_b]);
        assert_eq!(registry.created_at(id_a), first_created_at);
    }

    #[rstest]
    #[case(WorkflowStatus::Draft)]
    #[case(WorkflowStatus::Active)]
    #[case(WorkflowStatus::Deprecated)]
    #[case(WorkflowStatus::Retired)]
    fn statistics_count_each_status(#[case] status: WorkflowStatus) {
        let registry = Registry::new();
        registry.register(wf("a"), status, v1(), None);
        let stats = registry.statistics();
        let total = stats.draft + stats.active + stats.deprecated + stats.retired;
        assert_eq!(total, 1);
    }
}
