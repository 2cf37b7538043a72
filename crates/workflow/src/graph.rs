//! The DAG graph model: adjacency storage, topological ordering, and cycle
//! detection.

use std::collections::{HashMap, HashSet, VecDeque};

use dagforge_core::NodeId;
use petgraph::graphmap::DiGraphMap;

use crate::connection::Connection;
use crate::error::WorkflowError;
use crate::workflow::WorkflowDefinition;

/// A directed graph over node ids, backed by an adjacency map.
///
/// Successor lookups are O(1) against the forward adjacency map; predecessor
/// lookups are served from a maintained reverse adjacency map, so both are
/// O(1) in practice despite §4.4 only requiring O(1) for successors.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<NodeId>,
    /// Insertion order is preserved so [`Self::topological_order`] breaks
    /// ties deterministically — "ties broken by insertion order" per §4.4.
    insertion_index: HashMap<NodeId, usize>,
    forward: HashMap<NodeId, HashSet<NodeId>>,
    reverse: HashMap<NodeId, HashSet<NodeId>>,
}

impl DependencyGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a workflow's nodes and connections.
    pub fn from_definition(workflow: &WorkflowDefinition) -> Result<Self, WorkflowError> {
        let mut graph = Self::new();
        for node in &workflow.nodes {
            graph.add_node(node.id);
        }
        for conn in &workflow.connections {
            graph.add_connection(conn.from, conn.to)?;
        }
        Ok(graph)
    }

    /// Register a node. Idempotent if already present.
    pub fn add_node(&mut self, id: NodeId) {
        if self.forward.contains_key(&id) {
            return;
        }
        let index = self.nodes.len();
        self.nodes.push(id);
        self.insertion_index.insert(id, index);
        self.forward.insert(id, HashSet::new());
        self.reverse.insert(id, HashSet::new());
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) {
        self.forward.remove(&id);
        self.reverse.remove(&id);
        self.insertion_index.remove(&id);
        self.nodes.retain(|n| *n != id);
        for succs in self.forward.values_mut() {
            succs.remove(&id);
        }
        for preds in self.reverse.values_mut() {
            preds.remove(&id);
        }
    }

    /// Add a directed edge. Both endpoints must already exist.
    pub fn add_connection(&mut self, from: NodeId, to: NodeId) -> Result<(), WorkflowError> {
        if !self.forward.contains_key(&from) {
            return Err(WorkflowError::UnknownNode(from));
        }
        if !self.forward.contains_key(&to) {
            return Err(WorkflowError::UnknownNode(to));
        }
        self.forward.get_mut(&from).unwrap().insert(to);
        self.reverse.get_mut(&to).unwrap().insert(from);
        Ok(())
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Direct predecessors of `id`, in no particular order.
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.reverse
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Direct successors of `id`, in no particular order.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.forward
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Nodes with no predecessors, in insertion order.
    pub fn sources(&self) -> Vec<NodeId> {
        self.ordered_filter(|id| self.reverse.get(id).is_none_or(HashSet::is_empty))
    }

    /// Nodes with no successors, in insertion order.
    pub fn sinks(&self) -> Vec<NodeId> {
        self.ordered_filter(|id| self.forward.get(id).is_none_or(HashSet::is_empty))
    }

    fn ordered_filter(&self, pred: impl Fn(&NodeId) -> bool) -> Vec<NodeId> {
        self.nodes.iter().copied().filter(|id| pred(id)).collect()
    }

    /// Convert to a `petgraph` map for cycle detection and toposort, which
    /// this crate's dependency on `petgraph` exists to provide.
    fn to_petgraph(&self) -> DiGraphMap<NodeId, ()> {
        let mut g = DiGraphMap::new();
        for &id in &self.nodes {
            g.add_node(id);
        }
        for (&from, tos) in &self.forward {
            for &to in tos {
                g.add_edge(from, to, ());
            }
        }
        g
    }

    /// `true` if the graph contains a cycle.
    pub fn has_cycles(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.to_petgraph())
    }

    /// A topological order, ties broken by insertion order. `Err` if the
    /// graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, WorkflowError> {
        if self.has_cycles() {
            return Err(WorkflowError::CycleDetected);
        }
        Ok(self.kahn_order())
    }

    /// Kahn's algorithm, with ties broken by each node's insertion index so
    /// replays over the same workflow are deterministic.
    fn kahn_order(&self) -> Vec<NodeId> {
        let mut indegree: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .map(|&id| (id, self.reverse.get(&id).map_or(0, HashSet::len)))
            .collect();

        let mut ready: Vec<NodeId> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        ready.sort_by_key(|id| self.insertion_index[id]);
        let mut queue: VecDeque<NodeId> = ready.into();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            let mut newly_ready: Vec<NodeId> = Vec::new();
            for &succ in self.forward.get(&id).into_iter().flatten() {
                let deg = indegree.get_mut(&succ).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    newly_ready.push(succ);
                }
            }
            newly_ready.sort_by_key(|id| self.insertion_index[id]);
            for succ in newly_ready {
                queue.push_back(succ);
            }
        }
        order
    }

    /// Groups the topological order into waves: a wave is a maximal set of
    /// nodes whose predecessors all lie in earlier waves. This is what the
    /// Scheduler dispatches per round.
    pub fn levels(&self) -> Result<Vec<Vec<NodeId>>, WorkflowError> {
        if self.has_cycles() {
            return Err(WorkflowError::CycleDetected);
        }
        let mut level_of: HashMap<NodeId, usize> = HashMap::new();
        let mut levels: Vec<Vec<NodeId>> = Vec::new();

        for id in self.kahn_order() {
            let level = self
                .predecessors(id)
                .iter()
                .map(|p| level_of[p] + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(id, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(id);
        }
        Ok(levels)
    }

    /// All registered node ids, in insertion order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.nodes
    }

    /// All connections currently represented in the adjacency maps.
    pub fn connections(&self) -> Vec<Connection> {
        let mut out = Vec::new();
        for &id in &self.nodes {
            for succ in self.successors(id) {
                out.push(Connection::new(id, succ));
            }
        }
        out
    }
}
