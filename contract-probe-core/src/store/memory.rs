use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use super::{Artifact, ArtifactStore, ContractStore, DependencyGraph};
use crate::contract::Contract;
use crate::error::Result;

/// Directed call edge: `caller` invokes `callee`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub caller: String,
    pub callee: String,
}

/// In-memory artifact, contract and call-graph store
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: HashMap<String, Artifact>,
    contracts: HashMap<String, Contract>,
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_artifact(&mut self, artifact: Artifact) {
        self.node(&artifact.function_id);
        self.artifacts.insert(artifact.function_id.clone(), artifact);
    }

    pub fn insert_contract(&mut self, contract: Contract) {
        self.contracts.insert(contract.function_id.clone(), contract);
    }

    /// Record that `caller` calls `callee`. Repeated edges are ignored.
    pub fn add_dependency(&mut self, caller: &str, callee: &str) {
        let from = self.node(caller);
        let to = self.node(callee);
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut edges: Vec<Dependency> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| Dependency { caller: self.graph[a].clone(), callee: self.graph[b].clone() })
            .collect();
        edges.sort_by(|a, b| (&a.caller, &a.callee).cmp(&(&b.caller, &b.callee)));
        edges
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.values()
    }

    fn node(&mut self, function_id: &str) -> NodeIndex {
        if let Some(idx) = self.nodes.get(function_id) {
            return *idx;
        }
        let idx = self.graph.add_node(function_id.to_string());
        self.nodes.insert(function_id.to_string(), idx);
        idx
    }

    /// Breadth-first reach in one direction, nearest first, names sorted within a hop
    fn reach(&self, function_id: &str, depth: usize, direction: Direction) -> Vec<String> {
        let Some(&start) = self.nodes.get(function_id) else {
            return Vec::new();
        };

        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut found = Vec::new();

        while let Some((node, hops)) = queue.pop_front() {
            if hops >= depth {
                continue;
            }
            let mut next: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(node, direction)
                .filter(|n| seen.insert(*n))
                .collect();
            next.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
            for n in next {
                found.push(self.graph[n].clone());
                queue.push_back((n, hops + 1));
            }
        }

        found
    }
}

impl ArtifactStore for MemoryStore {
    fn artifact(&self, function_id: &str) -> Result<Option<Artifact>> {
        Ok(self.artifacts.get(function_id).cloned())
    }
}

impl ContractStore for MemoryStore {
    fn contract(&self, function_id: &str) -> Result<Option<Contract>> {
        Ok(self.contracts.get(function_id).cloned())
    }

    fn has_contract(&self, function_id: &str) -> Result<bool> {
        Ok(self.contracts.contains_key(function_id))
    }
}

impl DependencyGraph for MemoryStore {
    fn callees_of(&self, function_id: &str, depth: usize) -> Result<Vec<String>> {
        Ok(self.reach(function_id, depth, Direction::Outgoing))
    }

    fn callers_of(&self, function_id: &str, depth: usize) -> Result<Vec<String>> {
        Ok(self.reach(function_id, depth, Direction::Incoming))
    }

    fn contains(&self, function_id: &str) -> bool {
        self.nodes.contains_key(function_id)
    }
}
