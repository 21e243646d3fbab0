//! Discovery of uncontracted neighbours in the call graph

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::{Contract, Criticality};
use crate::error::Result;
use crate::store::{ArtifactStore, ContractStore, DependencyGraph};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissingConfig {
    pub max_depth: usize,
    pub callee_weight: f64,
    pub caller_weight: f64,
}

impl Default for MissingConfig {
    fn default() -> Self {
        Self { max_depth: 2, callee_weight: 1.0, caller_weight: 0.6 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Callee,
    Caller,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relationship::Callee => write!(f, "callee"),
            Relationship::Caller => write!(f, "caller"),
        }
    }
}

fn path_bonus(criticality: Option<Criticality>) -> f64 {
    match criticality {
        Some(Criticality::High) => 0.3,
        Some(Criticality::Medium) => 0.15,
        Some(Criticality::Low) => 0.05,
        None => 0.0,
    }
}

/// Most severe criticality declared by a contract
fn severest(contract: &Contract) -> Option<Criticality> {
    let declared = contract.invariants.iter().map(|inv| inv.criticality).min();
    if contract.precondition.is_some() || contract.postcondition.is_some() {
        Some(Criticality::High)
    } else {
        declared
    }
}

fn more_severe(a: Option<Criticality>, b: Option<Criticality>) -> Option<Criticality> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingContract {
    pub function_id: String,
    pub relationship: Relationship,
    /// Hops from the origin
    pub distance: usize,
    pub priority: f64,
    /// Functions from the origin to this one, both ends included
    pub path: Vec<String>,
    pub file_path: String,
    /// Why a contract here would help
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingContractReport {
    pub origin: String,
    pub origin_found: bool,
    pub origin_has_contract: bool,
    pub visited: usize,
    pub entries: Vec<MissingContract>,
    pub suggestion: String,
}

impl MissingContractReport {
    fn empty(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            origin_found: false,
            origin_has_contract: false,
            visited: 0,
            entries: Vec::new(),
            suggestion: format!("{} is not known to the dependency graph", origin),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_relationship(&self, relationship: Relationship) -> Vec<&MissingContract> {
        self.entries.iter().filter(|e| e.relationship == relationship).collect()
    }

    pub fn top(&self, n: usize) -> &[MissingContract] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn render_text(&self) -> String {
        let mut lines = vec![format!("Missing contracts around {}", self.origin)];
        for (i, entry) in self.entries.iter().enumerate() {
            lines.push(format!(
                "{:>3}. {} ({}, distance {}, priority {:.2})",
                i + 1,
                entry.function_id,
                entry.relationship,
                entry.distance,
                entry.priority
            ));
        }
        lines.push(self.suggestion.clone());
        lines.join("\n")
    }
}

fn reason(relationship: Relationship, distance: usize, via: &str) -> String {
    let via = via.rsplit("::").next().unwrap_or(via);
    match (relationship, distance) {
        (Relationship::Callee, 1) => {
            "Directly called by the target. A contract would check inputs and outputs at this call site."
                .to_string()
        }
        (Relationship::Caller, 1) => {
            "Calls the target directly. A contract would show what it passes in and expects back.".to_string()
        }
        (Relationship::Callee, _) => format!(
            "Called at depth {} in the call chain (via {}). A contract could help isolate issues in the call hierarchy.",
            distance, via
        ),
        (Relationship::Caller, _) => format!(
            "Reaches the target at depth {} (via {}). A contract could narrow down how bad inputs arrive.",
            distance, via
        ),
    }
}

struct Frontier {
    function_id: String,
    distance: usize,
    criticality: Option<Criticality>,
    path: Vec<String>,
}

pub struct MissingContractDetector {
    graph: Arc<dyn DependencyGraph>,
    contracts: Arc<dyn ContractStore>,
    artifacts: Arc<dyn ArtifactStore>,
    config: MissingConfig,
}

impl MissingContractDetector {
    pub fn new(
        graph: Arc<dyn DependencyGraph>,
        contracts: Arc<dyn ContractStore>,
        artifacts: Arc<dyn ArtifactStore>,
        config: MissingConfig,
    ) -> Self {
        Self { graph, contracts, artifacts, config }
    }

    /// Walk callees and callers of `origin` up to `depth` hops (configured default when `None`)
    pub fn detect(&self, origin: &str, depth: Option<usize>) -> Result<MissingContractReport> {
        let depth = depth.unwrap_or(self.config.max_depth);
        let origin_artifact = self.artifacts.artifact(origin)?;
        if !self.graph.contains(origin) && origin_artifact.is_none() {
            debug!("Origin {} unknown; nothing to traverse", origin);
            return Ok(MissingContractReport::empty(origin));
        }

        let origin_contract = self.contracts.contract(origin)?;
        let origin_criticality = origin_contract.as_ref().and_then(severest);

        let mut visited: HashSet<String> = HashSet::from([origin.to_string()]);
        let mut entries = Vec::new();
        for relationship in [Relationship::Callee, Relationship::Caller] {
            self.walk(origin, origin_criticality, relationship, depth, &mut visited, &mut entries)?;
        }

        entries.sort_by(|a: &MissingContract, b| b.priority.total_cmp(&a.priority));

        let suggestion = match entries.first() {
            None => format!("All neighbours of {} within {} hops have contracts", origin, depth),
            Some(first) => format!(
                "Add contracts to {} uncontracted neighbour(s), starting with {} ({})",
                entries.len(),
                first.function_id,
                first.relationship
            ),
        };
        info!("Missing contract scan of {}: {} of {} visited lack contracts", origin, entries.len(), visited.len() - 1);

        Ok(MissingContractReport {
            origin: origin.to_string(),
            origin_found: true,
            origin_has_contract: origin_contract.is_some(),
            visited: visited.len() - 1,
            entries,
            suggestion,
        })
    }

    fn walk(
        &self,
        origin: &str,
        origin_criticality: Option<Criticality>,
        relationship: Relationship,
        depth: usize,
        visited: &mut HashSet<String>,
        entries: &mut Vec<MissingContract>,
    ) -> Result<()> {
        let weight = match relationship {
            Relationship::Callee => self.config.callee_weight,
            Relationship::Caller => self.config.caller_weight,
        };

        let mut queue = VecDeque::from([Frontier {
            function_id: origin.to_string(),
            distance: 0,
            criticality: origin_criticality,
            path: vec![origin.to_string()],
        }]);

        while let Some(current) = queue.pop_front() {
            if current.distance >= depth {
                continue;
            }
            let neighbours = match relationship {
                Relationship::Callee => self.graph.callees_of(&current.function_id, 1)?,
                Relationship::Caller => self.graph.callers_of(&current.function_id, 1)?,
            };

            for neighbour in neighbours {
                if !visited.insert(neighbour.clone()) {
                    continue;
                }
                let distance = current.distance + 1;
                let mut path = current.path.clone();
                path.push(neighbour.clone());

                let contract = self.contracts.contract(&neighbour)?;
                // Graph-only nodes (builtins, external libraries) cannot carry a contract
                let artifact = match contract {
                    Some(_) => None,
                    None => self.artifacts.artifact(&neighbour)?,
                };
                match artifact {
                    Some(artifact) => entries.push(MissingContract {
                        function_id: neighbour.clone(),
                        relationship,
                        distance,
                        priority: weight / distance as f64 + path_bonus(current.criticality),
                        path: path.clone(),
                        file_path: artifact.file_path,
                        reason: reason(relationship, distance, &current.function_id),
                    }),
                    None if contract.is_none() => {
                        debug!("Skipping {}: no stored source", neighbour);
                    }
                    None => {}
                }

                queue.push_back(Frontier {
                    function_id: neighbour,
                    distance,
                    criticality: more_severe(current.criticality, contract.as_ref().and_then(severest)),
                    path,
                });
            }
        }
        Ok(())
    }
}
