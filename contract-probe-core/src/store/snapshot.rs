use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::memory::{Dependency, MemoryStore};
use super::Artifact;
use crate::contract::Contract;
use crate::error::{ProbeError, Result};

/// Serializable dump of a consistent store state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ProbeError::Serialization(format!("Failed to parse snapshot: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ProbeError::NotFound(format!("Cannot read snapshot {:?}: {}", path, e)))?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ProbeError::Serialization(format!("Failed to encode snapshot: {}", e)))?;
        std::fs::write(path, json)
            .map_err(|e| ProbeError::Config(format!("Cannot write snapshot {:?}: {}", path, e)))
    }

    /// Build a store, validating every contract on the way in
    pub fn into_store(self) -> Result<MemoryStore> {
        let mut store = MemoryStore::new();
        for artifact in self.artifacts {
            store.insert_artifact(artifact);
        }
        for contract in self.contracts {
            contract.validate().map_err(|e| {
                ProbeError::InvalidContract(format!("{}: {}", contract.function_id, e))
            })?;
            store.insert_contract(contract);
        }
        for dep in &self.dependencies {
            store.add_dependency(&dep.caller, &dep.callee);
        }

        info!(
            "Loaded snapshot: {} artifacts, {} contracts, {} dependencies",
            store.artifact_count(),
            store.contract_count(),
            self.dependencies.len()
        );
        Ok(store)
    }

    pub fn from_store(store: &MemoryStore) -> Self {
        let mut artifacts: Vec<Artifact> = store.artifacts().cloned().collect();
        artifacts.sort_by(|a, b| a.function_id.cmp(&b.function_id));
        let mut contracts: Vec<Contract> = store.contracts().cloned().collect();
        contracts.sort_by(|a, b| a.function_id.cmp(&b.function_id));
        Self { artifacts, contracts, dependencies: store.dependencies() }
    }
}
