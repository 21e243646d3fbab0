//! Collaborator seams: artifact, contract and dependency-graph providers
//!
//! The persistent store is external. These traits describe the lookups the
//! pipeline needs; [`MemoryStore`] implements all three for tests, the CLI
//! and any caller that can load a consistent snapshot up front.

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::Snapshot;

use serde::{Deserialize, Serialize};

use crate::contract::Contract;
use crate::error::Result;
use crate::hashing::{Language, code_hash};
use crate::script::TargetSource;

/// Stored record of a function's source and its hash at contract time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub function_id: String,
    pub file_path: String,
    pub function_name: String,
    #[serde(default)]
    pub language: Language,
    #[serde(alias = "body")]
    pub source: String,
    #[serde(default = "default_start_line")]
    pub start_line: usize,
    /// Hash recorded when the contract was authored
    pub code_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

fn default_start_line() -> usize {
    1
}

impl Artifact {
    /// Artifact whose stored hash matches `source`
    pub fn new(
        function_id: impl Into<String>,
        file_path: impl Into<String>,
        function_name: impl Into<String>,
        language: Language,
        source: impl Into<String>,
        start_line: usize,
    ) -> Self {
        let source = source.into();
        Self {
            function_id: function_id.into(),
            file_path: file_path.into(),
            function_name: function_name.into(),
            language,
            code_hash: code_hash(&source, language),
            source,
            start_line,
            signature: None,
        }
    }

    pub fn current_hash(&self) -> String {
        code_hash(&self.source, self.language)
    }

    pub fn is_stale(&self) -> bool {
        self.current_hash() != self.code_hash
    }

    pub fn target_source(&self) -> TargetSource {
        TargetSource {
            function_name: self.function_name.clone(),
            body: self.source.clone(),
            language: self.language,
        }
    }
}

pub trait ArtifactStore: Send + Sync {
    fn artifact(&self, function_id: &str) -> Result<Option<Artifact>>;
}

pub trait ContractStore: Send + Sync {
    fn contract(&self, function_id: &str) -> Result<Option<Contract>>;

    fn has_contract(&self, function_id: &str) -> Result<bool> {
        Ok(self.contract(function_id)?.is_some())
    }
}

/// Caller/callee relationships between functions
pub trait DependencyGraph: Send + Sync {
    /// Functions reachable by following call edges, up to `depth` hops
    fn callees_of(&self, function_id: &str, depth: usize) -> Result<Vec<String>>;

    /// Functions that reach `function_id` within `depth` hops
    fn callers_of(&self, function_id: &str, depth: usize) -> Result<Vec<String>>;

    fn contains(&self, function_id: &str) -> bool;
}
