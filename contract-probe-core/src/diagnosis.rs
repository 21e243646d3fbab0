//! One-call pipeline: verify, rank violations, localise, look for gaps

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::executor::ScriptRunner;
use crate::missing::{MissingContractDetector, MissingContractReport};
use crate::root_cause::{RootCauseAnalyzer, RootCauseReport};
use crate::store::{ArtifactStore, ContractStore, DependencyGraph};
use crate::verifier::{RuntimeVerifier, VerificationRequest, VerificationResult};
use crate::violation::{self, ViolationReport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub verification: VerificationResult,
    pub violations: ViolationReport,
    /// Absent when nothing was violated or no source is stored
    pub root_cause: Option<RootCauseReport>,
    pub missing: MissingContractReport,
}

impl Diagnosis {
    pub fn render_text(&self) -> String {
        let mut sections = vec![self.violations.render_text()];
        if let Some(root_cause) = &self.root_cause {
            sections.push(root_cause.render_text());
        }
        sections.push(self.missing.render_text());
        sections.join("\n\n")
    }
}

fn join_error(err: tokio::task::JoinError) -> ProbeError {
    ProbeError::Execution { message: format!("Diagnosis task failed: {}", err), stderr_tail: String::new() }
}

pub struct Diagnoser {
    verifier: RuntimeVerifier,
    contracts: Arc<dyn ContractStore>,
    artifacts: Arc<dyn ArtifactStore>,
    analyzer: Arc<RootCauseAnalyzer>,
    detector: Arc<MissingContractDetector>,
}

impl Diagnoser {
    pub fn new(
        contracts: Arc<dyn ContractStore>,
        artifacts: Arc<dyn ArtifactStore>,
        graph: Arc<dyn DependencyGraph>,
        runner: Arc<dyn ScriptRunner>,
        config: &ProbeConfig,
    ) -> Self {
        Self {
            verifier: RuntimeVerifier::new(contracts.clone(), artifacts.clone(), runner, &config.executor),
            analyzer: Arc::new(RootCauseAnalyzer::new(config.root_cause.clone())),
            detector: Arc::new(MissingContractDetector::new(
                graph,
                contracts.clone(),
                artifacts.clone(),
                config.missing.clone(),
            )),
            contracts,
            artifacts,
        }
    }

    pub fn verifier(&self) -> &RuntimeVerifier {
        &self.verifier
    }

    pub async fn diagnose(&self, request: &VerificationRequest) -> Result<Diagnosis> {
        let verification = self.verifier.verify(request).await;
        let contract = self.contracts.contract(&request.function_id)?;
        let violations = violation::identify(&verification, contract.as_ref());

        let artifact = if violations.is_empty() { None } else { self.artifacts.artifact(&request.function_id)? };
        let root_cause_task = artifact.map(|artifact| {
            let analyzer = self.analyzer.clone();
            let details = violations.violations.clone();
            tokio::task::spawn_blocking(move || analyzer.analyze(&details, &artifact))
        });

        let detector = self.detector.clone();
        let origin = request.function_id.clone();
        let missing_task = tokio::task::spawn_blocking(move || detector.detect(&origin, None));

        let root_cause = match root_cause_task {
            Some(task) => Some(task.await.map_err(join_error)?),
            None => {
                debug!("No root cause analysis for {}", request.function_id);
                None
            }
        };
        let missing = missing_task.await.map_err(join_error)??;

        info!(
            "Diagnosis of {}: {} violations, {} uncontracted neighbours",
            request.function_id,
            violations.failed_count,
            missing.entries.len()
        );
        Ok(Diagnosis { verification, violations, root_cause, missing })
    }
}
