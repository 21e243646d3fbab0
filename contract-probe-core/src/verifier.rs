//! Runtime verification of one function against its contract

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::contract::{Contract, Criticality};
use crate::error::{ErrorKind, ProbeError, Result};
use crate::executor::{ExecutorConfig, Payload, ScriptRunner, WorkerReport};
use crate::script::{GeneratedScript, ScriptGenerator};
use crate::serializer::{Arguments, Value, arguments_from_wire};
use crate::store::{Artifact, ArtifactStore, ContractStore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub function_id: String,
    #[serde(default)]
    pub input: Arguments,
    /// Present even when the expected value itself is null
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// Verify this output instead of calling the function
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub observed: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl VerificationRequest {
    pub fn new(function_id: impl Into<String>, input: Arguments) -> Self {
        Self { function_id: function_id.into(), input, ..Self::default() }
    }

    pub fn with_expected(mut self, expected: Value) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn with_observed(mut self, observed: Value) -> Self {
        self.observed = Some(observed);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    /// Copied from the contract, never re-derived
    pub criticality: Criticality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFailure {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl From<&ProbeError> for VerificationFailure {
    fn from(err: &ProbeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            diagnostic: err.diagnostic().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub run_id: Uuid,
    pub function_id: String,
    pub passed: bool,
    pub invariants: Vec<InvariantResult>,
    pub error: Option<VerificationFailure>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_hash: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl VerificationResult {
    /// True iff there is no error and every outcome passed
    pub fn aggregate(invariants: &[InvariantResult], error: Option<&VerificationFailure>) -> bool {
        error.is_none() && invariants.iter().all(|inv| inv.passed)
    }

    pub fn failed_invariants(&self) -> impl Iterator<Item = &InvariantResult> {
        self.invariants.iter().filter(|inv| !inv.passed)
    }

    /// Failure of the pipeline rather than of the function
    pub fn infrastructure_failure(&self) -> Option<&VerificationFailure> {
        self.error.as_ref().filter(|e| e.kind.is_infrastructure())
    }
}

struct CachedScript {
    fingerprint: String,
    code_hash: Option<String>,
    script: Arc<GeneratedScript>,
}

/// Generated scripts keyed by function id, invalidated when the contract or source changes
#[derive(Default)]
pub struct ScriptCache {
    entries: DashMap<String, CachedScript>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_or_generate(
        &self,
        generator: &ScriptGenerator,
        contract: &Contract,
        artifact: Option<&Artifact>,
    ) -> Result<Arc<GeneratedScript>> {
        let fingerprint = contract.fingerprint();
        let code_hash = artifact.map(Artifact::current_hash);

        if let Some(entry) = self.entries.get(&contract.function_id) {
            if entry.fingerprint == fingerprint && entry.code_hash == code_hash {
                debug!("Script cache hit for {}", contract.function_id);
                return Ok(entry.script.clone());
            }
        }

        debug!("Script cache miss for {}", contract.function_id);
        let target = artifact.map(Artifact::target_source);
        let script = Arc::new(generator.generate(contract, target.as_ref())?);
        self.entries.insert(
            contract.function_id.clone(),
            CachedScript { fingerprint, code_hash, script: script.clone() },
        );
        Ok(script)
    }
}

/// Names the embedded target could not resolve without its defining module
const UNRESOLVED_TARGET: [&str; 3] = [
    "target raised NameError",
    "target raised ImportError",
    "target raised ModuleNotFoundError",
];

/// Map a worker-reported error onto a failure kind
fn classify_worker_error(message: &str) -> ErrorKind {
    if UNRESOLVED_TARGET.iter().any(|prefix| message.starts_with(prefix)) {
        ErrorKind::ScriptError
    } else if message.starts_with("target raised") {
        ErrorKind::TargetRaised
    } else if message.starts_with("invalid payload") {
        ErrorKind::SerializationError
    } else if message.starts_with("no target function") {
        ErrorKind::ScriptError
    } else {
        ErrorKind::ExecutionError
    }
}

pub struct RuntimeVerifier {
    contracts: Arc<dyn ContractStore>,
    artifacts: Arc<dyn ArtifactStore>,
    runner: Arc<dyn ScriptRunner>,
    generator: ScriptGenerator,
    cache: ScriptCache,
    default_timeout: Duration,
}

impl RuntimeVerifier {
    pub fn new(
        contracts: Arc<dyn ContractStore>,
        artifacts: Arc<dyn ArtifactStore>,
        runner: Arc<dyn ScriptRunner>,
        config: &ExecutorConfig,
    ) -> Self {
        Self {
            contracts,
            artifacts,
            runner,
            generator: ScriptGenerator::new(),
            cache: ScriptCache::new(),
            default_timeout: config.timeout(),
        }
    }

    pub fn cache(&self) -> &ScriptCache {
        &self.cache
    }

    /// Script the worker would run for `function_id`
    pub fn script_for(&self, function_id: &str) -> Result<Arc<GeneratedScript>> {
        let contract = self.load_contract(function_id)?;
        let artifact = self.artifacts.artifact(function_id)?;
        self.cache.get_or_generate(&self.generator, &contract, artifact.as_ref())
    }

    /// Verify one call. Failures of any stage are folded into the result.
    pub async fn verify(&self, request: &VerificationRequest) -> VerificationResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        let outcome = self.run(request).await;
        let duration_ms = clock.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok((report, contract, script_hash)) => {
                let mut invariants: Vec<InvariantResult> = report
                    .invariants
                    .into_iter()
                    .map(|inv| {
                        let criticality = contract.criticality_of(&inv.name).unwrap_or_else(|| {
                            warn!("Worker reported unknown check '{}' for {}", inv.name, request.function_id);
                            Criticality::Medium
                        });
                        InvariantResult { name: inv.name, passed: inv.passed, message: inv.message, criticality }
                    })
                    .collect();
                let error = report.error.map(|message| VerificationFailure {
                    kind: classify_worker_error(&message),
                    message,
                    diagnostic: None,
                });
                // Outcomes only stand when the function itself raised
                if let Some(failure) = error.as_ref().filter(|e| e.kind.is_infrastructure()) {
                    if !invariants.is_empty() {
                        warn!(
                            "Dropping {} outcome(s) for {}: {} ({})",
                            invariants.len(),
                            request.function_id,
                            failure.message,
                            failure.kind.as_str()
                        );
                        invariants.clear();
                    }
                }
                let passed = VerificationResult::aggregate(&invariants, error.as_ref());
                if passed != report.passed {
                    debug!("Worker verdict {} overridden by recomputed {}", report.passed, passed);
                }
                VerificationResult {
                    run_id,
                    function_id: request.function_id.clone(),
                    passed,
                    invariants,
                    error,
                    duration_ms,
                    script_hash: Some(script_hash),
                    started_at,
                }
            }
            Err(err) => {
                warn!("Verification of {} failed: {}", request.function_id, err);
                VerificationResult {
                    run_id,
                    function_id: request.function_id.clone(),
                    passed: false,
                    invariants: Vec::new(),
                    error: Some(VerificationFailure::from(&err)),
                    duration_ms,
                    script_hash: None,
                    started_at,
                }
            }
        };

        info!(
            "Verification of {} {} in {} ms",
            result.function_id,
            if result.passed { "passed" } else { "failed" },
            result.duration_ms
        );
        result
    }

    /// Verify every IO example of the contract as a live call
    pub async fn verify_examples(&self, function_id: &str) -> Result<Vec<VerificationResult>> {
        let contract = self.load_contract(function_id)?;
        let mut results = Vec::with_capacity(contract.io_examples.len());

        for (idx, example) in contract.io_examples.iter().enumerate() {
            let decoded = arguments_from_wire(&example.input)
                .and_then(|input| Ok((input, Value::from_wire(&example.output)?)));
            let result = match decoded {
                Ok((input, expected)) => {
                    let request = VerificationRequest::new(function_id, input).with_expected(expected);
                    self.verify(&request).await
                }
                Err(err) => {
                    warn!("IO example {} of {} cannot be decoded: {}", idx, function_id, err);
                    VerificationResult {
                        run_id: Uuid::new_v4(),
                        function_id: function_id.to_string(),
                        passed: false,
                        invariants: Vec::new(),
                        error: Some(VerificationFailure::from(&err)),
                        duration_ms: 0,
                        script_hash: None,
                        started_at: Utc::now(),
                    }
                }
            };
            results.push(result);
        }

        Ok(results)
    }

    fn load_contract(&self, function_id: &str) -> Result<Contract> {
        self.contracts
            .contract(function_id)?
            .ok_or_else(|| ProbeError::NotFound(format!("No contract for {}", function_id)))
    }

    async fn run(&self, request: &VerificationRequest) -> Result<(WorkerReport, Contract, String)> {
        let contract = self.load_contract(&request.function_id)?;
        let artifact = self.artifacts.artifact(&request.function_id)?;
        if artifact.is_none() && request.observed.is_none() {
            return Err(ProbeError::NotFound(format!(
                "No artifact for {}; supply an observed output instead",
                request.function_id
            )));
        }

        let script = self.cache.get_or_generate(&self.generator, &contract, artifact.as_ref())?;
        let payload = Payload {
            inputs: request.input.clone(),
            expected: request.expected.clone(),
            observed: request.observed.clone(),
        };
        let timeout = request.timeout_ms.map(Duration::from_millis).unwrap_or(self.default_timeout);

        let report = self.runner.run(&script.text, &payload, timeout).await?;
        Ok((report, contract, script.hash.clone()))
    }
}
