//! Command implementations. Each loads the snapshot, runs one pipeline stage
//! and prints JSON on stdout.

pub mod diagnose;
pub mod examples;
pub mod missing;
pub mod script;
pub mod verify;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use contract_probe_core::serializer::{Value, arguments_from_wire};
use contract_probe_core::{Executor, MemoryStore, ProbeConfig, RuntimeVerifier, Snapshot, VerificationRequest};
use serde::Serialize;
use tracing::debug;

use crate::cli::app::VerifyArgs;

/// Configuration and store shared by every command
pub struct Workspace {
    pub config: ProbeConfig,
    pub store: Arc<MemoryStore>,
}

impl Workspace {
    pub fn load(config: Option<&Path>, snapshot: &Path) -> Result<Self> {
        let config = match config {
            Some(path) => ProbeConfig::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => ProbeConfig::default(),
        };
        let store = Snapshot::load(snapshot)
            .and_then(Snapshot::into_store)
            .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))?;
        debug!("Workspace ready: {} contracts", store.contract_count());
        Ok(Self { config, store: Arc::new(store) })
    }

    pub fn executor(&self) -> Arc<Executor> {
        Arc::new(Executor::new(self.config.executor.clone()))
    }

    pub fn verifier(&self) -> RuntimeVerifier {
        RuntimeVerifier::new(self.store.clone(), self.store.clone(), self.executor(), &self.config.executor)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to encode output")?);
    Ok(())
}

fn parse_value(text: &str, what: &str) -> Result<Value> {
    let json: serde_json::Value =
        serde_json::from_str(text).with_context(|| format!("{} is not valid JSON", what))?;
    Value::from_wire(&json).with_context(|| format!("{} cannot be decoded", what))
}

pub fn request_from_args(args: &VerifyArgs) -> Result<VerificationRequest> {
    let input: serde_json::Value = serde_json::from_str(&args.input).context("--input is not valid JSON")?;
    let mut request = VerificationRequest::new(
        args.function_id.clone(),
        arguments_from_wire(&input).context("--input must be a JSON object of arguments")?,
    );
    if let Some(expected) = &args.expected {
        request = request.with_expected(parse_value(expected, "--expected")?);
    }
    if let Some(observed) = &args.observed {
        request = request.with_observed(parse_value(observed, "--observed")?);
    }
    request.timeout_ms = args.timeout_ms;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(input: &str, expected: Option<&str>) -> VerifyArgs {
        VerifyArgs {
            function_id: "calc.py::subtract".to_string(),
            input: input.to_string(),
            expected: expected.map(str::to_string),
            observed: None,
            timeout_ms: Some(250),
        }
    }

    #[test]
    fn test_request_from_args() {
        let request = request_from_args(&args(
            r#"{"a": 1, "b": {"__type__": "decimal", "value": "2.50"}}"#,
            Some("null"),
        ))
        .unwrap();
        assert_eq!(request.input["a"], Value::Int(1));
        assert_eq!(request.input["b"], Value::Decimal("2.50".to_string()));
        assert_eq!(request.expected, Some(Value::Null));
        assert_eq!(request.timeout_ms, Some(250));
    }

    #[test]
    fn test_bad_input_is_reported() {
        assert!(request_from_args(&args("[1, 2]", None)).is_err());
        assert!(request_from_args(&args("{", None)).is_err());
    }

    #[test]
    fn test_workspace_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(
            &path,
            r#"{"contracts": [{"function_id": "f", "invariants": [{"name": "p", "logic": "result > 0", "criticality": "LOW"}]}]}"#,
        )
        .unwrap();
        let workspace = Workspace::load(None, &path).unwrap();
        assert_eq!(workspace.store.contract_count(), 1);
        assert!(Workspace::load(None, &dir.path().join("absent.json")).is_err());
    }
}
