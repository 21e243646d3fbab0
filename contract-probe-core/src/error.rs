//! Error types for the verification pipeline
//!
//! Every stage returns `Result<T, ProbeError>`. Each error maps onto a
//! machine-readable [`ErrorKind`] so callers can tell infrastructure
//! failures (timeouts, broken workers, stale source) apart from genuine
//! invariant violations.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("Script error: {0}")]
    Script(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Verification timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Execution error: {message}")]
    Execution { message: String, stderr_tail: String },

    #[error("Stale source: stored hash {stored} does not match current hash {current}")]
    StaleSource { stored: String, current: String },

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid contract: {0}")]
    InvalidContract(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ProbeError>;

/// Machine-readable failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ScriptError,
    SerializationError,
    Timeout,
    ExecutionError,
    StaleSource,
    GraphError,
    NotFound,
    InvalidContract,
    ConfigError,
    /// The function under test raised inside the worker
    TargetRaised,
}

impl ErrorKind {
    /// Failures of the pipeline itself rather than findings about the function
    pub fn is_infrastructure(self) -> bool {
        !matches!(self, ErrorKind::TargetRaised)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ScriptError => "SCRIPT_ERROR",
            ErrorKind::SerializationError => "SERIALIZATION_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ExecutionError => "EXECUTION_ERROR",
            ErrorKind::StaleSource => "STALE_SOURCE",
            ErrorKind::GraphError => "GRAPH_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidContract => "INVALID_CONTRACT",
            ErrorKind::ConfigError => "CONFIG_ERROR",
            ErrorKind::TargetRaised => "TARGET_RAISED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProbeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::Script(_) => ErrorKind::ScriptError,
            ProbeError::Serialization(_) => ErrorKind::SerializationError,
            ProbeError::Timeout(_) => ErrorKind::Timeout,
            ProbeError::Execution { .. } => ErrorKind::ExecutionError,
            ProbeError::StaleSource { .. } => ErrorKind::StaleSource,
            ProbeError::Graph(_) => ErrorKind::GraphError,
            ProbeError::NotFound(_) => ErrorKind::NotFound,
            ProbeError::InvalidContract(_) => ErrorKind::InvalidContract,
            ProbeError::Config(_) => ErrorKind::ConfigError,
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        self.kind().is_infrastructure()
    }

    /// Diagnostic excerpt attached to the error, if any
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ProbeError::Execution { stderr_tail, .. } if !stderr_tail.is_empty() => {
                Some(stderr_tail.as_str())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::ExecutionError).unwrap();
        assert_eq!(json, "\"EXECUTION_ERROR\"");
        assert_eq!(ErrorKind::Timeout.to_string(), "TIMEOUT");
    }

    #[test]
    fn test_timeout_message() {
        let err = ProbeError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Verification timed out after 250 ms");
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_infrastructure());
        assert!(!ErrorKind::TargetRaised.is_infrastructure());
    }

    #[test]
    fn test_execution_diagnostic() {
        let err = ProbeError::Execution {
            message: "worker exited with status 1".to_string(),
            stderr_tail: "Traceback ...".to_string(),
        };
        assert_eq!(err.diagnostic(), Some("Traceback ..."));
        assert_eq!(ProbeError::Graph("x".into()).diagnostic(), None);
    }
}
