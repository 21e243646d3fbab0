//! Isolated, deadline-bounded execution of generated workers
//!
//! The executor is stateless. Each call owns one worker process and its
//! temporary directory, so calls for unrelated functions may run
//! concurrently without coordination.

pub mod env;
pub mod worker;

pub use env::{host_worker_env, worker_env};
pub use worker::{Worker, WorkerExit};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::{debug, info};

use crate::error::{ProbeError, Result};
use crate::serializer::{Arguments, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub interpreter: String,
    /// Wall-clock deadline for one worker run, shared with the verifier
    pub timeout_ms: u64,
    /// Trailing bytes of stderr kept for diagnostics
    pub stderr_tail_bytes: usize,
    /// How long to wait for output readers after the worker is gone
    pub kill_grace_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_ms: 1000,
            stderr_tail_bytes: 2048,
            kill_grace_ms: 100,
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Data sent to the worker on stdin
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub inputs: Arguments,
    pub expected: Option<Value>,
    /// Output observed elsewhere; when present the target is not called
    pub observed: Option<Value>,
}

impl Payload {
    pub fn to_json(&self) -> Json {
        let mut obj = Map::new();
        obj.insert(
            "inputs".to_string(),
            Json::Object(self.inputs.iter().map(|(k, v)| (k.clone(), v.to_wire())).collect()),
        );
        if let Some(expected) = &self.expected {
            obj.insert("expected".to_string(), expected.to_wire());
        }
        if let Some(observed) = &self.observed {
            obj.insert("observed".to_string(), observed.to_wire());
        }
        Json::Object(obj)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.to_json().to_string().into_bytes();
        bytes.push(b'\n');
        bytes
    }
}

/// The single result line a worker prints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerReport {
    pub passed: bool,
    pub invariants: Vec<WorkerInvariant>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerInvariant {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

/// Anything that can run a worker script against a payload
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &str, payload: &Payload, timeout: Duration) -> Result<WorkerReport>;
}

pub struct Executor {
    config: ExecutorConfig,
    env: Vec<(String, String)>,
}

impl Executor {
    /// Executor whose workers inherit the allow-listed host environment
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config, env: host_worker_env() }
    }

    pub fn with_env(config: ExecutorConfig, env: Vec<(String, String)>) -> Self {
        Self { config, env }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub async fn execute(&self, script: &str, payload: &Payload, timeout: Duration) -> Result<WorkerReport> {
        let mut worker = Worker::spawn(&self.config, script, &self.env).await?;
        worker.write_payload(payload.to_bytes())?;

        match worker.finish(timeout).await? {
            WorkerExit::TimedOut { stderr, elapsed } => {
                info!("Worker timed out after {} ms", elapsed.as_millis());
                if !stderr.is_empty() {
                    debug!("Timed-out worker stderr: {}", tail(&stderr, self.config.stderr_tail_bytes));
                }
                Err(ProbeError::Timeout(timeout))
            }
            WorkerExit::Finished { status, stdout, stderr, .. } => {
                if !status.success() {
                    return Err(ProbeError::Execution {
                        message: format!("Worker exited with {}", status),
                        stderr_tail: tail(&stderr, self.config.stderr_tail_bytes),
                    });
                }
                parse_worker_output(&stdout, &stderr, self.config.stderr_tail_bytes)
            }
        }
    }
}

#[async_trait]
impl ScriptRunner for Executor {
    async fn run(&self, script: &str, payload: &Payload, timeout: Duration) -> Result<WorkerReport> {
        self.execute(script, payload, timeout).await
    }
}

/// Parse worker stdout, which must be exactly one well-formed result line
pub fn parse_worker_output(stdout: &str, stderr: &str, tail_bytes: usize) -> Result<WorkerReport> {
    let lines: Vec<&str> = stdout.lines().filter(|line| !line.trim().is_empty()).collect();

    let line = match lines.as_slice() {
        [line] => *line,
        other => {
            return Err(ProbeError::Execution {
                message: format!("Worker printed {} result lines, expected exactly one", other.len()),
                stderr_tail: tail(stderr, tail_bytes),
            });
        }
    };

    serde_json::from_str(line).map_err(|e| ProbeError::Execution {
        message: format!("Malformed worker result: {}", e),
        stderr_tail: tail(stderr, tail_bytes),
    })
}

/// Last `max_bytes` of `text`, cut on a character boundary
pub fn tail(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
