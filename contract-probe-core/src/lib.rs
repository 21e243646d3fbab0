//! Core functionality for contract-probe
//!
//! This crate compiles behavioural contracts into worker scripts, runs them
//! under a deadline, and turns the outcome into ranked violations, root-cause
//! candidates and a list of uncontracted neighbours.

pub mod confidence;
pub mod config;
pub mod contract;
pub mod diagnosis;
pub mod error;
pub mod executor;
pub mod hashing;
pub mod missing;
pub mod root_cause;
pub mod script;
pub mod serializer;
pub mod store;
pub mod verifier;
pub mod violation;

#[cfg(test)]
mod test_support;

pub use config::ProbeConfig;
pub use contract::{Contract, Criticality, Invariant};
pub use diagnosis::{Diagnoser, Diagnosis};
pub use error::{ErrorKind, ProbeError, Result};
pub use executor::{Executor, ExecutorConfig, ScriptRunner};
pub use serializer::Value;
pub use store::{Artifact, MemoryStore, Snapshot};
pub use verifier::{RuntimeVerifier, VerificationRequest, VerificationResult};
