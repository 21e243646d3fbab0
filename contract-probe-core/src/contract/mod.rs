//! Behavioural contracts for functions under verification
//!
//! A contract is produced upstream and consumed read-only here. It is
//! validated once on load; every later stage assumes a valid contract.

pub mod validator;

pub use validator::{ContractIssue, validate_contract};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ProbeError, Result};

/// Check names the script generator reserves for non-invariant checks
pub const RESERVED_CHECK_NAMES: [&str; 3] = ["precondition", "postcondition", "expected_output"];

/// Severity tier of an invariant. The derived ordering puts `High` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Criticality {
    #[serde(alias = "high")]
    High,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "low")]
    Low,
}

impl Criticality {
    /// Numeric rank used for sorting violations, lower is more severe
    pub fn rank(self) -> u8 {
        match self {
            Criticality::High => 0,
            Criticality::Medium => 1,
            Criticality::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Criticality::High => "HIGH",
            Criticality::Medium => "MEDIUM",
            Criticality::Low => "LOW",
        }
    }
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a consumer should do when a check fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnFail {
    #[default]
    #[serde(alias = "error")]
    Block,
    Warn,
    Log,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invariant {
    pub name: String,
    #[serde(alias = "logic")]
    pub expression: String,
    pub criticality: Criticality,
    /// Overrides the contract-level policy when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_fail: Option<OnFail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoExample {
    /// Keyword arguments, possibly carrying serializer type tags
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub function_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_summary: Option<String>,
    pub invariants: Vec<Invariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precondition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcondition: Option<String>,
    #[serde(default)]
    pub io_examples: Vec<IoExample>,
    #[serde(default)]
    pub on_fail: OnFail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Contract {
    /// Parse a contract from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let contract: Contract = serde_json::from_str(json)
            .map_err(|e| ProbeError::InvalidContract(format!("Failed to parse contract: {}", e)))?;
        contract.validate()?;
        Ok(contract)
    }

    /// Validate, folding every issue into one error
    pub fn validate(&self) -> Result<()> {
        let issues = validate_contract(self);
        if issues.is_empty() {
            return Ok(());
        }
        let joined = issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ");
        Err(ProbeError::InvalidContract(joined))
    }

    pub fn invariant(&self, name: &str) -> Option<&Invariant> {
        self.invariants.iter().find(|inv| inv.name == name)
    }

    /// Criticality of a named check. Reserved checks are always HIGH.
    pub fn criticality_of(&self, name: &str) -> Option<Criticality> {
        if RESERVED_CHECK_NAMES.contains(&name) {
            return Some(Criticality::High);
        }
        self.invariant(name).map(|inv| inv.criticality)
    }

    /// Effective failure policy of a named check
    pub fn on_fail_of(&self, name: &str) -> OnFail {
        self.invariant(name).and_then(|inv| inv.on_fail).unwrap_or(self.on_fail)
    }

    /// SHA-256 of the canonical JSON encoding
    pub fn fingerprint(&self) -> String {
        // Struct fields serialise in declaration order and serde_json maps are sorted
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn invariant(name: &str, expression: &str, criticality: Criticality) -> Invariant {
        Invariant {
            name: name.to_string(),
            expression: expression.to_string(),
            criticality,
            on_fail: None,
        }
    }

    pub fn contract(function_id: &str, invariants: Vec<Invariant>) -> Contract {
        Contract {
            function_id: function_id.to_string(),
            function_signature: None,
            intent_summary: None,
            invariants,
            precondition: None,
            postcondition: None,
            io_examples: Vec::new(),
            on_fail: OnFail::Block,
            created_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_criticality_ordering() {
        let mut levels = vec![Criticality::Low, Criticality::High, Criticality::Medium];
        levels.sort();
        assert_eq!(levels, vec![Criticality::High, Criticality::Medium, Criticality::Low]);
        assert_eq!(Criticality::High.rank(), 0);
        assert_eq!(Criticality::Low.rank(), 2);
    }

    #[test]
    fn test_parse_original_field_names() {
        let json = r#"{
            "function_id": "src/math.py::subtract",
            "function_signature": "def subtract(a, b)",
            "invariants": [
                {"name": "non_negative", "logic": "result is non-negative", "criticality": "HIGH", "on_fail": "error"},
                {"name": "is_int", "expression": "isinstance(result, int)", "criticality": "low", "on_fail": "warn"}
            ]
        }"#;

        let contract = Contract::from_json(json).unwrap();
        assert_eq!(contract.invariants.len(), 2);
        assert_eq!(contract.invariants[0].expression, "result is non-negative");
        assert_eq!(contract.invariants[0].on_fail, Some(OnFail::Block));
        assert_eq!(contract.on_fail_of("is_int"), OnFail::Warn);
        assert_eq!(contract.on_fail_of("expected_output"), OnFail::Block);
        assert_eq!(contract.criticality_of("postcondition"), Some(Criticality::High));
        assert_eq!(contract.criticality_of("is_int"), Some(Criticality::Low));
        assert_eq!(contract.criticality_of("missing"), None);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        let json = r#"{"function_id": "f", "invariants": []}"#;
        let err = Contract::from_json(json).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidContract(_)));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = contract("f", vec![invariant("pos", "result > 0", Criticality::High)]);
        let b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let mut c = a.clone();
        c.invariants[0].criticality = Criticality::Low;
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
