use std::collections::HashSet;
use std::fmt;

use super::{Contract, RESERVED_CHECK_NAMES};

/// One problem found in a contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractIssue {
    pub location: String,
    pub message: String,
}

impl ContractIssue {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self { location: location.into(), message: message.into() }
    }
}

impl fmt::Display for ContractIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Collect every issue rather than stopping at the first
pub fn validate_contract(contract: &Contract) -> Vec<ContractIssue> {
    let mut issues = Vec::new();

    if contract.function_id.trim().is_empty() {
        issues.push(ContractIssue::new("function_id", "must not be empty"));
    }

    if contract.invariants.is_empty() {
        issues.push(ContractIssue::new("invariants", "contract must have at least one invariant"));
    }

    let mut seen = HashSet::new();
    for (idx, invariant) in contract.invariants.iter().enumerate() {
        let location = format!("invariants[{}]", idx);
        let name = invariant.name.trim();

        if name.is_empty() {
            issues.push(ContractIssue::new(&location, "name must not be empty"));
        } else if name != invariant.name {
            issues.push(ContractIssue::new(&location, "name has surrounding whitespace"));
        } else if RESERVED_CHECK_NAMES.contains(&name) {
            issues.push(ContractIssue::new(&location, format!("name '{}' is reserved", name)));
        } else if !seen.insert(name) {
            issues.push(ContractIssue::new(&location, format!("duplicate invariant name '{}'", name)));
        }

        if invariant.expression.trim().is_empty() {
            issues.push(ContractIssue::new(&location, "expression must not be empty"));
        }
    }

    for (field, value) in [("precondition", &contract.precondition), ("postcondition", &contract.postcondition)] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            issues.push(ContractIssue::new(field, "must not be blank when present"));
        }
    }

    for (idx, example) in contract.io_examples.iter().enumerate() {
        if !example.input.is_object() {
            issues.push(ContractIssue::new(
                format!("io_examples[{}].input", idx),
                "must be an object of keyword arguments",
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::fixtures::*;
    use crate::contract::{Criticality, IoExample};

    #[test]
    fn test_valid_contract_has_no_issues() {
        let c = contract("f", vec![invariant("pos", "result > 0", Criticality::High)]);
        assert!(validate_contract(&c).is_empty());
    }

    #[test]
    fn test_collects_all_issues() {
        let mut c = contract(
            "f",
            vec![
                invariant("dup", "result > 0", Criticality::High),
                invariant("dup", "", Criticality::Low),
                invariant("expected_output", "True", Criticality::Low),
                invariant("  ", "x", Criticality::Low),
            ],
        );
        c.precondition = Some("   ".to_string());
        c.io_examples.push(IoExample {
            input: serde_json::json!([1, 2]),
            output: serde_json::json!(3),
            description: None,
        });

        let issues = validate_contract(&c);
        let rendered: Vec<String> = issues.iter().map(|i| i.to_string()).collect();

        assert!(rendered.contains(&"invariants[1]: duplicate invariant name 'dup'".to_string()));
        assert!(rendered.contains(&"invariants[1]: expression must not be empty".to_string()));
        assert!(rendered.contains(&"invariants[2]: name 'expected_output' is reserved".to_string()));
        assert!(rendered.contains(&"invariants[3]: name must not be empty".to_string()));
        assert!(rendered.contains(&"precondition: must not be blank when present".to_string()));
        assert!(rendered.iter().any(|r| r.starts_with("io_examples[0].input")));
        assert_eq!(issues.len(), 6);
    }
}
