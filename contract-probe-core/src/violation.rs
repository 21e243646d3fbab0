//! Ranking failed invariants into a violation report

use serde::{Deserialize, Serialize};

use crate::contract::{Contract, Criticality, OnFail};
use crate::verifier::{InvariantResult, VerificationFailure, VerificationResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationDetail {
    /// 0 for HIGH, 1 for MEDIUM, 2 for LOW
    pub rank: u8,
    pub name: String,
    pub expression: Option<String>,
    pub criticality: Criticality,
    pub on_fail: OnFail,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub suggestion: String,
    /// Position of the outcome in the verification result
    pub declaration_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationReport {
    pub function_id: String,
    pub total: usize,
    pub passed_count: usize,
    pub failed_count: usize,
    pub counts: CriticalityCounts,
    pub violations: Vec<ViolationDetail>,
    pub summary: String,
    /// Set when the run itself failed; such failures are never violations
    pub infrastructure_failure: Option<VerificationFailure>,
}

impl ViolationReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ViolationDetail> {
        self.violations.iter().find(|v| v.name == name)
    }

    /// Violations at `level` or more severe, in report order
    pub fn at_or_above(&self, level: Criticality) -> Vec<&ViolationDetail> {
        self.violations.iter().filter(|v| v.criticality <= level).collect()
    }

    pub fn most_critical(&self) -> Option<&ViolationDetail> {
        self.violations.first()
    }

    pub fn has_blocking(&self) -> bool {
        self.violations.iter().any(|v| v.on_fail == OnFail::Block)
    }

    pub fn render_text(&self) -> String {
        let mut lines = vec![
            format!("Violation report for {}", self.function_id),
            "=".repeat(60),
            format!("Checks: {}  passed: {}  failed: {}", self.total, self.passed_count, self.failed_count),
            String::new(),
        ];

        if let Some(failure) = &self.infrastructure_failure {
            lines.push(format!("Verification did not complete [{}]: {}", failure.kind, failure.message));
            if let Some(diagnostic) = &failure.diagnostic {
                lines.push(format!("   Diagnostic: {}", diagnostic.trim_end()));
            }
        } else if self.violations.is_empty() {
            lines.push("No violations detected.".to_string());
        } else {
            lines.push("Violations (most critical first):".to_string());
            for (i, v) in self.violations.iter().enumerate() {
                lines.push(format!("{}. {} [{}]", i + 1, v.name, v.criticality));
                if let Some(expression) = &v.expression {
                    lines.push(format!("   Expression: {}", expression));
                }
                if let Some(expected) = &v.expected {
                    lines.push(format!("   Expected: {}", expected));
                }
                if let Some(actual) = &v.actual {
                    lines.push(format!("   Actual: {}", actual));
                }
                lines.push(format!("   Suggestion: {}", v.suggestion));
            }
        }

        lines.push(String::new());
        lines.push(format!("Summary: {}", self.summary));
        lines.join("\n")
    }
}

/// Build the report. `contract` supplies expression text and failure policy.
pub fn identify(result: &VerificationResult, contract: Option<&Contract>) -> ViolationReport {
    let mut violations: Vec<ViolationDetail> = result
        .invariants
        .iter()
        .enumerate()
        .filter(|(_, inv)| !inv.passed)
        .map(|(idx, inv)| detail(idx, inv, contract))
        .collect();

    // Stable: equal ranks keep declaration order
    violations.sort_by_key(|v| v.rank);

    let mut counts = CriticalityCounts::default();
    for v in &violations {
        match v.criticality {
            Criticality::High => counts.high += 1,
            Criticality::Medium => counts.medium += 1,
            Criticality::Low => counts.low += 1,
        }
    }

    let total = result.invariants.len();
    let failed_count = violations.len();
    let infrastructure_failure = result.infrastructure_failure().cloned();
    let summary = summarize(&result.function_id, total, &violations, infrastructure_failure.as_ref());

    ViolationReport {
        function_id: result.function_id.clone(),
        total,
        passed_count: total - failed_count,
        failed_count,
        counts,
        violations,
        summary,
        infrastructure_failure,
    }
}

fn detail(idx: usize, inv: &InvariantResult, contract: Option<&Contract>) -> ViolationDetail {
    let expression = contract.and_then(|c| match inv.name.as_str() {
        "precondition" => c.precondition.clone(),
        "postcondition" => c.postcondition.clone(),
        name => c.invariant(name).map(|i| i.expression.clone()),
    });
    let on_fail = contract.map(|c| c.on_fail_of(&inv.name)).unwrap_or_default();
    let (expected, actual) = expected_actual(inv);
    let suggestion = suggest(inv, expression.as_deref().unwrap_or(""));

    ViolationDetail {
        rank: inv.criticality.rank(),
        name: inv.name.clone(),
        expression,
        criticality: inv.criticality,
        on_fail,
        message: inv.message.clone(),
        expected,
        actual,
        suggestion,
        declaration_index: idx,
    }
}

fn expected_actual(inv: &InvariantResult) -> (Option<String>, Option<String>) {
    let message = inv.message.trim();

    if let Some(rest) = message.strip_prefix("expected ") {
        if let Some((expected, actual)) = rest.split_once(", got ") {
            return (Some(expected.to_string()), Some(actual.to_string()));
        }
    }

    if let Some((_, rest)) = message.split_once("violated:") {
        let rest = rest.trim();
        return match rest.rsplit_once(" (result=") {
            Some((condition, value)) => (
                Some(format!("Should satisfy: {}", condition)),
                Some(format!("result = {}", value.strip_suffix(')').unwrap_or(value))),
            ),
            None => (Some(format!("Should satisfy: {}", rest)), Some("Condition was false".to_string())),
        };
    }

    if message.is_empty() {
        (None, None)
    } else {
        (Some(format!("Invariant '{}' to hold", inv.name)), Some(message.to_string()))
    }
}

fn suggest(inv: &InvariantResult, expression: &str) -> String {
    let message = inv.message.to_lowercase();
    let logic = expression.to_lowercase();
    let name = inv.name.to_lowercase();
    let any = |needle: &str| message.contains(needle) || logic.contains(needle);

    let text = if any("duplicate") || name.contains("unique") || logic.contains("unique") {
        "Check for missing uniqueness validation or deduplication logic"
    } else if any("none") || any("null") {
        "Add null/None checks before this operation"
    } else if any("negative") || logic.contains(">= 0") {
        "Check input validation for numeric bounds"
    } else if logic.contains("positive") || logic.contains("> 0") {
        "Ensure values are validated to be positive"
    } else if any("empty") {
        "Add empty check or ensure input is not empty"
    } else if ["range", "between", "bound"].iter().any(|w| logic.contains(w)) {
        "Check boundary conditions and range validation"
    } else if message.contains("type") || logic.contains("isinstance") {
        "Verify input types match expected types"
    } else if ["length", "len(", "size", "count"].iter().any(|w| logic.contains(w)) {
        "Check length/size constraints on input or output"
    } else if logic.contains("sorted") || logic.contains("order") {
        "Verify sorting/ordering logic is correct"
    } else if logic.contains("sum") || logic.contains("total") {
        "Check arithmetic operations preserve totals"
    } else if name == "expected_output" {
        "Compare the computation against the example; the result differs from the recorded output"
    } else if inv.criticality == Criticality::High {
        "This is a critical invariant: review the logic carefully and add defensive checks"
    } else {
        "Review the invariant logic against the code implementation"
    };
    text.to_string()
}

fn summarize(
    function_id: &str,
    total: usize,
    violations: &[ViolationDetail],
    failure: Option<&VerificationFailure>,
) -> String {
    if let Some(failure) = failure {
        return format!("Verification of {} did not complete: {}", function_id, failure.kind);
    }
    match violations {
        [] => format!("All {} checks passed for {}", total, function_id),
        [only] => format!("1 of {} checks violated: {} ({})", total, only.name, only.criticality),
        [first, ..] => format!(
            "{} of {} checks violated. Most critical: {} ({})",
            violations.len(),
            total,
            first.name,
            first.criticality
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::fixtures::{contract, invariant};
    use crate::error::ErrorKind;
    use chrono::Utc;
    use uuid::Uuid;

    fn outcome(name: &str, passed: bool, criticality: Criticality) -> InvariantResult {
        InvariantResult {
            name: name.to_string(),
            passed,
            message: if passed { "ok".to_string() } else { format!("invariant violated: {} check (result=-1)", name) },
            criticality,
        }
    }

    fn result(invariants: Vec<InvariantResult>, error: Option<VerificationFailure>) -> VerificationResult {
        VerificationResult {
            run_id: Uuid::new_v4(),
            function_id: "f".to_string(),
            passed: VerificationResult::aggregate(&invariants, error.as_ref()),
            invariants,
            error,
            duration_ms: 3,
            script_hash: None,
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_ranking_is_stable() {
        let r = result(
            vec![
                outcome("h1", false, Criticality::High),
                outcome("l1", false, Criticality::Low),
                outcome("ok", true, Criticality::High),
                outcome("h2", false, Criticality::High),
                outcome("m1", false, Criticality::Medium),
            ],
            None,
        );
        let report = identify(&r, None);

        let order: Vec<_> = report.violations.iter().map(|v| (v.name.as_str(), v.rank)).collect();
        assert_eq!(order, vec![("h1", 0), ("h2", 0), ("m1", 1), ("l1", 2)]);
        assert_eq!(report.counts, CriticalityCounts { high: 2, medium: 1, low: 1 });
        assert_eq!(report.passed_count, 1);
        assert_eq!(report.summary, "4 of 5 checks violated. Most critical: h1 (HIGH)");
    }

    #[test]
    fn test_lookup_and_filter() {
        let r = result(
            vec![outcome("a", false, Criticality::Low), outcome("b", false, Criticality::Medium)],
            None,
        );
        let report = identify(&r, None);

        assert_eq!(report.get("a").unwrap().criticality, Criticality::Low);
        assert!(report.get("zzz").is_none());
        let names: Vec<_> = report.at_or_above(Criticality::Medium).iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);
        assert_eq!(report.at_or_above(Criticality::Low).len(), 2);
        assert_eq!(report.most_critical().unwrap().name, "b");
    }

    #[test]
    fn test_contract_enriches_details() {
        let mut c = contract("f", vec![invariant("non_negative", "result is non-negative", Criticality::High)]);
        c.on_fail = OnFail::Warn;
        let r = result(
            vec![InvariantResult {
                name: "non_negative".to_string(),
                passed: false,
                message: "invariant violated: result >= 0 (result=-1)".to_string(),
                criticality: Criticality::High,
            }],
            None,
        );
        let report = identify(&r, Some(&c));
        let v = &report.violations[0];

        assert_eq!(v.rank, 0);
        assert_eq!(v.expression.as_deref(), Some("result is non-negative"));
        assert_eq!(v.expected.as_deref(), Some("Should satisfy: result >= 0"));
        assert_eq!(v.actual.as_deref(), Some("result = -1"));
        assert_eq!(v.suggestion, "Check input validation for numeric bounds");
        assert!(!report.has_blocking());
        assert_eq!(report.summary, "1 of 1 checks violated: non_negative (HIGH)");
        assert!(report.render_text().contains("Expected: Should satisfy: result >= 0"));
    }

    #[test]
    fn test_expected_output_message_parsed() {
        let r = result(
            vec![InvariantResult {
                name: "expected_output".to_string(),
                passed: false,
                message: "expected 3, got 4".to_string(),
                criticality: Criticality::High,
            }],
            None,
        );
        let v = identify(&r, None).violations.remove(0);
        assert_eq!(v.expected.as_deref(), Some("3"));
        assert_eq!(v.actual.as_deref(), Some("4"));
        assert_eq!(v.on_fail, OnFail::Block);
    }

    #[test]
    fn test_infrastructure_failure_is_not_a_violation() {
        let failure = VerificationFailure {
            kind: ErrorKind::Timeout,
            message: "Verification timed out after 1000 ms".to_string(),
            diagnostic: None,
        };
        let report = identify(&result(Vec::new(), Some(failure)), None);

        assert!(report.is_empty());
        assert_eq!(report.infrastructure_failure.as_ref().unwrap().kind, ErrorKind::Timeout);
        assert_eq!(report.summary, "Verification of f did not complete: TIMEOUT");
        assert!(report.render_text().contains("did not complete [TIMEOUT]"));
    }

    #[test]
    fn test_all_passed() {
        let report = identify(&result(vec![outcome("a", true, Criticality::High)], None), None);
        assert_eq!(report.summary, "All 1 checks passed for f");
        assert!(report.render_text().contains("No violations detected."));
    }
}
