//! Heuristic localisation of violations to source lines
//!
//! Scoring is pattern-based and approximate. Each line of the function body
//! collects weight from the heuristics it matches; lines below
//! `min_confidence` are dropped. Nothing is proposed when the source has
//! changed since the contract's hash was recorded.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::contract::Criticality;
use crate::error::ProbeError;
use crate::store::Artifact;
use crate::violation::ViolationDetail;

const KEYWORD_WEIGHT: f64 = 0.3;
const UNCHECKED_ADD_WEIGHT: f64 = 0.4;
const NONE_WEIGHT: f64 = 0.35;
const ARITHMETIC_WEIGHT: f64 = 0.3;
const EMPTY_RETURN_WEIGHT: f64 = 0.4;
const RETURN_WEIGHT: f64 = 0.15;
const RESULT_ASSIGN_WEIGHT: f64 = 0.2;
const IF_WITHOUT_ELSE_WEIGHT: f64 = 0.1;

const RESULT_VARS: [&str; 6] = ["result", "output", "ret", "response", "data", "value"];
const COLLECTION_ADDS: [&str; 6] = [".append(", ".extend(", ".add(", ".insert(", ".update(", "+="];
const STOP_WORDS: [&str; 12] =
    ["the", "and", "not", "for", "are", "has", "with", "must", "should", "always", "than", "isinstance"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootCauseConfig {
    pub min_confidence: f64,
    pub max_candidates_per_violation: usize,
    pub context_lines: usize,
}

impl Default for RootCauseConfig {
    fn default() -> Self {
        Self { min_confidence: 0.25, max_candidates_per_violation: 5, context_lines: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseCandidate {
    pub violation: String,
    /// Line number in the file
    pub line: usize,
    pub confidence: f64,
    pub explanation: String,
    pub snippet: String,
    pub highlighted_line: String,
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationAnalysis {
    pub violation: String,
    pub criticality: Criticality,
    pub candidates: Vec<RootCauseCandidate>,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staleness {
    pub stored: String,
    pub current: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseReport {
    pub function_id: String,
    pub file_path: String,
    pub stale: bool,
    pub staleness: Option<Staleness>,
    /// Every candidate, best first
    pub candidates: Vec<RootCauseCandidate>,
    pub analyses: Vec<ViolationAnalysis>,
}

impl RootCauseReport {
    pub fn primary(&self) -> Option<&RootCauseCandidate> {
        self.candidates.first()
    }

    pub fn has_root_cause(&self) -> bool {
        !self.candidates.is_empty()
    }

    pub fn above(&self, threshold: f64) -> Vec<&RootCauseCandidate> {
        self.candidates.iter().filter(|c| c.confidence >= threshold).collect()
    }

    /// The stale-source condition as an error, for callers that need one
    pub fn stale_error(&self) -> Option<ProbeError> {
        self.staleness.as_ref().map(|s| ProbeError::StaleSource {
            stored: s.stored.clone(),
            current: s.current.clone(),
        })
    }

    pub fn render_text(&self) -> String {
        let mut lines = vec![format!("Root cause analysis: {}", self.function_id), "=".repeat(60)];
        lines.push(format!("File: {}", self.file_path));
        lines.push(String::new());

        if self.stale {
            lines.push("Source has changed since the contract was recorded.".to_string());
            lines.push("No line hypothesis is offered; rescan the function first.".to_string());
            return lines.join("\n");
        }

        for analysis in &self.analyses {
            lines.push(format!("Violation: {} ({})", analysis.violation, analysis.criticality));
            match analysis.candidates.split_first() {
                None => lines.push("No specific root cause identified.".to_string()),
                Some((primary, rest)) => {
                    lines.push(format!(
                        "Line {} (confidence: {:.0}%): {}",
                        primary.line,
                        primary.confidence * 100.0,
                        primary.explanation
                    ));
                    lines.push(primary.snippet.clone());
                    for (i, c) in rest.iter().enumerate() {
                        lines.push(format!(
                            "  {}. line {} (confidence: {:.0}%): {}",
                            i + 1,
                            c.line,
                            c.confidence * 100.0,
                            c.explanation
                        ));
                    }
                }
            }
            lines.push(format!("Recommendation: {}", analysis.recommendation));
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

pub struct RootCauseAnalyzer {
    config: RootCauseConfig,
}

impl RootCauseAnalyzer {
    pub fn new(config: RootCauseConfig) -> Self {
        Self { config }
    }

    /// Analyse violations against the artifact's current source
    pub fn analyze(&self, violations: &[ViolationDetail], artifact: &Artifact) -> RootCauseReport {
        let current = artifact.current_hash();
        let mut report = RootCauseReport {
            function_id: artifact.function_id.clone(),
            file_path: artifact.file_path.clone(),
            stale: false,
            staleness: None,
            candidates: Vec::new(),
            analyses: Vec::new(),
        };

        if current != artifact.code_hash {
            warn!(
                "Source of {} changed since its contract was recorded; skipping line analysis",
                artifact.function_id
            );
            report.stale = true;
            report.staleness = Some(Staleness { stored: artifact.code_hash.clone(), current });
            return report;
        }

        let lines: Vec<&str> = artifact.source.lines().collect();
        for violation in violations {
            let mut candidates = self.score_lines(violation, &lines, artifact.start_line);
            candidates.truncate(self.config.max_candidates_per_violation);
            let recommendation = recommend(violation, candidates.first());
            report.candidates.extend(candidates.iter().cloned());
            report.analyses.push(ViolationAnalysis {
                violation: violation.name.clone(),
                criticality: violation.criticality,
                candidates,
                recommendation,
            });
        }

        report.candidates.sort_by(|a, b| {
            b.confidence.total_cmp(&a.confidence).then_with(|| a.line.cmp(&b.line))
        });
        debug!(
            "Root cause analysis of {}: {} candidates for {} violations",
            report.function_id,
            report.candidates.len(),
            violations.len()
        );
        report
    }

    fn score_lines(&self, violation: &ViolationDetail, lines: &[&str], start_line: usize) -> Vec<RootCauseCandidate> {
        let name = violation.name.to_lowercase();
        let logic = violation.expression.as_deref().unwrap_or("").to_lowercase();
        let actual = violation.actual.as_deref().unwrap_or("").to_lowercase();
        let keywords = keywords(violation);

        let uniqueness = ["duplicate", "unique"].iter().any(|w| name.contains(w) || logic.contains(w));
        let nullness = name.contains("null") || name.contains("none") || logic.contains("none") || actual.contains("none");
        let sign = ["negative", "positive"].iter().any(|w| name.contains(w) || logic.contains(w))
            || [">= 0", "> 0", "< 0", "<= 0"].iter().any(|w| logic.contains(w));
        let emptiness = name.contains("empty") || logic.contains("empty");

        let mut candidates = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
                continue;
            }
            let lower = line.to_lowercase();
            let mut confidence = 0.0;
            let mut reasons = Vec::new();

            let matched: Vec<&str> = keywords.iter().filter(|k| lower.contains(k.as_str())).map(String::as_str).collect();
            if !matched.is_empty() {
                confidence += KEYWORD_WEIGHT;
                reasons.push(format!("Contains relevant keywords: {}", matched.join(", ")));
            }
            if uniqueness && is_collection_add(line) && !has_check_before(lines, i) {
                confidence += UNCHECKED_ADD_WEIGHT;
                reasons.push("Adds to collection without duplicate check".to_string());
            }
            if nullness && might_produce_none(&lower) {
                confidence += NONE_WEIGHT;
                reasons.push("Could return or assign None without check".to_string());
            }
            if sign && regex_utils::code::is_arithmetic_assignment(line) {
                confidence += ARITHMETIC_WEIGHT;
                reasons.push("Arithmetic operation that could produce invalid values".to_string());
            }
            if emptiness && lower.contains("return") && ["[]", "{}", "\"\"", "''"].iter().any(|e| line.contains(e)) {
                confidence += EMPTY_RETURN_WEIGHT;
                reasons.push("Returns empty collection/string".to_string());
            }
            if lower.contains("return") {
                confidence += RETURN_WEIGHT;
                reasons.push("Return statement affecting output".to_string());
            }
            if is_result_assignment(&lower) {
                confidence += RESULT_ASSIGN_WEIGHT;
                reasons.push("Assignment to potential output variable".to_string());
            }
            if trimmed.starts_with("if ") && !has_else_following(lines, i) {
                confidence += IF_WITHOUT_ELSE_WEIGHT;
                reasons.push("Conditional without else clause".to_string());
            }

            let confidence = (f64::min(confidence, 1.0) * 100.0).round() / 100.0;
            if confidence >= self.config.min_confidence && !reasons.is_empty() {
                candidates.push(RootCauseCandidate {
                    violation: violation.name.clone(),
                    line: start_line + i,
                    confidence,
                    explanation: reasons.join("; "),
                    snippet: snippet(lines, i, start_line, self.config.context_lines),
                    highlighted_line: trimmed.to_string(),
                    stale: false,
                });
            }
        }

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence).then_with(|| a.line.cmp(&b.line)));
        candidates
    }
}

/// Words tying a violation to source lines: name parts, identifiers in the
/// expression and observed value, plus terms typical for the violation kind
fn keywords(violation: &ViolationDetail) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let mut add = |w: &str| {
        if !STOP_WORDS.contains(&w) && !words.iter().any(|x| x == w) {
            words.push(w.to_string());
        }
    };

    let name = violation.name.to_lowercase();
    for part in name.split('_').filter(|p| p.len() >= 3) {
        add(part);
    }
    for source in [violation.expression.as_deref(), violation.actual.as_deref()].into_iter().flatten() {
        for ident in regex_utils::identifiers::extract(source, 3) {
            add(ident.as_str());
        }
    }

    let extras: [(&str, &[&str]); 6] = [
        ("duplicate", &["duplicate", "add", "append", "extend", "insert"]),
        ("null", &["none", "null", "return"]),
        ("empty", &["empty", "len", "[]", "{}"]),
        ("negative", &["negative", "-", "subtract", "minus"]),
        ("positive", &["positive", "abs", "max", "min"]),
        ("unique", &["unique", "set", "distinct"]),
    ];
    for (key, terms) in extras {
        if name.contains(key) {
            for term in terms {
                add(*term);
            }
        }
    }
    words
}

fn is_collection_add(line: &str) -> bool {
    COLLECTION_ADDS.iter().any(|p| line.contains(p))
}

/// A membership test or guard within the three preceding lines
fn has_check_before(lines: &[&str], index: usize) -> bool {
    lines[index.saturating_sub(3)..index].iter().any(|l| {
        let lower = l.to_lowercase();
        ["not in", "if", "check"].iter().any(|k| lower.contains(k))
    })
}

fn might_produce_none(lower: &str) -> bool {
    (lower.contains("return") && lower.contains("none")) || lower.contains("= none")
}

fn is_result_assignment(lower: &str) -> bool {
    RESULT_VARS
        .iter()
        .any(|var| lower.contains(&format!("{} =", var)) || lower.contains(&format!("{}=", var)))
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// An `else`/`elif` within five lines, stopping at a sibling `if`
fn has_else_following(lines: &[&str], index: usize) -> bool {
    let indent = indent_of(lines[index]);
    for line in lines.iter().skip(index + 1).take(5) {
        let stripped = line.trim();
        if stripped.starts_with("else") || stripped.starts_with("elif ") || stripped.starts_with("} else") {
            return true;
        }
        if stripped.starts_with("if ") && indent_of(line) == indent {
            return false;
        }
    }
    false
}

fn snippet(lines: &[&str], index: usize, start_line: usize, context: usize) -> String {
    let from = index.saturating_sub(context);
    let to = usize::min(lines.len(), index + context + 1);
    (from..to)
        .map(|i| {
            let marker = if i == index { "-->" } else { "   " };
            format!("{:4}{} {}", start_line + i, marker, lines[i])
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn recommend(violation: &ViolationDetail, primary: Option<&RootCauseCandidate>) -> String {
    let Some(primary) = primary else {
        return "Unable to identify a specific root cause. Review the invariant logic manually.".to_string();
    };
    let name = violation.name.to_lowercase();
    let logic = violation.expression.as_deref().unwrap_or("").to_lowercase();
    let line = primary.line;

    if name.contains("duplicate") || name.contains("unique") {
        format!("Add a uniqueness check before line {line}. Consider using a set or checking membership before adding.")
    } else if name.contains("null") || logic.contains("none") {
        format!("Add a None check at line {line}. Consider an early return or raising an exception for invalid input.")
    } else if name.contains("positive") || name.contains("negative") || logic.contains("negative") {
        format!("Add bounds validation at line {line}. Ensure values stay within the expected range.")
    } else if name.contains("empty") {
        format!("Handle the empty case at line {line}. Consider returning a default value or raising an error.")
    } else if name.contains("range") || name.contains("bound") {
        format!("Add boundary checks at line {line}. Validate input is within the acceptable range.")
    } else {
        format!(
            "Review line {line}: {}. Consider adding validation so the invariant holds.",
            primary.explanation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::OnFail;
    use crate::hashing::Language;

    const SOURCE: &str = "def merge(items, extra):\n    result = []\n    for item in items:\n        result.append(item)\n    for item in extra:\n        result.append(item)\n    return result\n";

    fn artifact() -> Artifact {
        Artifact::new("lists.py::merge", "lists.py", "merge", Language::Python, SOURCE, 20)
    }

    fn violation(name: &str, expression: &str, criticality: Criticality) -> ViolationDetail {
        ViolationDetail {
            rank: criticality.rank(),
            name: name.to_string(),
            expression: Some(expression.to_string()),
            criticality,
            on_fail: OnFail::Block,
            message: format!("invariant violated: {}", expression),
            expected: None,
            actual: Some("result = [1, 1]".to_string()),
            suggestion: String::new(),
            declaration_index: 0,
        }
    }

    #[test]
    fn test_uniqueness_points_at_unchecked_append() {
        let analyzer = RootCauseAnalyzer::new(RootCauseConfig::default());
        let v = violation("unique_items", "_no_duplicates(result)", Criticality::High);
        let report = analyzer.analyze(&[v], &artifact());

        assert!(!report.stale);
        let primary = report.primary().unwrap();
        assert_eq!(primary.line, 23);
        assert!(primary.explanation.contains("without duplicate check"));
        assert!(primary.snippet.contains("  23--> "));
        assert!(report.analyses[0].recommendation.starts_with("Add a uniqueness check before line 23"));
        assert!(report.candidates.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_stale_source_yields_no_candidates() {
        let mut stale = artifact();
        stale.source = stale.source.replace("return result", "return list(set(result))");

        let analyzer = RootCauseAnalyzer::new(RootCauseConfig::default());
        let violations = vec![
            violation("unique_items", "_no_duplicates(result)", Criticality::High),
            violation("non_empty", "not _is_empty(result)", Criticality::Low),
        ];
        let report = analyzer.analyze(&violations, &stale);

        assert!(report.stale);
        assert!(report.candidates.is_empty());
        assert!(report.analyses.is_empty());
        let staleness = report.staleness.as_ref().unwrap();
        assert_eq!(staleness.stored, artifact().code_hash);
        assert!(matches!(report.stale_error(), Some(ProbeError::StaleSource { .. })));
        assert!(report.render_text().contains("No line hypothesis"));
    }

    #[test]
    fn test_candidate_limit_and_threshold() {
        let config = RootCauseConfig { max_candidates_per_violation: 2, ..RootCauseConfig::default() };
        let report = RootCauseAnalyzer::new(config)
            .analyze(&[violation("unique_items", "_no_duplicates(result)", Criticality::High)], &artifact());
        assert_eq!(report.analyses[0].candidates.len(), 2);
        assert!(report.candidates.iter().all(|c| c.confidence >= 0.25 && c.confidence <= 1.0));
    }

    #[test]
    fn test_sign_violation_prefers_arithmetic() {
        let source = "def subtract(a, b):\n    diff = a - b\n    return diff\n";
        let artifact = Artifact::new("m.py::subtract", "m.py", "subtract", Language::Python, source, 1);
        let v = ViolationDetail {
            actual: Some("result = -1".to_string()),
            ..violation("non_negative", "result >= 0", Criticality::High)
        };
        let report = RootCauseAnalyzer::new(RootCauseConfig::default()).analyze(&[v], &artifact);

        let primary = report.primary().unwrap();
        assert_eq!(primary.line, 2);
        assert!(primary.explanation.contains("Arithmetic"));
        assert!(report.analyses[0].recommendation.starts_with("Add bounds validation at line 2"));
    }

    #[test]
    fn test_no_match_gives_generic_recommendation() {
        let source = "def f():\n    pass\n";
        let artifact = Artifact::new("m.py::f", "m.py", "f", Language::Python, source, 1);
        let report = RootCauseAnalyzer::new(RootCauseConfig::default())
            .analyze(&[violation("zz", "q", Criticality::Low)], &artifact);
        assert!(!report.has_root_cause());
        assert!(report.analyses[0].recommendation.starts_with("Unable to identify"));
    }
}
