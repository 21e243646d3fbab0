//! Confidence scoring from verification history
//!
//! A pure aggregation: records in, score and status out. Persisting the status
//! is left to whoever owns the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::Criticality;
use crate::error::ErrorKind;
use crate::verifier::VerificationResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Scores at or above this are HIGH and the function counts as verified
    pub threshold: f64,
    /// Scores at or above this (but below `threshold`) are MEDIUM
    pub review_floor: f64,
    /// Most recent evidential runs considered
    pub window: usize,
    /// Weight multiplier applied per step back in history
    pub recency_decay: f64,
    pub stale_after_days: i64,
    pub age_penalty: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.70,
            review_floor: 0.50,
            window: 10,
            recency_decay: 0.8,
            stale_after_days: 90,
            age_penalty: 0.1,
        }
    }
}

/// Outcome of one verification run, reduced to what scoring needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worst_violation: Option<Criticality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ErrorKind>,
    pub recorded_at: DateTime<Utc>,
}

impl VerificationRecord {
    pub fn from_result(result: &VerificationResult) -> Self {
        Self {
            passed: result.passed,
            worst_violation: result.failed_invariants().map(|inv| inv.criticality).min(),
            failure: result.error.as_ref().map(|e| e.kind),
            recorded_at: result.started_at,
        }
    }

    /// Infrastructure failures say nothing about the function
    pub fn is_evidence(&self) -> bool {
        self.failure.map_or(true, |kind| !kind.is_infrastructure())
    }

    fn score(&self) -> f64 {
        if self.passed {
            return 1.0;
        }
        // A raised exception with no violated check is weighed like a MEDIUM violation
        1.0 - penalty(self.worst_violation.unwrap_or(Criticality::Medium))
    }
}

fn penalty(criticality: Criticality) -> f64 {
    match criticality {
        Criticality::High => 1.0,
        Criticality::Medium => 0.6,
        Criticality::Low => 0.3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    Pending,
    Broken,
    Verified,
    NeedsReview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    pub score: f64,
    pub level: ConfidenceLevel,
    pub status: ArtifactStatus,
    /// Runs that contributed to the score
    pub evidence: usize,
    /// Runs ignored as infrastructure failures
    pub excluded: usize,
    pub age_penalized: bool,
    pub description: String,
}

pub struct ConfidenceEvaluator {
    config: ConfidenceConfig,
}

impl ConfidenceEvaluator {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    pub fn level_for(&self, score: f64) -> ConfidenceLevel {
        if score >= self.config.threshold {
            ConfidenceLevel::High
        } else if score >= self.config.review_floor {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn evaluate(
        &self,
        records: &[VerificationRecord],
        contract_created_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ConfidenceAssessment {
        let mut evidence: Vec<&VerificationRecord> = records.iter().filter(|r| r.is_evidence()).collect();
        let excluded = records.len() - evidence.len();
        // Latest first; ties keep input order
        evidence.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        evidence.truncate(self.config.window);

        if evidence.is_empty() {
            return ConfidenceAssessment {
                score: 0.0,
                level: ConfidenceLevel::Low,
                status: ArtifactStatus::Pending,
                evidence: 0,
                excluded,
                age_penalized: false,
                description: "No verification evidence yet".to_string(),
            };
        }

        let mut weight = 1.0;
        let mut total = 0.0;
        let mut weights = 0.0;
        for record in &evidence {
            total += weight * record.score();
            weights += weight;
            weight *= self.config.recency_decay;
        }
        let mut score = total / weights;

        let age_penalized = contract_created_at
            .map(|created| (now - created).num_days() > self.config.stale_after_days)
            .unwrap_or(false);
        if age_penalized {
            score -= self.config.age_penalty;
        }
        let score = score.clamp(0.0, 1.0);

        let level = self.level_for(score);
        let status = if evidence[0].worst_violation == Some(Criticality::High) {
            ArtifactStatus::Broken
        } else if score >= self.config.threshold {
            ArtifactStatus::Verified
        } else {
            ArtifactStatus::NeedsReview
        };

        ConfidenceAssessment {
            score,
            level,
            status,
            evidence: evidence.len(),
            excluded,
            age_penalized,
            description: describe(level).to_string(),
        }
    }

    /// Threshold under which roughly `target_ratio` of `scores` would count as verified
    pub fn suggest_threshold(&self, scores: &[f64], target_ratio: f64) -> f64 {
        if scores.is_empty() {
            return self.config.threshold;
        }
        let mut sorted = scores.to_vec();
        sorted.sort_by(|a, b| b.total_cmp(a));

        let total = sorted.len();
        let target = (total as f64 * target_ratio.clamp(0.0, 1.0)).floor() as usize;
        if target >= total {
            sorted[total - 1]
        } else if target == 0 {
            f64::min(1.0, sorted[0] + 0.01)
        } else {
            sorted[target - 1]
        }
    }
}

fn describe(level: ConfidenceLevel) -> &'static str {
    match level {
        ConfidenceLevel::High => "High confidence - contract is probably correct",
        ConfidenceLevel::Medium => "Moderate confidence - contract may need review",
        ConfidenceLevel::Low => "Low confidence - contract is uncertain",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn record(minutes_ago: i64, passed: bool, worst: Option<Criticality>, failure: Option<ErrorKind>) -> VerificationRecord {
        VerificationRecord { passed, worst_violation: worst, failure, recorded_at: now() - Duration::minutes(minutes_ago) }
    }

    fn evaluator() -> ConfidenceEvaluator {
        ConfidenceEvaluator::new(ConfidenceConfig::default())
    }

    #[test]
    fn test_no_evidence_is_pending() {
        let records = vec![record(1, false, None, Some(ErrorKind::Timeout))];
        let assessment = evaluator().evaluate(&records, None, now());
        assert_eq!(assessment.status, ArtifactStatus::Pending);
        assert_eq!(assessment.excluded, 1);
        assert_eq!(assessment.evidence, 0);
    }

    #[test]
    fn test_all_passing_is_verified() {
        let records: Vec<_> = (0..5).map(|i| record(i, true, None, None)).collect();
        let assessment = evaluator().evaluate(&records, None, now());
        assert_eq!(assessment.score, 1.0);
        assert_eq!(assessment.level, ConfidenceLevel::High);
        assert_eq!(assessment.status, ArtifactStatus::Verified);
    }

    #[test]
    fn test_latest_high_violation_is_broken() {
        let records = vec![
            record(10, true, None, None),
            record(1, false, Some(Criticality::High), None),
        ];
        let assessment = evaluator().evaluate(&records, None, now());
        assert_eq!(assessment.status, ArtifactStatus::Broken);
        // weights 1.0 (latest, score 0) and 0.8 (score 1)
        assert!((assessment.score - 0.8 / 1.8).abs() < 1e-9);
        assert_eq!(assessment.level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_infrastructure_failures_are_ignored() {
        let records = vec![
            record(1, false, None, Some(ErrorKind::ExecutionError)),
            record(2, true, None, None),
        ];
        let assessment = evaluator().evaluate(&records, None, now());
        assert_eq!(assessment.score, 1.0);
        assert_eq!(assessment.excluded, 1);
    }

    #[test]
    fn test_low_violation_needs_review_and_threshold_is_configurable() {
        let records = vec![
            record(1, false, Some(Criticality::Low), None),
            record(2, false, Some(Criticality::Low), None),
        ];
        let assessment = evaluator().evaluate(&records, None, now());
        assert!((assessment.score - 0.7).abs() < 1e-9);

        let strict = ConfidenceEvaluator::new(ConfidenceConfig { threshold: 0.9, ..ConfidenceConfig::default() });
        let assessment = strict.evaluate(&records, None, now());
        assert_eq!(assessment.status, ArtifactStatus::NeedsReview);
        assert_eq!(assessment.level, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_age_penalty() {
        let records = vec![record(1, true, None, None)];
        let old = now() - Duration::days(200);
        let assessment = evaluator().evaluate(&records, Some(old), now());
        assert!(assessment.age_penalized);
        assert!((assessment.score - 0.9).abs() < 1e-9);

        let fresh = evaluator().evaluate(&records, Some(now() - Duration::days(3)), now());
        assert!(!fresh.age_penalized);
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let config = ConfidenceConfig { window: 2, ..ConfidenceConfig::default() };
        let records = vec![
            record(100, false, Some(Criticality::High), None),
            record(2, true, None, None),
            record(1, true, None, None),
        ];
        let assessment = ConfidenceEvaluator::new(config).evaluate(&records, None, now());
        assert_eq!(assessment.evidence, 2);
        assert_eq!(assessment.score, 1.0);
    }

    #[test]
    fn test_suggest_threshold() {
        let e = evaluator();
        assert_eq!(e.suggest_threshold(&[], 0.7), 0.70);
        let scores = [0.9, 0.5, 0.8, 0.6, 0.7];
        assert_eq!(e.suggest_threshold(&scores, 0.4), 0.8);
        assert_eq!(e.suggest_threshold(&scores, 1.0), 0.5);
        assert!((e.suggest_threshold(&scores, 0.0) - 0.91).abs() < 1e-9);
    }
}
