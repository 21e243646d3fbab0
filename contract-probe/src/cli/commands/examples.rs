//! Run a contract's IO examples and score the outcome

use anyhow::{Context, Result};
use chrono::Utc;
use contract_probe_core::confidence::{ConfidenceEvaluator, VerificationRecord};
use contract_probe_core::store::ContractStore;
use serde_json::json;

use super::{Workspace, print_json};
use crate::cli::app::ExamplesArgs;

pub async fn execute(workspace: &Workspace, args: ExamplesArgs) -> Result<()> {
    let results = workspace
        .verifier()
        .verify_examples(&args.function_id)
        .await
        .with_context(|| format!("Failed to run examples of {}", args.function_id))?;

    let created_at = workspace.store.contract(&args.function_id)?.and_then(|c| c.created_at);
    let records: Vec<VerificationRecord> = results.iter().map(VerificationRecord::from_result).collect();
    let confidence =
        ConfidenceEvaluator::new(workspace.config.confidence.clone()).evaluate(&records, created_at, Utc::now());

    print_json(&json!({
        "function_id": args.function_id,
        "passed": results.iter().filter(|r| r.passed).count(),
        "total": results.len(),
        "results": results,
        "confidence": confidence,
    }))
}
