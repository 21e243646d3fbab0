//! Full diagnosis of one call

use anyhow::{Context, Result};
use contract_probe_core::Diagnoser;

use super::{Workspace, print_json, request_from_args};
use crate::cli::app::VerifyArgs;

pub async fn execute(workspace: &Workspace, args: VerifyArgs) -> Result<()> {
    let request = request_from_args(&args)?;
    let store = workspace.store.clone();
    let diagnoser = Diagnoser::new(store.clone(), store.clone(), store, workspace.executor(), &workspace.config);

    let diagnosis = diagnoser
        .diagnose(&request)
        .await
        .with_context(|| format!("Failed to diagnose {}", args.function_id))?;
    print_json(&diagnosis)
}
