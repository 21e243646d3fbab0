//! Verify one call

use anyhow::Result;
use tracing::warn;

use super::{Workspace, print_json, request_from_args};
use crate::cli::app::VerifyArgs;

pub async fn execute(workspace: &Workspace, args: VerifyArgs) -> Result<()> {
    let request = request_from_args(&args)?;
    let result = workspace.verifier().verify(&request).await;
    if let Some(failure) = result.infrastructure_failure() {
        warn!("Verification did not complete: {}", failure.message);
    }
    print_json(&result)
}
