//! List uncontracted neighbours

use anyhow::Result;
use contract_probe_core::missing::MissingContractDetector;

use super::{Workspace, print_json};
use crate::cli::app::MissingArgs;

pub fn execute(workspace: &Workspace, args: MissingArgs) -> Result<()> {
    let store = workspace.store.clone();
    let detector = MissingContractDetector::new(store.clone(), store.clone(), store, workspace.config.missing.clone());

    let mut report = detector.detect(&args.function_id, args.depth)?;
    if let Some(n) = args.top {
        report.entries.truncate(n);
    }
    print_json(&report)
}
