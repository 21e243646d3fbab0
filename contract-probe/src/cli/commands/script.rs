//! Print the verification script for a function

use anyhow::{Context, Result};

use super::Workspace;
use crate::cli::app::ScriptArgs;

pub fn execute(workspace: &Workspace, args: ScriptArgs) -> Result<()> {
    let script = workspace
        .verifier()
        .script_for(&args.function_id)
        .with_context(|| format!("Failed to generate script for {}", args.function_id))?;

    if args.hash_only {
        println!("{}", script.hash);
    } else {
        print!("{}", script.text);
    }
    Ok(())
}
