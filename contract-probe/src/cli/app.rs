use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "contract-probe",
    version,
    about = "Contract Probe - verify functions against their behavioural contracts",
    long_about = "Contract Probe compiles behavioural contracts into verification scripts, runs them in a time-bounded worker, and reports ranked violations, likely root causes and uncontracted neighbours."
)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store snapshot with artifacts, contracts and dependencies
    #[arg(short, long, global = true, default_value = "contract-probe.json")]
    pub snapshot: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the verification script for a function
    #[command(about = "Generate and print the verification script for a function")]
    Script(ScriptArgs),

    /// Verify one call of a function
    #[command(about = "Verify a single call against the function's contract")]
    Verify(VerifyArgs),

    /// Verify every IO example of a contract
    #[command(about = "Run the contract's IO examples and score confidence")]
    Examples(ExamplesArgs),

    /// Verify, rank violations, localise and scan for gaps
    #[command(about = "Run the full diagnosis pipeline for one call")]
    Diagnose(VerifyArgs),

    /// List uncontracted neighbours in the call graph
    #[command(about = "Find callees and callers that lack contracts")]
    Missing(MissingArgs),
}

#[derive(Parser, Debug)]
pub struct ScriptArgs {
    /// Function identifier
    pub function_id: String,

    /// Print the script hash only
    #[arg(long)]
    pub hash_only: bool,
}

#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Function identifier
    pub function_id: String,

    /// Arguments as a JSON object in wire form
    #[arg(short, long, default_value = "{}")]
    pub input: String,

    /// Expected output in wire form
    #[arg(short, long)]
    pub expected: Option<String>,

    /// Observed output in wire form; the function is not called
    #[arg(short, long)]
    pub observed: Option<String>,

    /// Override the configured timeout
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct ExamplesArgs {
    /// Function identifier
    pub function_id: String,
}

#[derive(Parser, Debug)]
pub struct MissingArgs {
    /// Function identifier
    pub function_id: String,

    /// Hops to follow in each direction
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Only show the first N entries
    #[arg(long)]
    pub top: Option<usize>,
}
