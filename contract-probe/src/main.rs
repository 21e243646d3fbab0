use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
use cli::commands::Workspace;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Parse CLI arguments first to get verbosity level
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let workspace = Workspace::load(cli.config.as_deref(), &cli.snapshot)?;

    match cli.command {
        Commands::Script(args) => {
            info!("Script command: {:?}", args);
            cli::commands::script::execute(&workspace, args)?;
        }
        Commands::Verify(args) => {
            info!("Verify command: {:?}", args);
            // Create async runtime for the command
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(cli::commands::verify::execute(&workspace, args))?;
        }
        Commands::Examples(args) => {
            info!("Examples command: {:?}", args);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(cli::commands::examples::execute(&workspace, args))?;
        }
        Commands::Diagnose(args) => {
            info!("Diagnose command: {:?}", args);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(cli::commands::diagnose::execute(&workspace, args))?;
        }
        Commands::Missing(args) => {
            info!("Missing command: {:?}", args);
            cli::commands::missing::execute(&workspace, args)?;
        }
    }

    Ok(())
}
