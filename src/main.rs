// ABOUTME: Entry point for the tugboat CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use tracing_subscriber::EnvFilter;
use tugboat::error::Result;
use tugboat::output::Output;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = cli.output_mode();

    if let Err(e) = run(cli, Output::new(mode)).await {
        Output::new(mode).error(&e.to_string());
        tracing::debug!(kind = %e.kind(), "command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let cwd = env::current_dir()?;
    match cli.command {
        Commands::Init { force } => commands::init(&cwd, force, output),
        Commands::Deploy => commands::deploy(&cwd, output).await,
        Commands::Rollback { version, list } => {
            if list {
                commands::list_versions(&cwd, output)
            } else {
                commands::rollback(&cwd, version.as_deref().unwrap_or_default(), output).await
            }
        }
        Commands::Config => commands::show_config(&cwd),
    }
}
