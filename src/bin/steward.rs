//! Steward CLI Binary
//!
//! Command-line interface and interactive shell for agent lifecycle management.

use anyhow::Context;
use clap::Parser;
use steward::config::ConfigLoader;
use steward::logging::init_logging;
use steward::tooling::cli::{Cli, CliContext, Commands};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.workspace),
    }
    .context("Failed to load configuration")?;
    init_logging(Some(&cli.logging_config(&config.logging)))
        .context("Failed to initialize logging")?;

    let context = CliContext::from_config(cli.workspace.clone(), config)
        .context("Error initializing agents")?;

    let result = match &cli.command {
        Commands::Shell => context.run_shell().await.map(|_| String::new()),
        command => context.execute(command).await,
    };
    context.shutdown().await;

    let output = result?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
