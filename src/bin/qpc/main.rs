//! qpc CLI - incremental build project generator

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Run the selected command. `Ok(false)` means it finished with failures.
fn run() -> Result<bool> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("qpc=debug")
    } else {
        EnvFilter::new("qpc=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, cli.verbose),
        Commands::Status(args) => commands::status::execute(args),
        Commands::Clean(args) => commands::clean::execute(args).map(|()| true),
        Commands::Generators => commands::generators::execute().map(|()| true),
        Commands::Completions(args) => commands::completions::execute(args).map(|()| true),
    }
}
