//! gb CLI - dependency-aware builds for Go-style source trees

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("gb=debug")
    } else if cli.quiet {
        EnvFilter::new("gb=error")
    } else {
        EnvFilter::new("gb=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global = commands::GlobalArgs {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &global),
        Commands::Install(args) => commands::install::execute(args, &global),
        Commands::Test(args) => commands::test::execute(args, &global),
        Commands::Clean(args) => commands::clean::execute(args, &global),
        Commands::Scan(args) => commands::scan::execute(args, &global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
