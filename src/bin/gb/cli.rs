//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// gb - build every Go package and command under the current directory
#[derive(Parser)]
#[command(name = "gb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (echo toolchain commands)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Read configuration from this file instead of ~/.gb/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build out-of-date targets
    Build(RunArgs),

    /// Build, then install targets into GOROOT/GOPATH/GOBIN
    Install(RunArgs),

    /// Build, then run package tests
    Test(RunArgs),

    /// Remove build products
    Clean(CleanArgs),

    /// List targets and their status without building
    Scan(ScanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Selection and scheduling flags shared by every command that runs.
#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Directories to act on, relative to the current directory
    pub dirs: Vec<String>,

    /// Only act on exactly the listed directories; leave everything else alone
    #[arg(short, long)]
    pub exclusive: bool,

    /// Skip commands
    #[arg(long)]
    pub no_cmds: bool,

    /// Skip packages
    #[arg(long)]
    pub no_pkgs: bool,

    /// Build independent dependency subtrees in parallel
    #[arg(short = 'p', long)]
    pub concurrent: bool,

    /// Maximum number of toolchain processes running at once
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Use a directory's Makefile when it has one
    #[arg(short, long)]
    pub makefiles: bool,

    /// Fetch remote imports that are not installed
    #[arg(short = 'g', long)]
    pub fetch: bool,
}

#[derive(Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Rebuild everything after cleaning
    #[arg(short, long)]
    pub build: bool,
}

#[derive(Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Show each target's dependencies
    #[arg(long)]
    pub deps: bool,

    /// Show each target's files; `*` marks files built for another platform
    #[arg(long)]
    pub files: bool,

    /// Include test sources and test dependencies
    #[arg(short, long)]
    pub test: bool,

    /// Print the scan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
