//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod install;
pub mod scan;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::cli::RunArgs;
use gb::builder::{NativeBackend, Toolchain};
use gb::core::target::clean_path;
use gb::core::{Modes, RunConfig, Selection};
use gb::ops::gb_build::run;
use gb::util::config::{global_config_path, load_config, project_config_path, Config};
use gb::util::fs::{relative_path, slash_path};
use gb::util::{GlobalContext, Shell};

/// Flags accepted by every subcommand.
pub struct GlobalArgs {
    pub verbose: bool,
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

/// Load the merged config files for the current directory.
fn load(global: &GlobalArgs) -> Result<(Config, GlobalContext)> {
    let cwd = std::env::current_dir()?;
    let global_path = global.config.clone().or_else(global_config_path);
    let config = load_config(global_path.as_deref(), &project_config_path(&cwd));

    let mut ctx = GlobalContext::from_env(&config)?;
    ctx.set_verbose(global.verbose);
    Ok((config, ctx))
}

/// Turn command-line directories into run-root-relative, slash-separated
/// paths.
fn listed_dirs(root: &Path, dirs: &[String]) -> Vec<String> {
    dirs.iter()
        .map(|dir| {
            let path = Path::new(dir);
            let rel = if path.is_absolute() {
                relative_path(root, path)
            } else {
                path.to_path_buf()
            };
            clean_path(&slash_path(&rel))
        })
        .collect()
}

/// Combine flags, config files and environment into a run configuration.
///
/// A flag switches a toggle on; otherwise the config file decides.
pub fn run_config(args: &RunArgs, modes: Modes, global: &GlobalArgs) -> Result<(Config, RunConfig)> {
    let (config, ctx) = load(global)?;
    let b = &config.build;

    let selection = Selection {
        cmds: !args.no_cmds,
        pkgs: !args.no_pkgs,
        listed: listed_dirs(ctx.cwd(), &args.dirs),
        exclusive: args.exclusive,
    };
    if !selection.cmds && !selection.pkgs {
        bail!("--no-cmds and --no-pkgs together leave nothing to do");
    }

    let modes = Modes {
        concurrent: args.concurrent || b.concurrent.unwrap_or(false),
        makefiles: args.makefiles || b.makefiles.unwrap_or(false),
        fetch: args.fetch || b.fetch.unwrap_or(false),
        ..modes
    };

    let run_config = RunConfig::new(ctx)
        .with_selection(selection)
        .with_modes(modes)
        .with_jobs(args.jobs.or(b.jobs));
    Ok((config, run_config))
}

/// Run the requested actions with the native backend and report the outcome.
pub fn execute_run(args: &RunArgs, modes: Modes, global: &GlobalArgs) -> Result<()> {
    let (config, run_config) = run_config(args, modes, global)?;
    let toolchain = Toolchain::new(&config.toolchain, run_config.ctx.platform());
    let backend = NativeBackend::new(toolchain, run_config.ctx.clone());
    let mut shell = Shell::from_flags(global.quiet, global.verbose);

    let summary = run(&run_config, &backend, &mut shell)?;
    for line in summary.lines() {
        println!("{}", line);
    }

    if !summary.is_success() {
        bail!(
            "{} broken, {} failing tests",
            summary.broken.len(),
            summary.test_failures
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_dirs_are_cleaned() {
        let root = Path::new("/work");
        let dirs = vec!["./a/".to_string(), "/work/b/c".to_string(), ".".to_string()];
        assert_eq!(listed_dirs(root, &dirs), vec!["a", "b/c", "."]);
    }
}
