//! `gb scan` command

use anyhow::Result;

use super::{run_config, GlobalArgs};
use crate::cli::ScanArgs;
use gb::core::Modes;
use gb::ops::gb_scan::{print_scan, ScanOptions};
use gb::util::Shell;

pub fn execute(args: ScanArgs, global: &GlobalArgs) -> Result<()> {
    let modes = Modes {
        test: args.test,
        ..Modes::default()
    };
    let (_, config) = run_config(&args.run, modes, global)?;
    let shell = Shell::from_flags(global.quiet, global.verbose);

    let options = ScanOptions {
        deps: args.deps,
        files: args.files,
        json: args.json,
    };
    print_scan(&config, &options, &shell)
}
