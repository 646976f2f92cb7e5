//! `gb clean` command

use anyhow::Result;

use super::{execute_run, GlobalArgs};
use crate::cli::CleanArgs;
use gb::core::Modes;

pub fn execute(args: CleanArgs, global: &GlobalArgs) -> Result<()> {
    let modes = Modes {
        clean: true,
        build: args.build,
        ..Modes::default()
    };
    execute_run(&args.run, modes, global)
}
