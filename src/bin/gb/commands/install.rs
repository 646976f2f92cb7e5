//! `gb install` command
//!
//! Builds whatever is stale, then copies artifacts into GOROOT, the owning
//! GOPATH entry or GOBIN.

use anyhow::Result;

use super::{execute_run, GlobalArgs};
use crate::cli::RunArgs;
use gb::core::Modes;

pub fn execute(args: RunArgs, global: &GlobalArgs) -> Result<()> {
    let modes = Modes {
        build: true,
        install: true,
        ..Modes::default()
    };
    execute_run(&args, modes, global)
}
