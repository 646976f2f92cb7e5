//! Immutable per-run configuration.
//!
//! Everything a deeply nested call might want to know about the run (which
//! units are selected, which actions are requested, how much parallelism is
//! allowed) lives here and is passed down explicitly.

use crate::util::context::GlobalContext;

/// Which units the run acts on.
#[derive(Debug, Clone)]
pub struct Selection {
    pub cmds: bool,
    pub pkgs: bool,
    /// Directories named on the command line, relative to the run root
    pub listed: Vec<String>,
    /// Match listed directories exactly instead of by prefix, and leave
    /// unlisted units alone entirely
    pub exclusive: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Selection {
            cmds: true,
            pkgs: true,
            listed: Vec::new(),
            exclusive: false,
        }
    }
}

impl Selection {
    /// Whether a unit directory is named by the directory list.
    pub fn is_listed(&self, rel_dir: &str) -> bool {
        if self.listed.is_empty() {
            return true;
        }
        self.listed.iter().any(|listed| {
            if self.exclusive {
                rel_dir == listed
            } else {
                listed == "."
                    || rel_dir == listed
                    || rel_dir
                        .strip_prefix(listed.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        })
    }

    /// Whether a unit of this kind in this directory may invoke the backend.
    pub fn is_active(&self, is_cmd: bool, rel_dir: &str) -> bool {
        let kind = if is_cmd { self.cmds } else { self.pkgs };
        kind && (!self.exclusive || self.is_listed(rel_dir))
    }
}

/// Requested actions and toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modes {
    pub clean: bool,
    pub build: bool,
    pub test: bool,
    pub install: bool,
    /// Fetch remote imports that are neither local nor installed
    pub fetch: bool,
    /// Speculatively build dependency subtrees in parallel
    pub concurrent: bool,
    /// Prefer an existing Makefile over direct compilation
    pub makefiles: bool,
}

/// Everything the scanner, resolver and scheduler need to know about a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub ctx: GlobalContext,
    pub selection: Selection,
    pub modes: Modes,
    /// Cap on simultaneously running toolchain processes
    pub jobs: usize,
}

impl RunConfig {
    pub fn new(ctx: GlobalContext) -> Self {
        RunConfig {
            ctx,
            selection: Selection::default(),
            modes: Modes {
                build: true,
                ..Modes::default()
            },
            jobs: default_jobs(),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_modes(mut self, modes: Modes) -> Self {
        self.modes = modes;
        self
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs.filter(|&j| j > 0).unwrap_or_else(default_jobs);
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.ctx.is_verbose()
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
