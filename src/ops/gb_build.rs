//! Implementation of `gb build`, `gb install`, `gb test` and `gb clean`.
//!
//! All four are one pipeline with different modes switched on: discover the
//! tree, link imports, reject cycles, plan staleness, then clean, build, test
//! and install the listed units in that order.

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::builder::backend::Backend;
use crate::builder::plan::{mark_stale, BuildPlan};
use crate::builder::scheduler::Scheduler;
use crate::core::registry::UnitRegistry;
use crate::core::run_config::RunConfig;
use crate::core::unit::{Failure, UnitId};
use crate::resolver::{detect_cycles, resolve};
use crate::util::diagnostic::{emit, Diagnostic};
use crate::util::fs::remove_dir_all_if_exists;
use crate::util::shell::{Shell, Status};

/// A discovered, linked and planned tree.
#[derive(Debug)]
pub struct PreparedTree {
    pub registry: UnitRegistry,
    pub plan: BuildPlan,
    /// Warnings and non-fatal errors found on the way
    pub diagnostics: Vec<Diagnostic>,
}

/// Discover, resolve and plan. Fails only on an import cycle.
pub fn prepare(config: &RunConfig) -> Result<PreparedTree> {
    let mut registry = UnitRegistry::discover(config);
    let mut diagnostics = registry.report.diagnostics();

    let unresolved = resolve(&mut registry, config);
    diagnostics.extend(unresolved.iter().map(|e| e.to_diagnostic()));

    let cycles = detect_cycles(&registry, config.modes.test);
    if let Some(first) = cycles.first() {
        for cycle in &cycles {
            tracing::debug!("{}", cycle);
        }
        let more = match cycles.len() {
            1 => String::new(),
            n => format!(" (and {} more)", n - 1),
        };
        bail!("{}{}; nothing was built", first, more);
    }

    let plan = BuildPlan::new(&registry, config.modes.test);
    let staleness = mark_stale(&registry, &plan);
    tracing::debug!(
        "{} units, {} need building, {} need installing",
        registry.len(),
        staleness.needs_build,
        staleness.needs_install
    );

    Ok(PreparedTree {
        registry,
        plan,
        diagnostics,
    })
}

/// A unit that could not be built.
#[derive(Debug, Clone)]
pub struct BrokenUnit {
    pub target: String,
    pub dir: PathBuf,
    pub failure: Failure,
    pub diagnostic: Diagnostic,
}

/// What a run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub clean: bool,
    pub test: bool,
    pub built: usize,
    pub installed: usize,
    pub cleaned: usize,
    pub tested: usize,
    pub test_failures: usize,
    pub broken: Vec<BrokenUnit>,
    /// The top-level `_obj` directory was removed
    pub removed_obj: bool,
}

fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}", n, plural)
    }
}

impl RunSummary {
    /// The closing lines of a run.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.clean && self.built == 0 && self.installed == 0 {
            if self.cleaned == 0 && !self.removed_obj {
                lines.push("No mess to clean".to_string());
            } else if self.cleaned > 0 {
                lines.push(format!("Cleaned {}", count(self.cleaned, "target", "targets")));
            }
        } else {
            if self.built > 0 {
                lines.push(format!("Built {}", count(self.built, "target", "targets")));
            }
            if self.installed > 0 {
                lines.push(format!("Installed {}", count(self.installed, "target", "targets")));
            }
            if self.built == 0 && self.installed == 0 && self.broken.is_empty() {
                lines.push("Up to date".to_string());
            }
        }
        if self.test {
            lines.push(format!("Tested {}", count(self.tested, "target", "targets")));
            if self.test_failures > 0 {
                lines.push(count(self.test_failures, "test failure", "test failures"));
            }
        }
        if !self.broken.is_empty() {
            lines.push(count(self.broken.len(), "broken target", "broken targets"));
        }
        lines
    }

    pub fn is_success(&self) -> bool {
        self.broken.is_empty() && self.test_failures == 0
    }
}

/// Run the requested actions over the listed units.
pub fn run(config: &RunConfig, backend: &dyn Backend, shell: &mut Shell) -> Result<RunSummary> {
    let tree = prepare(config)?;
    if !shell.is_quiet() {
        for diag in &tree.diagnostics {
            emit(diag, shell.use_color());
        }
    }

    let registry = &tree.registry;
    let modes = config.modes;
    let listed: Vec<UnitId> = registry.listed(&config.selection);
    if registry.is_empty() {
        tracing::info!("no units found under {}", config.ctx.cwd().display());
    } else if listed.is_empty() {
        bail!(
            "no units in the listed directories: {}",
            config.selection.listed.join(", ")
        );
    }

    let mut summary = RunSummary {
        clean: modes.clean,
        test: modes.test,
        ..RunSummary::default()
    };

    if modes.clean && config.selection.listed.is_empty() {
        let obj = config.ctx.local_obj_dir();
        if remove_dir_all_if_exists(&obj)? {
            shell.status(Status::Removed, obj.display());
            summary.removed_obj = true;
        }
    }

    if modes.build {
        shell.start_progress(listed.len() as u64);
    }

    let scheduler = Scheduler::new(registry, config, backend, &*shell);
    if modes.clean {
        scheduler.clean_all(&listed);
    }
    if modes.build {
        scheduler.build_all(&listed);
    }
    if modes.test {
        let testable: Vec<UnitId> = listed
            .iter()
            .copied()
            .filter(|&id| registry.get(id).is_testable())
            .collect();
        scheduler.test_all(&testable);
    }
    if modes.install {
        scheduler.install_all(&listed);
    }
    shell.finish_progress();

    let progress = scheduler.progress();
    summary.built = progress.built();
    summary.installed = progress.installed();
    summary.cleaned = progress.cleaned();
    summary.tested = progress.tested();
    summary.test_failures = progress.test_failures();
    summary.broken = registry
        .iter()
        .filter_map(|unit| {
            unit.snapshot().failure.map(|failure| BrokenUnit {
                target: unit.target.clone(),
                dir: unit.dir.clone(),
                diagnostic: failure.to_diagnostic(unit),
                failure,
            })
        })
        .collect();

    for broken in &summary.broken {
        emit(&broken.diagnostic, shell.use_color());
    }

    Ok(summary)
}
