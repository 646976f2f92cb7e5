//! Implementation of `gb scan`.
//!
//! Lists the units a run would act on, dependencies first, with their
//! staleness. Nothing is built.

use std::collections::HashSet;
use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::builder::backend::BackendStrategy;
use crate::core::registry::UnitRegistry;
use crate::core::run_config::RunConfig;
use crate::core::unit::{Unit, UnitId, UnitKind};
use crate::ops::gb_build::prepare;
use crate::util::diagnostic::{emit, Diagnostic};
use crate::util::shell::Shell;

/// Options for `gb scan`.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Show each unit's resolved dependencies
    pub deps: bool,
    /// Show each unit's files
    pub files: bool,
    pub json: bool,
}

/// One unit as reported by `gb scan --json`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub dir: String,
    /// Lives under the run root rather than GOROOT or a GOPATH entry
    pub local: bool,
    pub label: String,
    pub kind: UnitKind,
    pub target: String,
    pub active: bool,
    pub needs_build: bool,
    pub needs_install: bool,
    pub strategy: BackendStrategy,
    pub deps: Vec<String>,
    pub test_deps: Vec<String>,
    pub imports: Vec<String>,
    pub test_imports: Vec<String>,
    pub sources: Vec<String>,
    pub test_sources: Vec<String>,
    pub dead: Vec<String>,
    pub has_makefile: bool,
}

/// Result of a scan.
#[derive(Debug)]
pub struct ScanResult {
    pub entries: Vec<ScanEntry>,
    pub diagnostics: Vec<Diagnostic>,
    test: bool,
}

/// Scan the tree and collect the listed units plus everything they depend
/// on, dependencies before their importers.
pub fn scan(config: &RunConfig) -> Result<ScanResult> {
    let tree = prepare(config)?;
    let registry = &tree.registry;

    let listed = registry.listed(&config.selection);
    if listed.is_empty() && !config.selection.listed.is_empty() {
        bail!(
            "no units in the listed directories: {}",
            config.selection.listed.join(", ")
        );
    }

    let mut order = Vec::new();
    let mut seen = HashSet::new();
    for id in listed {
        visit(registry, id, config.modes.test, &mut seen, &mut order);
    }

    let entries = order
        .into_iter()
        .map(|id| entry(registry, registry.get(id)))
        .collect();
    Ok(ScanResult {
        entries,
        diagnostics: tree.diagnostics,
        test: config.modes.test,
    })
}

fn visit(
    registry: &UnitRegistry,
    id: UnitId,
    tests: bool,
    seen: &mut HashSet<UnitId>,
    order: &mut Vec<UnitId>,
) {
    if !seen.insert(id) {
        return;
    }
    let unit = registry.get(id);
    let test_deps = tests.then_some(&unit.test_deps).into_iter().flatten();
    for &dep in unit.deps.iter().chain(test_deps) {
        visit(registry, dep, tests, seen, order);
    }
    order.push(id);
}

fn entry(registry: &UnitRegistry, unit: &Unit) -> ScanEntry {
    let state = unit.snapshot();
    let names = |ids: &[UnitId]| -> Vec<String> {
        ids.iter().map(|&id| registry.get(id).target.clone()).collect()
    };

    let mut sources: Vec<String> = unit
        .sources
        .primary
        .iter()
        .chain(&unit.sources.interop)
        .cloned()
        .collect();
    sources.sort();
    sources.extend(unit.sources.assembly.iter().cloned());
    sources.extend(unit.sources.native.iter().cloned());

    ScanEntry {
        dir: unit.display_dir(),
        local: !unit.root.is_foreign(),
        label: unit.label(),
        kind: unit.kind,
        target: unit.target.clone(),
        active: unit.active,
        needs_build: state.needs_build,
        needs_install: state.needs_install,
        strategy: unit.strategy,
        deps: names(&unit.deps),
        test_deps: names(&unit.test_deps),
        imports: unit.imports.clone(),
        test_imports: unit.test_imports.clone(),
        sources,
        test_sources: unit.sources.test.clone(),
        dead: unit.sources.dead.clone(),
        has_makefile: unit.has_makefile,
    }
}

impl ScanEntry {
    /// `(installed)`, `(up to date)` or nothing.
    pub fn status(&self) -> &'static str {
        if !self.needs_install {
            " (installed)"
        } else if !self.needs_build {
            " (up to date)"
        } else {
            ""
        }
    }

    fn write_text(&self, out: &mut String, options: &ScanOptions, test: bool) {
        if self.local {
            let _ = write!(out, "in {}: ", self.dir);
        }
        let _ = writeln!(out, "{} \"{}\"{}", self.label, self.target, self.status());

        if options.deps {
            let _ = writeln!(out, " {} Deps: [{}]", self.target, self.deps.join(" "));
            if test {
                let _ = writeln!(out, " {} TestDeps: [{}]", self.target, self.test_deps.join(" "));
            }
        }

        if options.files {
            if self.has_makefile {
                out.push_str("\tMakefile\n");
            }
            let tests = test.then_some(&self.test_sources).into_iter().flatten();
            for file in self.sources.iter().chain(tests) {
                let _ = writeln!(out, "\t{}", file);
            }
            for file in &self.dead {
                let _ = writeln!(out, "\t*{}", file);
            }
        }
    }
}

impl ScanResult {
    /// The plain listing.
    pub fn to_text(&self, options: &ScanOptions) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            entry.write_text(&mut out, options, self.test);
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.entries).context("failed to serialize scan result")
    }
}

/// Run `gb scan` and print the result.
pub fn print_scan(config: &RunConfig, options: &ScanOptions, shell: &Shell) -> Result<()> {
    let result = scan(config)?;
    if !shell.is_quiet() {
        for diag in &result.diagnostics {
            emit(diag, shell.use_color());
        }
    }
    if options.json {
        println!("{}", result.to_json()?);
    } else {
        print!("{}", result.to_text(options));
    }
    Ok(())
}
