//! The unit registry.
//!
//! An arena of [`Unit`]s addressed by [`UnitId`], with a side index from
//! target name to id. The registry is filled by [`UnitRegistry::discover`],
//! linked by the resolver through `&mut`, and then shared immutably for the
//! rest of the run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::error::UnitError;
use crate::core::extract::ParseError;
use crate::core::run_config::{RunConfig, Selection};
use crate::core::target::{clean_path, Marker};
use crate::core::unit::{Unit, UnitId};
use crate::resolver::errors::ResolveError;
use crate::util::diagnostic::Diagnostic;
use crate::util::fs::{relative_path, slash_path};

/// Problems found while discovering units. None of them stop the run.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Directories that did not become units
    pub skipped: Vec<UnitError>,
    pub parse_errors: Vec<ParseError>,
    /// Directories that claimed an already registered target
    pub duplicates: Vec<ResolveError>,
    pub warnings: Vec<Diagnostic>,
}

impl ScanReport {
    /// Everything worth showing the user.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut out: Vec<Diagnostic> = self
            .skipped
            .iter()
            .filter(|e| !e.is_quiet())
            .map(UnitError::to_diagnostic)
            .collect();
        out.extend(
            self.parse_errors
                .iter()
                .map(|e| Diagnostic::warning(e.to_string())),
        );
        out.extend(self.duplicates.iter().map(ResolveError::to_diagnostic));
        out.extend(self.warnings.iter().cloned());
        out
    }
}

#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: Vec<Unit>,
    by_target: HashMap<String, UnitId>,
    pub report: ScanReport,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the run root and register every unit below it.
    ///
    /// Hidden directories, `_`-prefixed output directories and `src` trees
    /// are not descended into. Each directory inherits a namespace base from
    /// its parent: the parent unit's base, or the parent marker file's name,
    /// extended by the directory's own name.
    pub fn discover(config: &RunConfig) -> Self {
        let root = config.ctx.cwd().to_path_buf();
        let mut registry = UnitRegistry::new();
        let mut bases: HashMap<PathBuf, String> = HashMap::new();

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || (e.file_type().is_dir() && !skip_dir(e.file_name()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("error while scanning: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let dir = entry.path();
            let rel = relative_path(&root, dir);
            let rel_dir = slash_path(&rel);
            let base = match dir.parent().and_then(|p| bases.get(p)) {
                Some(parent) if entry.depth() > 0 => {
                    let name = entry.file_name().to_string_lossy();
                    clean_path(&format!("{}/{}", parent, name))
                }
                _ => rel_dir.clone(),
            };

            let next_base = registry.scan_dir(dir, &rel_dir, &base, config);
            bases.insert(dir.to_path_buf(), next_base);
        }

        tracing::debug!(
            "discovered {} units ({} directories skipped)",
            registry.len(),
            registry.report.skipped.len()
        );
        registry
    }

    /// Scan one directory; returns the base its children inherit.
    fn scan_dir(&mut self, dir: &Path, rel_dir: &str, base: &str, config: &RunConfig) -> String {
        let outcome = Unit::scan(dir, rel_dir, base, config);
        self.report.parse_errors.extend(outcome.parse_errors);
        self.report.warnings.extend(outcome.warnings);

        match outcome.unit {
            Ok(unit) => {
                let next = unit.base.clone();
                tracing::debug!("(in {}) found {} \"{}\"", unit.display_dir(), unit.label(), unit.target);
                if let Err(dup) = self.insert(unit) {
                    self.report.duplicates.push(dup);
                }
                next
            }
            Err(err) => {
                if err.is_quiet() {
                    tracing::debug!("{}", err);
                } else {
                    tracing::warn!("{}", err);
                }
                self.report.skipped.push(err);
                match Marker::read(dir) {
                    Some(Marker::Named(name)) => clean_path(&name),
                    _ => base.to_string(),
                }
            }
        }
    }

    /// Register a unit. A second unit with the same target is refused.
    pub fn insert(&mut self, mut unit: Unit) -> Result<UnitId, ResolveError> {
        if let Some(&existing) = self.by_target.get(&unit.target) {
            return Err(ResolveError::DuplicateTarget {
                target: unit.target.clone(),
                first: self.get(existing).dir.clone(),
                second: unit.dir.clone(),
            });
        }
        let id = UnitId(self.units.len());
        unit.set_id(id);
        self.by_target.insert(unit.target.clone(), id);
        self.units.push(unit);
        Ok(id)
    }

    pub fn get(&self, id: UnitId) -> &Unit {
        &self.units[id.0]
    }

    pub fn get_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.units[id.0]
    }

    /// Look a target name up.
    pub fn lookup(&self, target: &str) -> Option<UnitId> {
        self.by_target.get(target).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = UnitId> {
        (0..self.units.len()).map(UnitId)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units named by the directory list, in discovery order.
    pub fn listed(&self, selection: &Selection) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|u| selection.is_listed(&u.rel_dir))
            .map(|u| u.id)
            .collect()
    }
}

fn skip_dir(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || name.starts_with('_') || name == "src"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Platform;
    use crate::util::context::GlobalContext;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RunConfig) {
        let tmp = TempDir::new().unwrap();
        let goroot = tmp.path().join("goroot");
        let work = tmp.path().join("work");
        std::fs::create_dir_all(&goroot).unwrap();
        std::fs::create_dir_all(&work).unwrap();
        let cfg = RunConfig::new(
            GlobalContext::new(work, goroot).with_platform(Platform::new("linux", "amd64")),
        );
        (tmp, cfg)
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_discover_tree() {
        let (_tmp, cfg) = setup();
        let root = cfg.ctx.cwd().to_path_buf();
        write(&root, "util/util.go", "package util\n");
        write(&root, "util/strings/strings.go", "package strings\n");
        write(&root, "hello/main.go", "package main\nimport \"util\"\n");
        write(&root, "docs/README", "nothing to build\n");
        write(&root, "_obj/junk.go", "package junk\n");
        write(&root, "src/x/x.go", "package x\n");

        let reg = UnitRegistry::discover(&cfg);
        let targets: Vec<_> = reg.iter().map(|u| u.target.as_str()).collect();
        assert_eq!(targets, vec!["hello", "util", "util/strings"]);
        assert!(reg
            .report
            .skipped
            .iter()
            .any(|e| matches!(e, UnitError::NoSource { dir } if dir.ends_with("docs"))));
        assert!(reg.lookup("junk").is_none());
        assert!(reg.lookup("x").is_none());
    }

    #[test]
    fn test_marker_sets_base_for_children() {
        let (_tmp, cfg) = setup();
        let root = cfg.ctx.cwd().to_path_buf();
        write(&root, "lib/target.gb", "example.org/lib\n");
        write(&root, "lib/lib.go", "package lib\n");
        write(&root, "lib/sub/sub.go", "package sub\n");
        write(&root, "group/target.gb", "grouped\n");
        write(&root, "group/inner/inner.go", "package inner\n");

        let reg = UnitRegistry::discover(&cfg);
        assert!(reg.lookup("example.org/lib").is_some());
        assert!(reg.lookup("example.org/lib/sub").is_some());
        assert!(reg.lookup("grouped/inner").is_some());
    }

    #[test]
    fn test_opt_out_directory() {
        let (_tmp, cfg) = setup();
        let root = cfg.ctx.cwd().to_path_buf();
        write(&root, "skip/target.gb", "-\n");
        write(&root, "skip/skip.go", "package skip\n");
        let reg = UnitRegistry::discover(&cfg);
        assert!(reg.is_empty());
        assert!(reg.report.diagnostics().is_empty());
    }

    #[test]
    fn test_duplicate_target_keeps_first() {
        let (_tmp, cfg) = setup();
        let root = cfg.ctx.cwd().to_path_buf();
        write(&root, "a/a.go", "//target:shared\npackage a\n");
        write(&root, "b/b.go", "//target:shared\npackage b\n");
        let reg = UnitRegistry::discover(&cfg);
        assert_eq!(reg.len(), 1);
        assert!(reg.get(reg.lookup("shared").unwrap()).dir.ends_with("a"));
        assert_eq!(reg.report.duplicates.len(), 1);
    }

    #[test]
    fn test_listed_prefix() {
        let (_tmp, cfg) = setup();
        let root = cfg.ctx.cwd().to_path_buf();
        write(&root, "net/net.go", "package net\n");
        write(&root, "net/http/http.go", "package http\n");
        write(&root, "os/os.go", "package os\n");
        let reg = UnitRegistry::discover(&cfg);
        let sel = Selection {
            listed: vec!["net".into()],
            ..Selection::default()
        };
        let listed: Vec<_> = reg.listed(&sel).into_iter().map(|id| reg.get(id).target.clone()).collect();
        assert_eq!(listed, vec!["net", "net/http"]);
    }
}
