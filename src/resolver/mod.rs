//! Dependency resolution.
//!
//! Turns every unit's raw imports into edges to other units, staleness floors
//! from installed artifacts, or fetch requests. Imports that fit none of these
//! mark their unit as failed; resolution of the other units carries on.

pub mod cycle;
pub mod errors;

pub use cycle::detect_cycles;
pub use errors::ResolveError;

use crate::builder::backend::BackendStrategy;
use crate::core::registry::UnitRegistry;
use crate::core::run_config::RunConfig;
use crate::core::unit::{Failure, Timestamp, UnitId};
use crate::util::context::GlobalContext;
use crate::util::fs::mtime;

/// How one import was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Another unit in the registry
    Unit(UnitId),
    /// An installed artifact outside the tree
    Prebuilt(Timestamp),
    /// Will be fetched before the importing unit builds
    Fetch,
    Unresolved,
}

/// Whether an import path names a remote repository (`host.tld/...`).
pub fn is_fetchable(import: &str) -> bool {
    import
        .split('/')
        .next()
        .is_some_and(|host| host.contains('.'))
}

/// Installed library artifact for `import`, in the toolchain or any workspace.
pub fn prebuilt_time(import: &str, ctx: &GlobalContext) -> Option<Timestamp> {
    let lib = format!("{}.a", import);
    std::iter::once(ctx.toolchain_pkg_dir())
        .chain(ctx.gopath().iter().map(|gp| ctx.workspace_pkg_dir(gp)))
        .filter_map(|dir| mtime(&dir.join(&lib)))
        .max()
}

/// Resolve a single import in the registry, then on disk.
pub fn resolve_import(import: &str, registry: &UnitRegistry, config: &RunConfig) -> Resolution {
    if let Some(id) = registry.lookup(import) {
        return Resolution::Unit(id);
    }
    if let Some(time) = prebuilt_time(import, &config.ctx) {
        return Resolution::Prebuilt(time);
    }
    if config.modes.fetch && is_fetchable(import) {
        return Resolution::Fetch;
    }
    Resolution::Unresolved
}

#[derive(Debug, Default)]
struct Linked {
    deps: Vec<UnitId>,
    test_deps: Vec<UnitId>,
    floor: Timestamp,
    fetch: Vec<String>,
    unresolved: Vec<String>,
}

/// Link every unit in `registry`. Returns one error per unit that has
/// unresolved imports.
pub fn resolve(registry: &mut UnitRegistry, config: &RunConfig) -> Vec<ResolveError> {
    let linked: Vec<(UnitId, Linked)> = registry
        .iter()
        .map(|unit| {
            let mut out = Linked::default();
            link_imports(unit.id, &unit.imports, false, registry, config, &mut out);
            if config.modes.test {
                link_imports(unit.id, &unit.test_imports, true, registry, config, &mut out);
            }
            (unit.id, out)
        })
        .collect();

    let mut errors = Vec::new();
    for (id, linked) in linked {
        let unit = registry.get_mut(id);
        unit.deps = linked.deps;
        unit.test_deps = linked.test_deps;
        unit.prebuilt_floor = linked.floor;
        unit.fetch = linked.fetch;
        unit.unresolved = linked.unresolved;
        unit.strategy = BackendStrategy::select(unit, &config.modes);

        if !unit.unresolved.is_empty() {
            tracing::debug!(
                "(in {}) unresolved: {}",
                unit.display_dir(),
                unit.unresolved.join(", ")
            );
            unit.lock().fail(Failure::Unresolved(unit.unresolved.clone()));
            errors.push(ResolveError::Unresolved {
                target: unit.target.clone(),
                dir: unit.dir.clone(),
                imports: unit.unresolved.clone(),
            });
        }
    }
    errors
}

fn link_imports(
    owner: UnitId,
    imports: &[String],
    test: bool,
    registry: &UnitRegistry,
    config: &RunConfig,
    out: &mut Linked,
) {
    for import in imports {
        match resolve_import(import, registry, config) {
            // a test may import the package it tests
            Resolution::Unit(id) if test && id == owner => {}
            Resolution::Unit(id) => {
                let edges = if test { &mut out.test_deps } else { &mut out.deps };
                if !edges.contains(&id) {
                    edges.push(id);
                }
            }
            Resolution::Prebuilt(time) => out.floor = out.floor.max(time),
            Resolution::Fetch => {
                if !out.fetch.contains(import) {
                    out.fetch.push(import.clone());
                }
            }
            Resolution::Unresolved => {
                if !out.unresolved.contains(import) {
                    out.unresolved.push(import.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Platform;
    use crate::core::run_config::Modes;
    use std::path::Path;
    use tempfile::TempDir;

    fn setup(modes: Modes) -> (TempDir, RunConfig) {
        let tmp = TempDir::new().unwrap();
        let goroot = tmp.path().join("goroot");
        let work = tmp.path().join("work");
        std::fs::create_dir_all(goroot.join("pkg/linux_amd64")).unwrap();
        std::fs::create_dir_all(&work).unwrap();
        let cfg = RunConfig::new(
            GlobalContext::new(work, goroot).with_platform(Platform::new("linux", "amd64")),
        )
        .with_modes(modes);
        (tmp, cfg)
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_is_fetchable() {
        assert!(is_fetchable("github.com/user/repo"));
        assert!(is_fetchable("go-glue.googlecode.com/hg/rlglue"));
        assert!(!is_fetchable("fmt"));
        assert!(!is_fetchable("net/http"));
    }

    #[test]
    fn test_registry_then_prebuilt_then_unresolved() {
        let (_tmp, cfg) = setup(Modes::default());
        let root = cfg.ctx.cwd().to_path_buf();
        write(&root, "util/util.go", "package util\nimport \"fmt\"\n");
        write(&root, "app/main.go", "package main\nimport (\n\"util\"\n\"fmt\"\n\"missing\"\n)\n");
        write(cfg.ctx.goroot(), "pkg/linux_amd64/fmt.a", "!<arch>");

        let mut reg = UnitRegistry::discover(&cfg);
        let errors = resolve(&mut reg, &cfg);

        let util = reg.lookup("util").unwrap();
        let app = reg.get(reg.lookup("app").unwrap());
        assert_eq!(app.deps, vec![util]);
        assert!(app.prebuilt_floor > Timestamp::ZERO);
        assert_eq!(app.unresolved, vec!["missing"]);
        assert!(matches!(app.snapshot().failure, Some(Failure::Unresolved(_))));

        assert_eq!(errors.len(), 1);
        assert!(!reg.get(util).snapshot().is_failed());
    }

    #[test]
    fn test_fetch_toggle() {
        let (_tmp, cfg) = setup(Modes {
            fetch: true,
            ..Modes::default()
        });
        let root = cfg.ctx.cwd().to_path_buf();
        write(&root, "app/main.go", "package main\nimport \"github.com/u/p\"\n");
        let mut reg = UnitRegistry::discover(&cfg);
        assert!(resolve(&mut reg, &cfg).is_empty());
        let app = reg.get(reg.lookup("app").unwrap());
        assert_eq!(app.fetch, vec!["github.com/u/p"]);

        let (_tmp2, cfg2) = setup(Modes::default());
        write(cfg2.ctx.cwd(), "app/main.go", "package main\nimport \"github.com/u/p\"\n");
        let mut reg2 = UnitRegistry::discover(&cfg2);
        assert_eq!(resolve(&mut reg2, &cfg2).len(), 1);
    }

    #[test]
    fn test_test_edges_only_in_test_mode() {
        let root_modes = [Modes::default(), Modes { test: true, ..Modes::default() }];
        for modes in root_modes {
            let (_tmp, cfg) = setup(modes);
            let root = cfg.ctx.cwd().to_path_buf();
            write(&root, "a/a.go", "package a\n");
            write(&root, "b/b.go", "package b\n");
            write(&root, "b/b_test.go", "package b\nimport (\n\"a\"\n\"b\"\n)\n");
            let mut reg = UnitRegistry::discover(&cfg);
            resolve(&mut reg, &cfg);
            let b = reg.get(reg.lookup("b").unwrap());
            assert!(b.deps.is_empty());
            if modes.test {
                assert_eq!(b.test_deps, vec![reg.lookup("a").unwrap()]);
            } else {
                assert!(b.test_deps.is_empty());
            }
        }
    }
}
