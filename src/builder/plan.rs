//! Build planning - the unit graph and initial staleness.
//!
//! The plan is a petgraph view of the registry's build edges. It gives a
//! dependency-first order, which is all the staleness pass needs: by the time
//! a unit is looked at, every dependency's flags are final.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Topo;

use crate::core::registry::UnitRegistry;
use crate::core::unit::{Timestamp, UnitId};

/// Dependency graph of a registry. An edge `a -> b` means `a` imports `b`.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    graph: DiGraph<UnitId, ()>,
    nodes: HashMap<UnitId, NodeIndex>,
}

impl BuildPlan {
    /// Build the graph. Test edges are included when `include_tests` is set.
    ///
    /// The registry must be acyclic along the chosen edges.
    pub fn new(registry: &UnitRegistry, include_tests: bool) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for id in registry.ids() {
            nodes.insert(id, graph.add_node(id));
        }
        for unit in registry.iter() {
            let from = nodes[&unit.id];
            let tests = include_tests.then_some(&unit.test_deps).into_iter().flatten();
            for dep in unit.deps.iter().chain(tests) {
                let to = nodes[dep];
                if from != to && !graph.contains_edge(from, to) {
                    graph.add_edge(from, to, ());
                }
            }
        }
        BuildPlan { graph, nodes }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Units with dependencies before their dependents.
    pub fn dependency_order(&self) -> Vec<UnitId> {
        let mut topo = Topo::new(&self.graph);
        let mut order = Vec::new();
        while let Some(node) = topo.next(&self.graph) {
            order.push(self.graph[node]);
        }
        // Topo yields importers first.
        order.reverse();
        order
    }

    /// Units that import `id` directly.
    pub fn dependents(&self, id: UnitId) -> Vec<UnitId> {
        match self.nodes.get(&id) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, petgraph::Direction::Incoming)
                .map(|n| self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Totals from [`mark_stale`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Staleness {
    pub needs_build: usize,
    pub needs_install: usize,
}

/// Compute `needs_build` and `needs_install` for every unit from the
/// timestamps read at scan time.
///
/// A unit needs building when it was forced, when a dependency needs
/// building, when it still has imports to fetch, or when its newest input
/// (own sources, dependency artifacts, installed archives it imports) is newer
/// than its artifact. It needs installing when it needs building or when the
/// installed copy is older than the artifact or any input.
pub fn mark_stale(registry: &UnitRegistry, plan: &BuildPlan) -> Staleness {
    let mut totals = Staleness::default();
    let mut dep_flags: HashMap<UnitId, (bool, Timestamp)> = HashMap::new();

    for id in plan.dependency_order() {
        let unit = registry.get(id);
        let mut state = unit.lock();

        let mut build = state.force_build || !unit.fetch.is_empty();
        let mut input = unit.prebuilt_floor.max(state.source_time);
        for dep in &unit.deps {
            if let Some(&(dep_build, dep_bin)) = dep_flags.get(dep) {
                build |= dep_build;
                input = input.max(dep_bin);
            }
        }
        if input > state.bin_time {
            build = true;
        }
        let install = build || state.inst_time < state.bin_time || state.inst_time < input;

        state.needs_build = build;
        state.needs_install = install;
        dep_flags.insert(id, (build, state.bin_time));

        totals.needs_build += build as usize;
        totals.needs_install += install as usize;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Platform;
    use crate::core::run_config::RunConfig;
    use crate::resolver::resolve;
    use crate::util::context::GlobalContext;
    use std::fs::File;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn write_file(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "!<arch>\n").unwrap();
    }

    fn set_mtime(path: &Path, secs_ago: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 - secs_ago))
            .unwrap();
    }

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

    fn chain(cfg: &RunConfig) -> UnitRegistry {
        let root = cfg.ctx.cwd();
        write(root, "a/a.go", "package a\n");
        write(root, "b/b.go", "package b\nimport \"a\"\n");
        write(root, "cmd/c/main.go", "package main\nimport \"b\"\n");
        let mut reg = UnitRegistry::discover(cfg);
        resolve(&mut reg, cfg);
        reg
    }

    #[test]
    fn test_dependency_order() {
        let (_tmp, cfg) = setup();
        let reg = chain(&cfg);
        let plan = BuildPlan::new(&reg, false);
        let order: Vec<_> = plan
            .dependency_order()
            .into_iter()
            .map(|id| reg.get(id).target.clone())
            .collect();
        let pos = |t: &str| order.iter().position(|x| x == t).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
        assert_eq!(plan.dependents(reg.lookup("a").unwrap()), vec![reg.lookup("b").unwrap()]);
    }

    #[test]
    fn test_fresh_tree_is_all_stale() {
        let (_tmp, cfg) = setup();
        let reg = chain(&cfg);
        let plan = BuildPlan::new(&reg, false);
        let totals = mark_stale(&reg, &plan);
        assert_eq!(totals.needs_build, 3);
        assert_eq!(totals.needs_install, 3);
    }

    #[test]
    fn test_up_to_date_and_propagation() {
        let (_tmp, cfg) = setup();
        let root = cfg.ctx.cwd().to_path_buf();
        write(&root, "a/a.go", "package a\n");
        write(&root, "b/b.go", "package b\nimport \"a\"\n");
        set_mtime(&root.join("a/a.go"), 100);
        set_mtime(&root.join("b/b.go"), 100);
        for lib in ["a", "b"] {
            let built = cfg.ctx.local_obj_dir().join(format!("{}.a", lib));
            let installed = cfg.ctx.toolchain_pkg_dir().join(format!("{}.a", lib));
            write_file(&built);
            write_file(&installed);
            set_mtime(&built, 50);
            set_mtime(&installed, 10);
        }

        let mut reg = UnitRegistry::discover(&cfg);
        resolve(&mut reg, &cfg);
        let plan = BuildPlan::new(&reg, false);
        assert_eq!(mark_stale(&reg, &plan), Staleness::default());

        // a's source is now newer than its archive: a and its importer go stale
        set_mtime(&root.join("a/a.go"), 0);
        let mut reg = UnitRegistry::discover(&cfg);
        resolve(&mut reg, &cfg);
        let plan = BuildPlan::new(&reg, false);
        let totals = mark_stale(&reg, &plan);
        assert_eq!(totals.needs_build, 2);
        assert!(reg.get(reg.lookup("b").unwrap()).snapshot().needs_build);
    }
}
