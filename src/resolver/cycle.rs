//! Import cycle detection.
//!
//! A depth-first walk from every unit with the classic three colours: units on
//! the current path, units fully explored, and units not yet seen. Every back
//! edge to a unit on the path is a cycle. Fully explored units are never
//! re-entered, so the walk is linear in the size of the graph; a cycle is
//! still found from whichever of its members the walk reaches first.

use std::collections::HashSet;

use crate::core::registry::UnitRegistry;
use crate::core::unit::UnitId;
use crate::resolver::errors::ResolveError;

/// Outgoing edges the detector follows for `id`: build edges always, test
/// edges when `include_tests` is set. A test importing its own package is
/// not an edge; a build import of itself is, and forms a cycle.
fn edges(registry: &UnitRegistry, id: UnitId, include_tests: bool) -> Vec<UnitId> {
    let unit = registry.get(id);
    let mut out: Vec<UnitId> = unit.deps.clone();
    if include_tests {
        out.extend(unit.test_deps.iter().copied().filter(|&dep| dep != id));
    }
    out
}

struct Walk<'a> {
    registry: &'a UnitRegistry,
    include_tests: bool,
    path: Vec<UnitId>,
    on_path: HashSet<UnitId>,
    done: HashSet<UnitId>,
    cycles: Vec<Vec<UnitId>>,
}

impl Walk<'_> {
    fn visit(&mut self, id: UnitId) {
        if self.done.contains(&id) {
            return;
        }
        if self.on_path.contains(&id) {
            let start = self.path.iter().position(|&p| p == id).unwrap_or(0);
            let mut cycle = self.path[start..].to_vec();
            cycle.push(id);
            self.cycles.push(cycle);
            return;
        }

        self.path.push(id);
        self.on_path.insert(id);
        for dep in edges(self.registry, id, self.include_tests) {
            self.visit(dep);
        }
        self.on_path.remove(&id);
        self.path.pop();
        self.done.insert(id);
    }
}

/// Find import cycles. Each cycle lists units from the repeated unit around
/// to itself (`a -> b -> a`). Rotations of the same cycle are reported once.
pub fn find_cycles(registry: &UnitRegistry, include_tests: bool) -> Vec<Vec<UnitId>> {
    let mut walk = Walk {
        registry,
        include_tests,
        path: Vec::new(),
        on_path: HashSet::new(),
        done: HashSet::new(),
        cycles: Vec::new(),
    };
    for id in registry.ids() {
        walk.visit(id);
    }

    let mut seen: HashSet<Vec<UnitId>> = HashSet::new();
    walk.cycles
        .into_iter()
        .filter(|cycle| seen.insert(canonical(cycle)))
        .collect()
}

/// Rotation-independent key: the open cycle rotated to start at its
/// smallest id.
fn canonical(cycle: &[UnitId]) -> Vec<UnitId> {
    let open = &cycle[..cycle.len().saturating_sub(1)];
    let Some(min_pos) = open.iter().enumerate().min_by_key(|(_, id)| **id).map(|(i, _)| i) else {
        return Vec::new();
    };
    open[min_pos..].iter().chain(&open[..min_pos]).copied().collect()
}

/// Cycle errors for the registry, named by target.
pub fn detect_cycles(registry: &UnitRegistry, include_tests: bool) -> Vec<ResolveError> {
    find_cycles(registry, include_tests)
        .into_iter()
        .map(|cycle| ResolveError::Cycle {
            path: cycle
                .into_iter()
                .map(|id| registry.get(id).target.clone())
                .collect(),
        })
        .collect()
}
