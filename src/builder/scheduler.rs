//! The incremental build scheduler.
//!
//! Drives build, install, clean and test over the unit graph. Every action on
//! a unit runs with that unit's lock held, so concurrent requests for the same
//! unit serialize and later callers see the once-per-run markers set by the
//! first. Locks are only ever taken along dependency edges, which are acyclic
//! by the time the scheduler runs.
//!
//! Backend invocations additionally hold a token from the run's
//! [`JobLimiter`], which caps how many tools run at once no matter how many
//! threads are walking the graph.

use std::collections::HashMap;

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::builder::backend::Backend;
use crate::builder::limiter::JobLimiter;
use crate::builder::progress::RunProgress;
use crate::builder::testmain::TestSuite;
use crate::core::registry::UnitRegistry;
use crate::core::run_config::RunConfig;
use crate::core::unit::{Failure, Timestamp, Unit, UnitId};
use crate::util::shell::{Shell, Status};

pub struct Scheduler<'a> {
    registry: &'a UnitRegistry,
    config: &'a RunConfig,
    backend: &'a dyn Backend,
    shell: &'a Shell,
    limiter: JobLimiter,
    progress: RunProgress,
    /// Fetch results by import path; each import is fetched at most once
    fetched: Mutex<HashMap<String, Result<Timestamp, String>>>,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        registry: &'a UnitRegistry,
        config: &'a RunConfig,
        backend: &'a dyn Backend,
        shell: &'a Shell,
    ) -> Self {
        Scheduler {
            registry,
            config,
            backend,
            shell,
            limiter: JobLimiter::new(config.jobs),
            progress: RunProgress::new(),
            fetched: Mutex::new(HashMap::new()),
        }
    }

    pub fn progress(&self) -> &RunProgress {
        &self.progress
    }

    pub fn limiter(&self) -> &JobLimiter {
        &self.limiter
    }

    /// Run `action` over `ids`, in parallel when concurrent mode is on.
    /// One unit's failure never stops the others.
    fn each<F>(&self, ids: &[UnitId], action: F)
    where
        F: Fn(UnitId) + Sync + Send,
    {
        if self.config.modes.concurrent {
            ids.par_iter().for_each(|&id| action(id));
        } else {
            ids.iter().for_each(|&id| action(id));
        }
    }

    pub fn build_all(&self, ids: &[UnitId]) {
        self.each(ids, |id| {
            let _ = self.build(id);
            self.shell.tick();
        });
    }

    pub fn install_all(&self, ids: &[UnitId]) {
        self.each(ids, |id| {
            let _ = self.install(id);
        });
    }

    pub fn clean_all(&self, ids: &[UnitId]) {
        self.each(ids, |id| self.clean(id));
    }

    pub fn test_all(&self, ids: &[UnitId]) {
        self.each(ids, |id| {
            let _ = self.test(id);
        });
    }

    /// Bring a unit's artifact up to date. Returns its artifact time.
    pub fn build(&self, id: UnitId) -> Result<Timestamp, Failure> {
        let unit = self.registry.get(id);
        let mut state = unit.lock();

        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }
        if state.built {
            return Ok(state.bin_time);
        }
        state.built = true;

        let mut input = unit.prebuilt_floor.max(state.source_time);
        let dep_rebuilt = match self.build_deps(unit, &unit.deps) {
            Ok((time, rebuilt)) => {
                input = input.max(time);
                rebuilt
            }
            Err(failure) => {
                state.fail(failure.clone());
                return Err(failure);
            }
        };

        for import in &unit.fetch {
            match self.fetch(import) {
                Ok(time) => input = input.max(time),
                Err(reason) => {
                    let failure = Failure::Local(reason);
                    state.fail(failure.clone());
                    return Err(failure);
                }
            }
        }

        if !unit.active {
            return Ok(state.bin_time);
        }

        // A dependency rebuilt in this run may share an mtime with our
        // artifact on coarse filesystems, so its rebuild counts on its own.
        if state.force_build || dep_rebuilt || input > state.bin_time {
            self.shell.status(Status::Building, describe(unit));
            let result = {
                let _token = self.limiter.acquire();
                self.backend.build(unit)
            };
            unit.restat(&mut state);

            let failure = match result {
                Ok(_) if !state.bin_time.is_zero() => None,
                Ok(_) => Some(format!("{} was not produced", unit.paths.build.display())),
                Err(e) => Some(format!("{:#}", e)),
            };
            if let Some(reason) = failure {
                tracing::debug!("(in {}) build failed: {}", unit.display_dir(), reason);
                self.shell
                    .error(format!("(in {}) could not build \"{}\"", unit.display_dir(), unit.target));
                let failure = Failure::Local(reason);
                state.fail(failure.clone());
                return Err(failure);
            }

            state.needs_build = false;
            state.force_build = false;
            state.needs_install = true;
            state.rebuilt = true;
            self.progress.record_built();
        } else {
            tracing::debug!("(in {}) \"{}\" is up to date", unit.display_dir(), unit.target);
            state.needs_build = false;
            unit.restat(&mut state);
        }
        Ok(state.bin_time)
    }

    /// Build every unit in `deps`, returning the newest artifact time and
    /// whether any of them was rebuilt in this run. In concurrent mode all of
    /// them are started at once; the results are then collected in order, so
    /// the first failing dependency is the one named.
    fn build_deps(&self, unit: &Unit, deps: &[UnitId]) -> Result<(Timestamp, bool), Failure> {
        let deps: Vec<UnitId> = deps.iter().copied().filter(|&d| d != unit.id).collect();
        let concurrent = self.config.modes.concurrent && deps.len() > 1;

        std::thread::scope(|s| {
            if concurrent {
                for &dep in &deps {
                    s.spawn(move || {
                        let _ = self.build(dep);
                    });
                }
            }

            let mut newest = Timestamp::ZERO;
            let mut rebuilt = false;
            for &dep in &deps {
                match self.build(dep) {
                    Ok(time) => {
                        newest = newest.max(time);
                        rebuilt |= self.registry.get(dep).lock().rebuilt;
                    }
                    Err(_) => {
                        return Err(Failure::Inherited {
                            dependency: self.registry.get(dep).target.clone(),
                        })
                    }
                }
            }
            Ok((newest, rebuilt))
        })
    }

    fn fetch(&self, import: &str) -> Result<Timestamp, String> {
        let mut fetched = self.fetched.lock();
        if let Some(result) = fetched.get(import) {
            return result.clone();
        }
        self.shell.status(Status::Fetching, format!("\"{}\"", import));
        let result = {
            let _token = self.limiter.acquire();
            self.backend.fetch(import)
        }
        .map_err(|e| format!("could not fetch \"{}\": {:#}", import, e));
        if result.is_ok() {
            self.progress.record_fetched();
        }
        fetched.insert(import.to_string(), result.clone());
        result
    }

    /// Install a unit and everything it imports.
    pub fn install(&self, id: UnitId) -> Result<(), Failure> {
        let unit = self.registry.get(id);
        let mut state = unit.lock();

        if state.installed {
            return Ok(());
        }
        state.installed = true;
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }

        for &dep in &unit.deps {
            let _ = self.install(dep);
        }

        if !unit.active || unit.is_toolchain() {
            return Ok(());
        }
        if !(state.needs_install && state.inst_time < state.bin_time) {
            return Ok(());
        }

        self.shell.status(Status::Installing, describe(unit));
        let result = {
            let _token = self.limiter.acquire();
            self.backend.install(unit)
        };
        unit.restat(&mut state);

        let failure = match result {
            Ok(()) if !state.inst_time.is_zero() => None,
            Ok(()) => Some(format!("{} was not installed", unit.paths.install.display())),
            Err(e) => Some(format!("{:#}", e)),
        };
        if let Some(reason) = failure {
            self.shell
                .error(format!("(in {}) could not install \"{}\"", unit.display_dir(), unit.target));
            let failure = Failure::Local(reason);
            state.fail(failure.clone());
            return Err(failure);
        }

        state.needs_install = false;
        self.progress.record_installed();
        Ok(())
    }

    /// Remove a unit's artifacts, and those of everything it imports. The
    /// unit will be rebuilt by a later build in the same run.
    pub fn clean(&self, id: UnitId) {
        let unit = self.registry.get(id);
        let mut state = unit.lock();

        if state.cleaned {
            return;
        }
        state.cleaned = true;

        for &dep in &unit.deps {
            self.clean(dep);
        }

        if !unit.active {
            return;
        }

        self.shell.status(Status::Cleaning, describe(unit));
        let result = {
            let _token = self.limiter.acquire();
            self.backend.clean(unit)
        };
        if let Err(e) = result {
            self.shell
                .warn(format!("(in {}) clean incomplete: {:#}", unit.display_dir(), e));
        }
        unit.restat(&mut state);
        state.force_build = true;
        state.needs_build = true;
        state.needs_install = true;
        self.progress.record_cleaned();
    }

    /// Build a library and its test dependencies, then run its tests.
    ///
    /// The unit's test guard is held throughout, so a second caller waits
    /// for the first run and gets its outcome.
    pub fn test(&self, id: UnitId) -> Result<(), Failure> {
        let unit = self.registry.get(id);
        if !unit.is_testable() {
            return Ok(());
        }
        let mut outcome = unit.lock_tests();
        if let Some(result) = outcome.as_ref() {
            return result.clone();
        }
        let result = self.run_tests(id, unit);
        *outcome = Some(result.clone());
        result
    }

    fn run_tests(&self, id: UnitId, unit: &Unit) -> Result<(), Failure> {
        let prepared = self
            .build_deps(unit, &unit.test_deps)
            .and_then(|_| self.build(id).map(|_| ()));
        if let Err(failure) = prepared {
            self.progress.record_tested(false);
            return Err(failure);
        }
        if !unit.active {
            return Ok(());
        }

        let suite = TestSuite::for_unit(unit);
        if suite.is_empty() {
            tracing::debug!("(in {}) no test functions", unit.display_dir());
            return Ok(());
        }

        self.shell.status(Status::Testing, describe(unit));
        let result = {
            let _token = self.limiter.acquire();
            self.backend.test(unit, &suite)
        };
        match result {
            Ok(()) => {
                self.progress.record_tested(true);
                Ok(())
            }
            Err(e) => {
                self.progress.record_tested(false);
                self.shell
                    .error(format!("(in {}) tests failed for \"{}\"", unit.display_dir(), unit.target));
                Err(Failure::Local(format!("{:#}", e)))
            }
        }
    }
}

/// `pkg "util" (in util)`, as printed in status lines.
fn describe(unit: &Unit) -> String {
    format!("{} \"{}\" (in {})", unit.label(), unit.target, unit.display_dir())
}
