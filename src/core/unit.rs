//! The unit model: one buildable directory.
//!
//! A [`Unit`] is created by [`Unit::scan`], linked by the resolver while the
//! registry is still exclusively owned, and afterwards shared read-only across
//! threads. The only mutable part is [`UnitState`], reached through the unit's
//! own lock.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use crate::builder::backend::BackendStrategy;
use crate::core::error::UnitError;
use crate::core::extract::{self, ParseError, INTEROP_IMPORT, INTEROP_RUNTIME};
use crate::core::run_config::RunConfig;
use crate::core::source::SourceSet;
use crate::core::target::{resolve_target, ArtifactPaths, Marker, RootKind, TargetInputs};
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::fs::mtime;

/// A file modification time in nanoseconds since the Unix epoch.
/// [`Timestamp::ZERO`] stands for "no such file".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos)
    }

    pub fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// Stable index of a unit in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UnitId(pub usize);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Command,
    Library,
}

/// Why a unit cannot be considered built in this run. Sticky once set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The backend failed, or the artifact did not appear
    Local(String),
    /// A dependency failed first
    Inherited { dependency: String },
    /// Imports that are neither units, installed, nor fetchable
    Unresolved(Vec<String>),
}

impl Failure {
    pub fn to_diagnostic(&self, unit: &Unit) -> Diagnostic {
        let diag = Diagnostic::error(format!("could not build \"{}\"", unit.target))
            .with_location(&unit.dir);
        match self {
            Failure::Local(reason) => diag
                .with_context(reason.clone())
                .with_suggestion(suggestions::VERBOSE),
            Failure::Inherited { dependency } => {
                diag.with_context(format!("dependency \"{}\" failed to build", dependency))
            }
            Failure::Unresolved(imports) => diag
                .with_context(format!("unresolved imports: {}", imports.join(", ")))
                .with_suggestion(suggestions::FETCH),
        }
    }

    pub fn is_inherited(&self) -> bool {
        matches!(self, Failure::Inherited { .. })
    }
}

/// The mutable part of a unit. Only touched with the unit's lock held.
#[derive(Debug, Clone, Default)]
pub struct UnitState {
    pub source_time: Timestamp,
    pub bin_time: Timestamp,
    pub inst_time: Timestamp,

    pub needs_build: bool,
    pub needs_install: bool,
    /// Set by clean: rebuild regardless of timestamps
    pub force_build: bool,

    // once-per-run markers
    pub built: bool,
    pub installed: bool,
    pub cleaned: bool,
    /// The backend produced a new artifact in this run
    pub rebuilt: bool,

    pub failure: Option<Failure>,
}

impl UnitState {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Record a failure. An earlier failure is kept.
    pub fn fail(&mut self, failure: Failure) {
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }
}

/// One buildable directory.
#[derive(Debug)]
pub struct Unit {
    pub id: UnitId,
    pub dir: PathBuf,
    /// Directory relative to the run root, slash-separated
    pub rel_dir: String,
    pub base: String,
    /// Declared package name
    pub package: String,
    pub target: String,
    pub kind: UnitKind,
    pub active: bool,
    pub interop: bool,
    pub root: RootKind,
    pub paths: ArtifactPaths,
    pub sources: SourceSet,

    /// Raw imports of the compiled sources
    pub imports: Vec<String>,
    /// Raw imports of the test sources
    pub test_imports: Vec<String>,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
    /// Test and benchmark functions keyed by the package that declares them
    pub test_funcs: BTreeMap<String, Vec<String>>,

    pub has_makefile: bool,
    pub must_use_makefile: bool,

    // Filled in by the resolver.
    pub deps: Vec<UnitId>,
    pub test_deps: Vec<UnitId>,
    /// Newest installed artifact among imports satisfied outside the registry
    pub prebuilt_floor: Timestamp,
    pub fetch: Vec<String>,
    pub unresolved: Vec<String>,
    pub strategy: BackendStrategy,

    state: Mutex<UnitState>,
    /// Outcome of this run's test action, held while the action runs
    tests: Mutex<Option<Result<(), Failure>>>,
}

/// Result of scanning one directory.
#[derive(Debug)]
pub struct ScanOutcome {
    pub unit: Result<Unit, UnitError>,
    pub parse_errors: Vec<ParseError>,
    pub warnings: Vec<Diagnostic>,
}

impl Unit {
    /// Scan `dir` and build its unit. `rel_dir` is the directory relative to
    /// the run root and `base` the namespace inherited from its parent.
    pub fn scan(dir: &Path, rel_dir: &str, base: &str, config: &RunConfig) -> ScanOutcome {
        let mut parse_errors = Vec::new();
        let mut warnings = Vec::new();
        let unit = Self::scan_inner(dir, rel_dir, base, config, &mut parse_errors, &mut warnings);
        ScanOutcome {
            unit,
            parse_errors,
            warnings,
        }
    }

    fn scan_inner(
        dir: &Path,
        rel_dir: &str,
        base: &str,
        config: &RunConfig,
        parse_errors: &mut Vec<ParseError>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<Unit, UnitError> {
        let ctx = &config.ctx;
        let platform = ctx.platform();
        let mut sources = SourceSet::scan(dir, platform)?;

        let has_makefile = dir.join("Makefile").is_file() || dir.join("makefile").is_file();
        if RootKind::of(dir, ctx) == RootKind::Toolchain && !has_makefile {
            return Err(UnitError::ToolchainWithoutMakefile {
                dir: dir.to_path_buf(),
            });
        }

        let mut headers = Vec::new();
        for name in &sources.primary {
            match extract::extract_file(&dir.join(name), platform) {
                Ok(header) => headers.push((name.clone(), header)),
                Err(e) => {
                    tracing::debug!("{}", e);
                    parse_errors.push(e);
                }
            }
        }

        let package = headers
            .iter()
            .map(|(_, h)| h.package.as_str())
            .find(|p| *p != "main" && *p != "documentation")
            .or_else(|| headers.iter().map(|(_, h)| h.package.as_str()).find(|p| *p == "main"))
            .unwrap_or("")
            .to_string();
        let mut directive = headers.iter().find_map(|(_, h)| h.target.clone());

        let mut imports = Vec::new();
        let mut cflags = Vec::new();
        let mut ldflags = Vec::new();
        let mut interop = !sources.native.is_empty();
        for (name, header) in &headers {
            if header.package != package {
                sources.kill(name);
                continue;
            }
            if header.is_interop() {
                sources.mark_interop(name);
                interop = true;
                cflags.extend(header.cflags.iter().cloned());
                ldflags.extend(header.ldflags.iter().cloned());
                imports.push(INTEROP_RUNTIME.to_string());
            }
            imports.extend(header.imports.iter().filter(|i| *i != INTEROP_IMPORT).cloned());
        }
        extract::dedup_in_place(&mut imports);
        extract::dedup_in_place(&mut cflags);
        extract::dedup_in_place(&mut ldflags);

        let mut test_imports = Vec::new();
        let mut test_funcs: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in &sources.test {
            let header = match extract::extract_file(&dir.join(name), platform) {
                Ok(h) => h,
                Err(e) => {
                    parse_errors.push(e);
                    continue;
                }
            };
            if header.is_interop() {
                warnings.push(
                    Diagnostic::warning(format!("test source {} imports \"C\"; ignoring that import", name))
                        .with_location(dir),
                );
            }
            if directive.is_none() {
                directive = header.target.clone();
            }
            test_imports.extend(header.imports.iter().filter(|i| *i != INTEROP_IMPORT).cloned());
            test_funcs
                .entry(header.package.clone())
                .or_default()
                .extend(header.functions.iter().cloned());
        }
        extract::dedup_in_place(&mut test_imports);

        let mut source_time = Timestamp::ZERO;
        for name in sources.compiled() {
            let path = dir.join(name);
            let t = mtime(&path).ok_or(UnitError::SourceVanished { path })?;
            source_time = source_time.max(t);
        }

        let resolved = resolve_target(
            &TargetInputs {
                dir,
                rel_dir,
                base,
                is_cmd: package == "main",
                is_interop: interop,
                directive: directive.as_deref(),
                marker: Marker::read(dir),
            },
            ctx,
        )?;

        if resolved.is_cmd && interop && !resolved.must_use_makefile {
            return Err(UnitError::InteropCommand {
                dir: dir.to_path_buf(),
            });
        }

        let paths = ArtifactPaths::compute(&resolved.target, resolved.is_cmd, &resolved.root, ctx);
        let state = UnitState {
            source_time,
            bin_time: mtime(&paths.build).unwrap_or_default(),
            inst_time: mtime(&paths.install).unwrap_or_default(),
            ..UnitState::default()
        };

        Ok(Unit {
            id: UnitId(usize::MAX),
            dir: dir.to_path_buf(),
            rel_dir: rel_dir.to_string(),
            base: resolved.base,
            package,
            target: resolved.target,
            kind: if resolved.is_cmd {
                UnitKind::Command
            } else {
                UnitKind::Library
            },
            active: config.selection.is_active(resolved.is_cmd, rel_dir),
            interop,
            root: resolved.root,
            paths,
            sources,
            imports,
            test_imports,
            cflags,
            ldflags,
            test_funcs,
            has_makefile,
            must_use_makefile: resolved.must_use_makefile,
            deps: Vec::new(),
            test_deps: Vec::new(),
            prebuilt_floor: Timestamp::ZERO,
            fetch: Vec::new(),
            unresolved: Vec::new(),
            strategy: BackendStrategy::Direct,
            state: Mutex::new(state),
            tests: Mutex::new(None),
        })
    }

    pub fn is_cmd(&self) -> bool {
        self.kind == UnitKind::Command
    }

    pub fn is_toolchain(&self) -> bool {
        self.root == RootKind::Toolchain
    }

    /// Lock the mutable state. Held for the whole of an action on the unit.
    pub fn lock(&self) -> MutexGuard<'_, UnitState> {
        self.state.lock()
    }

    /// Lock the test outcome. Held for the whole test action, so it is taken
    /// before, and independently of, the state lock that building needs.
    pub fn lock_tests(&self) -> MutexGuard<'_, Option<Result<(), Failure>>> {
        self.tests.lock()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> UnitState {
        self.state.lock().clone()
    }

    /// Re-read artifact times from disk.
    pub fn restat(&self, state: &mut UnitState) {
        state.bin_time = mtime(&self.paths.build).unwrap_or_default();
        state.inst_time = mtime(&self.paths.install).unwrap_or_default();
    }

    /// `pkg`, `cmd` or `cgo`, prefixed with the root label.
    pub fn label(&self) -> String {
        let kind = match (self.kind, self.interop) {
            (UnitKind::Command, _) => "cmd",
            (UnitKind::Library, true) => "cgo",
            (UnitKind::Library, false) => "pkg",
        };
        format!("{}{}", self.root.label(), kind)
    }

    /// Directory as shown to the user: relative for local units, absolute
    /// for units in toolchain or workspace trees.
    pub fn display_dir(&self) -> String {
        if self.root.is_foreign() || self.rel_dir == "." {
            self.dir.display().to_string()
        } else {
            self.rel_dir.clone()
        }
    }

    /// Interop test sources are not supported, so the test action needs
    /// plain test files and a library to test against.
    pub fn is_testable(&self) -> bool {
        !self.is_cmd() && !self.sources.test.is_empty()
    }

    pub(crate) fn set_id(&mut self, id: UnitId) {
        self.id = id;
    }
}
