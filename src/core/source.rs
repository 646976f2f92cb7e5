//! Source discovery.
//!
//! [`classify`] is a pure function from a file name to its role; it never
//! touches the filesystem. [`SourceSet::scan`] is the thin driver that lists a
//! unit directory and sorts each file into a bucket.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::core::error::UnitError;
use crate::core::platform::Platform;

/// Files produced by the interop generator. Never treated as input.
const GENERATED_NAMES: &[&str] = &[
    "_cgo_gotypes.go",
    "_cgo_import.c",
    "__cgo_import.c",
    "_cgo_main.c",
    "_cgo_defun.c",
    "_testmain.go",
];

const GENERATED_SUFFIXES: &[&str] = &[".cgo1.go", ".cgo2.c"];

/// Role of a source file within its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    /// `.go`, compiled into the unit
    Primary,
    /// `_test.go`, only compiled for the test action
    Test,
    /// `.s`
    Assembly,
    /// `.c`, handled by the interop strategy
    Native,
}

/// Why a file was skipped outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Hidden,
    EditorTemp,
    Generated,
    NotSource,
}

/// Classification of one file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Source(SourceRole),
    /// A source file whose name pins it to another OS or architecture.
    Dead(SourceRole),
    Ignored(IgnoreReason),
}

/// Classify a file name (no directory part) for `platform`.
pub fn classify(name: &str, platform: &Platform) -> FileClass {
    if name.starts_with('.') {
        return FileClass::Ignored(IgnoreReason::Hidden);
    }
    if name.starts_with('#') || name.ends_with('~') {
        return FileClass::Ignored(IgnoreReason::EditorTemp);
    }
    if GENERATED_NAMES.contains(&name) || GENERATED_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return FileClass::Ignored(IgnoreReason::Generated);
    }

    let (stem, role) = if let Some(stem) = name.strip_suffix("_test.go") {
        (stem, SourceRole::Test)
    } else if let Some(stem) = name.strip_suffix(".go") {
        (stem, SourceRole::Primary)
    } else if let Some(stem) = name.strip_suffix(".s") {
        (stem, SourceRole::Assembly)
    } else if let Some(stem) = name.strip_suffix(".c") {
        (stem, SourceRole::Native)
    } else {
        return FileClass::Ignored(IgnoreReason::NotSource);
    };

    if stem.is_empty() {
        return FileClass::Ignored(IgnoreReason::NotSource);
    }
    if platform.matches_stem(stem) {
        FileClass::Source(role)
    } else {
        FileClass::Dead(role)
    }
}

/// A unit's files, bucketed by role. All names are relative to the unit
/// directory and sorted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceSet {
    pub primary: Vec<String>,
    /// Primary files that import the interop pseudo-package
    pub interop: Vec<String>,
    pub test: Vec<String>,
    pub assembly: Vec<String>,
    pub native: Vec<String>,
    /// Files present but excluded from the build
    pub dead: Vec<String>,
}

impl SourceSet {
    /// List `dir` (non-recursively) and classify every regular file.
    pub fn scan(dir: &Path, platform: &Platform) -> Result<Self, UnitError> {
        let entries = fs::read_dir(dir).map_err(|source| UnitError::Io {
            dir: dir.to_path_buf(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| UnitError::Io {
                dir: dir.to_path_buf(),
                source,
            })?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        let set = Self::from_names(names.iter().map(String::as_str), platform);
        if !set.has_buildable() {
            return Err(UnitError::NoSource {
                dir: dir.to_path_buf(),
            });
        }
        Ok(set)
    }

    /// Bucket already-listed names. Pure; used by [`SourceSet::scan`].
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>, platform: &Platform) -> Self {
        let mut set = SourceSet::default();
        for name in names {
            match classify(name, platform) {
                FileClass::Source(role) => set.bucket_mut(role).push(name.to_string()),
                FileClass::Dead(_) => set.dead.push(name.to_string()),
                FileClass::Ignored(reason) => {
                    tracing::trace!("ignoring {} ({:?})", name, reason);
                }
            }
        }
        set
    }

    fn bucket_mut(&mut self, role: SourceRole) -> &mut Vec<String> {
        match role {
            SourceRole::Primary => &mut self.primary,
            SourceRole::Test => &mut self.test,
            SourceRole::Assembly => &mut self.assembly,
            SourceRole::Native => &mut self.native,
        }
    }

    /// True when there is something for the toolchain to compile.
    pub fn has_buildable(&self) -> bool {
        !(self.primary.is_empty()
            && self.interop.is_empty()
            && self.test.is_empty()
            && self.assembly.is_empty())
    }

    /// Files whose timestamps define the unit's source time.
    pub fn compiled(&self) -> impl Iterator<Item = &String> {
        self.primary
            .iter()
            .chain(&self.interop)
            .chain(&self.assembly)
            .chain(&self.native)
    }

    /// Move `name` from the primary bucket to the dead set.
    pub(crate) fn kill(&mut self, name: &str) {
        if let Some(pos) = self.primary.iter().position(|s| s == name) {
            let dead = self.primary.remove(pos);
            self.dead.push(dead);
            self.dead.sort();
        }
    }

    /// Move `name` from the primary bucket into the interop bucket.
    pub(crate) fn mark_interop(&mut self, name: &str) {
        if let Some(pos) = self.primary.iter().position(|s| s == name) {
            let file = self.primary.remove(pos);
            self.interop.push(file);
        }
    }
}
