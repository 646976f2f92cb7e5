//! Reasons a directory does not become a unit.

use std::path::PathBuf;

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Broad class of a [`UnitError`], used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitErrorKind {
    /// Target naming problems, including deliberate opt-outs
    Configuration,
    /// Nothing usable in the directory, or the directory could not be read
    Scan,
}

#[derive(Debug, Error)]
pub enum UnitError {
    #[error("(in {}) directory opts out via target.gb", dir.display())]
    OptedOut { dir: PathBuf },

    #[error("(in {}) unit has no target name", dir.display())]
    EmptyTarget { dir: PathBuf },

    #[error("(in {}) no source files", dir.display())]
    NoSource { dir: PathBuf },

    #[error("`{}` disappeared during the scan", path.display())]
    SourceVanished { path: PathBuf },

    #[error("(in {}) toolchain directory without a Makefile is not meant to be built", dir.display())]
    ToolchainWithoutMakefile { dir: PathBuf },

    #[error("(in {}) toolchain library lies outside $GOROOT/src/pkg", dir.display())]
    OutsideToolchainRoot { dir: PathBuf },

    #[error("(in {}) a command cannot contain interop sources", dir.display())]
    InteropCommand { dir: PathBuf },

    #[error("(in {}) cannot read directory", dir.display())]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UnitError {
    pub fn kind(&self) -> UnitErrorKind {
        match self {
            UnitError::OptedOut { .. }
            | UnitError::EmptyTarget { .. }
            | UnitError::OutsideToolchainRoot { .. }
            | UnitError::InteropCommand { .. } => UnitErrorKind::Configuration,
            UnitError::NoSource { .. }
            | UnitError::SourceVanished { .. }
            | UnitError::ToolchainWithoutMakefile { .. }
            | UnitError::Io { .. } => UnitErrorKind::Scan,
        }
    }

    /// Whether the problem is expected during a tree walk and only worth a
    /// debug line: opt-outs, and directories that simply hold no source.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self,
            UnitError::OptedOut { .. }
                | UnitError::NoSource { .. }
                | UnitError::ToolchainWithoutMakefile { .. }
        )
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::warning(self.to_string());
        match self {
            UnitError::EmptyTarget { .. } => diag.with_suggestion(suggestions::MARKER),
            UnitError::InteropCommand { .. } => {
                diag.with_suggestion("Move the interop code into a library the command imports")
            }
            UnitError::Io { source, .. } => diag.with_context(source.to_string()),
            _ => diag,
        }
    }
}
