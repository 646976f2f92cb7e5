//! Resolution error types and diagnostics.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error found while linking units together.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ResolveError {
    /// Blocks the named unit only.
    #[error("(in {}) unresolved imports for \"{target}\": {}", dir.display(), imports.join(", "))]
    #[diagnostic(code(gb::resolve::unresolved), help("pass --fetch to fetch remote imports"))]
    Unresolved {
        target: String,
        dir: PathBuf,
        imports: Vec<String>,
    },

    /// Blocks the whole run. `path` starts and ends with the same target.
    #[error("import cycle: {}", path.join(" -> "))]
    #[diagnostic(
        code(gb::resolve::cycle),
        help("break the cycle by moving the shared code into a new unit")
    )]
    Cycle { path: Vec<String> },

    /// The second directory is skipped.
    #[error("target \"{target}\" is claimed by both {} and {}", first.display(), second.display())]
    #[diagnostic(code(gb::resolve::duplicate_target))]
    DuplicateTarget {
        target: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl ResolveError {
    /// Whether the error stops the run before anything is built.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ResolveError::Cycle { .. })
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::Unresolved {
                target,
                dir,
                imports,
            } => {
                let mut diag = Diagnostic::error(format!("cannot resolve imports of \"{}\"", target))
                    .with_location(dir);
                for import in imports {
                    diag = diag.with_context(format!(
                        "\"{}\" is not in this tree, not installed, and not fetched",
                        import
                    ));
                }
                diag.with_suggestion(suggestions::FETCH)
                    .with_suggestion("Run gb from a directory that contains the imported units")
            }

            ResolveError::Cycle { path } => Diagnostic::error("import cycle detected")
                .with_context(format!("cycle: {}", path.join(" -> ")))
                .with_suggestion("Break the cycle by removing or restructuring imports"),

            ResolveError::DuplicateTarget {
                target,
                first,
                second,
            } => Diagnostic::warning(format!("duplicate target \"{}\"", target))
                .with_context(format!("registered from {}", first.display()))
                .with_context(format!("ignored in {}", second.display()))
                .with_suggestion(suggestions::MARKER),
        }
    }
}
