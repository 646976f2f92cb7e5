//! User-facing diagnostic messages.
//!
//! Every broken target, unresolved import, and scan problem in a run ends up as
//! a [`Diagnostic`]. The run report prints them after the summary counts.

use std::fmt;
use std::path::PathBuf;

/// Canned suggestions shared across error types.
pub mod suggestions {
    pub const VERBOSE: &str = "Run again with `--verbose` to see the toolchain output";
    pub const FETCH: &str = "Pass `--fetch` to fetch remote imports on demand";
    pub const GOROOT: &str = "Set GOROOT or `toolchain.goroot` in .gb/config.toml";
    pub const MARKER: &str = "Create a `target.gb` file naming the target, or run gb from a parent directory";
    pub const MAKEFILE: &str = "Add a Makefile to the directory to build interop sources";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional context and suggestions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    pub suggestions: Vec<String>,
    /// Directory or file the message is about
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let label = match (self.severity, color) {
            (Severity::Error, true) => "\x1b[1;31merror\x1b[0m",
            (Severity::Warning, true) => "\x1b[1;33mwarning\x1b[0m",
            (Severity::Error, false) => "error",
            (Severity::Warning, false) => "warning",
        };

        let mut out = format!("{}: {}\n", label, self.message);
        if let Some(path) = &self.location {
            out.push_str(&format!("  --> {}\n", path.display()));
        }
        for line in &self.context {
            out.push_str(&format!("  = {}\n", line));
        }
        if !self.suggestions.is_empty() {
            let help = if color { "\x1b[1;32mhelp\x1b[0m" } else { "help" };
            for suggestion in &self.suggestions {
                out.push_str(&format!("{}: {}\n", help, suggestion));
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("could not build \"util\"")
            .with_location("src/util")
            .with_context("6g exited with status 1")
            .with_suggestion(suggestions::VERBOSE);

        let output = diag.format(false);
        assert!(output.starts_with("error: could not build \"util\""));
        assert!(output.contains("--> src/util"));
        assert!(output.contains("= 6g exited"));
        assert!(output.contains("help: Run again"));
    }

    #[test]
    fn test_warning_severity() {
        let diag = Diagnostic::warning("artifact not newer than inputs");
        assert!(!diag.is_error());
        assert!(diag.format(false).starts_with("warning:"));
    }
}
