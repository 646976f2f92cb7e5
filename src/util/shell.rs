//! Status output for a run.
//!
//! Every line a build prints goes through [`Shell`] so that quiet mode,
//! colour, and the progress bar stay consistent across concurrent units.

use std::fmt::Display;
use std::io::{self, IsTerminal};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    #[default]
    Normal,
    /// Echo every toolchain command and pass its output through
    Verbose,
}

/// Semantic status for a line of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Building,
    Installing,
    Cleaning,
    Testing,
    Fetching,
    Running,
    Finished,
    Removed,
    Warning,
    Error,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Building => "Building",
            Status::Installing => "Installing",
            Status::Cleaning => "Cleaning",
            Status::Testing => "Testing",
            Status::Fetching => "Fetching",
            Status::Running => "Running",
            Status::Finished => "Finished",
            Status::Removed => "Removed",
            Status::Warning => "warning",
            Status::Error => "error",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Finished | Status::Removed => "\x1b[1;32m",
            Status::Warning => "\x1b[1;33m",
            Status::Error => "\x1b[1;31m",
            _ => "\x1b[1;36m",
        }
    }
}

/// Central sink for all CLI output.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
    bar: ProgressBar,
}

impl Shell {
    pub fn new(verbosity: Verbosity, color: bool) -> Self {
        Shell {
            verbosity,
            use_color: color,
            bar: ProgressBar::hidden(),
        }
    }

    /// Shell for the interactive CLI: colour and progress only on a terminal.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        Shell::new(verbosity, io::stderr().is_terminal())
    }

    /// Shell that prints nothing but errors. Used by tests.
    pub fn quiet() -> Self {
        Shell::new(Verbosity::Quiet, false)
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print `{status:>12} {message}` to stderr.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_quiet() && status != Status::Error {
            return;
        }
        let text = status.as_str();
        let line = if self.use_color {
            format!("{}{:>12}\x1b[0m {}", status.color_code(), text, msg)
        } else {
            format!("{:>12} {}", text, msg)
        };
        self.bar.suspend(|| eprintln!("{}", line));
    }

    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    pub fn error(&self, msg: impl Display) {
        self.status(Status::Error, msg);
    }

    /// Show a bar counting finished units. Only drawn on a terminal in
    /// normal verbosity.
    pub fn start_progress(&mut self, total: u64) {
        if self.verbosity != Verbosity::Normal || !io::stderr().is_terminal() {
            return;
        }
        let style = ProgressStyle::with_template("{prefix:>12.cyan.bold} [{bar:25}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        bar.set_style(style);
        bar.set_prefix("Progress");
        self.bar = bar;
    }

    /// Count one unit as finished.
    pub fn tick(&self) {
        self.bar.inc(1);
    }

    pub fn finish_progress(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::Normal, false)
    }
}
