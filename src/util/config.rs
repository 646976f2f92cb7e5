//! Configuration file support for gb.
//!
//! Two locations are read:
//! - Global: `~/.gb/config.toml` - user-wide defaults
//! - Project: `.gb/config.toml` in the run root - overrides for this tree
//!
//! Project values win over global ones. Environment variables and CLI flags
//! are layered on top of the merged file by [`crate::util::context`] and
//! [`crate::core::run_config`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// gb configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub build: BuildConfig,
    pub toolchain: ToolchainSettings,
}

/// Scheduling defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Cap on simultaneously running toolchain processes (None = CPU count)
    pub jobs: Option<usize>,

    /// Speculatively start dependency builds in parallel
    pub concurrent: Option<bool>,

    /// Prefer an existing Makefile over direct compilation
    pub makefiles: Option<bool>,

    /// Fetch remote imports that are neither local nor installed
    pub fetch: Option<bool>,
}

/// Toolchain location and tool overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    pub goroot: Option<PathBuf>,
    pub gobin: Option<PathBuf>,
    pub gopath: Vec<PathBuf>,
    pub goos: Option<String>,
    pub goarch: Option<String>,

    pub compiler: Option<PathBuf>,
    pub linker: Option<PathBuf>,
    pub packer: Option<PathBuf>,
    pub assembler: Option<PathBuf>,
    pub make: Option<PathBuf>,
    pub fetcher: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration, falling back to defaults when missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("ignoring config {}: {:#}", path.display(), e);
            Self::default()
        })
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let b = other.build;
        self.build.jobs = b.jobs.or(self.build.jobs);
        self.build.concurrent = b.concurrent.or(self.build.concurrent);
        self.build.makefiles = b.makefiles.or(self.build.makefiles);
        self.build.fetch = b.fetch.or(self.build.fetch);

        let t = other.toolchain;
        let mine = &mut self.toolchain;
        mine.goroot = t.goroot.or(mine.goroot.take());
        mine.gobin = t.gobin.or(mine.gobin.take());
        if !t.gopath.is_empty() {
            mine.gopath = t.gopath;
        }
        mine.goos = t.goos.or(mine.goos.take());
        mine.goarch = t.goarch.or(mine.goarch.take());
        mine.compiler = t.compiler.or(mine.compiler.take());
        mine.linker = t.linker.or(mine.linker.take());
        mine.packer = t.packer.or(mine.packer.take());
        mine.assembler = t.assembler.or(mine.assembler.take());
        mine.make = t.make.or(mine.make.take());
        mine.fetcher = t.fetcher.or(mine.fetcher.take());
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.gb/config.toml)
/// 2. Global config (~/.gb/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();
    if let Some(global) = global_path {
        config.merge(Config::load_or_default(global));
    }
    config.merge(Config::load_or_default(project_path));
    config
}

/// The global gb config directory (~/.gb).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".gb"))
}

/// The global config path (~/.gb/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// The project config path (.gb/config.toml under `root`).
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(".gb").join("config.toml")
}
