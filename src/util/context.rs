//! Global context for gb operations.
//!
//! Holds the resolved toolchain environment: the run root, `GOROOT`, `GOBIN`,
//! the `GOPATH` workspace roots and the target platform. Values come from the
//! environment first and fall back to the merged config files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::platform::Platform;
use crate::util::config::Config;

/// Global context containing the toolchain environment and output settings.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Directory the run was started in; all unit directories live below it
    cwd: PathBuf,

    goroot: PathBuf,
    gobin: PathBuf,
    gopath: Vec<PathBuf>,
    platform: Platform,

    verbose: bool,
    color: bool,
}

impl GlobalContext {
    /// Context for `cwd` against the toolchain at `goroot`, targeting the host.
    pub fn new(cwd: impl Into<PathBuf>, goroot: impl Into<PathBuf>) -> Self {
        let goroot = normalize(goroot.into());
        GlobalContext {
            cwd: normalize(cwd.into()),
            gobin: goroot.join("bin"),
            goroot,
            gopath: Vec::new(),
            platform: Platform::host(),
            verbose: false,
            color: false,
        }
    }

    /// Build the context from the process environment and `config`.
    pub fn from_env(config: &Config) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::from_sources(cwd, config, |key| std::env::var(key).ok())
    }

    /// Build the context from an arbitrary variable lookup.
    pub fn from_sources(
        cwd: PathBuf,
        config: &Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let tc = &config.toolchain;
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let goroot = match lookup("GOROOT").map(PathBuf::from).or_else(|| tc.goroot.clone()) {
            Some(root) => root,
            None => bail!("GOROOT is not set; set the GOROOT environment variable or `toolchain.goroot` in .gb/config.toml"),
        };
        if !goroot.is_dir() {
            bail!("GOROOT `{}` is not a directory", goroot.display());
        }

        let mut ctx = GlobalContext::new(cwd, goroot);

        let host = Platform::host();
        let os = lookup("GOOS").or_else(|| tc.goos.clone()).unwrap_or(host.os);
        let arch = lookup("GOARCH").or_else(|| tc.goarch.clone()).unwrap_or(host.arch);
        ctx.platform = Platform::new(os, arch);

        if let Some(bin) = lookup("GOBIN").map(PathBuf::from).or_else(|| tc.gobin.clone()) {
            ctx.gobin = normalize(bin);
        }

        ctx.gopath = match lookup("GOPATH") {
            Some(list) => std::env::split_paths(&list).collect(),
            None => tc.gopath.clone(),
        };
        ctx.gopath = ctx.gopath.into_iter().map(normalize).collect();

        tracing::debug!(
            "GOROOT={} GOBIN={} platform={}",
            ctx.goroot.display(),
            ctx.gobin.display(),
            ctx.platform
        );
        Ok(ctx)
    }

    pub fn with_gopath(mut self, gopath: Vec<PathBuf>) -> Self {
        self.gopath = gopath.into_iter().map(normalize).collect();
        self
    }

    pub fn with_gobin(mut self, gobin: impl Into<PathBuf>) -> Self {
        self.gobin = normalize(gobin.into());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn goroot(&self) -> &Path {
        &self.goroot
    }

    pub fn gobin(&self) -> &Path {
        &self.gobin
    }

    pub fn gopath(&self) -> &[PathBuf] {
        &self.gopath
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn color(&self) -> bool {
        self.color
    }

    /// `$GOROOT/src/cmd`, home of toolchain commands.
    pub fn toolchain_cmd_root(&self) -> PathBuf {
        self.goroot.join("src").join("cmd")
    }

    /// `$GOROOT/src/pkg`, home of the standard library.
    pub fn toolchain_pkg_root(&self) -> PathBuf {
        self.goroot.join("src").join("pkg")
    }

    /// `$GOROOT/pkg/<os>_<arch>`, where installed libraries live.
    pub fn toolchain_pkg_dir(&self) -> PathBuf {
        self.goroot.join("pkg").join(self.platform.pair())
    }

    /// `<gopath>/pkg/<os>_<arch>` for one workspace root.
    pub fn workspace_pkg_dir(&self, gopath: &Path) -> PathBuf {
        gopath.join("pkg").join(self.platform.pair())
    }

    /// The run-local library output directory.
    pub fn local_obj_dir(&self) -> PathBuf {
        self.cwd.join("_obj")
    }
}

fn normalize(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_goroot_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = GlobalContext::from_sources(tmp.path().into(), &Config::default(), env_of(&[]))
            .unwrap_err();
        assert!(err.to_string().contains("GOROOT is not set"));
    }

    #[test]
    fn test_env_overrides_config() {
        let tmp = TempDir::new().unwrap();
        let goroot = tmp.path().join("go");
        std::fs::create_dir_all(&goroot).unwrap();

        let mut config = Config::default();
        config.toolchain.goos = Some("windows".into());
        config.toolchain.goarch = Some("386".into());

        let ctx = GlobalContext::from_sources(
            tmp.path().into(),
            &config,
            env_of(&[
                ("GOROOT", goroot.display().to_string()),
                ("GOOS", "linux".into()),
            ]),
        )
        .unwrap();

        assert_eq!(ctx.platform(), &Platform::new("linux", "386"));
        assert!(ctx.gobin().ends_with("go/bin"));
        assert!(ctx.toolchain_pkg_dir().ends_with("pkg/linux_386"));
    }

    #[test]
    fn test_goroot_from_config() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.toolchain.goroot = Some(tmp.path().to_path_buf());
        let ctx = GlobalContext::from_sources(tmp.path().into(), &config, env_of(&[])).unwrap();
        assert_eq!(ctx.goroot(), tmp.path().canonicalize().unwrap());
    }
}
