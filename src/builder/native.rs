//! Process-spawning build backend.
//!
//! Drives the platform toolchain directly for plain units and delegates to
//! `make` for units that have to be built through their Makefile.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::builder::backend::{Backend, BackendStrategy};
use crate::builder::testmain::{TestSuite, TESTMAIN_FILE};
use crate::builder::toolchain::{ArchiveInput, CommandSpec, CompileInput, LinkInput, Toolchain};
use crate::core::target::RootKind;
use crate::core::unit::{Timestamp, Unit};
use crate::resolver::prebuilt_time;
use crate::util::context::GlobalContext;
use crate::util::fs::{copy_file, ensure_dir, mtime, remove_dir_all_if_exists, remove_file_if_exists, write_string};
use crate::util::process::ProcessBuilder;

/// Directory inside a unit that holds test build products.
pub const TEST_DIR: &str = "_test";

/// Directory inside an interop unit that holds generated interop files.
pub const INTEROP_DIR: &str = "_cgo";

/// The backend used by real runs.
pub struct NativeBackend {
    toolchain: Toolchain,
    ctx: GlobalContext,
    verbose: bool,
}

impl NativeBackend {
    pub fn new(toolchain: Toolchain, ctx: GlobalContext) -> Self {
        let verbose = ctx.is_verbose();
        NativeBackend {
            toolchain,
            ctx,
            verbose,
        }
    }

    /// Pass tool output straight through instead of capturing it.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Archive directories a unit compiles and links against.
    fn search_dirs(&self, unit: &Unit) -> Vec<PathBuf> {
        if unit.root == RootKind::Toolchain {
            return Vec::new();
        }
        let mut dirs = vec![self.ctx.local_obj_dir()];
        dirs.extend(self.ctx.gopath().iter().map(|gp| self.ctx.workspace_pkg_dir(gp)));
        dirs
    }

    fn run(&self, spec: CommandSpec, cwd: &Path, what: &str) -> Result<()> {
        let cmd = self.process_builder_from_spec(spec).cwd(cwd).passthrough(self.verbose);
        let output = cmd.exec()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            bail!(
                "{} failed in {}: `{}`\n{}{}",
                what,
                cwd.display(),
                cmd.display_command(),
                stdout.trim_end(),
                stderr.trim_end()
            );
        }
        Ok(())
    }

    fn make(&self, unit: &Unit, goals: &[&str]) -> Result<()> {
        let mut spec = self.toolchain.make_command(goals);
        if unit.strategy == BackendStrategy::Interop {
            spec = spec
                .env("CGO_CFLAGS", unit.cflags.join(" "))
                .env("CGO_LDFLAGS", unit.ldflags.join(" "));
        }
        let what = if goals.is_empty() {
            "make".to_string()
        } else {
            format!("make {}", goals.join(" "))
        };
        self.run(spec, &unit.dir, &what)
    }

    /// Compile, assemble, then link or pack.
    fn build_direct(&self, unit: &Unit) -> Result<()> {
        let search = self.search_dirs(unit);
        let ib = PathBuf::from(self.toolchain.intermediate_name());

        let compile = self.toolchain.compile_command(&CompileInput {
            sources: unit.sources.primary.clone(),
            output: ib.clone(),
            include_dirs: search.clone(),
        });
        tracing::debug!("compiling {} sources in {}", unit.sources.primary.len(), unit.dir.display());
        self.run(compile, &unit.dir, "compilation")?;
        if !unit.dir.join(&ib).exists() {
            bail!("compiler produced no {} in {}", ib.display(), unit.dir.display());
        }

        let mut objects = vec![ib.clone()];
        for source in &unit.sources.assembly {
            let (spec, obj) = self.toolchain.assemble_command(source);
            self.run(spec, &unit.dir, "assembly")?;
            objects.push(obj);
        }

        let output = &unit.paths.build;
        if let Some(parent) = output.parent() {
            ensure_dir(parent)?;
        }
        if unit.is_cmd() {
            let link = self.toolchain.link_command(&LinkInput {
                main_object: ib,
                output: output.clone(),
                lib_dirs: search,
            });
            tracing::debug!("linking {}", output.display());
            self.run(link, &unit.dir, "linking")
        } else {
            let _ = remove_file_if_exists(output)?;
            let pack = self.toolchain.pack_command(&ArchiveInput {
                objects,
                output: output.clone(),
            });
            tracing::debug!("packing {}", output.display());
            self.run(pack, &unit.dir, "packing")
        }
    }

    /// Compile the unit together with its tests, then build and run the
    /// generated driver.
    fn test_direct(&self, unit: &Unit, suite: &TestSuite) -> Result<()> {
        let test_dir = unit.dir.join(TEST_DIR);
        remove_dir_all_if_exists(&test_dir)?;
        write_string(&test_dir.join(TESTMAIN_FILE), &suite.render())?;

        let search = self.search_dirs(unit);
        let ext = self.toolchain.object_extension();
        let test_ib = PathBuf::from(TEST_DIR).join(format!("_gotest_{}", ext));

        let mut sources = unit.sources.primary.clone();
        sources.extend(unit.sources.test.iter().cloned());
        let compile = self.toolchain.compile_command(&CompileInput {
            sources,
            output: test_ib.clone(),
            include_dirs: search.clone(),
        });
        self.run(compile, &unit.dir, "test compilation")?;

        let test_obj_dir = PathBuf::from(TEST_DIR).join("_obj");
        let archive = test_obj_dir.join(format!("{}.a", unit.target));
        if let Some(parent) = unit.dir.join(&archive).parent() {
            ensure_dir(parent)?;
        }
        let pack = self.toolchain.pack_command(&ArchiveInput {
            objects: vec![test_ib],
            output: archive,
        });
        self.run(pack, &unit.dir, "test packing")?;

        let main_ib = PathBuf::from(TEST_DIR).join(format!("_testmain{}", ext));
        let mut dirs = vec![test_obj_dir];
        dirs.extend(search);
        let compile_main = self.toolchain.compile_command(&CompileInput {
            sources: vec![PathBuf::from(TEST_DIR).join(TESTMAIN_FILE).display().to_string()],
            output: main_ib.clone(),
            include_dirs: dirs.clone(),
        });
        self.run(compile_main, &unit.dir, "test driver compilation")?;

        let binary = PathBuf::from(TEST_DIR).join(format!("_testmain{}", self.toolchain.exe_extension()));
        let link = self.toolchain.link_command(&LinkInput {
            main_object: main_ib,
            output: binary.clone(),
            lib_dirs: dirs,
        });
        self.run(link, &unit.dir, "test driver linking")?;

        let runner = CommandSpec::new(unit.dir.join(&binary));
        self.run(runner, &unit.dir, "tests")
    }

    fn process_builder_from_spec(&self, spec: CommandSpec) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(&spec.program);

        for arg in spec.args {
            cmd = cmd.arg(arg);
        }

        for (key, value) in spec.env {
            cmd = cmd.env(key, value);
        }

        cmd
    }
}

impl Backend for NativeBackend {
    fn build(&self, unit: &Unit) -> Result<Timestamp> {
        match unit.strategy {
            BackendStrategy::Direct => self.build_direct(unit)?,
            BackendStrategy::Makefile if unit.is_toolchain() => self.make(unit, &["install"])?,
            BackendStrategy::Makefile => self.make(unit, &[])?,
            BackendStrategy::Interop => {
                if !unit.has_makefile {
                    bail!(
                        "interop unit \"{}\" needs a Makefile in {}",
                        unit.target,
                        unit.dir.display()
                    );
                }
                self.make(unit, &[])?
            }
        }
        mtime(&unit.paths.build)
            .with_context(|| format!("{} was not produced", unit.paths.build.display()))
    }

    fn install(&self, unit: &Unit) -> Result<()> {
        if unit.strategy == BackendStrategy::Makefile {
            return self.make(unit, &["install"]);
        }
        tracing::debug!(
            "copying {} to {}",
            unit.paths.build.display(),
            unit.paths.install.display()
        );
        copy_file(&unit.paths.build, &unit.paths.install)
    }

    fn clean(&self, unit: &Unit) -> Result<()> {
        if unit.has_makefile && unit.strategy != BackendStrategy::Direct {
            self.make(unit, &["clean"])?;
        }

        let mut removed = Vec::new();
        let ext = self.toolchain.object_extension();
        let mut objects = vec![unit.dir.join(self.toolchain.intermediate_name())];
        objects.extend(unit.sources.assembly.iter().map(|s| {
            let stem = s.strip_suffix(".s").unwrap_or(s);
            unit.dir.join(format!("{}{}", stem, ext))
        }));
        if !unit.is_toolchain() {
            objects.push(unit.paths.build.clone());
        }
        for path in objects {
            if remove_file_if_exists(&path)? {
                removed.push(path);
            }
        }
        for dir in [TEST_DIR, INTEROP_DIR] {
            let path = unit.dir.join(dir);
            if remove_dir_all_if_exists(&path)? {
                removed.push(path);
            }
        }
        for path in &removed {
            tracing::debug!("removed {}", path.display());
        }
        Ok(())
    }

    fn test(&self, unit: &Unit, suite: &TestSuite) -> Result<()> {
        if unit.has_makefile && unit.strategy != BackendStrategy::Direct {
            return self.make(unit, &["test"]);
        }
        self.test_direct(unit, suite)
    }

    fn fetch(&self, import: &str) -> Result<Timestamp> {
        let spec = self.toolchain.fetch_command(import);
        self.run(spec, self.ctx.cwd(), "fetch")?;
        prebuilt_time(import, &self.ctx)
            .with_context(|| format!("fetched \"{}\" but found no installed archive", import))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Platform;
    use crate::core::run_config::RunConfig;
    use crate::util::config::ToolchainSettings;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RunConfig) {
        let tmp = TempDir::new().unwrap();
        let goroot = tmp.path().join("goroot");
        let work = tmp.path().join("work");
        std::fs::create_dir_all(&goroot).unwrap();
        std::fs::create_dir_all(&work).unwrap();
        let cfg = RunConfig::new(
            GlobalContext::new(work, goroot).with_platform(Platform::new("linux", "amd64")),
        );
        (tmp, cfg)
    }

    fn backend(cfg: &RunConfig, settings: ToolchainSettings) -> NativeBackend {
        NativeBackend::new(
            Toolchain::new(&settings, cfg.ctx.platform()),
            cfg.ctx.clone(),
        )
    }

    fn scan(cfg: &RunConfig, rel: &str, files: &[(&str, &str)]) -> Unit {
        let dir = cfg.ctx.cwd().join(rel);
        std::fs::create_dir_all(&dir).unwrap();
        for (name, body) in files {
            std::fs::write(dir.join(name), body).unwrap();
        }
        let mut unit = Unit::scan(&dir, rel, rel, cfg).unit.unwrap();
        unit.strategy = BackendStrategy::select(&unit, &cfg.modes);
        unit
    }

    #[test]
    fn test_search_dirs_for_local_unit() {
        let (_tmp, cfg) = setup();
        let ctx = cfg.ctx.clone().with_gopath(vec![PathBuf::from("/gp")]);
        let be = NativeBackend::new(Toolchain::new(&ToolchainSettings::default(), ctx.platform()), ctx.clone());
        let unit = scan(&cfg, "util", &[("util.go", "package util\n")]);
        let dirs = be.search_dirs(&unit);
        assert_eq!(dirs[0], ctx.local_obj_dir());
        assert_eq!(dirs[1], PathBuf::from("/gp/pkg/linux_amd64"));
    }

    #[test]
    fn test_install_copies_artifact() {
        let (_tmp, cfg) = setup();
        let be = backend(&cfg, ToolchainSettings::default());
        let unit = scan(&cfg, "util", &[("util.go", "package util\n")]);
        write_string(&unit.paths.build, "!<arch>\n").unwrap();
        be.install(&unit).unwrap();
        assert_eq!(std::fs::read_to_string(&unit.paths.install).unwrap(), "!<arch>\n");
    }

    #[test]
    fn test_clean_removes_products() {
        let (_tmp, cfg) = setup();
        let be = backend(&cfg, ToolchainSettings::default());
        let unit = scan(
            &cfg,
            "util",
            &[("util.go", "package util\n"), ("mem_amd64.s", "TEXT\n")],
        );
        write_string(&unit.paths.build, "!<arch>\n").unwrap();
        write_string(&unit.dir.join("_go_.6"), "obj").unwrap();
        write_string(&unit.dir.join("mem_amd64.6"), "obj").unwrap();
        write_string(&unit.dir.join("_test/_testmain.go"), "package main\n").unwrap();

        be.clean(&unit).unwrap();
        assert!(!unit.paths.build.exists());
        assert!(!unit.dir.join("_go_.6").exists());
        assert!(!unit.dir.join("mem_amd64.6").exists());
        assert!(!unit.dir.join("_test").exists());
        assert!(unit.dir.join("util.go").exists());
    }

    #[test]
    fn test_interop_without_makefile_fails() {
        let (_tmp, cfg) = setup();
        let be = backend(&cfg, ToolchainSettings::default());
        let unit = scan(&cfg, "z", &[("z.go", "package z\nimport \"C\"\n")]);
        assert_eq!(unit.strategy, BackendStrategy::Interop);
        let err = be.build(&unit).unwrap_err();
        assert!(err.to_string().contains("needs a Makefile"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_compiler_is_reported() {
        let (_tmp, cfg) = setup();
        let settings = ToolchainSettings {
            compiler: Some(PathBuf::from("false")),
            ..ToolchainSettings::default()
        };
        let be = backend(&cfg, settings);
        let unit = scan(&cfg, "util", &[("util.go", "package util\n")]);
        let err = be.build(&unit).unwrap_err();
        assert!(err.to_string().contains("compilation failed"));
        assert!(!unit.paths.build.exists());
    }
}
