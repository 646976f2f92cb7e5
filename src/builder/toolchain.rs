//! Toolchain command generation.
//!
//! Knows the names and argument conventions of the compiler, assembler,
//! linker and packer for a target platform, plus the external `make` and
//! fetch tools. Only builds [`CommandSpec`]s; running them is the backend's
//! job.

use std::path::{Path, PathBuf};

use crate::core::platform::Platform;
use crate::util::config::ToolchainSettings;
use crate::util::process::resolve_tool;

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Input for a compile step. Sources are relative to the working directory.
#[derive(Debug, Clone)]
pub struct CompileInput {
    pub sources: Vec<String>,
    pub output: PathBuf,
    /// Directories searched for imported library archives
    pub include_dirs: Vec<PathBuf>,
}

/// Input for a pack step (creating a library archive).
#[derive(Debug, Clone)]
pub struct ArchiveInput {
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Input for a link step.
#[derive(Debug, Clone)]
pub struct LinkInput {
    pub main_object: PathBuf,
    pub output: PathBuf,
    pub lib_dirs: Vec<PathBuf>,
}

/// Resolved tool paths for one target platform.
#[derive(Debug, Clone)]
pub struct Toolchain {
    platform: Platform,
    compiler: PathBuf,
    assembler: PathBuf,
    linker: PathBuf,
    packer: PathBuf,
    make: PathBuf,
    fetcher: PathBuf,
}

impl Toolchain {
    /// Resolve every tool: configured paths first, then `PATH`.
    pub fn new(settings: &ToolchainSettings, platform: &Platform) -> Self {
        let c = platform.tool_char();
        Toolchain {
            platform: platform.clone(),
            compiler: resolve_tool(&format!("{}g", c), settings.compiler.as_deref()),
            assembler: resolve_tool(&format!("{}a", c), settings.assembler.as_deref()),
            linker: resolve_tool(&format!("{}l", c), settings.linker.as_deref()),
            packer: resolve_tool("gopack", settings.packer.as_deref()),
            make: resolve_tool("make", settings.make.as_deref()),
            fetcher: resolve_tool("goinstall", settings.fetcher.as_deref()),
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn compiler_path(&self) -> &Path {
        &self.compiler
    }

    /// Object file extension, e.g. `.6` on amd64.
    pub fn object_extension(&self) -> String {
        self.platform.obj_suffix()
    }

    pub fn exe_extension(&self) -> &'static str {
        self.platform.exe_suffix()
    }

    /// Intermediate object for a unit's primary sources.
    pub fn intermediate_name(&self) -> String {
        format!("_go_{}", self.object_extension())
    }

    pub fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.compiler);
        for dir in &input.include_dirs {
            cmd = cmd.arg("-I").arg(dir.display().to_string());
        }
        cmd.arg("-o")
            .arg(input.output.display().to_string())
            .args(input.sources.iter().cloned())
    }

    /// Assemble one `.s` file; the object lands next to it.
    pub fn assemble_command(&self, source: &str) -> (CommandSpec, PathBuf) {
        let stem = source.strip_suffix(".s").unwrap_or(source);
        let output = PathBuf::from(format!("{}{}", stem, self.object_extension()));
        let cmd = CommandSpec::new(&self.assembler)
            .arg("-o")
            .arg(output.display().to_string())
            .arg(source);
        (cmd, output)
    }

    pub fn pack_command(&self, input: &ArchiveInput) -> CommandSpec {
        CommandSpec::new(&self.packer)
            .arg("grc")
            .arg(input.output.display().to_string())
            .args(input.objects.iter().map(|o| o.display().to_string()))
    }

    pub fn link_command(&self, input: &LinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.linker);
        for dir in &input.lib_dirs {
            cmd = cmd.arg("-L").arg(dir.display().to_string());
        }
        cmd.arg("-o")
            .arg(input.output.display().to_string())
            .arg(input.main_object.display().to_string())
    }

    /// `make` with the given goals (none means the default goal).
    pub fn make_command(&self, goals: &[&str]) -> CommandSpec {
        CommandSpec::new(&self.make).args(goals.iter().copied())
    }

    pub fn fetch_command(&self, import: &str) -> CommandSpec {
        CommandSpec::new(&self.fetcher).arg(import)
    }
}
