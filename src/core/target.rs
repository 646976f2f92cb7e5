//! Target naming and artifact paths.
//!
//! A unit's target comes from, in order: a `target.gb` marker file, the first
//! `//target:` directive in its sources, or its position in the tree. The
//! target plus the unit's kind and root decide where its artifact is built and
//! where it is installed.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::error::UnitError;
use crate::util::context::GlobalContext;
use crate::util::fs::{slash_path, strip_root};

/// Marker file naming a directory's target.
pub const MARKER_FILE: &str = "target.gb";

/// Default library target for the top-level directory.
pub const LOCAL_ROOT_LIBRARY: &str = "localpkg";

/// Default command target for the top-level directory.
pub const LOCAL_ROOT_COMMAND: &str = "main";

/// Which tree a unit belongs to. Toolchain and workspace trees own their
/// layout, so their build and install paths coincide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum RootKind {
    /// Under `$GOROOT/src`
    Toolchain,
    /// Under `<gopath>/src` for one `GOPATH` entry
    Workspace(PathBuf),
    /// Anywhere else
    Local,
}

impl RootKind {
    /// Classify an absolute directory.
    pub fn of(dir: &Path, ctx: &GlobalContext) -> RootKind {
        if dir.starts_with(ctx.goroot().join("src")) {
            return RootKind::Toolchain;
        }
        ctx.gopath()
            .iter()
            .find(|gp| dir.starts_with(gp.join("src")))
            .map(|gp| RootKind::Workspace(gp.clone()))
            .unwrap_or(RootKind::Local)
    }

    pub fn is_foreign(&self) -> bool {
        !matches!(self, RootKind::Local)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RootKind::Toolchain => "goroot ",
            RootKind::Workspace(_) => "gopath ",
            RootKind::Local => "",
        }
    }
}

/// What a marker file says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Named(String),
    OptOut,
}

impl Marker {
    /// Interpret the first line of a marker file.
    pub fn parse(line: &str) -> Marker {
        match line.trim() {
            "-" | "--" => Marker::OptOut,
            name => Marker::Named(name.to_string()),
        }
    }

    /// Read `dir/target.gb`, if there is one.
    pub fn read(dir: &Path) -> Option<Marker> {
        crate::util::fs::read_first_line(&dir.join(MARKER_FILE)).map(|l| Marker::parse(&l))
    }
}

/// Everything target naming looks at.
#[derive(Debug, Clone)]
pub struct TargetInputs<'a> {
    /// Absolute unit directory
    pub dir: &'a Path,
    /// Directory relative to the run root, slash-separated, `.` for the root
    pub rel_dir: &'a str,
    /// Namespace inherited from the parent directory
    pub base: &'a str,
    pub is_cmd: bool,
    pub is_interop: bool,
    pub directive: Option<&'a str>,
    pub marker: Option<Marker>,
}

/// Outcome of target naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub target: String,
    /// Namespace handed down to subdirectories
    pub base: String,
    pub is_cmd: bool,
    pub root: RootKind,
    /// Toolchain commands are only ever built through their Makefile
    pub must_use_makefile: bool,
}

/// Name a unit.
pub fn resolve_target(
    inputs: &TargetInputs<'_>,
    ctx: &GlobalContext,
) -> Result<ResolvedTarget, UnitError> {
    let root = RootKind::of(inputs.dir, ctx);
    let mut is_cmd = inputs.is_cmd;
    let mut must_use_makefile = false;
    let mut base = inputs.base.to_string();

    let explicit = match &inputs.marker {
        Some(Marker::OptOut) => {
            return Err(UnitError::OptedOut {
                dir: inputs.dir.to_path_buf(),
            })
        }
        Some(Marker::Named(name)) => Some(name.clone()),
        None => inputs.directive.map(str::to_string),
    };

    let target = if let Some(name) = explicit {
        base = name.clone();
        name
    } else {
        match &root {
            RootKind::Toolchain => {
                toolchain_position(inputs, ctx, &mut is_cmd, &mut must_use_makefile)?
            }
            RootKind::Workspace(gp) if !is_cmd => {
                strip_root(&gp.join("src"), inputs.dir)
                    .map(|rel| slash_path(&rel))
                    .unwrap_or_default()
            }
            _ => local_position(inputs, is_cmd),
        }
    };

    let mut target = clean_path(&target);
    if target.is_empty() || target == "." {
        return Err(UnitError::EmptyTarget {
            dir: inputs.dir.to_path_buf(),
        });
    }
    if is_cmd {
        target.push_str(ctx.platform().exe_suffix());
    }

    Ok(ResolvedTarget {
        target,
        base: clean_path(&base),
        is_cmd,
        root,
        must_use_makefile,
    })
}

fn toolchain_position(
    inputs: &TargetInputs<'_>,
    ctx: &GlobalContext,
    is_cmd: &mut bool,
    must_use_makefile: &mut bool,
) -> Result<String, UnitError> {
    if let Some(rel) = strip_root(&ctx.toolchain_cmd_root(), inputs.dir) {
        if !*is_cmd {
            // Tool sources under src/cmd are C programs built by their Makefile.
            if inputs.is_interop {
                return Err(UnitError::InteropCommand {
                    dir: inputs.dir.to_path_buf(),
                });
            }
            *is_cmd = true;
            *must_use_makefile = true;
        }
        return Ok(slash_path(&rel));
    }
    if *is_cmd {
        return Ok(local_position(inputs, true));
    }
    strip_root(&ctx.toolchain_pkg_root(), inputs.dir)
        .map(|rel| slash_path(&rel))
        .ok_or_else(|| UnitError::OutsideToolchainRoot {
            dir: inputs.dir.to_path_buf(),
        })
}

fn local_position(inputs: &TargetInputs<'_>, is_cmd: bool) -> String {
    if is_cmd {
        return match inputs.dir.file_name() {
            Some(name) if inputs.rel_dir != "." => name.to_string_lossy().into_owned(),
            _ => LOCAL_ROOT_COMMAND.to_string(),
        };
    }
    if inputs.base == "." {
        return LOCAL_ROOT_LIBRARY.to_string();
    }
    if inputs.base == inputs.rel_dir {
        if let Some(rest) = inputs.rel_dir.strip_prefix("pkg/") {
            return rest.to_string();
        }
    }
    inputs.base.to_string()
}

/// Normalise a slash path: drop empty and `.` segments, fold `..`.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Where a unit's artifact is produced and where it is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub build: PathBuf,
    pub install: PathBuf,
}

impl ArtifactPaths {
    pub fn compute(target: &str, is_cmd: bool, root: &RootKind, ctx: &GlobalContext) -> Self {
        let lib = format!("{}.a", target);
        match root {
            RootKind::Toolchain => {
                let path = if is_cmd {
                    ctx.gobin().join(target)
                } else {
                    ctx.toolchain_pkg_dir().join(&lib)
                };
                ArtifactPaths {
                    build: path.clone(),
                    install: path,
                }
            }
            RootKind::Workspace(gp) => {
                let path = if is_cmd {
                    gp.join("bin").join(target)
                } else {
                    ctx.workspace_pkg_dir(gp).join(&lib)
                };
                ArtifactPaths {
                    build: path.clone(),
                    install: path,
                }
            }
            RootKind::Local => {
                if is_cmd {
                    ArtifactPaths {
                        build: ctx.cwd().join(target),
                        install: ctx.gobin().join(target),
                    }
                } else {
                    ArtifactPaths {
                        build: ctx.local_obj_dir().join(&lib),
                        install: ctx.toolchain_pkg_dir().join(&lib),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Platform;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        ctx: GlobalContext,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let goroot = tmp.path().join("goroot");
        let gopath = tmp.path().join("gopath");
        let work = tmp.path().join("work");
        for d in [&goroot, &gopath, &work] {
            std::fs::create_dir_all(d).unwrap();
        }
        let ctx = GlobalContext::new(&work, &goroot)
            .with_gopath(vec![gopath])
            .with_platform(Platform::new("linux", "amd64"));
        Fixture { _tmp: tmp, ctx }
    }

    fn inputs<'a>(dir: &'a Path, rel: &'a str, base: &'a str, is_cmd: bool) -> TargetInputs<'a> {
        TargetInputs {
            dir,
            rel_dir: rel,
            base,
            is_cmd,
            is_interop: false,
            directive: None,
            marker: None,
        }
    }

    #[test]
    fn test_local_defaults() {
        let f = fixture();
        let root = f.ctx.cwd().to_path_buf();
        let r = resolve_target(&inputs(&root, ".", ".", false), &f.ctx).unwrap();
        assert_eq!(r.target, "localpkg");

        let r = resolve_target(&inputs(&root, ".", ".", true), &f.ctx).unwrap();
        assert_eq!(r.target, "main");

        let dir = root.join("tools/lint");
        let r = resolve_target(&inputs(&dir, "tools/lint", "tools/lint", true), &f.ctx).unwrap();
        assert_eq!(r.target, "lint");

        let dir = root.join("util");
        let r = resolve_target(&inputs(&dir, "util", "util", false), &f.ctx).unwrap();
        assert_eq!(r.target, "util");
        assert!(!r.root.is_foreign());
    }

    #[test]
    fn test_pkg_prefix_stripped() {
        let f = fixture();
        let dir = f.ctx.cwd().join("pkg/net/rpc");
        let r = resolve_target(&inputs(&dir, "pkg/net/rpc", "pkg/net/rpc", false), &f.ctx).unwrap();
        assert_eq!(r.target, "net/rpc");
    }

    #[test]
    fn test_marker_beats_directive() {
        let f = fixture();
        let dir = f.ctx.cwd().join("a");
        let mut i = inputs(&dir, "a", "a", false);
        i.directive = Some("from/directive");
        assert_eq!(resolve_target(&i, &f.ctx).unwrap().target, "from/directive");

        i.marker = Some(Marker::Named("from/marker".into()));
        let r = resolve_target(&i, &f.ctx).unwrap();
        assert_eq!(r.target, "from/marker");
        assert_eq!(r.base, "from/marker");
    }

    #[test]
    fn test_marker_opt_out() {
        let f = fixture();
        let dir = f.ctx.cwd().join("vendor");
        let mut i = inputs(&dir, "vendor", "vendor", false);
        i.marker = Some(Marker::parse("--"));
        assert!(matches!(resolve_target(&i, &f.ctx), Err(UnitError::OptedOut { .. })));
    }

    #[test]
    fn test_empty_target_is_configuration_error() {
        let f = fixture();
        let dir = f.ctx.cwd().join("a");
        let mut i = inputs(&dir, "a", "a", false);
        i.directive = Some("./");
        assert!(matches!(resolve_target(&i, &f.ctx), Err(UnitError::EmptyTarget { .. })));
    }

    #[test]
    fn test_toolchain_positions() {
        let f = fixture();
        let lib = f.ctx.toolchain_pkg_root().join("container/list");
        let r = resolve_target(&inputs(&lib, "", "x", false), &f.ctx).unwrap();
        assert_eq!(r.target, "container/list");
        assert_eq!(r.root, RootKind::Toolchain);

        let tool = f.ctx.toolchain_cmd_root().join("6l");
        let r = resolve_target(&inputs(&tool, "", "x", false), &f.ctx).unwrap();
        assert!(r.is_cmd);
        assert!(r.must_use_makefile);
        assert_eq!(r.target, "6l");

        let stray = f.ctx.goroot().join("src/lib9");
        assert!(matches!(
            resolve_target(&inputs(&stray, "", "x", false), &f.ctx),
            Err(UnitError::OutsideToolchainRoot { .. })
        ));
    }

    #[test]
    fn test_workspace_library() {
        let f = fixture();
        let gp = f.ctx.gopath()[0].clone();
        let dir = gp.join("src/github.com/u/p");
        let r = resolve_target(&inputs(&dir, "", "x", false), &f.ctx).unwrap();
        assert_eq!(r.target, "github.com/u/p");
        assert_eq!(r.root, RootKind::Workspace(gp));
    }

    #[test]
    fn test_windows_commands_get_exe() {
        let f = fixture();
        let ctx = f.ctx.clone().with_platform(Platform::new("windows", "386"));
        let dir = ctx.cwd().join("hello");
        let r = resolve_target(&inputs(&dir, "hello", "hello", true), &ctx).unwrap();
        assert_eq!(r.target, "hello.exe");
    }

    #[test]
    fn test_artifact_paths() {
        let f = fixture();
        let local_lib = ArtifactPaths::compute("util", false, &RootKind::Local, &f.ctx);
        assert_eq!(local_lib.build, f.ctx.cwd().join("_obj/util.a"));
        assert_eq!(local_lib.install, f.ctx.goroot().join("pkg/linux_amd64/util.a"));

        let local_cmd = ArtifactPaths::compute("tool", true, &RootKind::Local, &f.ctx);
        assert_eq!(local_cmd.build, f.ctx.cwd().join("tool"));
        assert_eq!(local_cmd.install, f.ctx.gobin().join("tool"));

        let foreign = ArtifactPaths::compute("fmt", false, &RootKind::Toolchain, &f.ctx);
        assert_eq!(foreign.build, foreign.install);

        let gp = f.ctx.gopath()[0].clone();
        let ws = ArtifactPaths::compute("x/y", false, &RootKind::Workspace(gp.clone()), &f.ctx);
        assert_eq!(ws.build, gp.join("pkg/linux_amd64/x/y.a"));
        assert_eq!(ws.build, ws.install);
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("a//b/./c/"), "a/b/c");
        assert_eq!(clean_path("a/../b"), "b");
        assert_eq!(clean_path("./"), ".");
    }
}
