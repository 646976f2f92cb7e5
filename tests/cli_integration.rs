//! CLI integration tests for gb.
//!
//! These tests drive the real binary over throwaway source trees. Builds use
//! a stand-in toolchain: a shell script that creates whatever file it is
//! asked to write.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// A source tree plus a private GOROOT.
struct Project {
    tmp: TempDir,
}

impl Project {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("goroot")).unwrap();
        fs::create_dir_all(tmp.path().join("work")).unwrap();
        fs::create_dir_all(tmp.path().join("home")).unwrap();
        Project { tmp }
    }

    fn goroot(&self) -> PathBuf {
        self.tmp.path().join("goroot")
    }

    fn root(&self) -> PathBuf {
        self.tmp.path().join("work")
    }

    fn file(self, rel: &str, body: &str) -> Self {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
        self
    }

    /// Three units: a <- b <- cmd/c.
    fn chain(self) -> Self {
        self.file("a/a.go", "package a\n")
            .file("b/b.go", "package b\n\nimport \"a\"\n")
            .file("cmd/c/main.go", "package main\n\nimport \"b\"\n")
    }

    /// Point every tool at a script that just creates its `-o` output.
    #[cfg(unix)]
    fn fake_toolchain(self) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let tool = self.tmp.path().join("fake-tool");
        fs::write(
            &tool,
            "#!/bin/sh\n\
             if [ \"$1\" = grc ]; then : > \"$2\"; exit 0; fi\n\
             while [ $# -gt 0 ]; do\n\
               if [ \"$1\" = -o ]; then : > \"$2\"; exit 0; fi\n\
               shift\n\
             done\n",
        )
        .unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let tool = tool.display().to_string();
        let config = format!(
            "[toolchain]\ngoos = \"linux\"\ngoarch = \"amd64\"\n\
             compiler = \"{0}\"\nlinker = \"{0}\"\npacker = \"{0}\"\nassembler = \"{0}\"\n",
            tool
        );
        self.file(".gb/config.toml", &config)
    }

    fn gb(&self) -> Command {
        let mut cmd = Command::cargo_bin("gb").unwrap();
        cmd.current_dir(self.root())
            .env("GOROOT", self.goroot())
            .env("HOME", self.tmp.path().join("home"))
            .env_remove("GOPATH")
            .env_remove("GOBIN")
            .env_remove("GOOS")
            .env_remove("GOARCH");
        cmd
    }
}

fn exists(path: &Path) -> bool {
    path.exists()
}

// ============================================================================
// gb scan
// ============================================================================

#[test]
fn test_scan_lists_targets_in_dependency_order() {
    let project = Project::new().chain();

    let output = project.gb().arg("scan").assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output).unwrap();

    let a = text.find("in a: pkg \"a\"").unwrap();
    let b = text.find("in b: pkg \"b\"").unwrap();
    let c = text.find("in cmd/c: cmd \"c\"").unwrap();
    assert!(a < b && b < c);
}

#[test]
fn test_scan_deps_and_files() {
    let project = Project::new()
        .chain()
        .file("a/a_windows.go", "package a\n");

    project
        .gb()
        .args(["scan", "--deps", "--files", "-e", "a", "b"])
        .env("GOOS", "linux")
        .assert()
        .success()
        .stdout(predicate::str::contains(" b Deps: [a]"))
        .stdout(predicate::str::contains("\ta.go"))
        .stdout(predicate::str::contains("\t*a_windows.go"))
        .stdout(predicate::str::contains("cmd \"c\"").not());
}

#[test]
fn test_scan_json() {
    let project = Project::new().chain();

    let output = project.gb().args(["scan", "--json"]).assert().success().get_output().stdout.clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let entries = value.as_array().unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2]["target"], "c");
    assert_eq!(entries[2]["kind"], "command");
    assert_eq!(entries[2]["deps"][0], "b");
    assert_eq!(entries[0]["needs_build"], true);
}

#[test]
fn test_readme_only_directory_is_not_a_target() {
    let project = Project::new()
        .file("a/a.go", "package a\n")
        .file("docs/README", "nothing to build here\n");

    project
        .gb()
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("pkg \"a\""))
        .stdout(predicate::str::contains("docs").not());
}

#[test]
fn test_marker_file_names_target() {
    let project = Project::new()
        .file("lib/x.go", "package x\n")
        .file("lib/target.gb", "example.org/x\n");

    project
        .gb()
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("pkg \"example.org/x\""));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_import_cycle_fails_before_building() {
    let project = Project::new()
        .file("a/a.go", "package a\n\nimport \"b\"\n")
        .file("b/b.go", "package b\n\nimport \"a\"\n");

    project
        .gb()
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("import cycle: a -> b -> a"));

    assert!(!exists(&project.root().join("_obj")));
}

#[test]
fn test_missing_goroot_is_an_error() {
    let project = Project::new().chain();

    project
        .gb()
        .env_remove("GOROOT")
        .arg("scan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOROOT"));
}

#[test]
fn test_goroot_must_exist() {
    let project = Project::new().chain();
    let missing = project.tmp.path().join("no-such-goroot");

    project
        .gb()
        .env("GOROOT", &missing)
        .arg("scan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory"));
}

#[test]
fn test_unknown_listed_directory() {
    let project = Project::new().chain();

    project
        .gb()
        .args(["scan", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no units in the listed directories"));
}

// ============================================================================
// gb build / install / clean
// ============================================================================

#[cfg(unix)]
#[test]
fn test_build_then_up_to_date() {
    let project = Project::new().chain().fake_toolchain();

    project
        .gb()
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::contains("Built 3 targets"));

    assert!(exists(&project.root().join("_obj/a.a")));
    assert!(exists(&project.root().join("_obj/b.a")));

    project
        .gb()
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::contains("Up to date"));
}

#[cfg(unix)]
#[test]
fn test_concurrent_build_with_one_job() {
    let project = Project::new().chain().fake_toolchain();

    project
        .gb()
        .args(["build", "-p", "-j", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Built 3 targets"));
}

#[cfg(unix)]
#[test]
fn test_install_copies_libraries() {
    let project = Project::new().chain().fake_toolchain();

    project
        .gb()
        .args(["install", "--no-cmds"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed 2 targets"));

    let pkg = project.goroot().join("pkg/linux_amd64");
    assert!(exists(&pkg.join("a.a")));
    assert!(exists(&pkg.join("b.a")));

    project
        .gb()
        .args(["scan", "--no-cmds"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pkg \"a\" (installed)"));
}

#[cfg(unix)]
#[test]
fn test_unresolved_import_breaks_only_its_importers() {
    let project = Project::new()
        .file("a/a.go", "package a\n")
        .file("b/b.go", "package b\n\nimport \"missing/thing\"\n")
        .fake_toolchain();

    project
        .gb()
        .arg("build")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Built 1 target"))
        .stdout(predicate::str::contains("1 broken target"))
        .stderr(predicate::str::contains("missing/thing"));
}

#[cfg(unix)]
#[test]
fn test_clean_removes_obj() {
    let project = Project::new().chain().fake_toolchain();

    project.gb().arg("build").assert().success();
    assert!(exists(&project.root().join("_obj")));

    project.gb().arg("clean").assert().success();
    assert!(!exists(&project.root().join("_obj")));

    project
        .gb()
        .args(["clean", "--build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Built 3 targets"));
}

// ============================================================================
// gb completions
// ============================================================================

#[test]
fn test_completions_bash() {
    Command::cargo_bin("gb")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gb"));
}
