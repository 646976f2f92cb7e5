//! Target platform (OS/architecture pair) and the filename conventions tied to it.

use std::fmt;

use serde::Serialize;

/// Operating systems recognised in `_<os>` filename suffixes.
pub const KNOWN_OS: &[&str] = &[
    "darwin", "freebsd", "linux", "netbsd", "openbsd", "plan9", "windows",
];

/// Architectures recognised in `_<arch>` filename suffixes.
pub const KNOWN_ARCH: &[&str] = &["386", "amd64", "arm"];

/// The OS/architecture pair being built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Platform {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary is running on, spelled the toolchain's way.
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "386",
            "aarch64" => "arm64",
            other => other,
        };
        Platform::new(os, arch)
    }

    /// `linux_amd64`, the directory name used under `pkg/`.
    pub fn pair(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }

    /// The letter that prefixes compiler, linker and assembler names.
    pub fn tool_char(&self) -> char {
        match self.arch.as_str() {
            "386" => '8',
            "arm" => '5',
            _ => '6',
        }
    }

    /// Object file suffix, `.6` for amd64.
    pub fn obj_suffix(&self) -> String {
        format!(".{}", self.tool_char())
    }

    /// Suffix appended to command targets.
    pub fn exe_suffix(&self) -> &'static str {
        if self.os == "windows" {
            ".exe"
        } else {
            ""
        }
    }

    /// Whether a file stem (no extension, `_test` already stripped) belongs to
    /// this platform.
    ///
    /// Only the last one or two `_`-separated words are considered, and only
    /// when they name a known OS or architecture. `linux.go` is unconstrained;
    /// `poll_linux.go`, `asm_amd64.go` and `zsys_linux_arm.go` are not.
    pub fn matches_stem(&self, stem: &str) -> bool {
        let words: Vec<&str> = stem.split('_').collect();
        let n = words.len();
        if n >= 3 && KNOWN_OS.contains(&words[n - 2]) && KNOWN_ARCH.contains(&words[n - 1]) {
            return words[n - 2] == self.os && words[n - 1] == self.arch;
        }
        if n >= 2 {
            let last = words[n - 1];
            if KNOWN_OS.contains(&last) {
                return last == self.os;
            }
            if KNOWN_ARCH.contains(&last) {
                return last == self.arch;
            }
        }
        true
    }

    /// Evaluate a `#cgo` line constraint such as `linux`, `linux,amd64`,
    /// `!windows` or `darwin freebsd` (space means "or", comma means "and").
    pub fn matches_constraint(&self, constraint: &str) -> bool {
        constraint.split_whitespace().any(|option| {
            option.split(',').all(|term| match term.strip_prefix('!') {
                Some(negated) => negated != self.os && negated != self.arch,
                None => term == self.os || term == self.arch,
            })
        })
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::host()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_amd64() -> Platform {
        Platform::new("linux", "amd64")
    }

    #[test]
    fn test_stem_filtering() {
        let p = linux_amd64();
        assert!(p.matches_stem("main"));
        assert!(p.matches_stem("linux"));
        assert!(p.matches_stem("poll_linux"));
        assert!(!p.matches_stem("poll_windows"));
        assert!(p.matches_stem("asm_amd64"));
        assert!(!p.matches_stem("asm_386"));
        assert!(p.matches_stem("zsys_linux_amd64"));
        assert!(!p.matches_stem("zsys_linux_arm"));
        assert!(!p.matches_stem("zsys_darwin_amd64"));
        assert!(p.matches_stem("my_helper"));
    }

    #[test]
    fn test_tool_names() {
        assert_eq!(linux_amd64().obj_suffix(), ".6");
        assert_eq!(Platform::new("linux", "386").tool_char(), '8');
        assert_eq!(Platform::new("linux", "arm").obj_suffix(), ".5");
        assert_eq!(Platform::new("windows", "386").exe_suffix(), ".exe");
        assert_eq!(linux_amd64().pair(), "linux_amd64");
    }

    #[test]
    fn test_cgo_constraints() {
        let p = linux_amd64();
        assert!(p.matches_constraint("linux"));
        assert!(p.matches_constraint("darwin linux"));
        assert!(p.matches_constraint("linux,amd64"));
        assert!(!p.matches_constraint("linux,386"));
        assert!(p.matches_constraint("!windows"));
        assert!(!p.matches_constraint("!linux"));
    }
}
