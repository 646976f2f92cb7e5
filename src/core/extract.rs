//! Source header extraction.
//!
//! Reads just enough of a source file to learn its package clause, an optional
//! `//target:` directive, its imports, interop flag annotations, and the names
//! of test and benchmark functions. Nothing past the import block is parsed
//! except top-level `func` lines.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::core::platform::Platform;

/// Pseudo-import that marks a file as foreign-interop.
pub const INTEROP_IMPORT: &str = "C";

/// Support library every interop unit implicitly depends on.
pub const INTEROP_RUNTIME: &str = "runtime/cgo";

static TARGET_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^//\s*target:\s*(\S+)").expect("static pattern"));
static PACKAGE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^package\s+([A-Za-z_][A-Za-z0-9_]*)").expect("static pattern"));
static IMPORT_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:([A-Za-z_][A-Za-z0-9_]*|\.)\s+)?"([^"]*)"\s*(?:;\s*)?(?://.*)?$"#)
        .expect("static pattern")
});
static CGO_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#cgo\s+(?:([^:]*?)\s+)?(CFLAGS|LDFLAGS):\s*(.*)$").expect("static pattern")
});
static TEST_FUNC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^func\s+((?:Test|Benchmark)[A-Za-z0-9_]*)\s*\(").expect("static pattern")
});

/// A per-file parse failure. Collected, never fatal to the scan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}:{line}: {message}", path.display())]
pub struct ParseError {
    pub path: PathBuf,
    pub line: usize,
    pub message: String,
}

/// What a file header declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceHeader {
    pub package: String,
    pub target: Option<String>,
    /// Import paths, unquoted, in order of appearance (the interop marker included)
    pub imports: Vec<String>,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
    /// Top-level `Test*` and `Benchmark*` functions
    pub functions: Vec<String>,
}

impl SourceHeader {
    /// Whether the file imports the interop pseudo-package.
    pub fn is_interop(&self) -> bool {
        self.imports.iter().any(|i| i == INTEROP_IMPORT)
    }
}

/// Read and parse the header of `path`.
pub fn extract_file(path: &Path, platform: &Platform) -> Result<SourceHeader, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|e| ParseError {
        path: path.to_path_buf(),
        line: 0,
        message: format!("cannot read file: {}", e),
    })?;
    extract_header(&text, platform).map_err(|(line, message)| ParseError {
        path: path.to_path_buf(),
        line,
        message,
    })
}

/// Parse a header from text. Errors carry a 1-based line number.
pub fn extract_header(text: &str, platform: &Platform) -> Result<SourceHeader, (usize, String)> {
    let mut header = SourceHeader::default();
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

    // Comment lines directly above the current position, for `#cgo` lookup.
    let mut preamble: Vec<String> = Vec::new();
    let mut in_block_comment = false;
    let mut seen_package = false;
    let mut in_import_group: Option<usize> = None;
    let mut imports_done = false;

    for (number, line) in lines.by_ref() {
        if in_block_comment {
            match line.find("*/") {
                Some(end) => {
                    preamble.push(line[..end].to_string());
                    in_block_comment = false;
                }
                None => preamble.push(line.to_string()),
            }
            continue;
        }

        if line.is_empty() {
            preamble.clear();
            continue;
        }

        if let Some(comment) = line.strip_prefix("//") {
            if !seen_package && header.target.is_none() {
                if let Some(caps) = TARGET_DIRECTIVE.captures(line) {
                    header.target = Some(caps[1].to_string());
                }
            }
            preamble.push(comment.trim().to_string());
            continue;
        }

        if let Some(rest) = line.strip_prefix("/*") {
            match rest.find("*/") {
                Some(end) => preamble.push(rest[..end].to_string()),
                None => {
                    preamble.push(rest.to_string());
                    in_block_comment = true;
                }
            }
            continue;
        }

        if !seen_package {
            let caps = PACKAGE_CLAUSE
                .captures(line)
                .ok_or_else(|| (number, "expected `package` clause".to_string()))?;
            header.package = caps[1].to_string();
            seen_package = true;
            preamble.clear();
            continue;
        }

        if in_import_group.is_some() {
            if line.starts_with(')') {
                in_import_group = None;
                preamble.clear();
                continue;
            }
            add_import(&mut header, line, number, &preamble, platform)?;
            preamble.clear();
            continue;
        }

        if let Some(rest) = line.strip_prefix("import") {
            let rest = rest.trim_start();
            if rest.starts_with('(') {
                let inner = rest[1..].trim();
                if let Some(single) = inner.strip_suffix(')') {
                    if !single.trim().is_empty() {
                        add_import(&mut header, single.trim(), number, &preamble, platform)?;
                    }
                } else {
                    if !inner.is_empty() {
                        add_import(&mut header, inner, number, &preamble, platform)?;
                    }
                    in_import_group = Some(number);
                }
            } else {
                add_import(&mut header, rest, number, &preamble, platform)?;
            }
            preamble.clear();
            continue;
        }

        // First declaration after the imports.
        imports_done = true;
        collect_function(&mut header, line);
        break;
    }

    if in_block_comment && !seen_package {
        return Err((text.lines().count(), "unterminated comment".to_string()));
    }
    if !seen_package {
        return Err((text.lines().count().max(1), "expected `package` clause".to_string()));
    }
    if let Some(start) = in_import_group {
        return Err((start, "unterminated import block".to_string()));
    }

    if imports_done {
        for (_, line) in lines {
            collect_function(&mut header, line);
        }
    }

    dedup_in_place(&mut header.imports);
    dedup_in_place(&mut header.cflags);
    dedup_in_place(&mut header.ldflags);
    Ok(header)
}

fn add_import(
    header: &mut SourceHeader,
    spec: &str,
    number: usize,
    preamble: &[String],
    platform: &Platform,
) -> Result<(), (usize, String)> {
    let caps = IMPORT_SPEC
        .captures(spec)
        .ok_or_else(|| (number, format!("malformed import `{}`", spec)))?;
    let path = caps[2].to_string();
    if path.is_empty() {
        return Err((number, "empty import path".to_string()));
    }
    if path == INTEROP_IMPORT {
        collect_interop_flags(header, preamble, platform);
    }
    header.imports.push(path);
    Ok(())
}

fn collect_interop_flags(header: &mut SourceHeader, preamble: &[String], platform: &Platform) {
    for line in preamble {
        let Some(caps) = CGO_DIRECTIVE.captures(line.trim()) else {
            continue;
        };
        if let Some(constraint) = caps.get(1) {
            if !platform.matches_constraint(constraint.as_str()) {
                continue;
            }
        }
        let flags = caps[3].split_whitespace().map(str::to_string);
        match &caps[2] {
            "CFLAGS" => header.cflags.extend(flags),
            _ => header.ldflags.extend(flags),
        }
    }
}

fn collect_function(header: &mut SourceHeader, line: &str) {
    if let Some(caps) = TEST_FUNC.captures(line) {
        header.functions.push(caps[1].to_string());
    }
}

/// Drop repeated entries, keeping the first occurrence.
pub fn dedup_in_place(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SourceHeader {
        extract_header(text, &Platform::new("linux", "amd64")).unwrap()
    }

    #[test]
    fn test_package_and_single_imports() {
        let h = parse("package util\n\nimport \"fmt\"\nimport str \"strings\"\n\nfunc X() {}\n");
        assert_eq!(h.package, "util");
        assert_eq!(h.imports, vec!["fmt", "strings"]);
        assert_eq!(h.target, None);
    }

    #[test]
    fn test_grouped_imports() {
        let h = parse(
            "// Package a does things.\npackage a\n\nimport (\n\t\"fmt\"\n\t_ \"net/http/pprof\"\n\t. \"math\"\n\t// comment\n\tos \"os\" // trailing\n)\n",
        );
        assert_eq!(h.imports, vec!["fmt", "net/http/pprof", "math", "os"]);
    }

    #[test]
    fn test_target_directive_before_package() {
        let h = parse("//target:tools/gen\npackage main\n");
        assert_eq!(h.target.as_deref(), Some("tools/gen"));

        let h = parse("package main\n//target:ignored\n");
        assert_eq!(h.target, None);
    }

    #[test]
    fn test_interop_flags() {
        let h = parse(
            "package sqlite\n\n/*\n#cgo CFLAGS: -I/usr/include -DX\n#cgo LDFLAGS: -lsqlite3\n#cgo windows LDFLAGS: -lwinsock\n#include <sqlite3.h>\n*/\nimport \"C\"\nimport \"unsafe\"\n",
        );
        assert!(h.is_interop());
        assert_eq!(h.cflags, vec!["-I/usr/include", "-DX"]);
        assert_eq!(h.ldflags, vec!["-lsqlite3"]);
        assert_eq!(h.imports, vec!["C", "unsafe"]);
    }

    #[test]
    fn test_interop_line_comments() {
        let h = parse("package z\n// #cgo LDFLAGS: -lz -lz\nimport \"C\"\n");
        assert_eq!(h.ldflags, vec!["-lz"]);
    }

    #[test]
    fn test_functions_collected() {
        let h = parse(
            "package util\nimport \"testing\"\nfunc TestJoin(t *testing.T) {}\nfunc helper() {}\nfunc BenchmarkJoin(b *testing.B) {}\n",
        );
        assert_eq!(h.functions, vec!["TestJoin", "BenchmarkJoin"]);
    }

    #[test]
    fn test_missing_package_is_error() {
        let err = extract_header("// nothing here\n", &Platform::host()).unwrap_err();
        assert!(err.1.contains("package"));
    }

    #[test]
    fn test_unterminated_import_block() {
        let err = extract_header("package a\nimport (\n\"fmt\"\n", &Platform::host()).unwrap_err();
        assert_eq!(err.0, 2);
        assert!(err.1.contains("unterminated"));
    }

    #[test]
    fn test_malformed_import() {
        let err = extract_header("package a\nimport fmt\n", &Platform::host()).unwrap_err();
        assert!(err.1.contains("malformed import"));
    }
}
