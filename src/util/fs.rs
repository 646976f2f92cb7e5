//! Filesystem helpers shared by the scanner and the backends.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};

use crate::core::unit::Timestamp;

/// Modification time of `path`, or `None` when it does not exist.
pub fn mtime(path: &Path) -> Option<Timestamp> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let nanos = modified.duration_since(UNIX_EPOCH).ok()?.as_nanos();
    Some(Timestamp::from_nanos(nanos.min(u64::MAX as u128) as u64))
}

/// Modification time of `path`, [`Timestamp::ZERO`] when absent.
pub fn mtime_or_zero(path: &Path) -> Timestamp {
    mtime(path).unwrap_or(Timestamp::ZERO)
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a file if present.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

/// Remove a directory tree if present.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(path)
        .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    Ok(true)
}

/// Copy `src` over `dst`, creating the destination directory.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// First line of a small marker file, trimmed. `None` if the file is missing.
pub fn read_first_line(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    Some(contents.lines().next().unwrap_or("").trim().to_string())
}

/// Path of `path` relative to `base`, or `path` itself if there is none.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Path of `path` relative to `root` when it lies beneath it.
pub fn strip_root(root: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}

/// Render a path with forward slashes, the way targets are spelled.
pub fn slash_path(path: &Path) -> String {
    let parts: Vec<_> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mtime_absent_is_zero() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(mtime_or_zero(&tmp.path().join("nope")), Timestamp::ZERO);
    }

    #[test]
    fn test_mtime_present() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.go");
        fs::write(&file, "package a\n").unwrap();
        assert!(mtime_or_zero(&file) > Timestamp::ZERO);
    }

    #[test]
    fn test_read_first_line() {
        let tmp = TempDir::new().unwrap();
        let marker = tmp.path().join("target.gb");
        fs::write(&marker, "  util/strings \nignored\n").unwrap();
        assert_eq!(read_first_line(&marker).as_deref(), Some("util/strings"));
        assert_eq!(read_first_line(&tmp.path().join("missing")), None);
    }

    #[test]
    fn test_copy_creates_parent() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("lib.a");
        fs::write(&src, "!<arch>").unwrap();
        let dst = tmp.path().join("pkg/linux_amd64/lib.a");
        copy_file(&src, &dst).unwrap();
        assert!(dst.exists());
    }

    #[test]
    fn test_slash_path() {
        assert_eq!(slash_path(Path::new("a/b/c")), "a/b/c");
        assert_eq!(slash_path(Path::new("")), ".");
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let tmp = TempDir::new().unwrap();
        assert!(!remove_file_if_exists(&tmp.path().join("gone")).unwrap());
    }
}
