//! # Path Canonicalisation
//!
//! Turns any user-supplied path spelling into the one canonical absolute
//! form used across the storage core. Canonicalisation is purely textual
//! after prefix resolution: it does not touch the filesystem and does not
//! resolve symlinks, so it works for paths that do not exist yet.
//!
//! ## Resolution Rules
//!
//! | Input            | Result                          |
//! |------------------|---------------------------------|
//! | `""`, `.`, `./`  | current working directory       |
//! | `~`              | `$HOME`                         |
//! | `~/x`            | `$HOME/x`                       |
//! | `./x`, `x`       | `<cwd>/x`                       |
//! | `/x//y/../z/.`   | `/x/z`                          |
//!
//! A `..` that would pop past the root is an [`StorageError::InvalidPath`]
//! error, never a silent truncation. Output is absolute with no trailing
//! slash except for the root itself, and the function is idempotent.

use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};

/// Returns the current working directory.
pub fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| StorageError::io("get current dir", "", e))
}

fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| StorageError::InvalidPath("HOME is not set".to_string()))
}

/// Canonicalises `dir` into an absolute, slash-deduplicated, dot-resolved
/// path.
pub fn real_dir(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let raw = dir.as_ref().to_str().ok_or_else(|| {
        StorageError::InvalidPath(format!("non UTF-8 path '{}'", dir.as_ref().display()))
    })?;

    let absolute = match raw {
        "" | "." | "./" => return current_dir().and_then(|d| canonicalize_absolute(&lossy(&d))),
        "~" => return home_dir().and_then(|d| canonicalize_absolute(&lossy(&d))),
        "/" => return Ok(PathBuf::from("/")),
        s if s.starts_with('/') => s.to_string(),
        s if s.starts_with("~/") => {
            let home = home_dir()?;
            format!("{}{}", lossy(&home), &s[1..])
        }
        s if s.starts_with("./") => {
            let cwd = current_dir()?;
            format!("{}{}", lossy(&cwd), &s[1..])
        }
        s => {
            let cwd = current_dir()?;
            format!("{}/{}", lossy(&cwd), s)
        }
    };

    canonicalize_absolute(&absolute)
}

/// Returns the parent directory of a canonical path; the parent of the
/// root is the root.
pub fn parent_dir(dir: &Path) -> PathBuf {
    dir.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"))
}

fn lossy(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// Collapses duplicate slashes and resolves `.`/`..` segments of an
/// absolute path.
fn canonicalize_absolute(path: &str) -> Result<PathBuf> {
    debug_assert!(path.starts_with('/'), "expected an absolute path");

    let mut resolved: Vec<&str> = Vec::new();
    for token in path.split('/').filter(|t| !t.is_empty()) {
        match token {
            "." => {}
            ".." => {
                if resolved.pop().is_none() {
                    return Err(StorageError::InvalidPath(format!(
                        "'{path}' escapes the filesystem root"
                    )));
                }
            }
            t => resolved.push(t),
        }
    }

    if resolved.is_empty() {
        return Ok(PathBuf::from("/"));
    }
    let mut out = String::new();
    for token in resolved {
        out.push('/');
        out.push_str(token);
    }
    Ok(PathBuf::from(out))
}
