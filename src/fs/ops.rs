//! Filesystem primitives: typed predicates, directory enumeration, and
//! the small set of mutating operations the storage manager builds on.
//! Every mutator syncs before reporting success and maps OS failures to
//! [`StorageError::Io`] with the failing operation and path preserved.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};

/// True iff `path` exists and is a directory.
pub fn is_dir(path: impl AsRef<Path>) -> bool {
    fs::metadata(path.as_ref())
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// True iff `path` exists and is not a directory.
pub fn is_file(path: impl AsRef<Path>) -> bool {
    fs::metadata(path.as_ref())
        .map(|m| !m.is_dir())
        .unwrap_or(false)
}

/// Creates a directory, failing if it already exists.
pub fn create_dir(path: &Path) -> Result<()> {
    if is_dir(path) {
        return Err(StorageError::AlreadyExists(format!(
            "directory '{}'",
            path.display()
        )));
    }
    fs::create_dir(path).map_err(|e| StorageError::io("create directory", path, e))
}

/// Creates an empty marker file with create-new semantics and syncs it.
pub fn create_marker_file(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| StorageError::io("create marker", path, e))?;
    file.sync_all()
        .map_err(|e| StorageError::io("create marker", path, e))
}

/// Appends `buffer` to `path` (creating it if absent) and syncs. A short
/// write surfaces as an error through `write_all`.
pub fn write_to_file(path: &Path, buffer: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| StorageError::io("append write", path, e))?;
    file.write_all(buffer)
        .map_err(|e| StorageError::io("append write", path, e))?;
    file.sync_all()
        .map_err(|e| StorageError::io("append write", path, e))
}

/// Reads the whole file into an owned buffer.
pub fn read_file_to_vec(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| StorageError::io("read file", path, e))
}

/// Size of a file in bytes.
pub fn file_size(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| StorageError::io("stat file", path, e))
}

/// Opens and fsyncs an existing file.
pub fn sync_file(path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| StorageError::io("sync file", path, e))?;
    file.sync_all()
        .map_err(|e| StorageError::io("sync file", path, e))
}

/// Recursively deletes a directory tree.
pub fn delete_dir(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).map_err(|e| StorageError::io("delete directory", path, e))
}

/// Deletes a single file.
pub fn delete_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| StorageError::io("delete file", path, e))
}

/// Renames a path; used by entity moves.
pub fn rename(old: &Path, new: &Path) -> Result<()> {
    fs::rename(old, new).map_err(|e| StorageError::io("rename", old, e))
}

/// Immediate subdirectories of `path`, as full paths. `.` and `..` are
/// never reported.
pub fn child_dirs(path: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let entries =
        fs::read_dir(path).map_err(|e| StorageError::io("list directory", path, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io("list directory", path, e))?;
        if is_dir(entry.path()) {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

/// All immediate children of `path` as `(name, full path)` pairs,
/// including plain files.
pub fn list_entries(path: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    let entries =
        fs::read_dir(path).map_err(|e| StorageError::io("list directory", path, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io("list directory", path, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        out.push((name, entry.path()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_dir_rejects_existing() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("d");
        create_dir(&target).unwrap();
        assert!(matches!(
            create_dir(&target),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn marker_files_are_empty_and_exclusive() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("__marker.tdb");
        create_marker_file(&marker).unwrap();
        assert!(is_file(&marker));
        assert_eq!(file_size(&marker).unwrap(), 0);
        assert!(matches!(
            create_marker_file(&marker),
            Err(StorageError::Io { op: "create marker", .. })
        ));
    }

    #[test]
    fn write_to_file_appends() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.tdb");
        write_to_file(&file, b"hello ").unwrap();
        write_to_file(&file, b"world").unwrap();
        assert_eq!(read_file_to_vec(&file).unwrap(), b"hello world");
    }

    #[test]
    fn child_dirs_skips_plain_files() {
        let dir = tempdir().unwrap();
        create_dir(&dir.path().join("sub")).unwrap();
        write_to_file(&dir.path().join("file"), b"x").unwrap();
        let dirs = child_dirs(dir.path()).unwrap();
        assert_eq!(dirs, vec![dir.path().join("sub")]);
    }

    #[test]
    fn list_entries_reports_files_and_dirs() {
        let dir = tempdir().unwrap();
        create_dir(&dir.path().join("sub")).unwrap();
        write_to_file(&dir.path().join("file"), b"x").unwrap();
        let mut names: Vec<String> =
            list_entries(dir.path()).unwrap().into_iter().map(|(n, _)| n).collect();
        names.sort();
        assert_eq!(names, vec!["file".to_string(), "sub".to_string()]);
    }
}
