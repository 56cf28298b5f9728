//! # Open-Array Registry
//!
//! Process-wide table of currently open arrays, keyed by canonical path.
//! Each entry is created on first open with a zero refcount, loaded once
//! under its own entry lock (schema, chronologically ordered fragments,
//! per-fragment book-keeping, and the shared consolidation filelock),
//! and torn down when the refcount returns to zero.
//!
//! ## Locking
//!
//! Two mutex levels, always taken registry-then-entry:
//!
//! 1. The registry lock guards the map itself. It is held only for
//!    get-or-insert, refcount bumps, and removal, never across I/O.
//! 2. The entry lock guards one entry's mutable fields. First-open
//!    loading happens under it, which serialises first-open per array
//!    while letting unrelated arrays load concurrently.
//!
//! Everything but the refcount is immutable once loaded: readers receive
//! an `Arc` snapshot of the loaded state and keep it unchanged even if
//! the entry is later torn down and reloaded by a newer generation of
//! openers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::error::{Result, StorageError};
use crate::fragment::BookKeeping;
use crate::schema::ArraySchema;

use super::filelock::FileLock;

/// Identity and book-keeping of one visible fragment of an open array.
#[derive(Debug)]
pub struct FragmentInfo {
    pub path: PathBuf,
    pub dense: bool,
    pub book_keeping: BookKeeping,
}

/// The immutable payload of an open-array entry, loaded at first open.
/// Fragments are ordered by ascending embedded timestamp.
#[derive(Debug)]
pub struct OpenArrayState {
    pub schema: Arc<ArraySchema>,
    pub fragments: Vec<FragmentInfo>,
}

#[derive(Default)]
struct OpenArrayInner {
    refcount: u64,
    state: Option<Arc<OpenArrayState>>,
    filelock: Option<FileLock>,
}

/// One registry entry.
pub struct OpenArray {
    path: PathBuf,
    inner: Mutex<OpenArrayInner>,
}

impl OpenArray {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current refcount; mainly for tests and diagnostics.
    pub fn refcount(&self) -> u64 {
        self.inner.lock().refcount
    }

    /// Loaded snapshot, if first-open finished.
    pub fn state(&self) -> Option<Arc<OpenArrayState>> {
        self.inner.lock().state.clone()
    }

    /// Runs `loader` under the entry lock if the entry is not yet loaded
    /// and returns the (now shared) snapshot. The caller owns refcount
    /// cleanup when the loader fails.
    pub(crate) fn ensure_loaded<F>(&self, loader: F) -> Result<Arc<OpenArrayState>>
    where
        F: FnOnce() -> Result<(OpenArrayState, FileLock)>,
    {
        let mut inner = self.inner.lock();
        if let Some(state) = &inner.state {
            return Ok(Arc::clone(state));
        }
        let (state, filelock) = loader()?;
        let state = Arc::new(state);
        inner.state = Some(Arc::clone(&state));
        inner.filelock = Some(filelock);
        Ok(state)
    }
}

/// The process-wide open-array map.
pub(crate) struct OpenArrays {
    map: Mutex<HashMap<PathBuf, Arc<OpenArray>>>,
}

impl OpenArrays {
    pub(crate) fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Gets or creates the entry for `path` and bumps its refcount.
    pub(crate) fn acquire(&self, path: &Path) -> Arc<OpenArray> {
        let mut map = self.map.lock();
        let entry = map.entry(path.to_path_buf()).or_insert_with(|| {
            Arc::new(OpenArray {
                path: path.to_path_buf(),
                inner: Mutex::new(OpenArrayInner::default()),
            })
        });
        let entry = Arc::clone(entry);
        entry.inner.lock().refcount += 1;
        entry
    }

    /// Drops one reference to `path`; tears the entry down at zero.
    /// Tearing down releases the book-keeping, the schema, and the
    /// shared consolidation filelock.
    pub(crate) fn release(&self, path: &Path) -> Result<()> {
        let mut map = self.map.lock();
        let entry = Arc::clone(
            map.get(path)
                .ok_or_else(|| StorageError::RegistryMissing(path.to_path_buf()))?,
        );

        let mut inner = entry.inner.lock();
        inner.refcount -= 1;
        if inner.refcount == 0 {
            inner.state = None;
            inner.filelock = None;
            drop(inner);
            map.remove(path);
        }
        Ok(())
    }

    /// Refcount of an entry, if one exists.
    pub(crate) fn refcount(&self, path: &Path) -> Option<u64> {
        self.map.lock().get(path).map(|e| e.refcount())
    }

    pub(crate) fn contains(&self, path: &Path) -> bool {
        self.map.lock().contains_key(path)
    }
}
