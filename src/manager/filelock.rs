//! # Consolidation Filelock
//!
//! Advisory byte-range locking on the per-array `__consolidation_lock`
//! file: readers hold it shared for the lifetime of an open-array entry,
//! consolidation holds it exclusive while it flips fragment visibility.
//! Locking is blocking (`fcntl(F_SETLKW)`); callers wanting timeouts
//! wrap at a higher layer.
//!
//! ## Per-process coalescing
//!
//! POSIX `fcntl` locks are per-process, not per-fd: a process that holds
//! a shared lock is *granted* an exclusive lock on the same file, and
//! closing any fd for the file drops every lock the process holds on it.
//! Neither behaviour is acceptable here: a consolidator thread must
//! wait for in-process readers too. So each locked inode gets one entry
//! in a process-wide table that counts readers and writers and owns the
//! single canonical fd through which all kernel lock calls are issued.
//! Threads coordinate through the table; processes coordinate through
//! the kernel lock.
//!
//! Acquisition order inside this module: table mutex, then the node's
//! state mutex, then the kernel lock. The table mutex is never held
//! while blocking on the kernel.

use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};

use crate::error::{Result, StorageError};

/// Lock flavour: shared for readers, exclusive for consolidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Shared,
    Exclusive,
}

/// Unique identity of a lock file (device + inode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct InodeKey {
    dev: u64,
    ino: u64,
}

/// Per-inode lock state shared by every holder in this process.
struct NodeState {
    /// Canonical fd for the inode; present while any lock is held so no
    /// other fd close can drop the process' kernel locks.
    file: Option<File>,
    readers: u32,
    writer: bool,
    waiters: u32,
}

struct LockNode {
    state: Mutex<NodeState>,
    cond: Condvar,
}

struct LockTable {
    map: Mutex<HashMap<InodeKey, Arc<LockNode>>>,
}

impl LockTable {
    fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_create(&self, key: InodeKey) -> Arc<LockNode> {
        let mut map = self.map.lock();
        Arc::clone(map.entry(key).or_insert_with(|| {
            Arc::new(LockNode {
                state: Mutex::new(NodeState {
                    file: None,
                    readers: 0,
                    writer: false,
                    waiters: 0,
                }),
                cond: Condvar::new(),
            })
        }))
    }

    fn maybe_remove(&self, key: InodeKey) {
        let mut map = self.map.lock();
        if let Some(node) = map.get(&key) {
            let state = node.state.lock();
            if state.readers == 0 && !state.writer && state.waiters == 0 {
                drop(state);
                map.remove(&key);
            }
        }
    }
}

fn lock_table() -> &'static LockTable {
    static TABLE: OnceLock<LockTable> = OnceLock::new();
    TABLE.get_or_init(LockTable::new)
}

/// Issues a blocking whole-file `fcntl` lock request on the canonical fd.
fn fcntl_lock(file: &File, l_type: i16) -> std::io::Result<()> {
    let fl = libc::flock {
        l_type,
        l_whence: libc::SEEK_SET as i16,
        l_start: 0,
        l_len: 0,
        l_pid: 0,
    };
    loop {
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETLKW, &fl) };
        if rc != -1 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

/// A held consolidation lock; released on drop.
pub struct FileLock {
    node: Arc<LockNode>,
    key: InodeKey,
    kind: LockKind,
    path: PathBuf,
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .finish()
    }
}

impl FileLock {
    /// Blocks until the requested lock on `lock_path` is held.
    pub fn acquire(lock_path: &Path, kind: LockKind) -> Result<FileLock> {
        let meta = std::fs::metadata(lock_path).map_err(|e| {
            StorageError::Lock(format!(
                "cannot stat filelock '{}': {e}",
                lock_path.display()
            ))
        })?;
        let key = InodeKey {
            dev: meta.dev(),
            ino: meta.ino(),
        };

        let node = lock_table().get_or_create(key);
        let mut state = node.state.lock();

        match kind {
            LockKind::Shared => {
                while state.writer {
                    state.waiters += 1;
                    node.cond.wait(&mut state);
                    state.waiters -= 1;
                }
                if state.readers == 0 {
                    Self::kernel_lock(&mut state, lock_path, libc::F_RDLCK as i16)?;
                }
                state.readers += 1;
            }
            LockKind::Exclusive => {
                while state.writer || state.readers > 0 {
                    state.waiters += 1;
                    node.cond.wait(&mut state);
                    state.waiters -= 1;
                }
                Self::kernel_lock(&mut state, lock_path, libc::F_WRLCK as i16)?;
                state.writer = true;
            }
        }

        drop(state);
        Ok(FileLock {
            node,
            key,
            kind,
            path: lock_path.to_path_buf(),
        })
    }

    /// Opens the canonical fd if needed and takes the kernel lock while
    /// the node mutex is held. A failure leaves the node unlocked.
    fn kernel_lock(state: &mut NodeState, lock_path: &Path, l_type: i16) -> Result<()> {
        if state.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(lock_path)
                .map_err(|e| {
                    StorageError::Lock(format!(
                        "cannot open filelock '{}': {e}",
                        lock_path.display()
                    ))
                })?;
            state.file = Some(file);
        }
        let file = state.file.as_ref().expect("canonical fd just ensured");
        if let Err(e) = fcntl_lock(file, l_type) {
            state.file = None;
            return Err(StorageError::Lock(format!(
                "cannot lock filelock '{}': {e}",
                lock_path.display()
            )));
        }
        Ok(())
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let mut state = self.node.state.lock();
        match self.kind {
            LockKind::Shared => {
                state.readers -= 1;
            }
            LockKind::Exclusive => {
                state.writer = false;
            }
        }
        if state.readers == 0 && !state.writer {
            // Dropping the canonical fd releases the kernel lock.
            if let Some(file) = state.file.take() {
                if let Err(e) = fcntl_lock(&file, libc::F_UNLCK as i16) {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "failed to release consolidation filelock"
                    );
                }
            }
        }
        drop(state);
        self.node.cond.notify_all();
        lock_table().maybe_remove(self.key);
    }
}
