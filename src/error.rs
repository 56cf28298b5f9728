//! Error types for gridstore
//!
//! One discriminated error type covers every fallible operation in the
//! storage core. Callers match on the kind; the payload carries enough
//! context (path, failing operation, OS detail) to identify the failure
//! site. There are no silent swallows: cleanup paths recover locally and
//! return the original error unchanged.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StorageError
pub type Result<T> = std::result::Result<T, StorageError>;

/// Unified error type for gridstore storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Bad name: empty, too long, non-absolute after resolution, or `..`
    /// escaping the root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// An entity was created or moved into the wrong kind of parent.
    #[error("containment violation: {0}")]
    Containment(String),

    /// An expected entity is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The destination of a create or move already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// An OS-level I/O failure, wrapping the errno detail together with
    /// the operation and path that failed.
    #[error("I/O error during {op} on '{}': {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An empty or malformed schema blob.
    #[error("corrupt schema: {0}")]
    CorruptSchema(String),

    /// zlib deflate/inflate failure.
    #[error("compression error: {0}")]
    Compression(String),

    /// `fcntl` filelock failure.
    #[error("lock error: {0}")]
    Lock(String),

    /// Close was requested for an array with no open-array registry entry.
    #[error("no open array entry for '{}'", .0.display())]
    RegistryMissing(PathBuf),

    /// Consolidation failed past the point where the new fragment became
    /// visible; safe to retry.
    #[error("partial consolidation: {0}")]
    PartialConsolidation(String),

    /// An array handle was used in a mode that does not support the
    /// requested operation.
    #[error("invalid mode: {0}")]
    InvalidMode(String),
}

impl StorageError {
    /// Wraps an OS error with the failing operation and path.
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
