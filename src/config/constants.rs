//! # gridstore Naming and Tuning Constants
//!
//! The marker filenames below form the on-disk interface. Every namespace
//! entity is a plain directory whose kind is witnessed by exactly one
//! marker file; fragments additionally become visible to readers only once
//! their marker exists. Classification probes these names directly, so a
//! change here is a storage format change.
//!
//! ## Directory Layout
//!
//! ```text
//! <workspace>/__tiledb_workspace.tdb
//! <workspace>/<group>/__tiledb_group.tdb
//! <workspace>/.../<array>/__array_schema.tdb          # schema blob
//! <workspace>/.../<array>/__consolidation_lock        # fcntl lock target
//! <workspace>/.../<array>/__<uuid>_<timestamp_ms>/    # fragment
//! <workspace>/.../<array>/__<uuid>_<ts>/__tiledb_fragment.tdb
//! <workspace>/.../<array>/__<uuid>_<ts>/__book_keeping.tdb.gz
//! <workspace>/.../<array>/__<uuid>_<ts>/<attr>.tdb    # attribute data
//! <workspace>/.../<metadata>/__metadata_schema.tdb
//! ```

/// Marker file witnessing a workspace directory.
pub const WORKSPACE_FILENAME: &str = "__tiledb_workspace.tdb";

/// Marker file witnessing a group directory. Workspaces carry this marker
/// too, since a workspace can parent arrays and groups exactly like a
/// group can.
pub const GROUP_FILENAME: &str = "__tiledb_group.tdb";

/// Schema blob filename witnessing an array directory.
pub const ARRAY_SCHEMA_FILENAME: &str = "__array_schema.tdb";

/// Schema blob filename witnessing a metadata directory.
pub const METADATA_SCHEMA_FILENAME: &str = "__metadata_schema.tdb";

/// Marker file witnessing a completed (reader-visible) fragment.
pub const FRAGMENT_FILENAME: &str = "__tiledb_fragment.tdb";

/// Per-array lock file used as the `fcntl` byte-range lock target for
/// consolidation. Created empty at array/metadata creation; never written.
pub const CONSOLIDATION_FILELOCK_NAME: &str = "__consolidation_lock";

/// Gzipped per-fragment book-keeping blob.
pub const BOOK_KEEPING_FILENAME: &str = "__book_keeping.tdb.gz";

/// Suffix of attribute data files inside a fragment directory.
pub const FILE_SUFFIX: &str = ".tdb";

/// Name of the implicit coordinates attribute of sparse fragments.
pub const COORDS_NAME: &str = "__coords";

/// Prefix every fragment directory basename must carry.
pub const FRAGMENT_PREFIX: &str = "__";

/// Chunk size for streaming inflate with unknown output size.
pub const GZIP_CHUNK_SIZE: usize = 16 * 1024;

/// Maximum accepted length for an entity path.
pub const NAME_MAX_LEN: usize = 4096;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_filenames_are_distinct() {
        let names = [
            WORKSPACE_FILENAME,
            GROUP_FILENAME,
            ARRAY_SCHEMA_FILENAME,
            METADATA_SCHEMA_FILENAME,
            FRAGMENT_FILENAME,
            CONSOLIDATION_FILELOCK_NAME,
            BOOK_KEEPING_FILENAME,
        ];
        for (i, a) in names.iter().enumerate() {
            for b in names.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn fragment_prefix_matches_marker_convention() {
        assert!(FRAGMENT_FILENAME.starts_with(FRAGMENT_PREFIX));
        assert!(CONSOLIDATION_FILELOCK_NAME.starts_with(FRAGMENT_PREFIX));
    }
}
