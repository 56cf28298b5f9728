//! # Filesystem Module
//!
//! Foundational filesystem layer for gridstore: path canonicalisation,
//! typed predicates, directory enumeration, marker-file creation,
//! synchronous append-writes, and zlib compression helpers.
//!
//! ## Canonical Paths
//!
//! Every path entering the storage manager is first run through
//! [`real_dir`], which resolves `""`/`"."` to the working directory, `~`
//! to the home directory, collapses duplicate slashes, and interprets
//! `.`/`..` segments. The canonical form is what keys the open-array
//! registry and what every containment check compares, so two spellings
//! of the same directory always collapse to one entry.
//!
//! ## Durability
//!
//! Marker files and appended attribute data are synced before the
//! operation reports success. A fragment's visibility flip is a single
//! marker-file creation, so readers either see a fully written fragment
//! or none at all.
//!
//! ## Module Organization
//!
//! - `path`: canonicalisation and parent resolution
//! - `ops`: create/delete/enumerate/append primitives
//! - `gzip`: zlib deflate/inflate, including streaming inflate with
//!   unknown output size

mod gzip;
mod ops;
mod path;

pub use gzip::{gunzip_fixed, gunzip_streaming, gzip};
pub use ops::{
    child_dirs, create_dir, create_marker_file, delete_dir, delete_file, file_size, is_dir,
    is_file, list_entries, read_file_to_vec, rename, sync_file, write_to_file,
};
pub use path::{current_dir, parent_dir, real_dir};
