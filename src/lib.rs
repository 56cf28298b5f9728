//! # gridstore - Multi-Dimensional Array Storage Core
//!
//! gridstore persists dense and sparse N-dimensional arrays as a
//! directory-based hierarchy and coordinates concurrent readers, writers,
//! and consolidation over it. This crate is the storage management core:
//! everything that must be consistent when several threads and several
//! processes touch the same array tree at once.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        StorageManager (facade, manager)      │
//! ├──────────────────────────────────────────────┤
//! │ Open-array registry │ Consolidation filelock │
//! ├─────────────────────┴────────────────────────┤
//! │   Array engine  │  Fragment + book-keeping   │
//! ├─────────────────┴────────────────────────────┤
//! │ Namespace classifier │ Schema blob │ Coords  │
//! ├──────────────────────────────────────────────┤
//! │   Filesystem layer (paths, markers, gzip)    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Storage Model
//!
//! The namespace is a directory tree whose entity kinds are witnessed by
//! marker files: workspaces contain groups and arrays, groups nest, and
//! arrays hold one subdirectory per write batch (a *fragment*). A
//! fragment becomes visible to readers the instant its marker file
//! exists; consolidation merges all visible fragments into one under an
//! exclusive advisory file lock and then retires the originals.
//!
//! ```text
//! workspace/
//! ├── __tiledb_workspace.tdb
//! ├── __tiledb_group.tdb
//! └── group/
//!     ├── __tiledb_group.tdb
//!     └── array/
//!         ├── __array_schema.tdb
//!         ├── __consolidation_lock
//!         └── __a1f30001_1700000000123/
//!             ├── __tiledb_fragment.tdb
//!             ├── __book_keeping.tdb.gz
//!             └── v.tdb
//! ```
//!
//! ## Concurrency Model
//!
//! Parallel OS threads, no async. Three lock levels, always taken in
//! order: the registry lock, the per-entry lock, and the per-array
//! `fcntl` filelock (shared by readers, exclusive by consolidation).
//! Cross-process coordination rides entirely on the kernel lock; the
//! in-process tables mirror it so threads of one process obey the same
//! protocol.
//!
//! ## Quick Start
//!
//! ```ignore
//! use gridstore::{ArrayMode, ArraySchema, AttributeType, CoordsType, StorageManager};
//!
//! let sm = StorageManager::new();
//! sm.workspace_create("/data/w")?;
//! sm.group_create("/data/w/g")?;
//!
//! let schema = ArraySchema::new("/data/w/g/a", true, CoordsType::Int64)
//!     .add_dimension("rows", 1.0, 1000.0)
//!     .add_attribute("v", AttributeType::Int32);
//! sm.array_create(&schema)?;
//!
//! let mut writer = sm.array_init("/data/w/g/a", ArrayMode::Write, None)?;
//! writer.write("v", &1i32.to_le_bytes())?;
//! sm.array_finalize(writer)?;          // publishes the fragment
//!
//! sm.array_consolidate("/data/w/g/a")?;
//! ```
//!
//! ## Module Overview
//!
//! - [`manager`]: storage manager facade, open-array registry, filelock
//! - [`array`]: per-open array handle (read snapshot / write fragment)
//! - [`fragment`]: fragment directories and gzipped book-keeping
//! - [`schema`]: array schema and its opaque wire form
//! - [`layout`]: marker-file classifier and fragment ordering
//! - [`coords`]: generic coordinate comparators and MBR helpers
//! - [`fs`]: canonical paths, filesystem primitives, compression
//! - [`config`]: the on-disk naming contract

pub mod array;
pub mod config;
pub mod coords;
pub mod error;
pub mod fragment;
pub mod fs;
pub mod layout;
pub mod manager;
pub mod schema;

pub use array::{Array, ArrayMode};
pub use error::{Result, StorageError};
pub use layout::ObjectKind;
pub use manager::{FragmentInfo, OpenArrayState, StorageManager};
pub use schema::{ArraySchema, AttributeType, CellOrder, CoordsType};
