//! # Namespace Classifier
//!
//! Decides what a directory *is*. A directory is classified as a given
//! entity kind iff it is a directory and contains that kind's marker
//! file; nothing else is consulted. Classification is pure over the
//! filesystem state at call time; there is no caching, so a marker
//! written by another process is honoured by the very next probe.
//!
//! Workspaces carry both the workspace and the group marker (a workspace
//! parents groups and arrays the same way a group does), so the workspace
//! probe runs before the group probe.

mod fragment_name;

pub use fragment_name::{fragment_timestamp, sort_fragment_names};

use std::fmt;
use std::path::Path;

use crate::config::{
    ARRAY_SCHEMA_FILENAME, FRAGMENT_FILENAME, GROUP_FILENAME, METADATA_SCHEMA_FILENAME,
    WORKSPACE_FILENAME,
};
use crate::fs;

/// The kind of a namespace entity, as witnessed by its marker file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Workspace,
    Group,
    Array,
    Metadata,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Workspace => "workspace",
            ObjectKind::Group => "group",
            ObjectKind::Array => "array",
            ObjectKind::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// True iff `dir` is a workspace directory.
pub fn is_workspace(dir: &Path) -> bool {
    fs::is_dir(dir) && fs::is_file(dir.join(WORKSPACE_FILENAME))
}

/// True iff `dir` is a group directory (workspaces also qualify).
pub fn is_group(dir: &Path) -> bool {
    fs::is_dir(dir) && fs::is_file(dir.join(GROUP_FILENAME))
}

/// True iff `dir` is an array directory.
pub fn is_array(dir: &Path) -> bool {
    fs::is_dir(dir) && fs::is_file(dir.join(ARRAY_SCHEMA_FILENAME))
}

/// True iff `dir` is a metadata directory.
pub fn is_metadata(dir: &Path) -> bool {
    fs::is_dir(dir) && fs::is_file(dir.join(METADATA_SCHEMA_FILENAME))
}

/// True iff `dir` is a completed, reader-visible fragment directory.
pub fn is_fragment(dir: &Path) -> bool {
    fs::is_dir(dir) && fs::is_file(dir.join(FRAGMENT_FILENAME))
}

/// Classifies a directory, or returns `None` if it is no entity at all.
pub fn classify(dir: &Path) -> Option<ObjectKind> {
    if is_workspace(dir) {
        Some(ObjectKind::Workspace)
    } else if is_group(dir) {
        Some(ObjectKind::Group)
    } else if is_array(dir) {
        Some(ObjectKind::Array)
    } else if is_metadata(dir) {
        Some(ObjectKind::Metadata)
    } else {
        None
    }
}

/// True iff `dir` is any namespace entity.
pub fn is_any_entity(dir: &Path) -> bool {
    classify(dir).is_some()
}
