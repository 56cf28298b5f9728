//! # Storage Manager
//!
//! The façade every caller goes through: namespace lifecycle
//! (workspaces, groups, arrays, metadata), open/close with reference
//! counting, fragment consolidation, and entity enumeration. One
//! `StorageManager` instance owns the process-wide open-array registry;
//! callers that need a singleton construct one at boot.
//!
//! ## Namespace Containment
//!
//! ```text
//! <any non-entity dir>
//! └── workspace            (workspace + group markers)
//!     ├── group            (group marker)
//!     │   ├── array        (schema + consolidation lock)
//!     │   │   └── metadata (metadata schema + consolidation lock)
//!     │   └── metadata
//!     └── array
//! ```
//!
//! Workspaces may not nest inside any entity; groups live in workspaces
//! or groups; arrays live in workspaces or groups; metadata live in
//! workspaces, groups, or arrays. Every create and move re-checks the
//! table against the live filesystem.
//!
//! ## Open Protocol
//!
//! Opening an array for read walks the lock hierarchy in order: the
//! registry lock (get-or-create the entry, bump the refcount), the
//! per-entry lock (first opener loads schema, fragment list, and
//! book-keeping), and the shared consolidation filelock (held until the
//! last close). Write opens do not touch the registry: they materialise
//! a fresh invisible fragment that `array_finalize` publishes with a
//! single marker-file create.
//!
//! ## Consolidation
//!
//! `array_consolidate` merges all visible fragments into one. The merge
//! runs under a shared lock like any reader; the visibility flip runs
//! under the exclusive filelock: publish the new fragment's marker,
//! remove the old markers, release the lock, then delete the old
//! directories. Readers that opened earlier keep reading their snapshot
//! (on POSIX, unlinked data files stay readable until last close).

mod filelock;
mod registry;

pub use filelock::{FileLock, LockKind};
pub use registry::{FragmentInfo, OpenArray, OpenArrayState};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::array::{self, Array, ArrayMode};
use crate::config::{
    ARRAY_SCHEMA_FILENAME, CONSOLIDATION_FILELOCK_NAME, COORDS_NAME, FILE_SUFFIX,
    FRAGMENT_FILENAME, GROUP_FILENAME, METADATA_SCHEMA_FILENAME, NAME_MAX_LEN,
    WORKSPACE_FILENAME,
};
use crate::error::{Result, StorageError};
use crate::fragment::{BookKeeping, Fragment};
use crate::fs;
use crate::layout::{self, ObjectKind};
use crate::schema::ArraySchema;

/// The storage management core. Cheap to share behind an `Arc`; all
/// methods take `&self`.
pub struct StorageManager {
    open_arrays: registry::OpenArrays,
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageManager {
    pub fn new() -> Self {
        Self {
            open_arrays: registry::OpenArrays::new(),
        }
    }

    /// Canonicalises an entity path and applies the length cap.
    fn entity_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let real = fs::real_dir(path.as_ref())?;
        if real.as_os_str().len() > NAME_MAX_LEN {
            return Err(StorageError::InvalidPath(format!(
                "path of {} bytes exceeds the {NAME_MAX_LEN} byte cap",
                real.as_os_str().len()
            )));
        }
        Ok(real)
    }

    // ------------------------------------------------------------------
    // Workspace
    // ------------------------------------------------------------------

    /// Creates a workspace. The parent may not be any storage entity.
    pub fn workspace_create(&self, workspace: impl AsRef<Path>) -> Result<()> {
        let workspace = Self::entity_path(workspace)?;
        let parent = fs::parent_dir(&workspace);
        if layout::is_any_entity(&parent) {
            return Err(StorageError::Containment(format!(
                "workspace '{}' cannot live inside workspace, group, array, or metadata '{}'",
                workspace.display(),
                parent.display()
            )));
        }

        fs::create_dir(&workspace)?;
        fs::create_marker_file(&workspace.join(WORKSPACE_FILENAME))?;
        // A workspace parents groups and arrays exactly like a group.
        fs::create_marker_file(&workspace.join(GROUP_FILENAME))?;
        debug!(workspace = %workspace.display(), "created workspace");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Group
    // ------------------------------------------------------------------

    /// Creates a group inside a workspace or another group.
    pub fn group_create(&self, group: impl AsRef<Path>) -> Result<()> {
        let group = Self::entity_path(group)?;
        let parent = fs::parent_dir(&group);
        if !layout::is_workspace(&parent) && !layout::is_group(&parent) {
            return Err(StorageError::Containment(format!(
                "group '{}' must live in a workspace or group, but '{}' is neither",
                group.display(),
                parent.display()
            )));
        }

        fs::create_dir(&group)?;
        fs::create_marker_file(&group.join(GROUP_FILENAME))?;
        debug!(group = %group.display(), "created group");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Array
    // ------------------------------------------------------------------

    /// Creates an array from its schema. The schema's embedded name is
    /// canonicalised before it is stored.
    pub fn array_create(&self, schema: &ArraySchema) -> Result<()> {
        let dir = Self::entity_path(schema.array_name())?;
        let parent = fs::parent_dir(&dir);
        if !layout::is_workspace(&parent) && !layout::is_group(&parent) {
            return Err(StorageError::Containment(format!(
                "array '{}' must live in a workspace or group, but '{}' is neither",
                dir.display(),
                parent.display()
            )));
        }

        fs::create_dir(&dir)?;
        let mut stored = schema.clone();
        stored.set_array_name(&dir);
        self.store_schema(&dir, ARRAY_SCHEMA_FILENAME, &stored)?;
        fs::create_marker_file(&dir.join(CONSOLIDATION_FILELOCK_NAME))?;
        debug!(array = %dir.display(), "created array");
        Ok(())
    }

    /// Loads and deserialises an array's schema.
    pub fn array_load_schema(&self, array: impl AsRef<Path>) -> Result<ArraySchema> {
        let dir = Self::entity_path(array)?;
        if !layout::is_array(&dir) {
            return Err(StorageError::NotFound(format!(
                "array '{}'",
                dir.display()
            )));
        }
        Self::load_schema_file(&dir.join(ARRAY_SCHEMA_FILENAME))
    }

    /// Opens an array. Read mode registers the open in the registry and
    /// pins the fragment snapshot; write mode materialises a fresh,
    /// still-invisible fragment.
    pub fn array_init(
        &self,
        array: impl AsRef<Path>,
        mode: ArrayMode,
        attributes: Option<&[&str]>,
    ) -> Result<Array> {
        let dir = Self::entity_path(array)?;
        if !layout::is_array(&dir) {
            return Err(StorageError::NotFound(format!(
                "array '{}'",
                dir.display()
            )));
        }
        self.init_entity(dir, mode, attributes, false)
    }

    /// Flushes and closes a handle returned by `array_init` or
    /// `metadata_init`. Write handles publish their fragment marker;
    /// read handles drop their registry reference.
    pub fn array_finalize(&self, array: Array) -> Result<()> {
        match array.mode() {
            ArrayMode::Write => {
                let fragment = array.into_fragment()?;
                let path = fragment.path().to_path_buf();
                fragment.finalize()?;
                debug!(fragment = %path.display(), "published fragment");
                Ok(())
            }
            ArrayMode::Read => {
                let dir = array.path().to_path_buf();
                drop(array);
                self.array_close(&dir)
            }
        }
    }

    /// fsync-equivalent over every data file of an open write batch.
    pub fn array_sync(&self, array: &mut Array) -> Result<()> {
        array.sync()
    }

    /// fsync-equivalent over one attribute data file.
    pub fn array_sync_attribute(&self, array: &mut Array, attribute: &str) -> Result<()> {
        array.sync_attribute(attribute)
    }

    /// Merges all visible fragments of an array into one (§ module doc).
    pub fn array_consolidate(&self, array: impl AsRef<Path>) -> Result<()> {
        let dir = Self::entity_path(array)?;
        if !layout::is_array(&dir) {
            return Err(StorageError::NotFound(format!(
                "array '{}'",
                dir.display()
            )));
        }
        self.consolidate_entity(dir, false)
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Creates a metadata entity; the parent may additionally be an
    /// array.
    pub fn metadata_create(&self, schema: &ArraySchema) -> Result<()> {
        let dir = Self::entity_path(schema.array_name())?;
        let parent = fs::parent_dir(&dir);
        if !layout::is_workspace(&parent)
            && !layout::is_group(&parent)
            && !layout::is_array(&parent)
        {
            return Err(StorageError::Containment(format!(
                "metadata '{}' must live in a workspace, group, or array, but '{}' is none",
                dir.display(),
                parent.display()
            )));
        }

        fs::create_dir(&dir)?;
        let mut stored = schema.clone();
        stored.set_array_name(&dir);
        self.store_schema(&dir, METADATA_SCHEMA_FILENAME, &stored)?;
        fs::create_marker_file(&dir.join(CONSOLIDATION_FILELOCK_NAME))?;
        debug!(metadata = %dir.display(), "created metadata");
        Ok(())
    }

    /// Loads and deserialises a metadata entity's schema.
    pub fn metadata_load_schema(&self, metadata: impl AsRef<Path>) -> Result<ArraySchema> {
        let dir = Self::entity_path(metadata)?;
        if !layout::is_metadata(&dir) {
            return Err(StorageError::NotFound(format!(
                "metadata '{}'",
                dir.display()
            )));
        }
        Self::load_schema_file(&dir.join(METADATA_SCHEMA_FILENAME))
    }

    /// Opens a metadata entity; same protocol as `array_init`.
    pub fn metadata_init(
        &self,
        metadata: impl AsRef<Path>,
        mode: ArrayMode,
        attributes: Option<&[&str]>,
    ) -> Result<Array> {
        let dir = Self::entity_path(metadata)?;
        if !layout::is_metadata(&dir) {
            return Err(StorageError::NotFound(format!(
                "metadata '{}'",
                dir.display()
            )));
        }
        self.init_entity(dir, mode, attributes, true)
    }

    /// Consolidates the array underlying a metadata entity.
    pub fn metadata_consolidate(&self, metadata: impl AsRef<Path>) -> Result<()> {
        let dir = Self::entity_path(metadata)?;
        if !layout::is_metadata(&dir) {
            return Err(StorageError::NotFound(format!(
                "metadata '{}'",
                dir.display()
            )));
        }
        self.consolidate_entity(dir, true)
    }

    // ------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------

    /// Classifies a directory, canonicalising first.
    pub fn dir_type(&self, path: impl AsRef<Path>) -> Result<Option<ObjectKind>> {
        let dir = Self::entity_path(path)?;
        Ok(layout::classify(&dir))
    }

    /// Lists the storage entities directly inside `parent` with their
    /// kinds, sorted by name. Hidden files and foreign directories are
    /// skipped; a missing parent yields an empty listing.
    pub fn ls(&self, parent: impl AsRef<Path>) -> Result<Vec<(String, ObjectKind)>> {
        let parent = Self::entity_path(parent)?;
        if !fs::is_dir(&parent) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for (name, path) in fs::list_entries(&parent)? {
            if let Some(kind) = layout::classify(&path) {
                out.push((name, kind));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    /// Counts the storage entities directly inside `parent`.
    pub fn ls_c(&self, parent: impl AsRef<Path>) -> Result<usize> {
        let parent = Self::entity_path(parent)?;
        if !fs::is_dir(&parent) {
            return Ok(0);
        }
        let mut count = 0;
        for (_, path) in fs::list_entries(&parent)? {
            if layout::classify(&path).is_some() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Refcount of the open-array entry for `path`, if any. Diagnostic.
    pub fn open_array_refcount(&self, path: impl AsRef<Path>) -> Result<Option<u64>> {
        let dir = Self::entity_path(path)?;
        Ok(self.open_arrays.refcount(&dir))
    }

    // ------------------------------------------------------------------
    // Move / clear / delete
    // ------------------------------------------------------------------

    /// Renames an entity, re-checking containment at the destination.
    /// Arrays and metadata get their embedded schema name rewritten.
    pub fn move_entity(&self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<()> {
        let old = Self::entity_path(old)?;
        let new = Self::entity_path(new)?;
        match layout::classify(&old) {
            Some(ObjectKind::Workspace) => self.workspace_move(&old, &new),
            Some(ObjectKind::Group) => self.group_move(&old, &new),
            Some(ObjectKind::Array) => self.array_move(&old, &new),
            Some(ObjectKind::Metadata) => self.metadata_move(&old, &new),
            None => Err(StorageError::NotFound(format!(
                "no storage entity at '{}'",
                old.display()
            ))),
        }
    }

    /// Removes an entity's children, keeping its own marker, schema, and
    /// lock file.
    pub fn clear(&self, path: impl AsRef<Path>) -> Result<()> {
        let dir = Self::entity_path(path)?;
        match layout::classify(&dir) {
            Some(ObjectKind::Workspace) => self.workspace_clear(&dir),
            Some(ObjectKind::Group) => self.group_clear(&dir),
            Some(ObjectKind::Array) => self.array_clear(&dir),
            Some(ObjectKind::Metadata) => self.metadata_clear(&dir),
            None => Err(StorageError::NotFound(format!(
                "no storage entity at '{}'",
                dir.display()
            ))),
        }
    }

    /// Clears an entity and removes its directory.
    pub fn delete_entire(&self, path: impl AsRef<Path>) -> Result<()> {
        let dir = Self::entity_path(path)?;
        match layout::classify(&dir) {
            Some(ObjectKind::Workspace) => self.workspace_delete(&dir),
            Some(ObjectKind::Group) => self.group_delete(&dir),
            Some(ObjectKind::Array) => self.array_delete(&dir),
            Some(ObjectKind::Metadata) => self.metadata_delete(&dir),
            None => Err(StorageError::NotFound(format!(
                "no storage entity at '{}'",
                dir.display()
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Open/close internals
    // ------------------------------------------------------------------

    fn init_entity(
        &self,
        dir: PathBuf,
        mode: ArrayMode,
        attributes: Option<&[&str]>,
        metadata: bool,
    ) -> Result<Array> {
        match mode {
            ArrayMode::Read => {
                let state = self.array_open(&dir, mode)?;
                let attrs = match array::effective_attributes(&state.schema, attributes) {
                    Ok(attrs) => attrs,
                    Err(e) => {
                        // Undo the open; the attribute error wins.
                        let _ = self.array_close(&dir);
                        return Err(e);
                    }
                };
                debug!(array = %dir.display(), fragments = state.fragments.len(), "opened for read");
                Ok(Array::new_read(
                    dir,
                    Arc::clone(&state.schema),
                    state,
                    attrs,
                ))
            }
            ArrayMode::Write => {
                let schema = if metadata {
                    self.metadata_load_schema(&dir)?
                } else {
                    self.array_load_schema(&dir)?
                };
                let schema = Arc::new(schema);
                let attrs = array::effective_attributes(&schema, attributes)?;
                let fragment = Fragment::create(&dir, &schema, schema.dense())?;
                debug!(array = %dir.display(), fragment = %fragment.path().display(), "opened for write");
                Ok(Array::new_write(dir, schema, fragment, attrs))
            }
        }
    }

    /// Registers a read open and returns the loaded snapshot.
    fn array_open(&self, dir: &Path, mode: ArrayMode) -> Result<Arc<OpenArrayState>> {
        let entry = self.open_arrays.acquire(dir);
        match entry.ensure_loaded(|| Self::load_open_array(dir, mode)) {
            Ok(state) => Ok(state),
            Err(e) => {
                // First-open failed: undo the refcount (removing the
                // entry at zero) and propagate the original error.
                let _ = self.open_arrays.release(dir);
                Err(e)
            }
        }
    }

    /// First-open loading: shared filelock, fragment enumeration in
    /// chronological order, schema, and per-fragment book-keeping.
    fn load_open_array(dir: &Path, mode: ArrayMode) -> Result<(OpenArrayState, FileLock)> {
        let filelock = FileLock::acquire(
            &dir.join(CONSOLIDATION_FILELOCK_NAME),
            LockKind::Shared,
        )?;

        let mut fragment_dirs: Vec<PathBuf> = fs::child_dirs(dir)?
            .into_iter()
            .filter(|d| layout::is_fragment(d))
            .collect();
        layout::sort_fragment_names(&mut fragment_dirs)?;

        let schema = if layout::is_array(dir) {
            Self::load_schema_file(&dir.join(ARRAY_SCHEMA_FILENAME))?
        } else if layout::is_metadata(dir) {
            Self::load_schema_file(&dir.join(METADATA_SCHEMA_FILENAME))?
        } else {
            return Err(StorageError::NotFound(format!(
                "array or metadata '{}'",
                dir.display()
            )));
        };
        let schema = Arc::new(schema);

        let mut fragments = Vec::with_capacity(fragment_dirs.len());
        for path in fragment_dirs {
            // A fragment with no coordinates file holds dense data.
            let dense = !fs::is_file(&path.join(format!("{COORDS_NAME}{FILE_SUFFIX}")));
            let mut book_keeping = BookKeeping::new(&schema, dense, &path, mode);
            book_keeping.load()?;
            fragments.push(FragmentInfo {
                path,
                dense: book_keeping.dense(),
                book_keeping,
            });
        }

        Ok((OpenArrayState { schema, fragments }, filelock))
    }

    /// Drops one registry reference.
    fn array_close(&self, dir: &Path) -> Result<()> {
        self.open_arrays.release(dir)?;
        debug!(array = %dir.display(), "closed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Consolidation internals
    // ------------------------------------------------------------------

    fn consolidate_entity(&self, dir: PathBuf, metadata: bool) -> Result<()> {
        let handle = if metadata {
            self.metadata_init(&dir, ArrayMode::Read, None)?
        } else {
            self.array_init(&dir, ArrayMode::Read, None)?
        };

        let merged = handle.consolidate();
        let path = handle.path().to_path_buf();
        drop(handle);
        let close_status = self.array_close(&path);

        // Both the merge and the close must have succeeded before the
        // visibility flip runs.
        let merged = merged?;
        close_status?;

        match merged {
            None => Ok(()),
            Some((fragment, old_paths)) => self.consolidation_finalize(fragment, &old_paths),
        }
    }

    /// The visibility flip: publish the new fragment, hide the old ones,
    /// then reclaim their directories.
    fn consolidation_finalize(&self, fragment: Fragment, old_paths: &[PathBuf]) -> Result<()> {
        if old_paths.is_empty() {
            return Ok(());
        }

        let array_path = fragment.array_path().to_path_buf();
        let new_path = fragment.path().to_path_buf();
        let filelock = FileLock::acquire(
            &array_path.join(CONSOLIDATION_FILELOCK_NAME),
            LockKind::Exclusive,
        )?;

        // Publish first: from here on the merged data is reachable, so a
        // failure below leaves a consistent (if duplicated) array.
        fragment.finalize()?;

        for old in old_paths {
            let marker = old.join(FRAGMENT_FILENAME);
            if let Err(e) = fs::delete_file(&marker) {
                warn!(
                    array = %array_path.display(),
                    fragment = %old.display(),
                    "consolidation could not hide an old fragment"
                );
                return Err(StorageError::PartialConsolidation(format!(
                    "new fragment '{}' is visible but marker '{}' could not be removed: {e}",
                    new_path.display(),
                    marker.display()
                )));
            }
        }

        drop(filelock);

        for old in old_paths {
            fs::delete_dir(old)?;
        }
        debug!(
            array = %array_path.display(),
            merged = old_paths.len(),
            fragment = %new_path.display(),
            "consolidated"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Schema storage
    // ------------------------------------------------------------------

    fn load_schema_file(path: &Path) -> Result<ArraySchema> {
        let bytes = fs::read_file_to_vec(path)?;
        if bytes.is_empty() {
            return Err(StorageError::CorruptSchema(format!(
                "empty schema file '{}'",
                path.display()
            )));
        }
        ArraySchema::deserialize(&bytes)
    }

    /// Stores a schema blob via temp-file-and-rename, so a crash never
    /// leaves the entity without a readable schema.
    fn store_schema(&self, dir: &Path, filename: &str, schema: &ArraySchema) -> Result<()> {
        let bytes = schema.serialize()?;
        let target = dir.join(filename);
        let staging = dir.join(format!("{filename}.tmp"));
        if fs::is_file(&staging) {
            fs::delete_file(&staging)?;
        }
        fs::write_to_file(&staging, &bytes)?;
        fs::rename(&staging, &target)
    }

    // ------------------------------------------------------------------
    // Per-kind move
    // ------------------------------------------------------------------

    fn move_preamble(&self, new: &Path) -> Result<()> {
        if fs::is_dir(new) {
            return Err(StorageError::AlreadyExists(format!(
                "directory '{}'",
                new.display()
            )));
        }
        Ok(())
    }

    fn workspace_move(&self, old: &Path, new: &Path) -> Result<()> {
        self.move_preamble(new)?;
        let parent = fs::parent_dir(new);
        if layout::is_any_entity(&parent) {
            return Err(StorageError::Containment(format!(
                "workspace destination parent '{}' may not be a storage entity",
                parent.display()
            )));
        }
        fs::rename(old, new)
    }

    fn group_move(&self, old: &Path, new: &Path) -> Result<()> {
        self.move_preamble(new)?;
        let parent = fs::parent_dir(new);
        if !layout::is_workspace(&parent) && !layout::is_group(&parent) {
            return Err(StorageError::Containment(format!(
                "group destination parent '{}' must be a workspace or group",
                parent.display()
            )));
        }
        fs::rename(old, new)
    }

    fn array_move(&self, old: &Path, new: &Path) -> Result<()> {
        self.move_preamble(new)?;
        let parent = fs::parent_dir(new);
        if !layout::is_workspace(&parent) && !layout::is_group(&parent) {
            return Err(StorageError::Containment(format!(
                "array destination parent '{}' must be a workspace or group",
                parent.display()
            )));
        }
        fs::rename(old, new)?;

        // The schema embeds the array name; rewrite it for the new home.
        let mut schema = Self::load_schema_file(&new.join(ARRAY_SCHEMA_FILENAME))?;
        schema.set_array_name(new);
        self.store_schema(new, ARRAY_SCHEMA_FILENAME, &schema)
    }

    fn metadata_move(&self, old: &Path, new: &Path) -> Result<()> {
        self.move_preamble(new)?;
        let parent = fs::parent_dir(new);
        if !layout::is_workspace(&parent)
            && !layout::is_group(&parent)
            && !layout::is_array(&parent)
        {
            return Err(StorageError::Containment(format!(
                "metadata destination parent '{}' must be a workspace, group, or array",
                parent.display()
            )));
        }
        fs::rename(old, new)?;

        let mut schema = Self::load_schema_file(&new.join(METADATA_SCHEMA_FILENAME))?;
        schema.set_array_name(new);
        self.store_schema(new, METADATA_SCHEMA_FILENAME, &schema)
    }

    // ------------------------------------------------------------------
    // Per-kind clear/delete
    // ------------------------------------------------------------------

    fn foreign_element(path: &Path) -> StorageError {
        StorageError::InvalidPath(format!(
            "cannot delete foreign element '{}'",
            path.display()
        ))
    }

    fn workspace_clear(&self, dir: &Path) -> Result<()> {
        for (name, path) in fs::list_entries(dir)? {
            if name == WORKSPACE_FILENAME || name == GROUP_FILENAME {
                continue;
            }
            match layout::classify(&path) {
                Some(ObjectKind::Workspace) => self.workspace_delete(&path)?,
                Some(ObjectKind::Group) => self.group_delete(&path)?,
                Some(ObjectKind::Array) => self.array_delete(&path)?,
                Some(ObjectKind::Metadata) => self.metadata_delete(&path)?,
                None => return Err(Self::foreign_element(&path)),
            }
        }
        Ok(())
    }

    fn workspace_delete(&self, dir: &Path) -> Result<()> {
        self.workspace_clear(dir)?;
        fs::delete_dir(dir)
    }

    fn group_clear(&self, dir: &Path) -> Result<()> {
        for (name, path) in fs::list_entries(dir)? {
            if name == GROUP_FILENAME {
                continue;
            }
            match layout::classify(&path) {
                Some(ObjectKind::Workspace) => self.workspace_delete(&path)?,
                Some(ObjectKind::Group) => self.group_delete(&path)?,
                Some(ObjectKind::Array) => self.array_delete(&path)?,
                Some(ObjectKind::Metadata) => self.metadata_delete(&path)?,
                None => return Err(Self::foreign_element(&path)),
            }
        }
        Ok(())
    }

    fn group_delete(&self, dir: &Path) -> Result<()> {
        self.group_clear(dir)?;
        fs::delete_dir(dir)
    }

    fn array_clear(&self, dir: &Path) -> Result<()> {
        for (name, path) in fs::list_entries(dir)? {
            if name == ARRAY_SCHEMA_FILENAME || name == CONSOLIDATION_FILELOCK_NAME {
                continue;
            }
            if layout::is_metadata(&path) {
                self.metadata_delete(&path)?;
            } else if layout::is_fragment(&path) {
                fs::delete_dir(&path)?;
            } else {
                return Err(Self::foreign_element(&path));
            }
        }
        Ok(())
    }

    fn array_delete(&self, dir: &Path) -> Result<()> {
        self.array_clear(dir)?;
        fs::delete_dir(dir)
    }

    fn metadata_clear(&self, dir: &Path) -> Result<()> {
        for (name, path) in fs::list_entries(dir)? {
            if name == METADATA_SCHEMA_FILENAME || name == CONSOLIDATION_FILELOCK_NAME {
                continue;
            }
            if layout::is_fragment(&path) {
                fs::delete_dir(&path)?;
            } else {
                return Err(Self::foreign_element(&path));
            }
        }
        Ok(())
    }

    fn metadata_delete(&self, dir: &Path) -> Result<()> {
        self.metadata_clear(dir)?;
        fs::delete_dir(dir)
    }
}
