//! # Fragment Module
//!
//! A fragment is one write batch: a subdirectory of an array named
//! `__<uuid>_<timestamp_ms>` holding one data file per attribute plus a
//! gzipped book-keeping blob. A fragment is *invisible* to readers until
//! its `__tiledb_fragment.tdb` marker exists; [`Fragment::finalize`]
//! writes the marker last, so a crash mid-write leaves an ignorable
//! orphan directory rather than a half-readable fragment.
//!
//! ## Consolidation Materialiser
//!
//! [`consolidate`] merges every fragment of an open-array snapshot into
//! one new fragment: attribute files are concatenated in chronological
//! order and the book-keeping blobs are merged. The new fragment is
//! returned *unfinalised*; the storage manager flips visibility under
//! the exclusive consolidation filelock, not this module.

mod book_keeping;

pub use book_keeping::BookKeeping;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::array::ArrayMode;
use crate::config::{COORDS_NAME, FILE_SUFFIX, FRAGMENT_FILENAME};
use crate::error::{Result, StorageError};
use crate::fs;
use crate::manager::OpenArrayState;
use crate::schema::ArraySchema;

static FRAGMENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Builds a fresh `__<uuid>_<timestamp_ms>` basename. The uuid field is
/// the pid plus a process-wide sequence number, which keeps names unique
/// across processes and within one.
fn new_fragment_name() -> String {
    let pid = std::process::id();
    let seq = FRAGMENT_SEQ.fetch_add(1, Ordering::Relaxed);
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    format!("__{pid:x}{seq:06x}_{timestamp_ms}")
}

/// Write-side handle for one fragment directory.
#[derive(Debug)]
pub struct Fragment {
    array_path: PathBuf,
    path: PathBuf,
    dense: bool,
    book_keeping: BookKeeping,
}

impl Fragment {
    /// Creates the fragment directory under `array_path`. No marker is
    /// written; the fragment stays invisible until [`Fragment::finalize`].
    pub fn create(array_path: &Path, schema: &ArraySchema, dense: bool) -> Result<Fragment> {
        let path = array_path.join(new_fragment_name());
        fs::create_dir(&path)?;
        let book_keeping = BookKeeping::new(schema, dense, &path, ArrayMode::Write);
        Ok(Fragment {
            array_path: array_path.to_path_buf(),
            path,
            dense,
            book_keeping,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn array_path(&self) -> &Path {
        &self.array_path
    }

    pub fn dense(&self) -> bool {
        self.dense
    }

    pub fn book_keeping(&self) -> &BookKeeping {
        &self.book_keeping
    }

    pub fn book_keeping_mut(&mut self) -> &mut BookKeeping {
        &mut self.book_keeping
    }

    fn attribute_file(&self, attribute: &str) -> PathBuf {
        self.path.join(format!("{attribute}{FILE_SUFFIX}"))
    }

    /// Appends raw cell data to an attribute file.
    pub fn write_attribute(&mut self, attribute: &str, bytes: &[u8]) -> Result<()> {
        fs::write_to_file(&self.attribute_file(attribute), bytes)
    }

    /// fsyncs one attribute file.
    pub fn sync_attribute(&self, attribute: &str) -> Result<()> {
        let path = self.attribute_file(attribute);
        if !fs::is_file(&path) {
            return Err(StorageError::NotFound(format!(
                "attribute file '{}'",
                path.display()
            )));
        }
        fs::sync_file(&path)
    }

    /// fsyncs every data file in the fragment directory.
    pub fn sync(&self) -> Result<()> {
        for (name, path) in fs::list_entries(&self.path)? {
            if name.ends_with(FILE_SUFFIX) && fs::is_file(&path) {
                fs::sync_file(&path)?;
            }
        }
        Ok(())
    }

    /// Flushes book-keeping and writes the visibility marker. After this
    /// returns, readers enumerate the fragment.
    pub fn finalize(self) -> Result<()> {
        self.book_keeping.flush()?;
        fs::create_marker_file(&self.path.join(FRAGMENT_FILENAME))
    }
}

/// Merges all fragments of an open-array snapshot into one new,
/// unfinalised fragment. Returns `None` when the snapshot holds nothing
/// to consolidate.
pub fn consolidate(state: &OpenArrayState) -> Result<Option<(Fragment, Vec<PathBuf>)>> {
    if state.fragments.is_empty() {
        return Ok(None);
    }

    let schema = &state.schema;
    let array_path = schema.array_name();
    let dense = state.fragments.iter().all(|f| f.dense);
    let mut merged = Fragment::create(array_path, schema, dense)?;

    let mut attributes: Vec<String> = schema
        .attributes()
        .iter()
        .map(|a| a.name.clone())
        .collect();
    if !dense {
        attributes.push(COORDS_NAME.to_string());
    }

    for attribute in &attributes {
        for fragment in &state.fragments {
            let source = fragment
                .path
                .join(format!("{attribute}{FILE_SUFFIX}"));
            if !fs::is_file(&source) {
                continue;
            }
            let bytes = fs::read_file_to_vec(&source)?;
            merged.write_attribute(attribute, &bytes)?;
        }
    }

    for fragment in &state.fragments {
        merged.book_keeping.absorb(&fragment.book_keeping);
    }

    let old_paths: Vec<PathBuf> = state.fragments.iter().map(|f| f.path.clone()).collect();
    Ok(Some((merged, old_paths)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout;
    use crate::schema::{AttributeType, CoordsType};
    use tempfile::tempdir;

    fn schema(path: &Path) -> ArraySchema {
        ArraySchema::new(path, true, CoordsType::Int64)
            .add_dimension("x", 0.0, 63.0)
            .add_attribute("v", AttributeType::Int32)
    }

    #[test]
    fn fragment_names_are_unique_and_parse() {
        let a = new_fragment_name();
        let b = new_fragment_name();
        assert_ne!(a, b);
        layout::fragment_timestamp(Path::new(&a)).unwrap();
    }

    #[test]
    fn fragment_is_invisible_until_finalized() {
        let dir = tempdir().unwrap();
        let schema = schema(dir.path());

        let mut fragment = Fragment::create(dir.path(), &schema, true).unwrap();
        fragment.write_attribute("v", &[1, 2, 3, 4]).unwrap();
        fragment.book_keeping_mut().record_cells(1);
        let path = fragment.path().to_path_buf();

        assert!(!layout::is_fragment(&path));
        fragment.finalize().unwrap();
        assert!(layout::is_fragment(&path));
        assert!(fs::is_file(&path.join(crate::config::BOOK_KEEPING_FILENAME)));
    }

    #[test]
    fn sync_attribute_requires_the_file() {
        let dir = tempdir().unwrap();
        let schema = schema(dir.path());
        let mut fragment = Fragment::create(dir.path(), &schema, true).unwrap();
        assert!(matches!(
            fragment.sync_attribute("v"),
            Err(StorageError::NotFound(_))
        ));
        fragment.write_attribute("v", &[9]).unwrap();
        fragment.sync_attribute("v").unwrap();
        fragment.sync().unwrap();
    }
}
