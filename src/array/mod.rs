//! # Array Engine
//!
//! The per-open handle the storage manager hands out. A read-mode array
//! holds an immutable snapshot of the open-array registry entry (schema,
//! ordered fragment list, book-keeping) and keeps that snapshot until it
//! is finalized, even if a consolidation rewrites the directory in the
//! meantime. A write-mode array owns a fresh, still-invisible fragment
//! that becomes visible when the array is finalized.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::COORDS_NAME;
use crate::error::{Result, StorageError};
use crate::fragment::{self, Fragment};
use crate::manager::OpenArrayState;
use crate::schema::ArraySchema;

/// How an array was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayMode {
    Read,
    Write,
}

impl ArrayMode {
    pub fn is_read(self) -> bool {
        self == ArrayMode::Read
    }

    pub fn is_write(self) -> bool {
        self == ArrayMode::Write
    }
}

/// An open array or metadata handle.
#[derive(Debug)]
pub struct Array {
    path: PathBuf,
    schema: Arc<ArraySchema>,
    mode: ArrayMode,
    attributes: Vec<String>,
    state: Option<Arc<OpenArrayState>>,
    fragment: Option<Fragment>,
}

impl Array {
    pub(crate) fn new_read(
        path: PathBuf,
        schema: Arc<ArraySchema>,
        state: Arc<OpenArrayState>,
        attributes: Vec<String>,
    ) -> Self {
        Self {
            path,
            schema,
            mode: ArrayMode::Read,
            attributes,
            state: Some(state),
            fragment: None,
        }
    }

    pub(crate) fn new_write(
        path: PathBuf,
        schema: Arc<ArraySchema>,
        fragment: Fragment,
        attributes: Vec<String>,
    ) -> Self {
        Self {
            path,
            schema,
            mode: ArrayMode::Write,
            attributes,
            state: None,
            fragment: Some(fragment),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Arc<ArraySchema> {
        &self.schema
    }

    pub fn mode(&self) -> ArrayMode {
        self.mode
    }

    /// Effective attribute set of this open (the requested subset, or
    /// every schema attribute plus coordinates for sparse arrays).
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Snapshot loaded at open time; present in read mode only.
    pub fn state(&self) -> Option<&Arc<OpenArrayState>> {
        self.state.as_ref()
    }

    /// Paths of the fragments visible to this handle.
    pub fn fragment_paths(&self) -> Vec<&Path> {
        match (&self.state, &self.fragment) {
            (Some(state), _) => state.fragments.iter().map(|f| f.path.as_path()).collect(),
            (None, Some(fragment)) => vec![fragment.path()],
            (None, None) => Vec::new(),
        }
    }

    fn write_fragment(&mut self) -> Result<&mut Fragment> {
        match (self.mode, self.fragment.as_mut()) {
            (ArrayMode::Write, Some(fragment)) => Ok(fragment),
            _ => Err(StorageError::InvalidMode(format!(
                "array '{}' is not open for writing",
                self.path.display()
            ))),
        }
    }

    /// Appends raw cell data to an attribute of the open write batch.
    pub fn write(&mut self, attribute: &str, bytes: &[u8]) -> Result<()> {
        if !self.attributes.iter().any(|a| a == attribute) {
            return Err(StorageError::NotFound(format!(
                "attribute '{attribute}' in array '{}'",
                self.path.display()
            )));
        }
        self.write_fragment()?.write_attribute(attribute, bytes)
    }

    /// Accounts for newly written cells in the fragment book-keeping.
    pub fn record_cells(&mut self, count: u64) -> Result<()> {
        self.write_fragment()?.book_keeping_mut().record_cells(count);
        Ok(())
    }

    /// Grows the fragment MBR to cover a written cell.
    pub fn expand_mbr(&mut self, coords: &[f64]) -> Result<()> {
        self.write_fragment()?.book_keeping_mut().expand_mbr(coords);
        Ok(())
    }

    /// fsyncs every data file of the open write batch.
    pub fn sync(&mut self) -> Result<()> {
        match (self.mode, self.fragment.as_ref()) {
            (ArrayMode::Write, Some(fragment)) => fragment.sync(),
            _ => Err(StorageError::InvalidMode(format!(
                "array '{}' is not open for writing",
                self.path.display()
            ))),
        }
    }

    /// fsyncs one attribute data file of the open write batch.
    pub fn sync_attribute(&mut self, attribute: &str) -> Result<()> {
        match (self.mode, self.fragment.as_ref()) {
            (ArrayMode::Write, Some(fragment)) => fragment.sync_attribute(attribute),
            _ => Err(StorageError::InvalidMode(format!(
                "array '{}' is not open for writing",
                self.path.display()
            ))),
        }
    }

    /// Drives the merge engine over this handle's snapshot. Read mode
    /// only; the returned fragment is not yet visible.
    pub fn consolidate(&self) -> Result<Option<(Fragment, Vec<PathBuf>)>> {
        match &self.state {
            Some(state) => fragment::consolidate(state),
            None => Err(StorageError::InvalidMode(format!(
                "array '{}' is not open for reading",
                self.path.display()
            ))),
        }
    }

    pub(crate) fn into_fragment(self) -> Result<Fragment> {
        self.fragment.ok_or_else(|| {
            StorageError::InvalidMode(
                "array holds no write fragment to finalize".to_string(),
            )
        })
    }
}

/// Computes the effective attribute set for an open.
pub(crate) fn effective_attributes(
    schema: &ArraySchema,
    requested: Option<&[&str]>,
) -> Result<Vec<String>> {
    match requested {
        None => {
            let mut attrs: Vec<String> = schema
                .attributes()
                .iter()
                .map(|a| a.name.clone())
                .collect();
            if !schema.dense() {
                attrs.push(COORDS_NAME.to_string());
            }
            Ok(attrs)
        }
        Some(names) => {
            if crate::coords::has_duplicates(names) {
                return Err(StorageError::InvalidPath(
                    "requested attribute list has duplicates".to_string(),
                ));
            }
            let mut attrs = Vec::with_capacity(names.len());
            for name in names {
                if *name != COORDS_NAME && !schema.has_attribute(name) {
                    return Err(StorageError::NotFound(format!(
                        "attribute '{name}' in schema of '{}'",
                        schema.array_name().display()
                    )));
                }
                attrs.push((*name).to_string());
            }
            Ok(attrs)
        }
    }
}
