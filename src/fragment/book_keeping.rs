//! Per-fragment book-keeping: the metadata a reader loads before it can
//! plan I/O against a fragment: density, cell count, and the minimum
//! bounding rectangle of the written cells.
//!
//! The blob lives in the fragment directory as `__book_keeping.tdb.gz`
//! and is stored zlib-deflated; loading inflates it through the
//! streaming path since the inflated size is not recorded anywhere.

use std::path::{Path, PathBuf};

use crate::array::ArrayMode;
use crate::config::BOOK_KEEPING_FILENAME;
use crate::error::{Result, StorageError};
use crate::fs;
use crate::schema::{ArraySchema, Reader};

const BOOK_KEEPING_VERSION: u16 = 1;

/// Book-keeping for one fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct BookKeeping {
    fragment_path: PathBuf,
    mode: ArrayMode,
    dense: bool,
    dim_num: usize,
    cell_num: u64,
    mbr: Vec<f64>,
}

impl BookKeeping {
    /// Fresh book-keeping for a fragment of `schema` at `fragment_path`.
    pub fn new(
        schema: &ArraySchema,
        dense: bool,
        fragment_path: impl Into<PathBuf>,
        mode: ArrayMode,
    ) -> Self {
        Self {
            fragment_path: fragment_path.into(),
            mode,
            dense,
            dim_num: schema.dim_num(),
            cell_num: 0,
            mbr: Vec::new(),
        }
    }

    pub fn fragment_path(&self) -> &Path {
        &self.fragment_path
    }

    pub fn dense(&self) -> bool {
        self.dense
    }

    pub fn cell_num(&self) -> u64 {
        self.cell_num
    }

    /// MBR over all recorded cells, `[lo_0, hi_0, ...]`; empty until the
    /// first cell is recorded.
    pub fn mbr(&self) -> &[f64] {
        &self.mbr
    }

    /// Accounts for `count` newly written cells.
    pub fn record_cells(&mut self, count: u64) {
        self.cell_num += count;
    }

    /// Grows the MBR to cover a cell.
    pub fn expand_mbr(&mut self, coords: &[f64]) {
        debug_assert_eq!(coords.len(), self.dim_num);
        if self.mbr.is_empty() {
            for &c in coords {
                self.mbr.push(c);
                self.mbr.push(c);
            }
        } else {
            crate::coords::expand_mbr(&mut self.mbr, coords);
        }
    }

    /// Merges another fragment's book-keeping into this one.
    pub fn absorb(&mut self, other: &BookKeeping) {
        self.cell_num += other.cell_num;
        if self.mbr.is_empty() {
            self.mbr = other.mbr.clone();
        } else if !other.mbr.is_empty() {
            for i in 0..self.dim_num {
                if other.mbr[2 * i] < self.mbr[2 * i] {
                    self.mbr[2 * i] = other.mbr[2 * i];
                }
                if other.mbr[2 * i + 1] > self.mbr[2 * i + 1] {
                    self.mbr[2 * i + 1] = other.mbr[2 * i + 1];
                }
            }
        }
    }

    fn blob_path(&self) -> PathBuf {
        self.fragment_path.join(BOOK_KEEPING_FILENAME)
    }

    /// Loads the gzipped blob from the fragment directory.
    pub fn load(&mut self) -> Result<()> {
        let path = self.blob_path();
        let compressed = fs::read_file_to_vec(&path)?;
        let bytes = fs::gunzip_streaming(&compressed)?;

        let mut reader = Reader::new(&bytes);
        let version = reader.get_u16()?;
        if version != BOOK_KEEPING_VERSION {
            return Err(StorageError::CorruptSchema(format!(
                "unsupported book-keeping version {version} in '{}'",
                path.display()
            )));
        }
        self.dense = reader.get_u8()? != 0;
        self.cell_num = reader.get_u64()?;
        let mbr_len = reader.get_u32()? as usize;
        let mut mbr = Vec::with_capacity(mbr_len);
        for _ in 0..mbr_len {
            mbr.push(reader.get_f64()?);
        }
        if !mbr.is_empty() && mbr.len() != 2 * self.dim_num {
            return Err(StorageError::CorruptSchema(format!(
                "book-keeping MBR has {} bounds for {} dimensions in '{}'",
                mbr.len(),
                self.dim_num,
                path.display()
            )));
        }
        self.mbr = mbr;
        Ok(())
    }

    /// Deflates and writes the blob into the fragment directory.
    pub fn flush(&self) -> Result<()> {
        debug_assert_eq!(self.mode, ArrayMode::Write);

        let mut bytes = Vec::with_capacity(32 + self.mbr.len() * 8);
        bytes.extend_from_slice(&BOOK_KEEPING_VERSION.to_le_bytes());
        bytes.push(u8::from(self.dense));
        bytes.extend_from_slice(&self.cell_num.to_le_bytes());
        bytes.extend_from_slice(&(self.mbr.len() as u32).to_le_bytes());
        for bound in &self.mbr {
            bytes.extend_from_slice(&bound.to_le_bytes());
        }

        let compressed = fs::gzip(&bytes)?;
        let path = self.blob_path();
        if fs::is_file(&path) {
            fs::delete_file(&path)?;
        }
        fs::write_to_file(&path, &compressed)
    }
}
