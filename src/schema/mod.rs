//! # Array Schema
//!
//! The schema describes one array: its canonical path, density, domain
//! dimensions, and attributes. The storage manager treats the serialised
//! form as an opaque byte blob: it reads the whole schema file into a
//! buffer and hands it to [`ArraySchema::deserialize`], and stores
//! whatever [`ArraySchema::serialize`] returns. Only this module knows
//! the wire layout.
//!
//! ## Wire Format
//!
//! Little-endian throughout. Strings are a `u32` byte length followed by
//! UTF-8 bytes.
//!
//! ```text
//! Offset  Size  Description
//! 0       4     Magic: "GRDS"
//! 4       2     Version (currently 1)
//! 6       1     Dense flag
//! 7       1     Coordinate type tag
//! 8       1     Cell order tag
//! 9       8     Tile capacity (cells)
//! 17      ..    Array name (string)
//! ..      4     Dimension count, then per dimension:
//!               name (string), lo (f64), hi (f64)
//! ..      4     Attribute count, then per attribute:
//!               name (string), type tag (u8)
//! ```
//!
//! An empty or malformed blob deserialises to
//! [`StorageError::CorruptSchema`].

use std::path::{Path, PathBuf};

use crate::coords::has_duplicates;
use crate::error::{Result, StorageError};

const SCHEMA_MAGIC: u32 = 0x4752_4453; // "GRDS"
const SCHEMA_VERSION: u16 = 1;

/// Physical order of cells within a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOrder {
    RowMajor,
    ColMajor,
}

/// Element type of the coordinate domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordsType {
    Int32,
    Int64,
    Float32,
    Float64,
}

/// Element type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    Int32,
    Int64,
    Float32,
    Float64,
    Char,
}

/// One domain dimension: a name and an inclusive `[lo, hi]` extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub lo: f64,
    pub hi: f64,
}

/// One array attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub attr_type: AttributeType,
}

/// Schema of one array or metadata entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    array_name: PathBuf,
    dense: bool,
    coords_type: CoordsType,
    cell_order: CellOrder,
    capacity: u64,
    dimensions: Vec<Dimension>,
    attributes: Vec<Attribute>,
}

impl ArraySchema {
    /// Starts a schema for the array at `array_name`.
    pub fn new(array_name: impl Into<PathBuf>, dense: bool, coords_type: CoordsType) -> Self {
        Self {
            array_name: array_name.into(),
            dense,
            coords_type,
            cell_order: CellOrder::RowMajor,
            capacity: 10_000,
            dimensions: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_cell_order(mut self, cell_order: CellOrder) -> Self {
        self.cell_order = cell_order;
        self
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn add_dimension(mut self, name: impl Into<String>, lo: f64, hi: f64) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            lo,
            hi,
        });
        self
    }

    pub fn add_attribute(mut self, name: impl Into<String>, attr_type: AttributeType) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            attr_type,
        });
        self
    }

    pub fn array_name(&self) -> &Path {
        &self.array_name
    }

    pub fn set_array_name(&mut self, name: impl Into<PathBuf>) {
        self.array_name = name.into();
    }

    pub fn dense(&self) -> bool {
        self.dense
    }

    pub fn coords_type(&self) -> CoordsType {
        self.coords_type
    }

    pub fn cell_order(&self) -> CellOrder {
        self.cell_order
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn dim_num(&self) -> usize {
        self.dimensions.len()
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn attribute_num(&self) -> usize {
        self.attributes.len()
    }

    /// Name of the attribute at `index`.
    pub fn attribute(&self, index: usize) -> Option<&str> {
        self.attributes.get(index).map(|a| a.name.as_str())
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// True iff `name` is one of this schema's attributes.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Rejects schemas with no dimensions or repeated names.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions.is_empty() {
            return Err(StorageError::CorruptSchema(
                "schema declares no dimensions".to_string(),
            ));
        }
        let dim_names: Vec<&str> = self.dimensions.iter().map(|d| d.name.as_str()).collect();
        if has_duplicates(&dim_names) {
            return Err(StorageError::CorruptSchema(
                "schema has duplicate dimension names".to_string(),
            ));
        }
        let attr_names: Vec<&str> = self.attributes.iter().map(|a| a.name.as_str()).collect();
        if has_duplicates(&attr_names) {
            return Err(StorageError::CorruptSchema(
                "schema has duplicate attribute names".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialises the schema into its opaque wire form.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&SCHEMA_MAGIC.to_le_bytes());
        out.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
        out.push(u8::from(self.dense));
        out.push(coords_type_tag(self.coords_type));
        out.push(match self.cell_order {
            CellOrder::RowMajor => 0,
            CellOrder::ColMajor => 1,
        });
        out.extend_from_slice(&self.capacity.to_le_bytes());

        let name = self.array_name.to_str().ok_or_else(|| {
            StorageError::CorruptSchema("array name is not UTF-8".to_string())
        })?;
        put_string(&mut out, name);

        out.extend_from_slice(&(self.dimensions.len() as u32).to_le_bytes());
        for dim in &self.dimensions {
            put_string(&mut out, &dim.name);
            out.extend_from_slice(&dim.lo.to_le_bytes());
            out.extend_from_slice(&dim.hi.to_le_bytes());
        }

        out.extend_from_slice(&(self.attributes.len() as u32).to_le_bytes());
        for attr in &self.attributes {
            put_string(&mut out, &attr.name);
            out.push(attribute_type_tag(attr.attr_type));
        }

        Ok(out)
    }

    /// Reconstructs a schema from its wire form.
    pub fn deserialize(bytes: &[u8]) -> Result<ArraySchema> {
        if bytes.is_empty() {
            return Err(StorageError::CorruptSchema("empty schema blob".to_string()));
        }

        let mut reader = Reader::new(bytes);
        let magic = reader.get_u32()?;
        if magic != SCHEMA_MAGIC {
            return Err(StorageError::CorruptSchema(format!(
                "bad magic {magic:#010x}"
            )));
        }
        let version = reader.get_u16()?;
        if version != SCHEMA_VERSION {
            return Err(StorageError::CorruptSchema(format!(
                "unsupported schema version {version}"
            )));
        }

        let dense = reader.get_u8()? != 0;
        let coords_type = coords_type_from_tag(reader.get_u8()?)?;
        let cell_order = match reader.get_u8()? {
            0 => CellOrder::RowMajor,
            1 => CellOrder::ColMajor,
            tag => {
                return Err(StorageError::CorruptSchema(format!(
                    "unknown cell order tag {tag}"
                )))
            }
        };
        let capacity = reader.get_u64()?;
        let array_name = PathBuf::from(reader.get_string()?);

        let dim_num = reader.get_u32()? as usize;
        let mut dimensions = Vec::with_capacity(dim_num.min(1024));
        for _ in 0..dim_num {
            let name = reader.get_string()?;
            let lo = reader.get_f64()?;
            let hi = reader.get_f64()?;
            dimensions.push(Dimension { name, lo, hi });
        }

        let attr_num = reader.get_u32()? as usize;
        let mut attributes = Vec::with_capacity(attr_num.min(1024));
        for _ in 0..attr_num {
            let name = reader.get_string()?;
            let attr_type = attribute_type_from_tag(reader.get_u8()?)?;
            attributes.push(Attribute { name, attr_type });
        }

        let schema = ArraySchema {
            array_name,
            dense,
            coords_type,
            cell_order,
            capacity,
            dimensions,
            attributes,
        };
        schema.validate()?;
        Ok(schema)
    }
}

fn coords_type_tag(t: CoordsType) -> u8 {
    match t {
        CoordsType::Int32 => 0,
        CoordsType::Int64 => 1,
        CoordsType::Float32 => 2,
        CoordsType::Float64 => 3,
    }
}

fn coords_type_from_tag(tag: u8) -> Result<CoordsType> {
    match tag {
        0 => Ok(CoordsType::Int32),
        1 => Ok(CoordsType::Int64),
        2 => Ok(CoordsType::Float32),
        3 => Ok(CoordsType::Float64),
        _ => Err(StorageError::CorruptSchema(format!(
            "unknown coordinate type tag {tag}"
        ))),
    }
}

fn attribute_type_tag(t: AttributeType) -> u8 {
    match t {
        AttributeType::Int32 => 0,
        AttributeType::Int64 => 1,
        AttributeType::Float32 => 2,
        AttributeType::Float64 => 3,
        AttributeType::Char => 4,
    }
}

fn attribute_type_from_tag(tag: u8) -> Result<AttributeType> {
    match tag {
        0 => Ok(AttributeType::Int32),
        1 => Ok(AttributeType::Int64),
        2 => Ok(AttributeType::Float32),
        3 => Ok(AttributeType::Float64),
        4 => Ok(AttributeType::Char),
        _ => Err(StorageError::CorruptSchema(format!(
            "unknown attribute type tag {tag}"
        ))),
    }
}

pub(crate) fn put_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Little-endian wire reader shared by the schema and book-keeping blobs.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(StorageError::CorruptSchema(format!(
                "truncated schema blob at offset {}",
                self.pos
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn get_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().expect("len 2")))
    }

    pub(crate) fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("len 4")))
    }

    pub(crate) fn get_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("len 8")))
    }

    pub(crate) fn get_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().expect("len 8")))
    }

    pub(crate) fn get_string(&mut self) -> Result<String> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| StorageError::CorruptSchema("non UTF-8 string in schema".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> ArraySchema {
        ArraySchema::new("/w/g/a", true, CoordsType::Int64)
            .with_capacity(4096)
            .add_dimension("rows", 1.0, 100.0)
            .add_dimension("cols", 1.0, 200.0)
            .add_attribute("v", AttributeType::Int32)
            .add_attribute("w", AttributeType::Float64)
    }

    #[test]
    fn serialises_round_trip() {
        let schema = sample_schema();
        let bytes = schema.serialize().unwrap();
        let back = ArraySchema::deserialize(&bytes).unwrap();
        assert_eq!(back, schema);
        assert_eq!(back.array_name(), Path::new("/w/g/a"));
        assert_eq!(back.attribute(0), Some("v"));
        assert_eq!(back.attribute(2), None);
    }

    #[test]
    fn rename_survives_round_trip() {
        let mut schema = sample_schema();
        schema.set_array_name("/w/g/a2");
        let back = ArraySchema::deserialize(&schema.serialize().unwrap()).unwrap();
        assert_eq!(back.array_name(), Path::new("/w/g/a2"));
    }

    #[test]
    fn empty_blob_is_corrupt() {
        assert!(matches!(
            ArraySchema::deserialize(&[]),
            Err(StorageError::CorruptSchema(_))
        ));
    }

    #[test]
    fn truncated_blob_is_corrupt() {
        let bytes = sample_schema().serialize().unwrap();
        assert!(matches!(
            ArraySchema::deserialize(&bytes[..bytes.len() - 3]),
            Err(StorageError::CorruptSchema(_))
        ));
    }

    #[test]
    fn foreign_magic_is_corrupt() {
        let mut bytes = sample_schema().serialize().unwrap();
        bytes[0] ^= 0xff;
        assert!(matches!(
            ArraySchema::deserialize(&bytes),
            Err(StorageError::CorruptSchema(_))
        ));
    }

    #[test]
    fn duplicate_attribute_names_are_rejected() {
        let schema = ArraySchema::new("/w/a", false, CoordsType::Float32)
            .add_dimension("d", 0.0, 1.0)
            .add_attribute("v", AttributeType::Int32)
            .add_attribute("v", AttributeType::Int64);
        assert!(matches!(
            schema.serialize(),
            Err(StorageError::CorruptSchema(_))
        ));
    }

    #[test]
    fn schema_without_dimensions_is_rejected() {
        let schema = ArraySchema::new("/w/a", true, CoordsType::Int32);
        assert!(schema.serialize().is_err());
    }
}
