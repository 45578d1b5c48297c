//! Physical array-file access.
//!
//! The index never talks to a file format directly. Everything it needs
//! (headers, attributes, rectangular slabs) goes through the traits in this
//! module, implemented for netCDF files by [`NetcdfAccessor`] and for
//! in-process staging by [`MemoryAccessor`].

mod memory;
mod netcdf_file;

pub use memory::{MemoryAccessor, MemoryFile, MemoryWriter};
pub use netcdf_file::{NetcdfAccessor, NetcdfReader, NetcdfWriter};

use std::fmt;
use std::path::Path;

use crate::error::{CurateError, Result};

/// Element type of a stored variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Signed 8-bit integer.
    Byte,
    /// Character.
    Char,
    /// Signed 16-bit integer.
    Short,
    /// Signed 32-bit integer.
    Int,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UByte,
    /// Unsigned 16-bit integer.
    UShort,
    /// Unsigned 32-bit integer.
    UInt,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Variable-length string or any type without a numeric representation.
    String,
}

impl ElementType {
    /// Name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            ElementType::Byte => "Byte",
            ElementType::Char => "Char",
            ElementType::Short => "Short",
            ElementType::Int => "Int",
            ElementType::Int64 => "Int64",
            ElementType::UByte => "UByte",
            ElementType::UShort => "UShort",
            ElementType::UInt => "UInt",
            ElementType::UInt64 => "UInt64",
            ElementType::Float => "Float",
            ElementType::Double => "Double",
            ElementType::String => "String",
        }
    }

    /// Check if this is an integer type.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ElementType::Byte
                | ElementType::Short
                | ElementType::Int
                | ElementType::Int64
                | ElementType::UByte
                | ElementType::UShort
                | ElementType::UInt
                | ElementType::UInt64
        )
    }

    /// Check if this is a floating point type.
    pub fn is_float(self) -> bool {
        matches!(self, ElementType::Float | ElementType::Double)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dimension as declared in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionHeader {
    /// Dimension name.
    pub name: String,
    /// Current length.
    pub len: usize,
    /// Whether the dimension is unlimited.
    pub unlimited: bool,
}

/// A variable as declared in one file.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableHeader {
    /// Variable name.
    pub name: String,
    /// Stored element type.
    pub element_type: ElementType,
    /// Dimensions in declaration order.
    pub dimensions: Vec<DimensionHeader>,
    /// Attributes rendered as strings, in file order.
    pub attributes: Vec<(String, String)>,
}

impl VariableHeader {
    /// Look up an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Shape of the variable.
    pub fn shape(&self) -> Vec<usize> {
        self.dimensions.iter().map(|d| d.len).collect()
    }
}

/// Read access to one open file.
pub trait ArrayReader {
    /// Global attributes rendered as strings, in file order.
    fn attributes(&self) -> Result<Vec<(String, String)>>;

    /// Dimensions in declaration order.
    fn dimensions(&self) -> Vec<DimensionHeader>;

    /// Variables in declaration order.
    fn variables(&self) -> Result<Vec<VariableHeader>>;

    /// Look up a single variable.
    fn variable(&self, name: &str) -> Result<Option<VariableHeader>>;

    /// Read a slab converted to double precision.
    fn read_f64(&self, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<f64>>;

    /// Read a slab converted to single precision.
    fn read_f32(&self, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<f32>>;

    /// Look up a single dimension.
    fn dimension(&self, name: &str) -> Option<DimensionHeader> {
        self.dimensions().into_iter().find(|d| d.name == name)
    }
}

/// Write access to one open file.
pub trait ArrayWriter: ArrayReader {
    /// Add a dimension; `None` creates an unlimited dimension.
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> Result<()>;

    /// Add a variable over existing dimensions.
    fn add_variable(
        &mut self,
        name: &str,
        element_type: ElementType,
        dimensions: &[&str],
    ) -> Result<()>;

    /// Set a string attribute on a variable.
    fn put_attribute(&mut self, variable: &str, name: &str, value: &str) -> Result<()>;

    /// Write a double precision slab.
    fn write_f64(
        &mut self,
        variable: &str,
        start: &[usize],
        count: &[usize],
        values: &[f64],
    ) -> Result<()>;

    /// Write a single precision slab.
    fn write_f32(
        &mut self,
        variable: &str,
        start: &[usize],
        count: &[usize],
        values: &[f32],
    ) -> Result<()>;
}

/// Opens and creates files of one storage backend.
pub trait Accessor {
    /// Reader handle type.
    type Reader: ArrayReader;
    /// Writer handle type.
    type Writer: ArrayWriter;

    /// Open an existing file for reading.
    fn open(&self, path: &Path) -> Result<Self::Reader>;

    /// Open an existing file for writing.
    fn append(&self, path: &Path) -> Result<Self::Writer>;

    /// Create a file, truncating any existing one.
    fn create(&self, path: &Path) -> Result<Self::Writer>;

    /// List entry names of a directory in enumeration order.
    fn list_directory(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(dir).map_err(|source| CurateError::Directory {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        Ok(names)
    }

    /// Create a directory (and its parents) if it does not exist.
    fn create_directory(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        Ok(())
    }
}

/// Number of elements in a slab.
pub(crate) fn slab_len(count: &[usize]) -> usize {
    count.iter().product()
}
