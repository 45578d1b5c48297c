//! netCDF-backed accessor.

use std::fmt;
use std::path::{Path, PathBuf};

use netcdf::types::{FloatType, IntType, NcVariableType};

use super::{
    slab_len, Accessor, ArrayReader, ArrayWriter, DimensionHeader, ElementType, VariableHeader,
};
use crate::error::{CurateError, Result};

/// Accessor for netCDF files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfAccessor;

impl Accessor for NetcdfAccessor {
    type Reader = NetcdfReader;
    type Writer = NetcdfWriter;

    fn open(&self, path: &Path) -> Result<NetcdfReader> {
        let file = netcdf::open(path).map_err(|e| CurateError::file_open(path, e))?;
        Ok(NetcdfReader {
            path: path.to_path_buf(),
            file,
        })
    }

    fn append(&self, path: &Path) -> Result<NetcdfWriter> {
        let file = netcdf::append(path).map_err(|e| CurateError::file_open(path, e))?;
        Ok(NetcdfWriter {
            path: path.to_path_buf(),
            file,
        })
    }

    fn create(&self, path: &Path) -> Result<NetcdfWriter> {
        let file = netcdf::create(path).map_err(|e| CurateError::file_open(path, e))?;
        Ok(NetcdfWriter {
            path: path.to_path_buf(),
            file,
        })
    }
}

/// A netCDF file opened for reading.
pub struct NetcdfReader {
    path: PathBuf,
    file: netcdf::File,
}

impl fmt::Debug for NetcdfReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetcdfReader")
            .field("path", &self.path)
            .finish()
    }
}

/// A netCDF file opened for writing.
pub struct NetcdfWriter {
    path: PathBuf,
    file: netcdf::FileMut,
}

impl fmt::Debug for NetcdfWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetcdfWriter")
            .field("path", &self.path)
            .finish()
    }
}

impl ArrayReader for NetcdfReader {
    fn attributes(&self) -> Result<Vec<(String, String)>> {
        Ok(read_attributes(self.file.attributes()))
    }

    fn dimensions(&self) -> Vec<DimensionHeader> {
        read_dimensions(&self.file)
    }

    fn variables(&self) -> Result<Vec<VariableHeader>> {
        Ok(self.file.variables().map(|v| variable_header(&v)).collect())
    }

    fn variable(&self, name: &str) -> Result<Option<VariableHeader>> {
        Ok(self.file.variable(name).map(|v| variable_header(&v)))
    }

    fn read_f64(&self, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<f64>> {
        read_slab(&self.file, variable, start, count)
    }

    fn read_f32(&self, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<f32>> {
        read_slab(&self.file, variable, start, count)
    }
}

impl ArrayReader for NetcdfWriter {
    fn attributes(&self) -> Result<Vec<(String, String)>> {
        Ok(read_attributes(self.file.attributes()))
    }

    fn dimensions(&self) -> Vec<DimensionHeader> {
        read_dimensions(&self.file)
    }

    fn variables(&self) -> Result<Vec<VariableHeader>> {
        Ok(self.file.variables().map(|v| variable_header(&v)).collect())
    }

    fn variable(&self, name: &str) -> Result<Option<VariableHeader>> {
        Ok(self.file.variable(name).map(|v| variable_header(&v)))
    }

    fn read_f64(&self, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<f64>> {
        read_slab(&self.file, variable, start, count)
    }

    fn read_f32(&self, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<f32>> {
        read_slab(&self.file, variable, start, count)
    }
}

impl ArrayWriter for NetcdfWriter {
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> Result<()> {
        match len {
            Some(len) => self.file.add_dimension(name, len)?,
            None => self.file.add_unlimited_dimension(name)?,
        };
        Ok(())
    }

    fn add_variable(
        &mut self,
        name: &str,
        element_type: ElementType,
        dimensions: &[&str],
    ) -> Result<()> {
        match element_type {
            ElementType::Byte => self.file.add_variable::<i8>(name, dimensions)?,
            ElementType::UByte => self.file.add_variable::<u8>(name, dimensions)?,
            ElementType::Short => self.file.add_variable::<i16>(name, dimensions)?,
            ElementType::UShort => self.file.add_variable::<u16>(name, dimensions)?,
            ElementType::Int => self.file.add_variable::<i32>(name, dimensions)?,
            ElementType::UInt => self.file.add_variable::<u32>(name, dimensions)?,
            ElementType::Int64 => self.file.add_variable::<i64>(name, dimensions)?,
            ElementType::UInt64 => self.file.add_variable::<u64>(name, dimensions)?,
            ElementType::Float => self.file.add_variable::<f32>(name, dimensions)?,
            ElementType::Double => self.file.add_variable::<f64>(name, dimensions)?,
            ElementType::Char | ElementType::String => {
                return Err(CurateError::Type {
                    variable: name.to_string(),
                    found: element_type.to_string(),
                })
            },
        };
        Ok(())
    }

    fn put_attribute(&mut self, variable: &str, name: &str, value: &str) -> Result<()> {
        let mut var = self
            .file
            .variable_mut(variable)
            .ok_or_else(|| missing_variable(&self.path, variable))?;
        var.put_attribute(name, value)?;
        Ok(())
    }

    fn write_f64(
        &mut self,
        variable: &str,
        start: &[usize],
        count: &[usize],
        values: &[f64],
    ) -> Result<()> {
        check_slab(values.len(), count)?;
        let mut var = self
            .file
            .variable_mut(variable)
            .ok_or_else(|| missing_variable(&self.path, variable))?;
        var.put_values(values, extents(start, count))?;
        Ok(())
    }

    fn write_f32(
        &mut self,
        variable: &str,
        start: &[usize],
        count: &[usize],
        values: &[f32],
    ) -> Result<()> {
        check_slab(values.len(), count)?;
        let mut var = self
            .file
            .variable_mut(variable)
            .ok_or_else(|| missing_variable(&self.path, variable))?;
        var.put_values(values, extents(start, count))?;
        Ok(())
    }
}

fn missing_variable(path: &Path, variable: &str) -> CurateError {
    CurateError::NetCDF(format!(
        "variable \"{}\" not found in \"{}\"",
        variable,
        path.display()
    ))
}

fn check_slab(len: usize, count: &[usize]) -> Result<()> {
    let expected = slab_len(count);
    if len != expected {
        return Err(CurateError::Size {
            expected,
            actual: len,
        });
    }
    Ok(())
}

fn extents(start: &[usize], count: &[usize]) -> netcdf::Extents {
    start
        .iter()
        .zip(count)
        .map(|(&s, &c)| netcdf::Extent::from(s..s + c))
        .collect::<Vec<_>>()
        .into()
}

fn read_slab<T>(file: &netcdf::File, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<T>>
where
    T: netcdf::NcTypeDescriptor + Copy,
{
    let var = file
        .variable(variable)
        .ok_or_else(|| CurateError::NetCDF(format!("variable \"{}\" not found", variable)))?;
    let values = var.get_values::<T, _>(extents(start, count))?;
    Ok(values)
}

fn read_dimensions(file: &netcdf::File) -> Vec<DimensionHeader> {
    file.dimensions()
        .map(|d| DimensionHeader {
            name: d.name(),
            len: d.len(),
            unlimited: d.is_unlimited(),
        })
        .collect()
}

fn read_attributes<'a>(
    attributes: impl Iterator<Item = netcdf::Attribute<'a>>,
) -> Vec<(String, String)> {
    attributes
        .map(|attr| (attr.name().to_string(), attr_value_to_string(&attr)))
        .collect()
}

fn variable_header(var: &netcdf::Variable<'_>) -> VariableHeader {
    VariableHeader {
        name: var.name(),
        element_type: element_type(&var.vartype()),
        dimensions: var
            .dimensions()
            .iter()
            .map(|d: &netcdf::Dimension<'_>| DimensionHeader {
                name: d.name(),
                len: d.len(),
                unlimited: d.is_unlimited(),
            })
            .collect(),
        attributes: read_attributes(var.attributes()),
    }
}

fn element_type(vartype: &NcVariableType) -> ElementType {
    match vartype {
        NcVariableType::Int(IntType::I8) => ElementType::Byte,
        NcVariableType::Int(IntType::U8) => ElementType::UByte,
        NcVariableType::Int(IntType::I16) => ElementType::Short,
        NcVariableType::Int(IntType::U16) => ElementType::UShort,
        NcVariableType::Int(IntType::I32) => ElementType::Int,
        NcVariableType::Int(IntType::U32) => ElementType::UInt,
        NcVariableType::Int(IntType::I64) => ElementType::Int64,
        NcVariableType::Int(IntType::U64) => ElementType::UInt64,
        NcVariableType::Float(FloatType::F32) => ElementType::Float,
        NcVariableType::Float(FloatType::F64) => ElementType::Double,
        NcVariableType::Char => ElementType::Char,
        _ => ElementType::String,
    }
}

fn attr_value_to_string(attr: &netcdf::Attribute<'_>) -> String {
    use netcdf::AttributeValue;

    fn join<T: ToString>(values: &[T]) -> String {
        values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    match attr.value() {
        Ok(AttributeValue::Uchar(v)) => v.to_string(),
        Ok(AttributeValue::Schar(v)) => v.to_string(),
        Ok(AttributeValue::Ushort(v)) => v.to_string(),
        Ok(AttributeValue::Short(v)) => v.to_string(),
        Ok(AttributeValue::Uint(v)) => v.to_string(),
        Ok(AttributeValue::Int(v)) => v.to_string(),
        Ok(AttributeValue::Ulonglong(v)) => v.to_string(),
        Ok(AttributeValue::Longlong(v)) => v.to_string(),
        Ok(AttributeValue::Float(v)) => v.to_string(),
        Ok(AttributeValue::Double(v)) => v.to_string(),
        Ok(AttributeValue::Str(v)) => v,
        Ok(AttributeValue::Uchars(v)) => join(&v),
        Ok(AttributeValue::Schars(v)) => join(&v),
        Ok(AttributeValue::Ushorts(v)) => join(&v),
        Ok(AttributeValue::Shorts(v)) => join(&v),
        Ok(AttributeValue::Uints(v)) => join(&v),
        Ok(AttributeValue::Ints(v)) => join(&v),
        Ok(AttributeValue::Ulonglongs(v)) => join(&v),
        Ok(AttributeValue::Longlongs(v)) => join(&v),
        Ok(AttributeValue::Floats(v)) => join(&v),
        Ok(AttributeValue::Doubles(v)) => join(&v),
        Ok(AttributeValue::Strs(v)) => v.join(", "),
        Err(_) => format!("{:?}", attr),
    }
}
