//! In-process accessor backed by `ndarray`.
//!
//! Files live in a shared table keyed by path, so an index built over a
//! [`MemoryAccessor`] behaves like one over a directory of netCDF files:
//! writers opened with `append` mutate the table and later readers observe
//! the changes.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ndarray::{ArrayD, IxDyn, Slice};

use super::{
    slab_len, Accessor, ArrayReader, ArrayWriter, DimensionHeader, ElementType, VariableHeader,
};
use crate::error::{CurateError, Result};

/// A table of in-memory files.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccessor {
    files: Rc<RefCell<Vec<(PathBuf, MemoryFile)>>>,
}

impl MemoryAccessor {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl Into<PathBuf>, file: MemoryFile) {
        let path = path.into();
        let mut files = self.files.borrow_mut();
        match files.iter_mut().find(|(p, _)| *p == path) {
            Some((_, existing)) => *existing = file,
            None => files.push((path, file)),
        }
    }

    /// Snapshot of a file.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<MemoryFile> {
        let path = path.as_ref();
        self.files
            .borrow()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, f)| f.clone())
    }

    /// Paths of all files in insertion order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.borrow().iter().map(|(p, _)| p.clone()).collect()
    }

    fn contains(&self, path: &Path) -> bool {
        self.files.borrow().iter().any(|(p, _)| p == path)
    }
}

impl Accessor for MemoryAccessor {
    type Reader = MemoryFile;
    type Writer = MemoryWriter;

    fn open(&self, path: &Path) -> Result<MemoryFile> {
        self.file(path)
            .ok_or_else(|| CurateError::file_open(path, "no such file"))
    }

    fn append(&self, path: &Path) -> Result<MemoryWriter> {
        if !self.contains(path) {
            return Err(CurateError::file_open(path, "no such file"));
        }
        Ok(MemoryWriter {
            path: path.to_path_buf(),
            files: Rc::clone(&self.files),
        })
    }

    fn create(&self, path: &Path) -> Result<MemoryWriter> {
        self.insert(path, MemoryFile::new());
        Ok(MemoryWriter {
            path: path.to_path_buf(),
            files: Rc::clone(&self.files),
        })
    }

    /// Names of the files whose parent is `dir`, in insertion order.
    fn list_directory(&self, dir: &Path) -> Result<Vec<String>> {
        let names: Vec<String> = self
            .files
            .borrow()
            .iter()
            .filter(|(p, _)| p.parent() == Some(dir))
            .filter_map(|(p, _)| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect();

        if names.is_empty() {
            return Err(CurateError::Directory {
                path: dir.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
            });
        }
        Ok(names)
    }

    fn create_directory(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct MemoryVariable {
    name: String,
    element_type: ElementType,
    dimensions: Vec<String>,
    attributes: Vec<(String, String)>,
    data: ArrayD<f64>,
}

/// One in-memory file.
///
/// Values are held as `f64` and rounded to the declared element type on
/// write, so a `Float` variable reads back exactly what a netCDF file would.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryFile {
    attributes: Vec<(String, String)>,
    dimensions: Vec<DimensionHeader>,
    variables: Vec<MemoryVariable>,
}

impl MemoryFile {
    /// Create an empty file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global attribute.
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a fixed-size dimension.
    pub fn with_dimension(mut self, name: &str, len: usize) -> Self {
        self.dimensions.push(DimensionHeader {
            name: name.to_string(),
            len,
            unlimited: false,
        });
        self
    }

    /// Add an unlimited dimension with an initial length.
    pub fn with_unlimited_dimension(mut self, name: &str, len: usize) -> Self {
        self.dimensions.push(DimensionHeader {
            name: name.to_string(),
            len,
            unlimited: true,
        });
        self
    }

    /// Add a variable with its full contents in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if a dimension is undeclared or `values` does not match the shape.
    pub fn with_variable(
        mut self,
        name: &str,
        element_type: ElementType,
        dimensions: &[&str],
        values: Vec<f64>,
    ) -> Self {
        let shape: Vec<usize> = dimensions
            .iter()
            .map(|d| {
                self.dimension(d)
                    .map(|h| h.len)
                    .unwrap_or_else(|| panic!("undeclared dimension {}", d))
            })
            .collect();
        let values = values
            .into_iter()
            .map(|v| store_as(element_type, v))
            .collect();
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .unwrap_or_else(|e| panic!("variable {}: {}", name, e));

        self.variables.push(MemoryVariable {
            name: name.to_string(),
            element_type,
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            attributes: Vec::new(),
            data,
        });
        self
    }

    /// Add an attribute to a variable declared earlier.
    ///
    /// # Panics
    ///
    /// Panics if the variable is undeclared.
    pub fn with_variable_attribute(mut self, variable: &str, name: &str, value: &str) -> Self {
        let var = self
            .variables
            .iter_mut()
            .find(|v| v.name == variable)
            .unwrap_or_else(|| panic!("undeclared variable {}", variable));
        var.attributes.push((name.to_string(), value.to_string()));
        self
    }

    fn find(&self, name: &str) -> Result<&MemoryVariable> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| CurateError::NetCDF(format!("variable \"{}\" not found", name)))
    }

    fn header(&self, var: &MemoryVariable) -> VariableHeader {
        VariableHeader {
            name: var.name.clone(),
            element_type: var.element_type,
            dimensions: var
                .dimensions
                .iter()
                .filter_map(|d| self.dimension(d))
                .collect(),
            attributes: var.attributes.clone(),
        }
    }

    fn read_slab(&self, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<f64>> {
        let var = self.find(variable)?;
        check_bounds(variable, var.data.shape(), start, count)?;
        let view = var
            .data
            .slice_each_axis(|ax| slab_axis(start, count, ax.axis.index()));
        Ok(view.iter().copied().collect())
    }

    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> Result<()> {
        if self.dimension(name).is_some() {
            return Err(CurateError::NetCDF(format!(
                "dimension \"{}\" already defined",
                name
            )));
        }
        self.dimensions.push(DimensionHeader {
            name: name.to_string(),
            len: len.unwrap_or(0),
            unlimited: len.is_none(),
        });
        Ok(())
    }

    fn add_variable(
        &mut self,
        name: &str,
        element_type: ElementType,
        dimensions: &[&str],
    ) -> Result<()> {
        if self.variables.iter().any(|v| v.name == name) {
            return Err(CurateError::NetCDF(format!(
                "variable \"{}\" already defined",
                name
            )));
        }
        let mut shape = Vec::with_capacity(dimensions.len());
        for dim in dimensions {
            let header = self.dimension(dim).ok_or_else(|| {
                CurateError::NetCDF(format!("dimension \"{}\" not defined", dim))
            })?;
            shape.push(header.len);
        }

        self.variables.push(MemoryVariable {
            name: name.to_string(),
            element_type,
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            attributes: Vec::new(),
            data: ArrayD::from_elem(IxDyn(&shape), f64::NAN),
        });
        Ok(())
    }

    fn put_attribute(&mut self, variable: &str, name: &str, value: &str) -> Result<()> {
        let var = self
            .variables
            .iter_mut()
            .find(|v| v.name == variable)
            .ok_or_else(|| CurateError::NetCDF(format!("variable \"{}\" not found", variable)))?;
        match var.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => var.attributes.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn write_slab(
        &mut self,
        variable: &str,
        start: &[usize],
        count: &[usize],
        values: &[f64],
    ) -> Result<()> {
        let expected = slab_len(count);
        if values.len() != expected {
            return Err(CurateError::Size {
                expected,
                actual: values.len(),
            });
        }

        let dims = self.find(variable)?.dimensions.clone();
        if dims.len() != start.len() || dims.len() != count.len() {
            return Err(CurateError::NetCDF(format!(
                "variable \"{}\": slab rank {} does not match {}",
                variable,
                start.len(),
                dims.len()
            )));
        }

        // Unlimited dimensions grow to fit the slab.
        for (axis, dim) in dims.iter().enumerate() {
            let end = start[axis] + count[axis];
            let grows = self
                .dimension(dim)
                .map_or(false, |h| h.unlimited && end > h.len);
            if grows {
                self.grow_dimension(dim, end);
            }
        }

        let var = self
            .variables
            .iter_mut()
            .find(|v| v.name == variable)
            .ok_or_else(|| CurateError::NetCDF(format!("variable \"{}\" not found", variable)))?;
        check_bounds(variable, var.data.shape(), start, count)?;

        let element_type = var.element_type;
        let mut view = var
            .data
            .slice_each_axis_mut(|ax| slab_axis(start, count, ax.axis.index()));
        for (dst, &src) in view.iter_mut().zip(values) {
            *dst = store_as(element_type, src);
        }
        Ok(())
    }

    fn grow_dimension(&mut self, name: &str, len: usize) {
        if let Some(header) = self.dimensions.iter_mut().find(|h| h.name == name) {
            header.len = len;
        }
        for var in self.variables.iter_mut() {
            let Some(axis) = var.dimensions.iter().position(|d| d == name) else {
                continue;
            };
            let old_shape = var.data.shape().to_vec();
            let mut new_shape = old_shape.clone();
            new_shape[axis] = len;

            let mut grown = ArrayD::from_elem(IxDyn(&new_shape), f64::NAN);
            grown
                .slice_each_axis_mut(|ax| Slice::from(0..old_shape[ax.axis.index()]))
                .assign(&var.data);
            var.data = grown;
        }
    }
}

impl ArrayReader for MemoryFile {
    fn attributes(&self) -> Result<Vec<(String, String)>> {
        Ok(self.attributes.clone())
    }

    fn dimensions(&self) -> Vec<DimensionHeader> {
        self.dimensions.clone()
    }

    fn variables(&self) -> Result<Vec<VariableHeader>> {
        Ok(self.variables.iter().map(|v| self.header(v)).collect())
    }

    fn variable(&self, name: &str) -> Result<Option<VariableHeader>> {
        Ok(self
            .variables
            .iter()
            .find(|v| v.name == name)
            .map(|v| self.header(v)))
    }

    fn read_f64(&self, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<f64>> {
        self.read_slab(variable, start, count)
    }

    fn read_f32(&self, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<f32>> {
        let values = self.read_slab(variable, start, count)?;
        Ok(values.into_iter().map(|v| v as f32).collect())
    }

    fn dimension(&self, name: &str) -> Option<DimensionHeader> {
        self.dimensions.iter().find(|d| d.name == name).cloned()
    }
}

/// Write handle onto a file of a [`MemoryAccessor`].
#[derive(Debug)]
pub struct MemoryWriter {
    path: PathBuf,
    files: Rc<RefCell<Vec<(PathBuf, MemoryFile)>>>,
}

impl MemoryWriter {
    fn with_file<R>(&self, f: impl FnOnce(&MemoryFile) -> Result<R>) -> Result<R> {
        let files = self.files.borrow();
        let (_, file) = files
            .iter()
            .find(|(p, _)| *p == self.path)
            .ok_or_else(|| CurateError::file_open(&self.path, "file was removed"))?;
        f(file)
    }

    fn with_file_mut<R>(&self, f: impl FnOnce(&mut MemoryFile) -> Result<R>) -> Result<R> {
        let mut files = self.files.borrow_mut();
        let (_, file) = files
            .iter_mut()
            .find(|(p, _)| *p == self.path)
            .ok_or_else(|| CurateError::file_open(&self.path, "file was removed"))?;
        f(file)
    }
}

impl ArrayReader for MemoryWriter {
    fn attributes(&self) -> Result<Vec<(String, String)>> {
        self.with_file(|f| f.attributes())
    }

    fn dimensions(&self) -> Vec<DimensionHeader> {
        self.with_file(|f| Ok(f.dimensions())).unwrap_or_default()
    }

    fn variables(&self) -> Result<Vec<VariableHeader>> {
        self.with_file(|f| f.variables())
    }

    fn variable(&self, name: &str) -> Result<Option<VariableHeader>> {
        self.with_file(|f| f.variable(name))
    }

    fn read_f64(&self, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<f64>> {
        self.with_file(|f| f.read_f64(variable, start, count))
    }

    fn read_f32(&self, variable: &str, start: &[usize], count: &[usize]) -> Result<Vec<f32>> {
        self.with_file(|f| f.read_f32(variable, start, count))
    }
}

impl ArrayWriter for MemoryWriter {
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> Result<()> {
        self.with_file_mut(|f| f.add_dimension(name, len))
    }

    fn add_variable(
        &mut self,
        name: &str,
        element_type: ElementType,
        dimensions: &[&str],
    ) -> Result<()> {
        self.with_file_mut(|f| f.add_variable(name, element_type, dimensions))
    }

    fn put_attribute(&mut self, variable: &str, name: &str, value: &str) -> Result<()> {
        self.with_file_mut(|f| f.put_attribute(variable, name, value))
    }

    fn write_f64(
        &mut self,
        variable: &str,
        start: &[usize],
        count: &[usize],
        values: &[f64],
    ) -> Result<()> {
        self.with_file_mut(|f| f.write_slab(variable, start, count, values))
    }

    fn write_f32(
        &mut self,
        variable: &str,
        start: &[usize],
        count: &[usize],
        values: &[f32],
    ) -> Result<()> {
        let widened: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        self.with_file_mut(|f| f.write_slab(variable, start, count, &widened))
    }
}

fn slab_axis(start: &[usize], count: &[usize], axis: usize) -> Slice {
    Slice::from(start[axis]..start[axis] + count[axis])
}

fn check_bounds(variable: &str, shape: &[usize], start: &[usize], count: &[usize]) -> Result<()> {
    let in_bounds = shape.len() == start.len()
        && shape.len() == count.len()
        && shape
            .iter()
            .zip(start.iter().zip(count))
            .all(|(&len, (&s, &c))| s + c <= len);
    if !in_bounds {
        return Err(CurateError::NetCDF(format!(
            "slab {:?}+{:?} out of bounds for variable \"{}\" of shape {:?}",
            start, count, variable, shape
        )));
    }
    Ok(())
}

fn store_as(element_type: ElementType, value: f64) -> f64 {
    match element_type {
        ElementType::Float => value as f32 as f64,
        t if t.is_integer() && value.is_finite() => value.round(),
        _ => value,
    }
}
