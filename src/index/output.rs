//! Output file allocation.
//!
//! An output index created by [`DatasetIndex::duplicate_for_writing`] owns no
//! files at first. Files are registered here, either one at a time or one
//! per chunk of the time axis, and the output table binds every global time
//! index to the file and local slot that will receive its writes.

use std::collections::BTreeMap;

use tracing::info;

use super::DatasetIndex;
use crate::accessor::{Accessor, ArrayWriter, ElementType};
use crate::catalog::{
    CoordinateValues, DimensionDescriptor, DimensionKind, DimensionSize, FileTimeLocation,
    ObjectInfo,
};
use crate::error::{CurateError, Result};
use crate::time::TimeUnits;

/// Placeholder replaced by the short form of a chunk's first time.
pub const TIME_PLACEHOLDER: &str = "%T";

/// One dimension of an output grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDimension {
    name: String,
    size: usize,
    values: Option<Vec<f64>>,
    units: String,
}

impl GridDimension {
    /// Create a dimension without coordinate values.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            values: None,
            units: String::new(),
        }
    }

    /// Create a dimension with coordinate values; the size is their count.
    pub fn with_values(name: impl Into<String>, values: Vec<f64>, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: values.len(),
            values: Some(values),
            units: units.into(),
        }
    }

    /// Dimension name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dimension length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Coordinate values.
    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    /// Coordinate units, empty when absent.
    pub fn units(&self) -> &str {
        &self.units
    }
}

/// The grid written into every output file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridShape {
    dimensions: Vec<GridDimension>,
}

impl GridShape {
    /// Create an empty shape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a dimension.
    pub fn with_dimension(mut self, dimension: GridDimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    /// Dimensions in declaration order.
    pub fn dimensions(&self) -> &[GridDimension] {
        &self.dimensions
    }

    /// Number of points in one grid slice.
    pub fn len(&self) -> usize {
        self.dimensions.iter().map(GridDimension::size).product()
    }

    /// Check if the shape declares no dimensions.
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

impl<A: Accessor> DatasetIndex<A> {
    /// Shape of this index's grid dimensions, with any captured coordinates.
    pub fn grid_shape(&self) -> Result<GridShape> {
        let mut shape = GridShape::new();
        for name in &self.grid_dims {
            let desc = self
                .state
                .dimensions
                .get(name)
                .ok_or_else(|| CurateError::UnknownDimension { name: name.clone() })?;
            let size = desc.size().len().ok_or_else(|| {
                CurateError::schema(format!("Grid dimension \"{}\" has no fixed size", name))
            })?;
            let dimension = match desc.values() {
                Some(values) => GridDimension::with_values(name, values.to_f64(), desc.units()),
                None => GridDimension::new(name, size),
            };
            shape = shape.with_dimension(dimension);
        }
        Ok(shape)
    }

    /// Register and create a file holding only the grid dimensions.
    ///
    /// Returns the new file index.
    pub fn create_file_no_time(&mut self, filename: &str, grid: &GridShape) -> Result<usize> {
        if self.filenames.iter().any(|f| f == filename) {
            return Err(CurateError::State(format!(
                "File \"{}\" already exists in file_list",
                filename
            )));
        }
        for dim in grid.dimensions() {
            if let Some(existing) = self.state.dimensions.get(dim.name()) {
                if existing.size() != DimensionSize::Sized(dim.size()) {
                    return Err(CurateError::schema(format!(
                        "Dimension \"{}\" mismatch ({} / {})",
                        dim.name(),
                        existing.size(),
                        dim.size()
                    )));
                }
            }
        }

        let ix = self.filenames.len();
        self.filenames.push(filename.to_string());
        let path = super::join_path(&self.base_dir, filename);
        info!("Creating {}", path.display());

        let created = self.accessor.create(&path).and_then(|mut writer| {
            for dim in grid.dimensions() {
                writer.add_dimension(dim.name(), Some(dim.size()))?;
                if let Some(values) = dim.values() {
                    writer.add_variable(dim.name(), ElementType::Double, &[dim.name()])?;
                    writer.write_f64(dim.name(), &[0], &[values.len()], values)?;
                    if !dim.units().is_empty() {
                        writer.put_attribute(dim.name(), "units", dim.units())?;
                    }
                }
            }
            Ok(())
        });
        if let Err(err) = created {
            self.filenames.truncate(ix);
            return Err(err);
        }

        for dim in grid.dimensions() {
            self.add_dimension(dim.name(), DimensionSize::Sized(dim.size()), DimensionKind::Grid)?;
            if let (Some(values), Some(desc)) =
                (dim.values(), self.state.dimensions.get_mut(dim.name()))
            {
                if desc.values().is_none() {
                    desc.set_values(CoordinateValues::Double(values.to_vec()));
                    desc.set_info(ObjectInfo::new(dim.name(), Some(ElementType::Double), dim.units()));
                }
            }
        }
        Ok(ix)
    }

    /// Create one output file per `times_per_file` consecutive times.
    ///
    /// The template must contain [`TIME_PLACEHOLDER`] exactly once; it is
    /// replaced by the short form of each chunk's first time. Returns the
    /// generated filenames in chunk order.
    ///
    /// If any chunk fails, the filenames and output table rows of the
    /// chunks created by this call are dropped again.
    pub fn create_files_from_template(
        &mut self,
        template: &str,
        grid: &GridShape,
        times_per_file: usize,
    ) -> Result<Vec<String>> {
        match template.matches(TIME_PLACEHOLDER).count() {
            1 => {},
            0 => {
                return Err(CurateError::InvalidTemplate {
                    template: template.to_string(),
                    reason: "time specifier missing from filename template".to_string(),
                })
            },
            _ => {
                return Err(CurateError::InvalidTemplate {
                    template: template.to_string(),
                    reason: "time specifier appears more than once in filename template"
                        .to_string(),
                })
            },
        }
        if times_per_file == 0 {
            return Err(CurateError::Range(
                "times per file must be at least 1".to_string(),
            ));
        }

        let count = self.state.time_axis.len();
        if count == 0 {
            return Ok(Vec::new());
        }
        let units = self.state.time_units.clone().ok_or_else(|| {
            CurateError::State("time axis has no units to write output files with".to_string())
        })?;

        let record = self.config.record_dim_name.clone();
        if !self.state.dimensions.contains(&record) {
            self.state.dimensions.insert(
                DimensionDescriptor::new(&record, DimensionKind::Record, DimensionSize::Sized(count))
                    .with_info(ObjectInfo::new(&record, Some(ElementType::Double), units.as_str())),
            );
        }

        let first_file = self.filenames.len();
        let mut created = Vec::new();
        for first in (0..count).step_by(times_per_file) {
            let chunk = times_per_file.min(count - first);
            match self.create_chunk(template, grid, &units, first, chunk) {
                Ok(filename) => created.push(filename),
                Err(err) => {
                    // Files already created stay on disk but leave the index.
                    self.filenames.truncate(first_file);
                    self.output_table.retain(|_, location| location.file < first_file);
                    return Err(err);
                },
            }
        }
        Ok(created)
    }

    /// Create the file holding times `first..first + chunk`.
    fn create_chunk(
        &mut self,
        template: &str,
        grid: &GridShape,
        units: &TimeUnits,
        first: usize,
        chunk: usize,
    ) -> Result<String> {
        let record = self.config.record_dim_name.clone();
        let times = &self.state.time_axis.times()[first..first + chunk];
        let offsets: Vec<f64> = times.iter().map(|t| t.to_offset(units)).collect();
        let filename = template.replacen(TIME_PLACEHOLDER, &times[0].to_short_string(), 1);

        let file = self.create_file_no_time(&filename, grid)?;
        let path = super::join_path(&self.base_dir, &filename);
        let mut writer = self.accessor.append(&path)?;
        writer.add_dimension(&record, None)?;
        writer.add_variable(&record, ElementType::Double, &[record.as_str()])?;
        writer.put_attribute(&record, "units", units.as_str())?;
        writer.put_attribute(&record, "calendar", units.calendar().name())?;
        writer.write_f64(&record, &[0], &[chunk], &offsets)?;

        for local in 0..chunk {
            self.output_table
                .insert(first + local, FileTimeLocation::new(file, local));
        }
        Ok(filename)
    }

    /// Direct writes of time-invariant variables to an existing member file.
    pub fn set_reduce_target(&mut self, filename: &str) -> Result<()> {
        self.reduce_target = Some(self.file_index(filename)?);
        Ok(())
    }

    /// File index receiving time-invariant writes.
    pub fn reduce_target(&self) -> Option<usize> {
        self.reduce_target
    }

    /// Output location allocated for a global time index.
    pub fn output_location(&self, time_index: usize) -> Option<FileTimeLocation> {
        self.output_table.get(&time_index).copied()
    }

    /// The whole output allocation table.
    pub fn output_table(&self) -> &BTreeMap<usize, FileTimeLocation> {
        &self.output_table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{ArrayReader, MemoryAccessor};
    use crate::config::IndexConfig;
    use crate::time::{Calendar, Time, TimeAxis, TimeUnits};

    fn output_index(times: usize) -> DatasetIndex<MemoryAccessor> {
        let units = TimeUnits::parse("days since 2000-01-01", Calendar::Standard).unwrap();
        let mut index = DatasetIndex::with_accessor(MemoryAccessor::new(), IndexConfig::default());
        index.base_dir = "/out/".to_string();
        index.state.time_axis =
            TimeAxis::from_times((0..times).map(|t| Time::from_offset(&units, t as f64).unwrap()));
        index.state.time_units = Some(units);
        index
    }

    fn grid() -> GridShape {
        GridShape::new()
            .with_dimension(GridDimension::with_values("lat", vec![-45.0, 45.0], "degrees_north"))
            .with_dimension(GridDimension::new("lon", 3))
    }

    #[test]
    fn test_template_chunks_time_axis() {
        let mut index = output_index(5);
        let files = index
            .create_files_from_template("out_%T.nc", &grid(), 2)
            .unwrap();

        assert_eq!(
            files,
            vec![
                "out_2000-01-01-00000.nc",
                "out_2000-01-03-00000.nc",
                "out_2000-01-05-00000.nc"
            ]
        );
        assert_eq!(index.output_location(4), Some(FileTimeLocation::new(2, 0)));
        assert_eq!(index.output_location(3), Some(FileTimeLocation::new(1, 1)));
        assert_eq!(index.output_table().len(), 5);

        let last = index
            .accessor()
            .open(std::path::Path::new("/out/out_2000-01-05-00000.nc"))
            .unwrap();
        assert_eq!(last.dimension("time").unwrap().len, 1);
        assert_eq!(last.read_f64("time", &[0], &[1]).unwrap(), vec![4.0]);
        assert_eq!(last.read_f64("lat", &[0], &[2]).unwrap(), vec![-45.0, 45.0]);
    }

    #[test]
    fn test_template_placeholder_count() {
        let mut index = output_index(2);
        assert!(matches!(
            index.create_files_from_template("out.nc", &grid(), 1),
            Err(CurateError::InvalidTemplate { .. })
        ));
        assert!(matches!(
            index.create_files_from_template("%T_%T.nc", &grid(), 1),
            Err(CurateError::InvalidTemplate { .. })
        ));
        assert!(matches!(
            index.create_files_from_template("%T.nc", &grid(), 0),
            Err(CurateError::Range(_))
        ));
        assert!(index.filenames().is_empty());
    }

    #[test]
    fn test_grid_dimensions_registered() {
        let mut index = output_index(1);
        index.create_file_no_time("static.nc", &grid()).unwrap();

        assert_eq!(index.grid_dimension_names(), &["lat".to_string(), "lon".to_string()]);
        let lat = index.dimension("lat").unwrap();
        assert_eq!(lat.kind(), DimensionKind::Grid);
        assert_eq!(lat.units(), "degrees_north");
        assert_eq!(index.grid_shape().unwrap(), grid());
    }

    #[test]
    fn test_duplicate_file_rejected() {
        let mut index = output_index(1);
        index.create_file_no_time("static.nc", &grid()).unwrap();
        assert!(matches!(
            index.create_file_no_time("static.nc", &grid()),
            Err(CurateError::State(_))
        ));
    }

    #[test]
    fn test_reduce_target() {
        let mut index = output_index(1);
        assert!(matches!(
            index.set_reduce_target("static.nc"),
            Err(CurateError::UnknownFile { .. })
        ));
        index.create_file_no_time("static.nc", &grid()).unwrap();
        index.set_reduce_target("static.nc").unwrap();
        assert_eq!(index.reduce_target(), Some(0));
    }
}
