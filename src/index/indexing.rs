//! The indexing pass.
//!
//! Each file is read in full first, then merged into the live index state.
//! Every change a merge makes is recorded in an [`Undo`] journal and played
//! back if the file is rejected, so a rejected file leaves no trace while
//! every file before it stays indexed.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::{DatasetIndex, IndexState};
use crate::accessor::{Accessor, ArrayReader, DimensionHeader, ElementType, VariableHeader};
use crate::catalog::{
    vertical_order, AttributeSet, CoordinateValues, DimensionDescriptor, DimensionKind,
    DimensionSize, FileTimeLocation, Mismatch, ObjectInfo, TimeSlot, VariableDescriptor,
};
use crate::error::{CurateError, Result};
use crate::time::{Calendar, Time, TimeUnits};

/// Everything read from one member file.
#[derive(Debug)]
struct FileScan {
    path: PathBuf,
    attributes: Vec<(String, String)>,
    dimensions: Vec<DimensionHeader>,
    variables: Vec<VariableHeader>,
    times: Vec<Time>,
    time_units: Option<TimeUnits>,
    coordinates: HashMap<String, CoordinateValues>,
}

impl FileScan {
    fn variable(&self, name: &str) -> Option<&VariableHeader> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// What one file merge changed, enough to take it back.
///
/// Catalogs and the time axis only grow during a merge, so their lengths
/// before the file are a complete checkpoint. Pre-existing entries are
/// tracked by name.
#[derive(Debug, Default)]
struct Undo {
    dataset_was_empty: bool,
    time_units_was_empty: bool,
    time_count: usize,
    dimension_count: usize,
    variable_count: usize,
    dimension_info: Vec<String>,
    dimension_values: Vec<String>,
    locations: Vec<(String, TimeSlot)>,
}

impl Undo {
    fn checkpoint(state: &IndexState) -> Self {
        Self {
            dataset_was_empty: state.dataset.is_none(),
            time_units_was_empty: state.time_units.is_none(),
            time_count: state.time_axis.len(),
            dimension_count: state.dimensions.len(),
            variable_count: state.variables.len(),
            ..Self::default()
        }
    }
}

impl IndexState {
    fn rollback(&mut self, undo: Undo) {
        if undo.dataset_was_empty {
            self.dataset = None;
        }
        if undo.time_units_was_empty {
            self.time_units = None;
        }
        self.time_axis.truncate(undo.time_count);
        self.dimensions.truncate(undo.dimension_count);
        self.variables.truncate(undo.variable_count);

        for name in &undo.dimension_info {
            if let Some(desc) = self.dimensions.get_mut(name) {
                desc.clear_info();
            }
        }
        for name in &undo.dimension_values {
            if let Some(desc) = self.dimensions.get_mut(name) {
                desc.clear_values();
            }
        }
        for (name, slot) in undo.locations {
            if let Some(desc) = self.variables.get_mut(&name) {
                desc.remove_location(slot);
            }
        }
    }
}

impl<A: Accessor> DatasetIndex<A> {
    /// Index every file from `first` to the end of the filename list.
    ///
    /// On error the filename list is cut back to the files already merged
    /// and the index is finalized over those.
    pub(crate) fn index_files(&mut self, first: usize) -> Result<()> {
        for file in first..self.filenames.len() {
            // Moved out so the merge can borrow the rest of `self`.
            let mut state = std::mem::take(&mut self.state);
            let mut undo = Undo::checkpoint(&state);
            let merged = self
                .scan_file(file)
                .and_then(|scan| self.merge_file(&mut state, &mut undo, file, &scan));

            if let Err(err) = merged {
                state.rollback(undo);
                self.state = state;
                self.filenames.truncate(file);
                self.finalize();
                return Err(err);
            }
            self.state = state;
        }

        self.finalize();
        Ok(())
    }

    fn scan_file(&self, file: usize) -> Result<FileScan> {
        let path = self
            .file_path(file)
            .ok_or_else(|| CurateError::State(format!("file index {} out of range", file)))?;
        let reader = self.accessor.open(&path)?;
        info!("Indexing {}", path.display());

        let attributes = reader.attributes()?;
        let dimensions = reader.dimensions();
        let variables = reader.variables()?;

        let record = &self.config.record_dim_name;
        let (times, time_units) = match variables.iter().find(|v| v.name == *record) {
            Some(var) => {
                let (times, units) = read_times(&reader, var).map_err(|e| e.in_file(&path))?;
                (times, Some(units))
            },
            None => (Vec::new(), None),
        };
        info!("..File contains {} times", times.len());

        let mut coordinates = HashMap::new();
        for dim in dimensions.iter().filter(|d| d.name != *record) {
            let Some(var) = variables.iter().find(|v| v.name == dim.name) else {
                continue;
            };
            if var.dimensions.len() != 1 || var.dimensions[0].name != dim.name {
                return Err(CurateError::schema(format!(
                    "Dimension variable \"{}\" must have exactly one dimension \"{}\" in \"{}\"",
                    var.name,
                    dim.name,
                    path.display()
                )));
            }

            let values = match var.element_type {
                ElementType::Double => {
                    CoordinateValues::Double(reader.read_f64(&var.name, &[0], &[dim.len])?)
                },
                ElementType::Float => {
                    CoordinateValues::Float(reader.read_f32(&var.name, &[0], &[dim.len])?)
                },
                _ => continue,
            };
            coordinates.insert(dim.name.clone(), values);
        }

        Ok(FileScan {
            path,
            attributes,
            dimensions,
            variables,
            times,
            time_units,
            coordinates,
        })
    }

    fn merge_file(
        &self,
        state: &mut IndexState,
        undo: &mut Undo,
        file: usize,
        scan: &FileScan,
    ) -> Result<()> {
        match &state.dataset {
            None => {
                state.dataset = Some(AttributeSet::classify(
                    &scan.attributes,
                    &self.config.dataset_attributes,
                ));
            },
            Some(dataset) => dataset
                .reconcile(&scan.attributes)
                .map_err(|m| CurateError::consistency(&scan.path, "dataset", m))?,
        }

        let file_times: Vec<usize> = scan
            .times
            .iter()
            .map(|&time| state.time_axis.insert(time))
            .collect();
        if state.time_units.is_none() {
            state.time_units = scan.time_units.clone();
        }

        debug!("..Loading dimensions");
        self.merge_dimensions(state, undo, scan)?;
        debug!("..Loading variables");
        self.merge_variables(state, undo, file, scan, &file_times)
    }

    fn merge_dimensions(
        &self,
        state: &mut IndexState,
        undo: &mut Undo,
        scan: &FileScan,
    ) -> Result<()> {
        let record = &self.config.record_dim_name;
        let policy = &self.config.object_attributes;

        for dim in &scan.dimensions {
            let is_record = dim.name == *record;
            let coordinate = scan.variable(&dim.name);
            let values = scan.coordinates.get(&dim.name);
            let object = format!("dimension \"{}\"", dim.name);

            let Some(desc) = state.dimensions.get_mut(&dim.name) else {
                let (kind, size) = if is_record {
                    (DimensionKind::Record, DimensionSize::Varies)
                } else if self.config.is_vertical(&dim.name) {
                    (DimensionKind::Vertical, DimensionSize::Sized(dim.len))
                } else {
                    (DimensionKind::Auxiliary, DimensionSize::Sized(dim.len))
                };

                let mut desc = DimensionDescriptor::new(&dim.name, kind, size);
                if let Some(coordinate) = coordinate {
                    desc.set_info(ObjectInfo::from_header(coordinate, policy));
                }
                if let Some(values) = values {
                    attach_values(&mut desc, values.clone())?;
                }
                debug!("....New dimension {} ({}, {})", dim.name, kind.name(), size);
                state.dimensions.insert(desc);
                continue;
            };

            if !is_record && desc.size() != DimensionSize::Sized(dim.len) {
                return Err(CurateError::schema(format!(
                    "Dimension \"{}\" has inconsistent size across files ({} / {}) in \"{}\"",
                    dim.name,
                    desc.size(),
                    dim.len,
                    scan.path.display()
                )));
            }

            if let Some(coordinate) = coordinate {
                match desc.info() {
                    // Time units may differ between files; offsets are
                    // converted at ingestion.
                    Some(info) => info
                        .reconcile(coordinate, !is_record)
                        .map_err(|m| CurateError::consistency(&scan.path, &object, m))?,
                    None => {
                        desc.set_info(ObjectInfo::from_header(coordinate, policy));
                        undo.dimension_info.push(dim.name.clone());
                    },
                }
            }

            if let Some(values) = values {
                match desc.values() {
                    Some(existing) if existing != values => {
                        return Err(CurateError::consistency(
                            &scan.path,
                            &object,
                            Mismatch::CoordinateValues,
                        ));
                    },
                    Some(_) => {},
                    None => {
                        attach_values(desc, values.clone())?;
                        undo.dimension_values.push(dim.name.clone());
                    },
                }
            }
        }
        Ok(())
    }

    fn merge_variables(
        &self,
        state: &mut IndexState,
        undo: &mut Undo,
        file: usize,
        scan: &FileScan,
        file_times: &[usize],
    ) -> Result<()> {
        let record = &self.config.record_dim_name;

        for var in &scan.variables {
            if state.dimensions.contains(&var.name) {
                continue;
            }

            let record_dim = var.dimensions.iter().position(|d| d.name == *record);
            let vertical: Vec<usize> = var
                .dimensions
                .iter()
                .enumerate()
                .filter(|(_, d)| self.config.is_vertical(&d.name))
                .map(|(ix, _)| ix)
                .collect();
            if vertical.len() > 1 {
                return Err(CurateError::schema(format!(
                    "Possibly multiple vertical dimensions in variable \"{}\"",
                    var.name
                )));
            }

            let dimensions: Vec<(String, DimensionSize)> = var
                .dimensions
                .iter()
                .map(|d| {
                    let size = if d.name == *record {
                        DimensionSize::Varies
                    } else {
                        DimensionSize::Sized(d.len)
                    };
                    (d.name.clone(), size)
                })
                .collect();

            let (desc, inserted) = state.variables.get_or_insert_with(&var.name, || {
                VariableDescriptor::new(
                    ObjectInfo::from_header(var, &self.config.object_attributes),
                    dimensions.clone(),
                    record_dim,
                    vertical.first().copied(),
                )
            });

            if inserted {
                debug!("....New variable {}", var.name);
            } else {
                desc.info().reconcile(var, true).map_err(|m| {
                    CurateError::consistency(&scan.path, format!("variable \"{}\"", var.name), m)
                })?;
                let same_shape = desc.dimension_names().len() == dimensions.len()
                    && desc
                        .dimension_names()
                        .iter()
                        .zip(desc.dimension_sizes())
                        .zip(&dimensions)
                        .all(|((name, size), (n, s))| name == n && (size == s || *s == DimensionSize::Varies));
                if !same_shape {
                    return Err(CurateError::schema(format!(
                        "Variable \"{}\" has inconsistent dimensionality across files in \"{}\"",
                        var.name,
                        scan.path.display()
                    )));
                }
            }

            if desc.record_dim().is_none() {
                if desc.time_map().is_empty() {
                    desc.insert_location(TimeSlot::Invariant, FileTimeLocation::new(file, 0));
                    if !inserted {
                        undo.locations.push((var.name.clone(), TimeSlot::Invariant));
                    }
                } else if desc.time_map().len() != 1
                    || desc.location(TimeSlot::Invariant).is_none()
                {
                    return Err(inconsistent_time_dimension(&var.name));
                }
                continue;
            }

            if desc.location(TimeSlot::Invariant).is_some() {
                return Err(inconsistent_time_dimension(&var.name));
            }

            for (local, &global) in file_times.iter().enumerate() {
                let location = FileTimeLocation::new(file, local);
                let Some(existing) = desc.insert_location(TimeSlot::At(global), location) else {
                    if !inserted {
                        undo.locations.push((var.name.clone(), TimeSlot::At(global)));
                    }
                    continue;
                };

                let time = state
                    .time_axis
                    .get(global)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                if existing.file != file {
                    return Err(CurateError::DuplicateTime {
                        variable: var.name.clone(),
                        time,
                        first: self.filenames[existing.file].clone(),
                        second: self.filenames[file].clone(),
                    });
                }
                warn!(
                    "Variable \"{}\" repeats time {} within \"{}\", keeping slot {}",
                    var.name,
                    time,
                    self.filenames[file],
                    existing.local
                );
            }
        }
        Ok(())
    }

    /// Sort the time axis and bring every dependent up to date.
    pub(crate) fn finalize(&mut self) {
        let state = &mut self.state;

        if let Some(permutation) = state.time_axis.finalize() {
            debug!("Re-sorting {} times", permutation.len());
            for var in state.variables.iter_mut() {
                var.remap_times(&permutation);
            }
            self.output_table = std::mem::take(&mut self.output_table)
                .into_iter()
                .map(|(t, location)| (permutation[t], location))
                .collect();
        }

        let time_count = state.time_axis.len();
        if let Some(dim) = state.dimensions.get_mut(&self.config.record_dim_name) {
            dim.set_size(DimensionSize::Sized(time_count));
        }
        for name in &self.grid_dims {
            if let Some(dim) = state.dimensions.get_mut(name) {
                dim.set_kind(DimensionKind::Grid);
            }
        }

        for var in state.variables.iter_mut() {
            var.update_record_size();
            var.update_aux_dims(&self.grid_dims);
            let order = var
                .vertical_dim()
                .and_then(|d| state.dimensions.get(&var.dimension_names()[d]))
                .and_then(DimensionDescriptor::order);
            var.set_vertical_order(order);
        }
    }
}

fn inconsistent_time_dimension(variable: &str) -> CurateError {
    CurateError::schema(format!(
        "Variable \"{}\" has inconsistent \"time\" dimension across files",
        variable
    ))
}

fn attach_values(desc: &mut DimensionDescriptor, values: CoordinateValues) -> Result<()> {
    if desc.kind() == DimensionKind::Vertical {
        let order = vertical_order(&values.to_f64()).ok_or_else(|| CurateError::NonMonotonic {
            dimension: desc.name().to_string(),
        })?;
        desc.set_order(order);
    }
    desc.set_values(values);
    Ok(())
}

/// Read the record variable and convert its values to times.
fn read_times<R: ArrayReader>(reader: &R, var: &VariableHeader) -> Result<(Vec<Time>, TimeUnits)> {
    if var.dimensions.len() != 1 {
        return Err(CurateError::schema(format!(
            "\"{}\" variable must contain exactly one dimension",
            var.name
        )));
    }
    if !var.element_type.is_integer() && !var.element_type.is_float() {
        return Err(CurateError::Type {
            variable: var.name.clone(),
            found: var.element_type.to_string(),
        });
    }

    let calendar = var
        .attribute("calendar")
        .map(Calendar::from_name)
        .transpose()?
        .unwrap_or_default();

    let units = match var.attribute("units") {
        Some(units) if !units.trim().is_empty() => TimeUnits::parse(units, calendar)?,
        _ => {
            return Err(CurateError::schema(format!(
                "Unknown units for \"{}\"",
                var.name
            )))
        },
    };

    let raw = reader.read_f64(&var.name, &[0], &[var.dimensions[0].len])?;
    let times = raw
        .iter()
        .map(|&v| Time::from_offset(&units, v))
        .collect::<Result<Vec<_>>>()?;
    Ok((times, units))
}
