//! Logical to physical address resolution for reads and writes.

use tracing::debug;

use super::DatasetIndex;
use crate::accessor::{Accessor, ArrayReader, ArrayWriter, ElementType};
use crate::catalog::{DimensionSize, FileTimeLocation, TimeSlot, VariableDescriptor};
use crate::error::{CurateError, Result};

/// A rectangular slab in one physical file.
#[derive(Debug)]
struct Slab {
    start: Vec<usize>,
    count: Vec<usize>,
    len: usize,
}

impl<A: Accessor> DatasetIndex<A> {
    /// Read one grid slice of a variable.
    ///
    /// `aux` is aligned with the variable's auxiliary dimensions; its entry
    /// at the record dimension holds a global time index. `out` receives the
    /// grid values in row-major order and must match the grid size exactly.
    pub fn load_data(&self, variable: &str, aux: &[usize], out: &mut [f32]) -> Result<()> {
        let var = self
            .state
            .variables
            .get(variable)
            .ok_or_else(|| CurateError::unknown_variable(variable))?;

        let slot = self.time_slot(var, aux)?;
        let location = var.location(slot).ok_or_else(|| {
            CurateError::resolution(variable, format!("no file holds {}", self.describe_slot(slot)))
        })?;
        let slab = self.slab(var, aux, location)?;
        if out.len() != slab.len {
            return Err(CurateError::Size {
                expected: slab.len,
                actual: out.len(),
            });
        }

        let path = self
            .file_path(location.file)
            .ok_or_else(|| CurateError::resolution(variable, "file index out of range"))?;
        debug!(
            "READ {}{} from {}",
            variable,
            self.describe_aux(var, aux),
            path.display()
        );

        let reader = self.accessor.open(&path)?;
        let header = reader.variable(variable)?.ok_or_else(|| {
            CurateError::resolution(variable, format!("missing from \"{}\"", path.display()))
        })?;

        match header.element_type {
            ElementType::Double => {
                let values = reader.read_f64(variable, &slab.start, &slab.count)?;
                for (dst, src) in out.iter_mut().zip(values) {
                    *dst = src as f32;
                }
            },
            ElementType::Float => {
                let values = reader.read_f32(variable, &slab.start, &slab.count)?;
                out.copy_from_slice(&values);
            },
            other => {
                return Err(CurateError::Type {
                    variable: variable.to_string(),
                    found: other.to_string(),
                })
            },
        }
        Ok(())
    }

    /// Write one grid slice of a variable.
    ///
    /// The target file is, in order of preference: the file already holding
    /// this time slot, the reduce target for time-invariant variables, or the
    /// output file allocated for the time index. Missing dimensions and the
    /// variable itself are created in the target file on first write.
    pub fn write_data(&mut self, variable: &str, aux: &[usize], data: &[f32]) -> Result<()> {
        let var = self
            .state
            .variables
            .get(variable)
            .ok_or_else(|| CurateError::unknown_variable(variable))?;

        let slot = self.time_slot(var, aux)?;
        let (location, memoize) = match (var.location(slot), slot) {
            (Some(location), _) => (location, false),
            (None, TimeSlot::Invariant) => {
                let file = self.reduce_target.ok_or_else(|| CurateError::NoReduceTarget {
                    variable: variable.to_string(),
                })?;
                (FileTimeLocation::new(file, 0), true)
            },
            (None, TimeSlot::At(t)) => {
                let location = self
                    .output_table
                    .get(&t)
                    .copied()
                    .ok_or(CurateError::Allocation { time_index: t })?;
                (location, true)
            },
        };

        let slab = self.slab(var, aux, location)?;
        if data.len() != slab.len {
            return Err(CurateError::Size {
                expected: slab.len,
                actual: data.len(),
            });
        }

        let path = self
            .file_path(location.file)
            .ok_or_else(|| CurateError::resolution(variable, "file index out of range"))?;
        debug!(
            "WRITE {}{} to {}",
            variable,
            self.describe_aux(var, aux),
            path.display()
        );

        let mut writer = self.accessor.append(&path)?;
        self.ensure_dimensions(&mut writer, var)?;
        let stored = self.ensure_variable(&mut writer, var)?;
        match stored {
            ElementType::Double => {
                let widened: Vec<f64> = data.iter().map(|&v| v as f64).collect();
                writer.write_f64(variable, &slab.start, &slab.count, &widened)?;
            },
            _ => writer.write_f32(variable, &slab.start, &slab.count, data)?,
        }

        if memoize {
            if let Some(var) = self.state.variables.get_mut(variable) {
                var.insert_location(slot, location);
            }
        }
        Ok(())
    }

    fn time_slot(&self, var: &VariableDescriptor, aux: &[usize]) -> Result<TimeSlot> {
        let expected = var.aux_dimension_names().len();
        if aux.len() != expected {
            return Err(CurateError::resolution(
                var.name(),
                format!("expected {} auxiliary indices, got {}", expected, aux.len()),
            ));
        }
        Ok(match var.record_aux_index() {
            Some(ix) => TimeSlot::At(aux[ix]),
            None => TimeSlot::Invariant,
        })
    }

    /// Start/count over the variable's full shape: one element along each
    /// auxiliary dimension, the whole extent along each grid dimension.
    fn slab(
        &self,
        var: &VariableDescriptor,
        aux: &[usize],
        location: FileTimeLocation,
    ) -> Result<Slab> {
        let record = var.record_dim();
        let mut aux = aux.iter();
        let mut slab = Slab {
            start: Vec::with_capacity(var.dimension_names().len()),
            count: Vec::with_capacity(var.dimension_names().len()),
            len: 1,
        };

        for (d, name) in var.dimension_names().iter().enumerate() {
            if self.grid_dims.contains(name) {
                let size = self
                    .state
                    .dimensions
                    .size_of(name)
                    .and_then(DimensionSize::len)
                    .ok_or_else(|| CurateError::UnknownDimension { name: name.clone() })?;
                slab.start.push(0);
                slab.count.push(size);
                slab.len *= size;
                continue;
            }

            let index = *aux.next().ok_or_else(|| {
                CurateError::resolution(var.name(), "auxiliary index count mismatch")
            })?;
            let start = if Some(d) == record { location.local } else { index };
            slab.start.push(start);
            slab.count.push(1);
        }

        if aux.next().is_some() {
            return Err(CurateError::resolution(var.name(), "auxiliary indices left over"));
        }
        Ok(slab)
    }

    /// Create the variable's dimensions in the target file, or check the
    /// ones already there.
    fn ensure_dimensions<W: ArrayWriter>(&self, writer: &mut W, var: &VariableDescriptor) -> Result<()> {
        for (d, name) in var.dimension_names().iter().enumerate() {
            let is_record = var.record_dim() == Some(d);
            let desc = self
                .state
                .dimensions
                .get(name)
                .ok_or_else(|| CurateError::UnknownDimension { name: name.clone() })?;

            if let Some(existing) = writer.dimension(name) {
                if !is_record && desc.size() != DimensionSize::Sized(existing.len) {
                    return Err(CurateError::schema(format!(
                        "Dimension \"{}\" mismatch ({} / {})",
                        name,
                        existing.len,
                        desc.size()
                    )));
                }
                continue;
            }

            if is_record {
                writer.add_dimension(name, None)?;
                continue;
            }

            let size = desc.size().len().ok_or_else(|| {
                CurateError::schema(format!("Dimension \"{}\" has no fixed size", name))
            })?;
            writer.add_dimension(name, Some(size))?;

            if let Some(values) = desc.values() {
                writer.add_variable(name, values.element_type(), &[name.as_str()])?;
                writer.write_f64(name, &[0], &[values.len()], &values.to_f64())?;
                if !desc.units().is_empty() {
                    writer.put_attribute(name, "units", desc.units())?;
                }
            }
        }
        Ok(())
    }

    /// Create the variable in the target file if needed and return its
    /// stored element type.
    fn ensure_variable<W: ArrayWriter>(&self, writer: &mut W, var: &VariableDescriptor) -> Result<ElementType> {
        if let Some(header) = writer.variable(var.name())? {
            return Ok(header.element_type);
        }

        let element_type = match var.element_type() {
            Some(ElementType::Double) => ElementType::Double,
            _ => ElementType::Float,
        };
        let dims: Vec<&str> = var.dimension_names().iter().map(String::as_str).collect();
        writer.add_variable(var.name(), element_type, &dims)?;
        if !var.units().is_empty() {
            writer.put_attribute(var.name(), "units", var.units())?;
        }
        for (name, value) in var.info().attributes().iter() {
            writer.put_attribute(var.name(), name, value)?;
        }
        Ok(element_type)
    }

    fn describe_slot(&self, slot: TimeSlot) -> String {
        match slot {
            TimeSlot::Invariant => "the time-invariant slice".to_string(),
            TimeSlot::At(t) => match self.state.time_axis.get(t) {
                Some(time) => format!("time {} ({})", t, time),
                None => format!("time index {}", t),
            },
        }
    }

    fn describe_aux(&self, var: &VariableDescriptor, aux: &[usize]) -> String {
        let record = var.record_aux_index();
        aux.iter()
            .enumerate()
            .map(|(d, &ix)| {
                if Some(d) == record {
                    match self.state.time_axis.get(ix) {
                        Some(time) => format!(" [{}]", time),
                        None => format!(" [time: {}]", ix),
                    }
                } else {
                    format!(" [{}: {}]", var.aux_dimension_names()[d], ix)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{ElementType, MemoryAccessor, MemoryFile};
    use crate::config::IndexConfig;

    fn index() -> DatasetIndex<MemoryAccessor> {
        let accessor = MemoryAccessor::new();
        accessor.insert(
            "/d/a.nc",
            MemoryFile::new()
                .with_unlimited_dimension("time", 2)
                .with_dimension("lat", 3)
                .with_variable("time", ElementType::Double, &["time"], vec![0.0, 1.0])
                .with_variable_attribute("time", "units", "days since 2000-01-01")
                .with_variable("tas", ElementType::Float, &["time", "lat"], vec![0.0; 6]),
        );
        let mut index =
            DatasetIndex::with_accessor(accessor, IndexConfig::default().with_grid_dims(["lat"]));
        index.populate("/d/*.nc").unwrap();
        index
    }

    #[test]
    fn test_slab_spans_grid() {
        let index = index();
        let var = index.variable("tas").unwrap();
        let slab = index.slab(var, &[1], FileTimeLocation::new(0, 1)).unwrap();
        assert_eq!(slab.start, vec![1, 0]);
        assert_eq!(slab.count, vec![1, 3]);
        assert_eq!(slab.len, 3);
    }

    #[test]
    fn test_slab_rejects_wrong_index_count() {
        let index = index();
        let var = index.variable("tas").unwrap();
        let location = FileTimeLocation::new(0, 0);
        for aux in [&[][..], &[0, 0][..]] {
            assert!(matches!(
                index.slab(var, aux, location),
                Err(CurateError::Resolution { .. })
            ));
        }
    }
}
