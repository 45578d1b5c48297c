//! Declaring dimensions and variables on an output index.

use tracing::debug;

use super::DatasetIndex;
use crate::accessor::{Accessor, ElementType};
use crate::catalog::{
    vertical_order, CoordinateValues, DimensionDescriptor, DimensionKind, DimensionSize,
    ObjectInfo, VariableDescriptor,
};
use crate::error::{CurateError, Result};

impl<A: Accessor> DatasetIndex<A> {
    /// Declare a dimension or confirm an existing one.
    ///
    /// An auxiliary dimension may be upgraded to another kind. Declaring a
    /// grid dimension removes it from every variable's auxiliary dimensions.
    /// Vertical dimensions need coordinate values and are declared with
    /// [`DatasetIndex::add_vertical_dimension`].
    pub fn add_dimension(&mut self, name: &str, size: DimensionSize, kind: DimensionKind) -> Result<()> {
        if kind == DimensionKind::Vertical {
            return Err(CurateError::schema(format!(
                "Vertical dimension \"{}\" requires coordinate values",
                name
            )));
        }

        match self.state.dimensions.get_mut(name) {
            Some(desc) => {
                if kind != DimensionKind::Record && desc.size() != size {
                    return Err(CurateError::schema(format!(
                        "Dimension \"{}\" mismatch ({} / {})",
                        name,
                        desc.size(),
                        size
                    )));
                }
                if desc.kind() == DimensionKind::Auxiliary {
                    desc.set_kind(kind);
                } else if kind != DimensionKind::Auxiliary && desc.kind() != kind {
                    return Err(CurateError::schema(format!(
                        "Dimension \"{}\" already declared as {}",
                        name,
                        desc.kind().name()
                    )));
                }
            },
            None => {
                debug!("Adding {} dimension {} ({})", kind.name(), name, size);
                self.state
                    .dimensions
                    .insert(DimensionDescriptor::new(name, kind, size));
            },
        }

        if kind == DimensionKind::Grid && !self.grid_dims.iter().any(|g| g == name) {
            self.grid_dims.push(name.to_string());
            for var in self.state.variables.iter_mut() {
                var.update_aux_dims(&self.grid_dims);
            }
        }
        Ok(())
    }

    /// Declare a vertical dimension from its coordinate values.
    ///
    /// The orientation follows the monotonicity of `values`; anything not
    /// strictly monotonic is rejected.
    pub fn add_vertical_dimension(&mut self, name: &str, values: Vec<f64>, units: &str) -> Result<()> {
        let order = vertical_order(&values).ok_or_else(|| CurateError::NonMonotonic {
            dimension: name.to_string(),
        })?;

        if let Some(existing) = self.state.dimensions.get(name) {
            let same = existing.kind() == DimensionKind::Vertical
                && existing.size() == DimensionSize::Sized(values.len())
                && existing.values().map(CoordinateValues::to_f64) == Some(values);
            if !same {
                return Err(CurateError::schema(format!(
                    "Dimension \"{}\" already declared with different levels",
                    name
                )));
            }
            return Ok(());
        }

        debug!("Adding vertical dimension {} ({} levels)", name, values.len());
        let size = DimensionSize::Sized(values.len());
        self.state.dimensions.insert(
            DimensionDescriptor::new(name, DimensionKind::Vertical, size)
                .with_info(ObjectInfo::new(name, Some(ElementType::Double), units))
                .with_values(CoordinateValues::Double(values))
                .with_order(order),
        );
        Ok(())
    }

    /// Declare a variable shaped like `name` in `source`.
    ///
    /// The variable keeps its type, units, attributes and auxiliary
    /// dimensions, and takes this index's grid dimensions. Auxiliary
    /// dimensions unknown here are copied from `source`.
    pub fn add_variable_from_template<B: Accessor>(
        &mut self,
        source: &DatasetIndex<B>,
        name: &str,
    ) -> Result<()> {
        self.add_templated_variable(source, name, None)
    }

    /// Like [`DatasetIndex::add_variable_from_template`], replacing the
    /// variable's vertical dimension by `vertical_dim`, which must already be
    /// declared here.
    pub fn add_variable_from_template_with_new_vertical_dim<B: Accessor>(
        &mut self,
        source: &DatasetIndex<B>,
        name: &str,
        vertical_dim: &str,
    ) -> Result<()> {
        self.add_templated_variable(source, name, Some(vertical_dim))
    }

    fn add_templated_variable<B: Accessor>(
        &mut self,
        source: &DatasetIndex<B>,
        name: &str,
        vertical_dim: Option<&str>,
    ) -> Result<()> {
        if self.state.variables.contains(name) {
            return Err(CurateError::State(format!(
                "Variable \"{}\" already exists in file_list",
                name
            )));
        }
        let template = source
            .variable(name)
            .ok_or_else(|| CurateError::unknown_variable(name))?;

        if let Some(vdim) = vertical_dim {
            if template.vertical_dim().is_none() {
                return Err(CurateError::schema(format!(
                    "Variable \"{}\" has no vertical dimension to replace",
                    name
                )));
            }
            match self.state.dimensions.get(vdim) {
                Some(desc) if desc.kind() == DimensionKind::Vertical => {},
                Some(_) => {
                    return Err(CurateError::schema(format!(
                        "Dimension \"{}\" is not vertical",
                        vdim
                    )))
                },
                None => {
                    return Err(CurateError::UnknownDimension {
                        name: vdim.to_string(),
                    })
                },
            }
        }

        let record = self.config.record_dim_name.clone();
        let mut dimensions: Vec<(String, DimensionSize)> = Vec::new();
        let mut copied: Vec<DimensionDescriptor> = Vec::new();
        for (d, dim) in template.dimension_names().iter().enumerate() {
            if !template.aux_dimension_names().contains(dim) {
                continue;
            }
            let dim = match vertical_dim {
                Some(vdim) if template.vertical_dim() == Some(d) => vdim,
                _ => dim.as_str(),
            };

            let desc = match self.state.dimensions.get(dim) {
                Some(desc) => {
                    if let Some(theirs) = source.dimension(dim) {
                        check_compatible(desc, theirs, vertical_dim == Some(dim))?;
                    }
                    desc
                },
                None => {
                    let theirs = source
                        .dimension(dim)
                        .ok_or_else(|| CurateError::UnknownDimension { name: dim.to_string() })?;
                    copied.push(theirs.clone());
                    theirs
                },
            };

            let size = if dim == record {
                DimensionSize::Varies
            } else {
                desc.size()
            };
            dimensions.push((dim.to_string(), size));
        }

        for grid in &self.grid_dims {
            let size = self
                .state
                .dimensions
                .size_of(grid)
                .ok_or_else(|| CurateError::UnknownDimension { name: grid.clone() })?;
            dimensions.push((grid.clone(), size));
        }

        let record_dim = dimensions.iter().position(|(n, _)| *n == record);
        let vertical = dimensions.iter().position(|(n, _)| self.config.is_vertical(n));
        let vertical = match vertical_dim {
            Some(vdim) => dimensions.iter().position(|(n, _)| n == vdim),
            None => vertical,
        };

        for desc in copied {
            debug!("Adding dimension {} from template", desc.name());
            self.state.dimensions.insert(desc);
        }

        let mut var = VariableDescriptor::new(template.info().clone(), dimensions, record_dim, vertical);
        var.update_aux_dims(&self.grid_dims);
        let order = vertical
            .and_then(|d| self.state.dimensions.get(&var.dimension_names()[d]))
            .and_then(DimensionDescriptor::order);
        var.set_vertical_order(order);

        debug!("Adding variable {} from template", name);
        self.state.variables.insert(var);
        Ok(())
    }
}

/// A dimension declared here must agree with the template's dimension of
/// the same name. The record dimension may differ in length.
fn check_compatible(
    ours: &DimensionDescriptor,
    theirs: &DimensionDescriptor,
    replaced: bool,
) -> Result<()> {
    if replaced || ours.kind() == DimensionKind::Record || theirs.kind() == DimensionKind::Record {
        return Ok(());
    }
    if ours.size() != theirs.size() {
        return Err(CurateError::schema(format!(
            "Dimension \"{}\" mismatch ({} / {})",
            ours.name(),
            ours.size(),
            theirs.size()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{MemoryAccessor, MemoryFile};
    use crate::catalog::VerticalOrder;
    use crate::config::IndexConfig;
    use std::path::Path;

    fn populated(config: IndexConfig) -> DatasetIndex<MemoryAccessor> {
        let accessor = MemoryAccessor::new();
        accessor.insert(
            "/in/a.nc",
            MemoryFile::new()
                .with_unlimited_dimension("time", 2)
                .with_dimension("lev", 3)
                .with_dimension("lat", 2)
                .with_variable("time", ElementType::Double, &["time"], vec![0.0, 1.0])
                .with_variable_attribute("time", "units", "days since 2000-01-01")
                .with_variable("lev", ElementType::Double, &["lev"], vec![1000.0, 850.0, 500.0])
                .with_variable_attribute("lev", "units", "hPa")
                .with_variable("ta", ElementType::Float, &["time", "lev", "lat"], vec![0.0; 12])
                .with_variable_attribute("ta", "units", "K")
                .with_variable_attribute("ta", "long_name", "air temperature"),
        );
        let mut index = DatasetIndex::with_accessor(accessor, config);
        index.populate("/in/*.nc").unwrap();
        index
    }

    fn source_index() -> DatasetIndex<MemoryAccessor> {
        populated(IndexConfig::default().with_grid_dims(["lat"]))
    }

    fn output_index(source: &DatasetIndex<MemoryAccessor>) -> DatasetIndex<MemoryAccessor> {
        let mut out = source.duplicate_for_writing(Path::new("/out")).unwrap();
        out.add_dimension("lat", DimensionSize::Sized(2), DimensionKind::Grid)
            .unwrap();
        out
    }

    #[test]
    fn test_variable_from_template() {
        let source = source_index();
        let mut out = output_index(&source);
        out.add_variable_from_template(&source, "ta").unwrap();

        let ta = out.variable("ta").unwrap();
        assert_eq!(ta.dimension_names(), &["time", "lev", "lat"]);
        assert_eq!(ta.aux_dimension_names(), &["time", "lev"]);
        assert_eq!(ta.units(), "K");
        assert_eq!(ta.info().attributes().get("long_name"), Some("air temperature"));
        assert_eq!(ta.record_dim(), Some(0));
        assert_eq!(ta.vertical_order(), Some(VerticalOrder::TopDown));
        assert!(out.dimension("lev").is_some());

        assert!(matches!(
            out.add_variable_from_template(&source, "ta"),
            Err(CurateError::State(_))
        ));
        assert!(matches!(
            out.add_variable_from_template(&source, "missing"),
            Err(CurateError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_template_with_new_vertical_dim() {
        let source = source_index();
        let mut out = output_index(&source);
        out.add_vertical_dimension("plev", vec![10.0, 50.0], "hPa")
            .unwrap();
        out.add_variable_from_template_with_new_vertical_dim(&source, "ta", "plev")
            .unwrap();

        let ta = out.variable("ta").unwrap();
        assert_eq!(ta.dimension_names(), &["time", "plev", "lat"]);
        assert_eq!(ta.dimension_sizes()[1], DimensionSize::Sized(2));
        assert_eq!(ta.vertical_order(), Some(VerticalOrder::BottomUp));
        assert!(out.dimension("lev").is_none());
    }

    #[test]
    fn test_conflicting_template_dimension() {
        let source = source_index();
        let mut out = output_index(&source);
        out.add_dimension("lev", DimensionSize::Sized(5), DimensionKind::Auxiliary)
            .unwrap();
        assert!(matches!(
            out.add_variable_from_template(&source, "ta"),
            Err(CurateError::Schema(_))
        ));
        assert!(out.variable("ta").is_none());
    }

    #[test]
    fn test_vertical_dimension_checks() {
        let source = source_index();
        let mut out = output_index(&source);
        assert!(matches!(
            out.add_vertical_dimension("plev", vec![5.0, 5.0, 9.0], "hPa"),
            Err(CurateError::NonMonotonic { .. })
        ));
        out.add_vertical_dimension("plev", vec![1000.0, 850.0], "hPa")
            .unwrap();
        out.add_vertical_dimension("plev", vec![1000.0, 850.0], "hPa")
            .unwrap();
        assert!(matches!(
            out.add_vertical_dimension("plev", vec![900.0, 850.0], "hPa"),
            Err(CurateError::Schema(_))
        ));
        assert_eq!(out.dimension("plev").unwrap().order(), Some(VerticalOrder::TopDown));
    }

    #[test]
    fn test_grid_declaration_updates_aux_dims() {
        let mut index = populated(IndexConfig::default());
        assert_eq!(index.variable("ta").unwrap().aux_dimension_names(), &["time", "lev", "lat"]);

        index
            .add_dimension("lat", DimensionSize::Sized(2), DimensionKind::Grid)
            .unwrap();
        assert_eq!(index.dimension("lat").unwrap().kind(), DimensionKind::Grid);
        assert_eq!(index.grid_dimension_names(), &["lat"]);
        assert_eq!(index.variable("ta").unwrap().aux_dimension_names(), &["time", "lev"]);

        assert!(matches!(
            index.add_dimension("lat", DimensionSize::Sized(3), DimensionKind::Grid),
            Err(CurateError::Schema(_))
        ));
        assert!(matches!(
            index.add_dimension("lev", DimensionSize::Sized(3), DimensionKind::Grid),
            Err(CurateError::Schema(_))
        ));
        assert!(matches!(
            index.add_dimension("z", DimensionSize::Sized(3), DimensionKind::Vertical),
            Err(CurateError::Schema(_))
        ));
    }
}
