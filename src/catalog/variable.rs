//! Variable descriptors and their time maps.

use std::collections::{BTreeMap, HashMap};

use super::{DimensionSize, ObjectInfo, VerticalOrder};
use crate::accessor::ElementType;

/// Key of a variable's time map.
///
/// Variables without a record dimension hold a single `Invariant` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeSlot {
    /// The variable has no time dimension.
    Invariant,
    /// A global time index.
    At(usize),
}

/// Physical location of one time slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileTimeLocation {
    /// Index into the dataset's filename list.
    pub file: usize,
    /// Position along the file's record dimension.
    pub local: usize,
}

impl FileTimeLocation {
    /// Create a location.
    pub fn new(file: usize, local: usize) -> Self {
        Self { file, local }
    }
}

/// Everything the index knows about one data variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDescriptor {
    info: ObjectInfo,
    dim_names: Vec<String>,
    dim_sizes: Vec<DimensionSize>,
    aux_names: Vec<String>,
    aux_sizes: Vec<DimensionSize>,
    record_dim: Option<usize>,
    vertical_dim: Option<usize>,
    vertical_order: Option<VerticalOrder>,
    time_map: BTreeMap<TimeSlot, FileTimeLocation>,
}

impl VariableDescriptor {
    /// Create a descriptor over the full dimension list.
    ///
    /// The auxiliary dimensions start out equal to the full list.
    pub fn new(
        info: ObjectInfo,
        dimensions: Vec<(String, DimensionSize)>,
        record_dim: Option<usize>,
        vertical_dim: Option<usize>,
    ) -> Self {
        let (dim_names, dim_sizes): (Vec<_>, Vec<_>) = dimensions.into_iter().unzip();
        assert!(record_dim.map_or(true, |d| d < dim_names.len()));
        assert!(vertical_dim.map_or(true, |d| d < dim_names.len()));

        Self {
            info,
            aux_names: dim_names.clone(),
            aux_sizes: dim_sizes.clone(),
            dim_names,
            dim_sizes,
            record_dim,
            vertical_dim,
            vertical_order: None,
            time_map: BTreeMap::new(),
        }
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        self.info.name()
    }

    /// Reconciled metadata.
    pub fn info(&self) -> &ObjectInfo {
        &self.info
    }

    /// Stored element type.
    pub fn element_type(&self) -> Option<ElementType> {
        self.info.element_type()
    }

    /// Units, empty when absent.
    pub fn units(&self) -> &str {
        self.info.units()
    }

    /// All dimension names in declaration order.
    pub fn dimension_names(&self) -> &[String] {
        &self.dim_names
    }

    /// All dimension sizes in declaration order.
    pub fn dimension_sizes(&self) -> &[DimensionSize] {
        &self.dim_sizes
    }

    /// Dimensions addressed by callers (all dimensions minus grid dimensions).
    pub fn aux_dimension_names(&self) -> &[String] {
        &self.aux_names
    }

    /// Sizes of the auxiliary dimensions.
    pub fn aux_dimension_sizes(&self) -> &[DimensionSize] {
        &self.aux_sizes
    }

    /// Position of the record dimension in the full dimension list.
    pub fn record_dim(&self) -> Option<usize> {
        self.record_dim
    }

    /// Position of the record dimension in the auxiliary dimension list.
    pub fn record_aux_index(&self) -> Option<usize> {
        let name = &self.dim_names[self.record_dim?];
        self.aux_names.iter().position(|n| n == name)
    }

    /// Position of the vertical dimension in the full dimension list.
    pub fn vertical_dim(&self) -> Option<usize> {
        self.vertical_dim
    }

    /// Orientation inherited from the vertical dimension.
    pub fn vertical_order(&self) -> Option<VerticalOrder> {
        self.vertical_order
    }

    /// Check if the variable varies in time.
    pub fn has_record_dim(&self) -> bool {
        self.record_dim.is_some()
    }

    /// Map from time slot to physical location.
    pub fn time_map(&self) -> &BTreeMap<TimeSlot, FileTimeLocation> {
        &self.time_map
    }

    /// Physical location of a time slot.
    pub fn location(&self, slot: TimeSlot) -> Option<FileTimeLocation> {
        self.time_map.get(&slot).copied()
    }

    /// Record a location, returning the existing one if the slot is taken.
    pub(crate) fn insert_location(
        &mut self,
        slot: TimeSlot,
        location: FileTimeLocation,
    ) -> Option<FileTimeLocation> {
        match self.time_map.get(&slot) {
            Some(existing) => Some(*existing),
            None => {
                self.time_map.insert(slot, location);
                None
            },
        }
    }

    pub(crate) fn remove_location(&mut self, slot: TimeSlot) {
        self.time_map.remove(&slot);
    }

    /// Replace every global time index through `permutation` (old -> new).
    pub(crate) fn remap_times(&mut self, permutation: &[usize]) {
        self.time_map = std::mem::take(&mut self.time_map)
            .into_iter()
            .map(|(slot, location)| match slot {
                TimeSlot::Invariant => (slot, location),
                TimeSlot::At(t) => (TimeSlot::At(permutation[t]), location),
            })
            .collect();
    }

    /// Set the record dimension length to the number of mapped times.
    pub(crate) fn update_record_size(&mut self) {
        if let Some(d) = self.record_dim {
            let count = self
                .time_map
                .keys()
                .filter(|slot| matches!(slot, TimeSlot::At(_)))
                .count();
            self.dim_sizes[d] = DimensionSize::Sized(count);
        }
    }

    /// Recompute the auxiliary dimensions as all dimensions minus `grid_dims`.
    pub(crate) fn update_aux_dims(&mut self, grid_dims: &[String]) {
        assert_eq!(self.dim_names.len(), self.dim_sizes.len());

        let (names, sizes) = self
            .dim_names
            .iter()
            .zip(&self.dim_sizes)
            .filter(|(name, _)| !grid_dims.contains(*name))
            .map(|(name, size)| (name.clone(), *size))
            .unzip();
        self.aux_names = names;
        self.aux_sizes = sizes;
    }

    pub(crate) fn set_vertical_order(&mut self, order: Option<VerticalOrder>) {
        self.vertical_order = order;
    }
}

/// Variable descriptors in first-sighting order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableCatalog {
    variables: Vec<VariableDescriptor>,
    lookup: HashMap<String, usize>,
}

impl VariableCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor.
    ///
    /// # Panics
    ///
    /// Panics if a variable of the same name is already present.
    pub fn insert(&mut self, descriptor: VariableDescriptor) -> usize {
        assert!(
            !self.lookup.contains_key(descriptor.name()),
            "variable \"{}\" inserted twice",
            descriptor.name()
        );
        let ix = self.variables.len();
        self.lookup.insert(descriptor.name().to_string(), ix);
        self.variables.push(descriptor);
        ix
    }

    /// Return the named descriptor, inserting one built by `make` if absent.
    ///
    /// The flag is `true` when the descriptor was just inserted.
    pub(crate) fn get_or_insert_with(
        &mut self,
        name: &str,
        make: impl FnOnce() -> VariableDescriptor,
    ) -> (&mut VariableDescriptor, bool) {
        let (ix, inserted) = match self.lookup.get(name) {
            Some(&ix) => (ix, false),
            None => (self.insert(make()), true),
        };
        (&mut self.variables[ix], inserted)
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&VariableDescriptor> {
        self.lookup.get(name).map(|&ix| &self.variables[ix])
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut VariableDescriptor> {
        self.lookup.get(name).map(|&ix| &mut self.variables[ix])
    }

    /// Check if a variable is present.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// Descriptors in first-sighting order.
    pub fn iter(&self) -> impl Iterator<Item = &VariableDescriptor> {
        self.variables.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut VariableDescriptor> {
        self.variables.iter_mut()
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Drop every variable added after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        let len = len.min(self.variables.len());
        for desc in self.variables.drain(len..) {
            self.lookup.remove(desc.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> VariableDescriptor {
        VariableDescriptor::new(
            ObjectInfo::new("tas", Some(ElementType::Float), "K"),
            vec![
                ("time".to_string(), DimensionSize::Varies),
                ("lat".to_string(), DimensionSize::Sized(3)),
                ("lon".to_string(), DimensionSize::Sized(4)),
            ],
            Some(0),
            None,
        )
    }

    #[test]
    fn test_aux_dims_exclude_grid() {
        let mut var = descriptor();
        var.update_aux_dims(&["lat".to_string(), "lon".to_string()]);
        assert_eq!(var.aux_dimension_names(), &["time".to_string()]);
        assert_eq!(var.record_aux_index(), Some(0));
        assert_eq!(var.dimension_names().len(), 3);
    }

    #[test]
    fn test_insert_location_keeps_first() {
        let mut var = descriptor();
        assert!(var
            .insert_location(TimeSlot::At(0), FileTimeLocation::new(0, 0))
            .is_none());
        assert_eq!(
            var.insert_location(TimeSlot::At(0), FileTimeLocation::new(1, 0)),
            Some(FileTimeLocation::new(0, 0))
        );
        assert_eq!(var.location(TimeSlot::At(0)), Some(FileTimeLocation::new(0, 0)));
    }

    #[test]
    fn test_remap_and_record_size() {
        let mut var = descriptor();
        var.insert_location(TimeSlot::At(0), FileTimeLocation::new(0, 0));
        var.insert_location(TimeSlot::At(1), FileTimeLocation::new(1, 0));
        var.remap_times(&[1, 0]);
        var.update_record_size();

        assert_eq!(var.location(TimeSlot::At(1)), Some(FileTimeLocation::new(0, 0)));
        assert_eq!(var.location(TimeSlot::At(0)), Some(FileTimeLocation::new(1, 0)));
        assert_eq!(var.dimension_sizes()[0], DimensionSize::Sized(2));
    }

    #[test]
    fn test_invariant_slot_survives_remap() {
        let mut var = VariableDescriptor::new(
            ObjectInfo::new("area", Some(ElementType::Double), "m2"),
            vec![("lat".to_string(), DimensionSize::Sized(3))],
            None,
            None,
        );
        var.insert_location(TimeSlot::Invariant, FileTimeLocation::new(2, 0));
        var.remap_times(&[]);
        assert_eq!(var.location(TimeSlot::Invariant), Some(FileTimeLocation::new(2, 0)));
        assert_eq!(var.record_aux_index(), None);
    }
}
