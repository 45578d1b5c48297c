//! Reconciled metadata registries.
//!
//! Each catalog owns its descriptors outright; lookups by name go through a
//! position map so iteration keeps first-sighting order.

mod attributes;
mod dimension;
mod variable;

pub use attributes::{AttributeSet, Mismatch, ObjectInfo};
pub use dimension::{
    vertical_order, CoordinateValues, DimensionCatalog, DimensionDescriptor, DimensionKind,
    DimensionSize, VerticalOrder,
};
pub use variable::{FileTimeLocation, TimeSlot, VariableCatalog, VariableDescriptor};
