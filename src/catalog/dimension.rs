//! Dimension descriptors and the dimension catalog.

use std::collections::HashMap;
use std::fmt;

use super::ObjectInfo;
use crate::accessor::ElementType;

/// Role of a dimension in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionKind {
    /// Any dimension not otherwise classified.
    Auxiliary,
    /// Spatial grid dimension shared by the whole dataset.
    Grid,
    /// The time/append dimension.
    Record,
    /// Vertical coordinate.
    Vertical,
}

impl DimensionKind {
    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            DimensionKind::Auxiliary => "auxiliary",
            DimensionKind::Grid => "grid",
            DimensionKind::Record => "record",
            DimensionKind::Vertical => "vertical",
        }
    }
}

/// Size of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionSize {
    /// Fixed length.
    Sized(usize),
    /// Length varies between files (the record dimension).
    Varies,
}

impl DimensionSize {
    /// Fixed length, if any.
    pub fn len(self) -> Option<usize> {
        match self {
            DimensionSize::Sized(n) => Some(n),
            DimensionSize::Varies => None,
        }
    }
}

impl fmt::Display for DimensionSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionSize::Sized(n) => write!(f, "{}", n),
            DimensionSize::Varies => f.write_str("varies"),
        }
    }
}

/// Coordinate values captured from a dimension variable.
///
/// Equality is bitwise, so a NaN fill value matches itself.
#[derive(Debug, Clone)]
pub enum CoordinateValues {
    /// Single precision values.
    Float(Vec<f32>),
    /// Double precision values.
    Double(Vec<f64>),
}

impl CoordinateValues {
    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            CoordinateValues::Float(v) => v.len(),
            CoordinateValues::Double(v) => v.len(),
        }
    }

    /// Check if there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to double precision.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            CoordinateValues::Float(v) => v.iter().map(|&x| x as f64).collect(),
            CoordinateValues::Double(v) => v.clone(),
        }
    }

    /// Element type the values were stored with.
    pub fn element_type(&self) -> ElementType {
        match self {
            CoordinateValues::Float(_) => ElementType::Float,
            CoordinateValues::Double(_) => ElementType::Double,
        }
    }
}

impl PartialEq for CoordinateValues {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CoordinateValues::Float(a), CoordinateValues::Float(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            },
            (CoordinateValues::Double(a), CoordinateValues::Double(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            },
            _ => false,
        }
    }
}

/// Orientation of a vertical coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerticalOrder {
    /// Values increase with index.
    BottomUp,
    /// Values decrease with index.
    TopDown,
}

impl VerticalOrder {
    /// `+1` for bottom-up, `-1` for top-down.
    pub fn sign(self) -> i32 {
        match self {
            VerticalOrder::BottomUp => 1,
            VerticalOrder::TopDown => -1,
        }
    }
}

/// Orientation of a vertical coordinate, or `None` if the values are not
/// strictly monotonic.
///
/// Fewer than two values are treated as bottom-up.
pub fn vertical_order(values: &[f64]) -> Option<VerticalOrder> {
    if values.len() < 2 {
        return Some(VerticalOrder::BottomUp);
    }
    if values.windows(2).all(|w| w[1] > w[0]) {
        Some(VerticalOrder::BottomUp)
    } else if values.windows(2).all(|w| w[1] < w[0]) {
        Some(VerticalOrder::TopDown)
    } else {
        None
    }
}

/// Everything the index knows about one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionDescriptor {
    name: String,
    kind: DimensionKind,
    size: DimensionSize,
    values: Option<CoordinateValues>,
    info: Option<ObjectInfo>,
    order: Option<VerticalOrder>,
}

impl DimensionDescriptor {
    /// Create a descriptor without a coordinate variable.
    pub fn new(name: impl Into<String>, kind: DimensionKind, size: DimensionSize) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
            values: None,
            info: None,
            order: None,
        }
    }

    /// Attach coordinate variable metadata.
    pub fn with_info(mut self, info: ObjectInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Attach captured coordinate values.
    pub fn with_values(mut self, values: CoordinateValues) -> Self {
        self.values = Some(values);
        self
    }

    /// Set the vertical orientation.
    pub fn with_order(mut self, order: VerticalOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Dimension name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dimension role.
    pub fn kind(&self) -> DimensionKind {
        self.kind
    }

    /// Dimension size.
    pub fn size(&self) -> DimensionSize {
        self.size
    }

    /// Captured coordinate values.
    pub fn values(&self) -> Option<&CoordinateValues> {
        self.values.as_ref()
    }

    /// Coordinate variable metadata.
    pub fn info(&self) -> Option<&ObjectInfo> {
        self.info.as_ref()
    }

    /// Vertical orientation, for vertical dimensions with known values.
    pub fn order(&self) -> Option<VerticalOrder> {
        self.order
    }

    /// Units of the coordinate variable, empty when absent.
    pub fn units(&self) -> &str {
        self.info.as_ref().map_or("", ObjectInfo::units)
    }

    /// Element type of the coordinate variable.
    pub fn element_type(&self) -> Option<ElementType> {
        self.info.as_ref().and_then(ObjectInfo::element_type)
    }

    pub(crate) fn set_kind(&mut self, kind: DimensionKind) {
        self.kind = kind;
    }

    pub(crate) fn set_size(&mut self, size: DimensionSize) {
        self.size = size;
    }

    pub(crate) fn set_info(&mut self, info: ObjectInfo) {
        self.info = Some(info);
    }

    pub(crate) fn set_values(&mut self, values: CoordinateValues) {
        self.values = Some(values);
    }

    pub(crate) fn set_order(&mut self, order: VerticalOrder) {
        self.order = Some(order);
    }

    pub(crate) fn clear_info(&mut self) {
        self.info = None;
    }

    /// Forget the coordinate values and the orientation derived from them.
    pub(crate) fn clear_values(&mut self) {
        self.values = None;
        self.order = None;
    }
}

/// Dimension descriptors in first-sighting order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionCatalog {
    dimensions: Vec<DimensionDescriptor>,
    lookup: HashMap<String, usize>,
}

impl DimensionCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor.
    ///
    /// # Panics
    ///
    /// Panics if a dimension of the same name is already present.
    pub fn insert(&mut self, descriptor: DimensionDescriptor) -> usize {
        assert!(
            !self.lookup.contains_key(descriptor.name()),
            "dimension \"{}\" inserted twice",
            descriptor.name()
        );
        let ix = self.dimensions.len();
        self.lookup.insert(descriptor.name().to_string(), ix);
        self.dimensions.push(descriptor);
        ix
    }

    /// Look up a dimension.
    pub fn get(&self, name: &str) -> Option<&DimensionDescriptor> {
        self.lookup.get(name).map(|&ix| &self.dimensions[ix])
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut DimensionDescriptor> {
        self.lookup.get(name).map(|&ix| &mut self.dimensions[ix])
    }

    /// Check if a dimension is present.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// Size of a dimension.
    pub fn size_of(&self, name: &str) -> Option<DimensionSize> {
        self.get(name).map(DimensionDescriptor::size)
    }

    /// Descriptors in first-sighting order.
    pub fn iter(&self) -> impl Iterator<Item = &DimensionDescriptor> {
        self.dimensions.iter()
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Drop every dimension added after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        let len = len.min(self.dimensions.len());
        for desc in self.dimensions.drain(len..) {
            self.lookup.remove(desc.name());
        }
    }
}
