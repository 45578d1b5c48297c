//! The multi-file dataset index.
//!
//! A [`DatasetIndex`] is created empty, populated once from a search
//! pattern, and may then be extended with [`DatasetIndex::append`] until it
//! is locked. Output indices are derived with
//! [`DatasetIndex::duplicate_for_writing`] and receive files through the
//! output allocator in [`output`].

mod discovery;
mod indexing;
mod output;
mod partition;
mod resolve;
mod schema;

pub use output::{GridDimension, GridShape, TIME_PLACEHOLDER};
pub use partition::{block_range, WorkerPartition, MAX_TIME_STRIDE};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::accessor::{Accessor, NetcdfAccessor};
use crate::catalog::{
    AttributeSet, DimensionCatalog, DimensionDescriptor, DimensionSize, FileTimeLocation,
    VariableCatalog, VariableDescriptor,
};
use crate::config::IndexConfig;
use crate::error::{CurateError, Result};
use crate::time::{Time, TimeAxis, TimeUnits};

/// Everything merged from member files.
///
/// Kept separate from the filename list so a rejected file can be rolled
/// back without touching the files already accepted.
#[derive(Debug, Clone, Default)]
struct IndexState {
    dataset: Option<AttributeSet>,
    time_axis: TimeAxis,
    time_units: Option<TimeUnits>,
    dimensions: DimensionCatalog,
    variables: VariableCatalog,
}

/// Index of a dataset spread over many files.
#[derive(Debug)]
pub struct DatasetIndex<A: Accessor = NetcdfAccessor> {
    accessor: A,
    config: IndexConfig,
    base_dir: String,
    filenames: Vec<String>,
    grid_dims: Vec<String>,
    locked: bool,
    state: IndexState,
    output_table: BTreeMap<usize, FileTimeLocation>,
    reduce_target: Option<usize>,
}

impl DatasetIndex<NetcdfAccessor> {
    /// Create an empty index over netCDF files.
    pub fn new(config: IndexConfig) -> Self {
        Self::with_accessor(NetcdfAccessor, config)
    }
}

impl<A: Accessor> DatasetIndex<A> {
    /// Create an empty index over files of the given accessor.
    pub fn with_accessor(accessor: A, config: IndexConfig) -> Self {
        let grid_dims = config.grid_dim_names.clone();
        Self {
            accessor,
            config,
            base_dir: String::new(),
            filenames: Vec::new(),
            grid_dims,
            locked: false,
            state: IndexState::default(),
            output_table: BTreeMap::new(),
            reduce_target: None,
        }
    }

    /// Accessor used for member files.
    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    /// Configuration the index was created with.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Name of the record dimension.
    pub fn record_dim_name(&self) -> &str {
        &self.config.record_dim_name
    }

    /// Base directory, always ending in a path separator once set.
    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    /// Member filenames relative to the base directory, in index order.
    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    /// Full path of a member file.
    pub fn file_path(&self, file: usize) -> Option<PathBuf> {
        self.filenames
            .get(file)
            .map(|name| join_path(&self.base_dir, name))
    }

    /// Check if discovery has already run or files were created.
    pub fn is_populated(&self) -> bool {
        !self.filenames.is_empty() || self.state.dataset.is_some()
    }

    /// Forbid further appends.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Check if the index is locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Dataset-scope attributes.
    pub fn dataset_attributes(&self) -> Option<&AttributeSet> {
        self.state.dataset.as_ref()
    }

    /// The global time axis.
    pub fn time_axis(&self) -> &TimeAxis {
        &self.state.time_axis
    }

    /// Number of global times.
    pub fn time_count(&self) -> usize {
        self.state.time_axis.len()
    }

    /// Time at a global index.
    pub fn time(&self, ix: usize) -> Option<&Time> {
        self.state.time_axis.get(ix)
    }

    /// Units of the record variable, as first seen.
    pub fn time_units(&self) -> Option<&TimeUnits> {
        self.state.time_units.as_ref()
    }

    /// All dimensions.
    pub fn dimensions(&self) -> &DimensionCatalog {
        &self.state.dimensions
    }

    /// Look up a dimension.
    pub fn dimension(&self, name: &str) -> Option<&DimensionDescriptor> {
        self.state.dimensions.get(name)
    }

    /// Size of a dimension.
    pub fn dimension_size(&self, name: &str) -> Option<DimensionSize> {
        self.state.dimensions.size_of(name)
    }

    /// All variables.
    pub fn variables(&self) -> &VariableCatalog {
        &self.state.variables
    }

    /// Look up a variable.
    pub fn variable(&self, name: &str) -> Option<&VariableDescriptor> {
        self.state.variables.get(name)
    }

    /// Declared grid dimension names, in declaration order.
    pub fn grid_dimension_names(&self) -> &[String] {
        &self.grid_dims
    }

    /// Check if two indices share the same time axis.
    pub fn is_compatible<B: Accessor>(&self, other: &DatasetIndex<B>) -> bool {
        self.state.time_axis.times() == other.state.time_axis.times()
    }

    /// Create an empty output index in `dir` sharing this index's time axis.
    ///
    /// The directory is created if it does not exist.
    pub fn duplicate_for_writing(&self, dir: impl AsRef<Path>) -> Result<Self>
    where
        A: Clone,
    {
        let dir = dir.as_ref();
        self.accessor.create_directory(dir)?;

        let mut duplicate = Self::with_accessor(self.accessor.clone(), self.config.clone());
        duplicate.base_dir = dir_string(dir);
        duplicate.state.time_axis = self.state.time_axis.clone();
        duplicate.state.time_units = self.state.time_units.clone();
        Ok(duplicate)
    }

    fn file_index(&self, filename: &str) -> Result<usize> {
        self.filenames
            .iter()
            .position(|f| f == filename)
            .ok_or_else(|| CurateError::UnknownFile {
                name: filename.to_string(),
            })
    }

    fn require_unlocked(&self, operation: &str) -> Result<()> {
        if self.locked {
            return Err(CurateError::State(format!(
                "cannot {} a locked file_list",
                operation
            )));
        }
        Ok(())
    }
}

/// Render a directory as a base directory string ending in `/`.
fn dir_string(dir: &Path) -> String {
    let mut dir = dir.to_string_lossy().to_string();
    if dir.is_empty() {
        dir.push_str("./");
    } else if !dir.ends_with('/') {
        dir.push('/');
    }
    dir
}

fn join_path(base_dir: &str, filename: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", base_dir, filename))
}
