//! Error types for autocurator.
//!
//! Every fallible operation on the dataset index returns [`CurateError`].
//! Indexing errors are terminal for the call that raised them; the index
//! keeps whatever earlier files were fully merged.

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::Mismatch;

/// Result type alias for autocurator operations.
pub type Result<T> = std::result::Result<T, CurateError>;

/// Errors that can occur while indexing, resolving or exporting a dataset.
#[derive(Debug, Error)]
pub enum CurateError {
    /// The index was used out of order (re-populated, appended while locked, ...).
    #[error("Invalid state: {0}")]
    State(String),

    /// The directory of a search pattern could not be listed.
    #[error("Unable to open directory \"{}\"", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A member file could not be opened through the accessor.
    #[error("Unable to open data file \"{}\": {reason}", path.display())]
    FileOpen { path: PathBuf, reason: String },

    /// Metadata of a file disagrees with what earlier files established.
    #[error("NetCDF file \"{}\": {object} has {mismatch} across files", path.display())]
    Consistency {
        path: PathBuf,
        object: String,
        mismatch: Mismatch,
    },

    /// The same time of one variable is stored in two places.
    #[error(
        "Variable \"{variable}\" has repeated time across files:\nTime: {time}\nFile1: {first}\nFile2: {second}"
    )]
    DuplicateTime {
        variable: String,
        time: String,
        first: String,
        second: String,
    },

    /// Dimension or variable shape conflict.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Vertical coordinate values are not strictly monotonic.
    #[error("Vertical levels of \"{dimension}\" must be strictly monotonic")]
    NonMonotonic { dimension: String },

    /// Variable not present in the index.
    #[error("Variable \"{name}\" not found in file_list index")]
    UnknownVariable { name: String },

    /// Dimension not present in the index.
    #[error("Dimension \"{name}\" not found in file_list index")]
    UnknownDimension { name: String },

    /// Filename not present in the index.
    #[error("File \"{name}\" not found in file_list")]
    UnknownFile { name: String },

    /// A logical address could not be mapped to a physical location.
    #[error("Unable to resolve variable \"{variable}\": {detail}")]
    Resolution { variable: String, detail: String },

    /// Caller buffer does not match the grid shape.
    #[error("Data size mismatch ({actual}/{expected})")]
    Size { expected: usize, actual: usize },

    /// Stored element type cannot be converted for the caller.
    #[error("Variable \"{variable}\" is of type {found}, expected float or double")]
    Type { variable: String, found: String },

    /// Write requested for a time index that no output file covers.
    #[error("Unable to determine output file for time index {time_index}")]
    Allocation { time_index: usize },

    /// Write requested for a time-invariant variable without a reduce target.
    #[error("No reduce target set for time-invariant variable \"{variable}\"")]
    NoReduceTarget { variable: String },

    /// Partition or chunking parameter out of range.
    #[error("Out of range: {0}")]
    Range(String),

    /// Malformed output filename template.
    #[error("Invalid filename template \"{template}\": {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// Unrecognised calendar attribute.
    #[error("Unknown calendar \"{0}\"")]
    UnknownCalendar(String),

    /// Time units that do not follow `<unit> since <date>`.
    #[error("Invalid time units \"{0}\"")]
    InvalidTimeUnits(String),

    /// A raw time value that cannot be placed on the calendar.
    #[error("Time value {value} cannot be represented under \"{units}\"")]
    TimeOutOfRange { value: f64, units: String },

    /// An error attributed to one member file.
    #[error("{source} in \"{}\"", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<CurateError>,
    },

    /// A report could not be serialized.
    #[error("Unable to render report: {0}")]
    Report(String),

    /// Failure reported by the array-file accessor.
    #[error("NetCDF error: {0}")]
    NetCDF(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CurateError {
    /// Create a FileOpen error.
    pub fn file_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::FileOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a Consistency error.
    pub fn consistency(
        path: impl Into<PathBuf>,
        object: impl Into<String>,
        mismatch: Mismatch,
    ) -> Self {
        Self::Consistency {
            path: path.into(),
            object: object.into(),
            mismatch,
        }
    }

    /// Create a Schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Create a Resolution error.
    pub fn resolution(variable: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Resolution {
            variable: variable.into(),
            detail: detail.into(),
        }
    }

    /// Attribute this error to a member file.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Self::InFile {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Create an UnknownVariable error.
    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Self::UnknownVariable { name: name.into() }
    }
}

impl From<netcdf::Error> for CurateError {
    fn from(err: netcdf::Error) -> Self {
        Self::NetCDF(err.to_string())
    }
}

impl From<csv::Error> for CurateError {
    fn from(err: csv::Error) -> Self {
        Self::Report(err.to_string())
    }
}
