//! Autocurator - index a dataset scattered over many netCDF files.
//!
//! Autocurator visits every member file once, reconciles their metadata into
//! a single schema and builds a deduplicated, chronologically sorted time
//! axis. Every `(variable, time, auxiliary index)` tuple then resolves to the
//! physical file and record slot holding it, for reading as well as for
//! writing new output files.
//!
//! # Features
//!
//! - File discovery from a directory glob
//! - Attribute, type and units reconciliation with precise error reports
//! - Time axis sorting with index remapping
//! - Read and write resolution over any [`accessor::Accessor`]
//! - Output file allocation from filename templates
//! - Static time partitioning across workers
//! - CSV and XML reports
//!
//! # Example
//!
//! ```ignore
//! use autocurator::{DatasetIndex, IndexConfig};
//!
//! let mut index = DatasetIndex::new(IndexConfig::default().with_grid_dims(["lat", "lon"]));
//! index.populate("data/tas_*.nc")?;
//!
//! let mut slice = vec![0.0f32; 180 * 360];
//! index.load_data("tas", &[0], &mut slice)?;
//! println!("{} times, first {}", index.time_count(), index.time(0).unwrap());
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]
#![deny(unsafe_code)]

pub mod accessor;
pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
pub mod report;
pub mod time;

pub use config::IndexConfig;
pub use error::{CurateError, Result};
pub use index::{DatasetIndex, WorkerPartition};
