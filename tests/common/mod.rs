//! Shared fixtures for the integration tests.
//!
//! A shard is a small file over a 2x3 lat/lon grid holding a time-varying
//! `tas` and a time-invariant `area`. `tas` at raw time `t` and grid point
//! `i` holds `100 * t + i`, which makes every slice recognisable.

#![allow(dead_code)]

use std::path::Path;

use autocurator::accessor::{
    Accessor, ArrayWriter, ElementType, MemoryAccessor, MemoryFile, NetcdfAccessor,
};
use autocurator::{DatasetIndex, IndexConfig};

pub const DATA_DIR: &str = "/data";
pub const UNITS: &str = "days since 2000-01-01";
pub const GRID_LEN: usize = 6;

/// Expected `tas` slice at raw time `t`.
pub fn tas_slice(t: f64) -> Vec<f32> {
    (0..GRID_LEN).map(|i| (100.0 * t + i as f64) as f32).collect()
}

/// A grid-only file with the given record times.
pub fn shard(times: &[f64]) -> MemoryFile {
    let tas: Vec<f64> = times
        .iter()
        .flat_map(|&t| tas_slice(t).into_iter().map(f64::from))
        .collect();

    MemoryFile::new()
        .with_attribute("Conventions", "CF-1.6")
        .with_unlimited_dimension("time", times.len())
        .with_dimension("lat", 2)
        .with_dimension("lon", 3)
        .with_variable("time", ElementType::Double, &["time"], times.to_vec())
        .with_variable_attribute("time", "units", UNITS)
        .with_variable("lat", ElementType::Double, &["lat"], vec![-45.0, 45.0])
        .with_variable_attribute("lat", "units", "degrees_north")
        .with_variable("lon", ElementType::Float, &["lon"], vec![0.0, 120.0, 240.0])
        .with_variable_attribute("lon", "units", "degrees_east")
        .with_variable("tas", ElementType::Float, &["time", "lat", "lon"], tas)
        .with_variable_attribute("tas", "units", "K")
        .with_variable_attribute("tas", "long_name", "near-surface air temperature")
        .with_variable("area", ElementType::Double, &["lat", "lon"], vec![1.0; GRID_LEN])
        .with_variable_attribute("area", "units", "m2")
}

/// An accessor holding the named files under [`DATA_DIR`], in the given order.
pub fn accessor(files: Vec<(&str, MemoryFile)>) -> MemoryAccessor {
    let accessor = MemoryAccessor::new();
    for (name, file) in files {
        accessor.insert(format!("{}/{}", DATA_DIR, name), file);
    }
    accessor
}

/// Configuration declaring the lat/lon grid.
pub fn config() -> IndexConfig {
    IndexConfig::default().with_grid_dims(["lat", "lon"])
}

/// An index populated from every `.nc` file of the accessor.
pub fn populated(accessor: MemoryAccessor) -> DatasetIndex<MemoryAccessor> {
    let mut index = DatasetIndex::with_accessor(accessor, config());
    index
        .populate(&format!("{}/*.nc", DATA_DIR))
        .expect("populate");
    index
}

/// Write a netCDF shard like [`shard`], on a `noleap` calendar, without a
/// `lon` coordinate and with `area` set to 2.
pub fn write_shard(path: &Path, times: &[f64]) {
    let mut file = NetcdfAccessor.create(path).unwrap();
    file.add_dimension("time", None).unwrap();
    file.add_dimension("lat", Some(2)).unwrap();
    file.add_dimension("lon", Some(3)).unwrap();

    file.add_variable("time", ElementType::Double, &["time"]).unwrap();
    file.put_attribute("time", "units", UNITS).unwrap();
    file.put_attribute("time", "calendar", "noleap").unwrap();
    file.write_f64("time", &[0], &[times.len()], times).unwrap();

    file.add_variable("lat", ElementType::Double, &["lat"]).unwrap();
    file.put_attribute("lat", "units", "degrees_north").unwrap();
    file.write_f64("lat", &[0], &[2], &[-45.0, 45.0]).unwrap();

    file.add_variable("tas", ElementType::Float, &["time", "lat", "lon"])
        .unwrap();
    file.put_attribute("tas", "units", "K").unwrap();
    let tas: Vec<f32> = times.iter().flat_map(|&t| tas_slice(t)).collect();
    file.write_f32("tas", &[0, 0, 0], &[times.len(), 2, 3], &tas)
        .unwrap();

    file.add_variable("area", ElementType::Double, &["lat", "lon"])
        .unwrap();
    file.write_f64("area", &[0, 0], &[2, 3], &[2.0; GRID_LEN])
        .unwrap();
}
