//! End-to-end runs over real netCDF files in a temporary directory.

mod common;

use std::fs;
use std::path::Path;

use autocurator::accessor::{Accessor, ArrayReader, NetcdfAccessor};
use autocurator::report::{write_report, ReportFormat};
use autocurator::{DatasetIndex, IndexConfig, WorkerPartition};
use common::{tas_slice, write_shard, GRID_LEN, UNITS};
use tempfile::TempDir;

fn config() -> IndexConfig {
    IndexConfig::default().with_grid_dims(["lat", "lon"])
}

fn populated(dir: &Path) -> DatasetIndex {
    let mut index = DatasetIndex::new(config());
    index
        .populate(&format!("{}/*.nc", dir.display()))
        .unwrap();
    index
}

fn shards() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_shard(&dir.path().join("tas_b.nc"), &[2.0, 3.0]);
    write_shard(&dir.path().join("tas_a.nc"), &[0.0, 1.0]);
    fs::write(dir.path().join("notes.txt"), "not a shard").unwrap();
    dir
}

#[test]
fn test_index_real_files() {
    let dir = shards();
    let index = populated(dir.path());

    assert_eq!(index.filenames().len(), 2);
    assert_eq!(index.time_count(), 4);
    assert_eq!(index.time_units().unwrap().as_str(), UNITS);

    let mut slice = vec![0.0f32; GRID_LEN];
    for t in 0..4 {
        index.load_data("tas", &[t], &mut slice).unwrap();
        assert_eq!(slice, tas_slice(t as f64));
    }
    index.load_data("area", &[], &mut slice).unwrap();
    assert_eq!(slice, vec![2.0; GRID_LEN]);
}

#[test]
fn test_reports_on_disk() {
    let dir = shards();
    let index = populated(dir.path());
    let partition = WorkerPartition::single();

    let csv = dir.path().join("index.csv");
    write_report(&index, ReportFormat::from_path(&csv), &csv, &partition).unwrap();
    let text = fs::read_to_string(&csv).unwrap();
    assert!(text.starts_with("time,"));
    assert!(text.contains("file_ix,filename"));
    assert!(text.contains("tas_a.nc\n"));
    let rows = text.lines().take_while(|line| !line.is_empty()).count();
    assert_eq!(rows, 2 + 4);

    let xml = dir.path().join("index.xml");
    write_report(&index, ReportFormat::from_path(&xml), &xml, &partition).unwrap();
    let text = fs::read_to_string(&xml).unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(text.contains("id=\"tas\""));
    assert!(text.contains("id=\"lat\""));

    // Non-coordinator ranks leave the filesystem alone.
    let skipped = dir.path().join("skipped.xml");
    let worker = WorkerPartition::new(1, 2).unwrap();
    write_report(&index, ReportFormat::Xml, &skipped, &worker).unwrap();
    assert!(!skipped.exists());
}

#[test]
fn test_output_files_reindex() {
    let dir = shards();
    let source = populated(dir.path());
    let out_dir = dir.path().join("out");

    let mut out = source.duplicate_for_writing(&out_dir).unwrap();
    let grid = source.grid_shape().unwrap();
    let files = out.create_files_from_template("tas_%T.nc", &grid, 3).unwrap();
    assert_eq!(files, vec!["tas_2000-01-01-00000.nc", "tas_2000-01-04-00000.nc"]);
    out.add_variable_from_template(&source, "tas").unwrap();

    let mut slice = vec![0.0f32; GRID_LEN];
    for t in 0..source.time_count() {
        source.load_data("tas", &[t], &mut slice).unwrap();
        let shifted: Vec<f32> = slice.iter().map(|v| v - 273.15).collect();
        out.write_data("tas", &[t], &shifted).unwrap();
    }

    let header = NetcdfAccessor
        .open(&out_dir.join(&files[1]))
        .unwrap()
        .variable("time")
        .unwrap()
        .unwrap();
    assert_eq!(header.attribute("calendar"), Some("noleap"));

    let reread = populated(&out_dir);
    assert!(reread.is_compatible(&source));
    for t in 0..reread.time_count() {
        reread.load_data("tas", &[t], &mut slice).unwrap();
        let expected: Vec<f32> = tas_slice(t as f64).iter().map(|v| v - 273.15).collect();
        assert_eq!(slice, expected);
    }
}
