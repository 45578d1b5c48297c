//! Command-line behaviour of the `autocurator` binary.

mod common;

use std::fs;

use assert_cmd::Command;
use common::write_shard;
use predicates::prelude::*;
use tempfile::TempDir;

fn dataset() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_shard(&dir.path().join("tas_0.nc"), &[0.0, 1.0]);
    write_shard(&dir.path().join("tas_1.nc"), &[2.0]);
    dir
}

fn autocurator() -> Command {
    Command::cargo_bin("autocurator").unwrap()
}

#[test]
fn test_writes_xml_by_default() {
    let dir = dataset();
    let out = dir.path().join("dataset.xml");

    autocurator()
        .arg("--files")
        .arg(dir.path().join("tas_*.nc"))
        .arg("--out")
        .arg(&out)
        .arg("--grid-dims")
        .arg("lat,lon")
        .assert()
        .success();

    let xml = fs::read_to_string(&out).unwrap();
    assert!(xml.contains("<dataset"));
    assert!(xml.contains("id=\"tas\""));
}

#[test]
fn test_csv_from_extension() {
    let dir = dataset();
    let out = dir.path().join("index.csv");

    autocurator()
        .arg("--files")
        .arg(dir.path().join("*.nc"))
        .arg("--out")
        .arg(&out)
        .arg("--grid-dims=lat,lon")
        .assert()
        .success();

    let csv = fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("time,"));
    assert!(csv.contains("file_ix,filename"));
}

#[test]
fn test_format_flag_overrides_extension() {
    let dir = dataset();
    let out = dir.path().join("report.txt");

    autocurator()
        .arg("--files")
        .arg(dir.path().join("*.nc"))
        .arg("--out")
        .arg(&out)
        .args(["--grid-dims", "lat,lon", "--format", "csv"])
        .assert()
        .success();

    assert!(fs::read_to_string(&out).unwrap().starts_with("time,"));
}

#[test]
fn test_log_file() {
    let dir = dataset();
    let log = dir.path().join("run.log");

    autocurator()
        .arg("--files")
        .arg(dir.path().join("*.nc"))
        .arg("--out")
        .arg(dir.path().join("dataset.xml"))
        .args(["--grid-dims", "lat,lon"])
        .arg("--log")
        .arg(&log)
        .assert()
        .success();

    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("Starting autocurator"));
    assert!(text.contains("Indexed 2 files, 3 times"));
}

#[test]
fn test_missing_directory_fails() {
    let dir = TempDir::new().unwrap();

    autocurator()
        .arg("--files")
        .arg(dir.path().join("missing/*.nc"))
        .arg("--out")
        .arg(dir.path().join("dataset.xml"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error: Unable to index"));
}

#[test]
fn test_requires_arguments() {
    autocurator()
        .assert()
        .failure()
        .stderr(predicate::str::contains("--files"));
}
