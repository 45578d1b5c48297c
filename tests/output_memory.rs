//! Output allocation and write resolution over the in-memory accessor.

mod common;

use std::path::Path;

use autocurator::accessor::{Accessor, ArrayReader, ElementType};
use autocurator::catalog::FileTimeLocation;
use autocurator::index::{GridDimension, GridShape};
use autocurator::{CurateError, DatasetIndex, WorkerPartition};
use common::{accessor, populated, shard, tas_slice, GRID_LEN};

fn source() -> DatasetIndex<autocurator::accessor::MemoryAccessor> {
    populated(accessor(vec![
        ("f1.nc", shard(&[0.0, 1.0, 2.0])),
        ("f2.nc", shard(&[3.0, 4.0])),
    ]))
}

#[test]
fn test_template_allocates_chunks() {
    let source = source();
    let mut out = source.duplicate_for_writing("/out").unwrap();
    assert!(out.is_compatible(&source));

    let grid = source.grid_shape().unwrap();
    let files = out.create_files_from_template("tas_%T.nc", &grid, 2).unwrap();

    assert_eq!(files.len(), 3);
    assert_eq!(out.filenames().len(), 3);
    assert_eq!(out.output_location(4), Some(FileTimeLocation::new(2, 0)));
    assert_eq!(out.output_location(1), Some(FileTimeLocation::new(0, 1)));

    let last = out
        .accessor()
        .open(&out.file_path(2).unwrap())
        .unwrap();
    assert_eq!(last.dimension("time").unwrap().len, 1);
    let time = last.variable("time").unwrap().unwrap();
    assert_eq!(time.attribute("units"), Some(common::UNITS));
    assert_eq!(time.attribute("calendar"), Some("standard"));
}

#[test]
fn test_failed_chunk_unregisters_earlier_chunks() {
    let source = source();
    let mut out = source.duplicate_for_writing("/out").unwrap();
    let grid = source.grid_shape().unwrap();

    // The second chunk would start at 2000-01-03 and its name is taken.
    let taken = out.create_file_no_time("tas_2000-01-03-00000.nc", &grid).unwrap();
    assert_eq!(taken, 0);

    let err = out.create_files_from_template("tas_%T.nc", &grid, 2).unwrap_err();
    assert!(matches!(err, CurateError::State(_)), "{err}");
    assert_eq!(out.filenames(), &["tas_2000-01-03-00000.nc"]);
    assert!(out.output_table().is_empty());
    assert_eq!(out.output_location(0), None);
}

#[test]
fn test_write_then_load_round_trip() {
    let source = source();
    let mut out = source.duplicate_for_writing("/out").unwrap();
    let grid = source.grid_shape().unwrap();
    out.create_files_from_template("tas_%T.nc", &grid, 2).unwrap();
    out.add_variable_from_template(&source, "tas").unwrap();

    let mut slice = vec![0.0f32; GRID_LEN];
    for t in 0..source.time_count() {
        source.load_data("tas", &[t], &mut slice).unwrap();
        let doubled: Vec<f32> = slice.iter().map(|v| v * 2.0).collect();
        out.write_data("tas", &[t], &doubled).unwrap();
    }

    for t in 0..out.time_count() {
        out.load_data("tas", &[t], &mut slice).unwrap();
        let expected: Vec<f32> = tas_slice(t as f64).iter().map(|v| v * 2.0).collect();
        assert_eq!(slice, expected);
    }

    // Data variables and coordinates were created on first write.
    let file = out.accessor().open(&out.file_path(0).unwrap()).unwrap();
    let tas = file.variable("tas").unwrap().unwrap();
    assert_eq!(tas.element_type, ElementType::Float);
    assert_eq!(tas.attribute("units"), Some("K"));
    assert_eq!(tas.shape(), vec![2, 2, 3]);
    assert_eq!(file.read_f64("lat", &[0], &[2]).unwrap(), vec![-45.0, 45.0]);
}

#[test]
fn test_write_size_mismatch() {
    let source = source();
    let mut out = source.duplicate_for_writing("/out").unwrap();
    out.create_files_from_template("tas_%T.nc", &source.grid_shape().unwrap(), 5)
        .unwrap();
    out.add_variable_from_template(&source, "tas").unwrap();

    assert!(matches!(
        out.write_data("tas", &[0], &[1.0; 5]),
        Err(CurateError::Size {
            expected: 6,
            actual: 5
        })
    ));
}

#[test]
fn test_write_without_allocation() {
    let source = source();
    let mut out = source.duplicate_for_writing("/out").unwrap();
    out.create_file_no_time("static.nc", &source.grid_shape().unwrap())
        .unwrap();
    out.add_variable_from_template(&source, "tas").unwrap();

    assert!(matches!(
        out.write_data("tas", &[0], &[0.0; GRID_LEN]),
        Err(CurateError::Allocation { time_index: 0 })
    ));
    assert!(matches!(
        out.write_data("unknown", &[0], &[0.0; GRID_LEN]),
        Err(CurateError::UnknownVariable { .. })
    ));
}

#[test]
fn test_reduce_target_receives_invariant_variables() {
    let source = source();
    let mut out = source.duplicate_for_writing("/out").unwrap();
    let grid = source.grid_shape().unwrap();
    out.create_file_no_time("static.nc", &grid).unwrap();
    out.add_variable_from_template(&source, "area").unwrap();

    let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    assert!(matches!(
        out.write_data("area", &[], &values),
        Err(CurateError::NoReduceTarget { .. })
    ));

    out.set_reduce_target("static.nc").unwrap();
    out.write_data("area", &[], &values).unwrap();

    let mut read = [0.0f32; GRID_LEN];
    out.load_data("area", &[], &mut read).unwrap();
    assert_eq!(read, values);

    let file = out
        .accessor()
        .open(Path::new("/out/static.nc"))
        .unwrap();
    assert_eq!(
        file.variable("area").unwrap().unwrap().element_type,
        ElementType::Double
    );
}

#[test]
fn test_custom_grid_shape() {
    let source = source();
    let mut out = source.duplicate_for_writing("/regrid").unwrap();
    let grid = GridShape::new()
        .with_dimension(GridDimension::with_values("lat", vec![-45.0, 45.0], "degrees_north"))
        .with_dimension(GridDimension::new("lon", 3));
    assert_eq!(grid.len(), GRID_LEN);

    out.create_file_no_time("grid.nc", &grid).unwrap();
    let conflicting = GridShape::new().with_dimension(GridDimension::new("lat", 4));
    assert!(matches!(
        out.create_file_no_time("other.nc", &conflicting),
        Err(CurateError::Schema(_))
    ));
    assert_eq!(out.filenames(), &["grid.nc"]);
}

#[test]
fn test_rank_partition_covers_axis() {
    let source = populated(accessor(vec![(
        "f1.nc",
        shard(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]),
    )]));

    let blocks: Vec<Vec<usize>> = (0..3)
        .map(|rank| {
            let partition = WorkerPartition::new(rank, 3).unwrap();
            source.on_rank_time_indices(1, &partition).unwrap()
        })
        .collect();

    assert_eq!(
        blocks.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![4, 4, 2]
    );
    let all: Vec<usize> = blocks.concat();
    assert_eq!(all, (0..10).collect::<Vec<_>>());
}
