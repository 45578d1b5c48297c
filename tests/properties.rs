//! Property tests for time ordering, partitioning and discovery order.

mod common;

use std::collections::BTreeSet;

use autocurator::index::block_range;
use autocurator::time::{Calendar, Time, TimeAxis, TimeUnits};
use common::{accessor, populated, shard, tas_slice, GRID_LEN};
use proptest::prelude::*;

fn calendar() -> impl Strategy<Value = Calendar> {
    prop_oneof![
        Just(Calendar::Standard),
        Just(Calendar::NoLeap),
        Just(Calendar::AllLeap),
        Just(Calendar::Day360),
    ]
}

proptest! {
    #[test]
    fn test_finalized_axis_is_sorted_and_dense(
        hours in prop::collection::vec(0i64..100_000, 0..64),
        calendar in calendar(),
    ) {
        let units = TimeUnits::parse("hours since 1950-01-01", calendar)?;
        let times = hours
            .iter()
            .map(|&h| Time::from_offset(&units, h as f64))
            .collect::<Result<Vec<Time>, _>>()?;

        let mut axis = TimeAxis::new();
        let assigned: Vec<usize> = times.iter().map(|&t| axis.insert(t)).collect();
        let before = axis.clone();
        let permutation = axis.finalize();

        let distinct: BTreeSet<i64> = hours.iter().copied().collect();
        prop_assert_eq!(axis.len(), distinct.len());
        prop_assert!(axis.times().windows(2).all(|w| w[0] < w[1]));
        prop_assert!(axis.is_sorted());

        // Every time is reachable through its remapped index.
        for (time, &old) in times.iter().zip(&assigned) {
            let new = match &permutation {
                Some(permutation) => permutation[old],
                None => old,
            };
            prop_assert_eq!(axis.get(new), Some(time));
            prop_assert_eq!(axis.index_of(time), Some(new));
        }
        if permutation.is_none() {
            prop_assert_eq!(axis, before);
        }
    }

    #[test]
    fn test_offsets_survive_calendar_arithmetic(
        minutes in -5_000_000i64..5_000_000,
        calendar in calendar(),
    ) {
        let units = TimeUnits::parse("minutes since 1979-03-01 06:00:00", calendar)?;
        let time = Time::from_offset(&units, minutes as f64)?;
        prop_assert_eq!(time.to_offset(&units), minutes as f64);
        prop_assert_eq!(time.calendar(), calendar);
    }

    #[test]
    fn test_blocks_tile_the_range(count in 0usize..500, world in 1usize..17) {
        let block = (count + world - 1) / world;
        let mut next = 0;
        for rank in 0..world {
            let range = block_range(count, rank, world);
            prop_assert_eq!(range.start, next);
            prop_assert!(range.len() <= block);
            next = range.end;
        }
        prop_assert_eq!(next, count);
    }

    #[test]
    fn test_discovery_order_is_irrelevant(
        (days, cut) in (1usize..12).prop_flat_map(|n| {
            (Just((0..n).collect::<Vec<_>>()).prop_shuffle(), 0..=n)
        }),
        reverse in any::<bool>(),
    ) {
        let (head, tail) = days.split_at(cut);
        let head: Vec<f64> = head.iter().map(|&d| d as f64).collect();
        let tail: Vec<f64> = tail.iter().map(|&d| d as f64).collect();

        let mut files = Vec::new();
        if !head.is_empty() {
            files.push(("a.nc", shard(&head)));
        }
        if !tail.is_empty() {
            files.push(("b.nc", shard(&tail)));
        }
        if reverse {
            files.reverse();
        }

        let index = populated(accessor(files));
        prop_assert_eq!(index.time_count(), days.len());

        let units = index.time_units().cloned().ok_or_else(|| {
            TestCaseError::fail("populated index has no time units")
        })?;
        let mut slice = vec![0.0f32; GRID_LEN];
        for t in 0..index.time_count() {
            let offset = index.time(t).map(|time| time.to_offset(&units));
            prop_assert_eq!(offset, Some(t as f64));
            index.load_data("tas", &[t], &mut slice)?;
            prop_assert_eq!(&slice, &tas_slice(t as f64));
        }
    }
}
