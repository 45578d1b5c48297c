//! Deduplicated, chronologically ordered time registry.

use std::collections::BTreeMap;

use super::Time;

/// The dataset-wide time axis.
///
/// Times receive a global index on first insertion. After [`TimeAxis::finalize`]
/// the indices are dense and follow chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeAxis {
    times: Vec<Time>,
    lookup: BTreeMap<Time, usize>,
}

impl TimeAxis {
    /// Create an empty axis.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an already sorted axis from a list of times.
    pub fn from_times(times: impl IntoIterator<Item = Time>) -> Self {
        let mut axis = Self::new();
        for time in times {
            axis.insert(time);
        }
        axis.finalize();
        axis
    }

    /// Return the global index of a time, inserting it if unseen.
    pub fn insert(&mut self, time: Time) -> usize {
        if let Some(&ix) = self.lookup.get(&time) {
            return ix;
        }
        let ix = self.times.len();
        self.times.push(time);
        self.lookup.insert(time, ix);
        ix
    }

    /// Drop every time inserted after the first `len`.
    ///
    /// Only meaningful before [`TimeAxis::finalize`] reorders the indices.
    pub(crate) fn truncate(&mut self, len: usize) {
        let len = len.min(self.times.len());
        for time in self.times.drain(len..) {
            self.lookup.remove(&time);
        }
    }

    /// Global index of a time, if present.
    pub fn index_of(&self, time: &Time) -> Option<usize> {
        self.lookup.get(time).copied()
    }

    /// Time at a global index.
    pub fn get(&self, ix: usize) -> Option<&Time> {
        self.times.get(ix)
    }

    /// Number of distinct times.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Check if the axis holds no times.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// All times in index order.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Check whether index order already equals chronological order.
    pub fn is_sorted(&self) -> bool {
        self.lookup.values().enumerate().all(|(rank, &ix)| rank == ix)
    }

    /// Sort the axis chronologically.
    ///
    /// Returns `None` when no index moved, otherwise the permutation
    /// `old index -> new index` that dependents must apply.
    pub fn finalize(&mut self) -> Option<Vec<usize>> {
        assert_eq!(
            self.times.len(),
            self.lookup.len(),
            "time vector / lookup mismatch"
        );

        if self.is_sorted() {
            return None;
        }

        let mut permutation = vec![0; self.times.len()];
        for (rank, (time, ix)) in self.lookup.iter_mut().enumerate() {
            permutation[*ix] = rank;
            self.times[rank] = *time;
            *ix = rank;
        }

        Some(permutation)
    }
}
