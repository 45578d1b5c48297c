//! Static partition of the time axis across cooperating workers.

use std::ops::Range;

use super::DatasetIndex;
use crate::accessor::Accessor;
use crate::error::{CurateError, Result};

/// Largest accepted time stride.
pub const MAX_TIME_STRIDE: usize = 1000;

/// Identity of one worker among `world_size` cooperating workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPartition {
    rank: usize,
    world_size: usize,
}

impl WorkerPartition {
    /// Create a partition member; `rank` must be below `world_size`.
    pub fn new(rank: usize, world_size: usize) -> Result<Self> {
        if world_size == 0 || rank >= world_size {
            return Err(CurateError::Range(format!(
                "rank {} outside world of size {}",
                rank, world_size
            )));
        }
        Ok(Self { rank, world_size })
    }

    /// The only worker of a serial run.
    pub fn single() -> Self {
        Self {
            rank: 0,
            world_size: 1,
        }
    }

    /// This worker's rank.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of workers.
    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// Rank 0 performs the work that must happen exactly once.
    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }
}

impl Default for WorkerPartition {
    fn default() -> Self {
        Self::single()
    }
}

/// Block of `0..count` owned by `rank`.
///
/// Blocks are `ceil(count / world_size)` long; trailing ranks may get a
/// shorter or empty block.
pub fn block_range(count: usize, rank: usize, world_size: usize) -> Range<usize> {
    assert!(rank < world_size, "rank {} outside world of size {}", rank, world_size);
    let block = (count + world_size - 1) / world_size;
    let begin = (block * rank).min(count);
    let end = (block * (rank + 1)).min(count);
    begin..end
}

impl<A: Accessor> DatasetIndex<A> {
    /// Global time indices this worker should process.
    ///
    /// The axis is first decimated by `stride` (keeping indices 0, stride,
    /// 2*stride, ...) and the decimated sequence is split into contiguous
    /// blocks, one per rank.
    pub fn on_rank_time_indices(
        &self,
        stride: usize,
        partition: &WorkerPartition,
    ) -> Result<Vec<usize>> {
        if stride == 0 || stride > MAX_TIME_STRIDE {
            return Err(CurateError::Range(format!(
                "timestride {} out of range [1, {}]",
                stride, MAX_TIME_STRIDE
            )));
        }

        let decimated = (self.time_count() + stride - 1) / stride;
        Ok(block_range(decimated, partition.rank(), partition.world_size())
            .map(|i| i * stride)
            .collect())
    }
}
