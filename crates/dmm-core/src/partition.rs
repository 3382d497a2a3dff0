//! Deterministic partitioning of tile and row index spaces
//!
//! Work items (tiles of an operand, rows of A) are numbered `0..total` and
//! split into `P` contiguous ranges. Partition `p` owns
//! `[total*p/P, total*(p+1)/P)`, which is balanced to within one item, covers
//! every index exactly once, and depends on nothing but `(total, P)`.
//!
//! Shuffle targets are chosen separately by [`route`], a modulo rule over the
//! record key, so every record with the same key lands on the same worker.
//!
//! # Example
//!
//! ```
//! use dmm_core::partition::RangePartitioner;
//!
//! let parts = RangePartitioner::new(10, 3).unwrap();
//! assert_eq!(parts.range(0), 0..3);
//! assert_eq!(parts.range(2), 6..10);
//! assert_eq!(parts.assign(7), 2);
//! ```

use std::ops::Range;

use crate::error::{DmmError, DmmResult};

/// Contiguous range split of `total` items over `partitions` workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePartitioner {
    total: usize,
    partitions: usize,
}

impl RangePartitioner {
    /// Create a partitioner
    ///
    /// # Errors
    ///
    /// Returns a validation error if `partitions` is zero.
    pub fn new(total: usize, partitions: usize) -> DmmResult<Self> {
        if partitions == 0 {
            return Err(DmmError::validation("partition count must be at least 1"));
        }
        Ok(Self { total, partitions })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Index range owned by partition `p`
    pub fn range(&self, p: usize) -> Range<usize> {
        assert!(p < self.partitions, "partition {} out of {}", p, self.partitions);
        self.boundary(p)..self.boundary(p + 1)
    }

    /// Partition that owns `index`
    pub fn assign(&self, index: usize) -> usize {
        assert!(index < self.total, "index {} out of {}", index, self.total);
        // Smallest p with total*(p+1)/P > index, i.e. p = ceil((index+1)*P / total) - 1
        let num = (index as u128 + 1) * self.partitions as u128;
        let p = num.div_ceil(self.total as u128) - 1;
        p as usize
    }

    /// Largest number of items any partition owns
    pub fn max_range_len(&self) -> usize {
        (0..self.partitions)
            .map(|p| self.range(p).len())
            .max()
            .unwrap_or(0)
    }

    /// Iterate `(partition, range)` pairs in partition order
    pub fn iter(&self) -> impl Iterator<Item = (usize, Range<usize>)> + '_ {
        (0..self.partitions).map(move |p| (p, self.range(p)))
    }

    fn boundary(&self, p: usize) -> usize {
        ((self.total as u128 * p as u128) / self.partitions as u128) as usize
    }
}

/// Partition id owning `index` when `total_tiles` items are split over `partition_count`
///
/// # Panics
///
/// Panics if `partition_count` is zero or `index >= total_tiles`.
pub fn assign(total_tiles: usize, partition_count: usize, index: usize) -> usize {
    assert!(partition_count > 0, "partition count must be at least 1");
    RangePartitioner {
        total: total_tiles,
        partitions: partition_count,
    }
    .assign(index)
}

/// Shuffle target for a record key (modulo rule)
#[inline]
pub fn route(key: usize, partitions: usize) -> usize {
    key % partitions
}
