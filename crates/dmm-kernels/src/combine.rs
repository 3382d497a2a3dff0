//! Reduce-by-key combiner for partial output tiles
//!
//! A [`Partial`] is an output tile plus the number of `(A, B)` products folded
//! into it. Merging adds buffers elementwise and adds counts, so it is
//! associative and commutative: partials can be merged incrementally, pairwise
//! or in one fold, on any worker, in any order. After the final reduce every
//! destination must carry exactly `nbK` contributions.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use dmm_core::{DmmError, DmmResult, Element, MatrixId, OutputKey, Tile};

/// Partial (or finished) output tile with its contribution count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Element")]
pub struct Partial<T> {
    tile: Tile<T>,
    contributions: usize,
}

impl<T: Element> Partial<T> {
    /// Wrap the product of a single `(A, B)` pair
    pub fn from_product(tile: Tile<T>) -> DmmResult<Self> {
        Self::with_contributions(tile, 1)
    }

    /// Wrap an output tile that already folds `contributions` products
    pub fn with_contributions(tile: Tile<T>, contributions: usize) -> DmmResult<Self> {
        if tile.matrix() != MatrixId::C {
            return Err(DmmError::execution(
                "combine",
                format!("partials must be output tiles, got {}{}", tile.matrix(), tile.coord()),
            ));
        }
        Ok(Self {
            tile,
            contributions,
        })
    }

    /// Destination `(i, j)`
    pub fn key(&self) -> OutputKey {
        self.tile.coord()
    }

    pub fn contributions(&self) -> usize {
        self.contributions
    }

    pub fn tile(&self) -> &Tile<T> {
        &self.tile
    }

    pub fn into_tile(self) -> Tile<T> {
        self.tile
    }

    /// Elementwise sum of two partials for the same destination
    pub fn merge(mut self, other: Partial<T>) -> DmmResult<Self> {
        self.merge_in_place(&other)?;
        Ok(self)
    }

    fn merge_in_place(&mut self, other: &Partial<T>) -> DmmResult<()> {
        if self.key() != other.key() || self.tile.size() != other.tile.size() {
            return Err(DmmError::execution(
                "combine",
                format!(
                    "cannot merge partial {} (size {}) into {} (size {})",
                    other.key(),
                    other.tile.size(),
                    self.key(),
                    self.tile.size()
                ),
            ));
        }
        for (x, &y) in self.tile.as_mut_slice().iter_mut().zip(other.tile.as_slice()) {
            *x += y;
        }
        self.contributions += other.contributions;
        Ok(())
    }
}

/// Fold every partial for `key` into one tile
///
/// # Errors
///
/// An empty sequence is an execution error: every valid destination has at
/// least one contribution. A partial for another key is rejected as well.
pub fn combine<T, I>(key: OutputKey, partials: I) -> DmmResult<Partial<T>>
where
    T: Element,
    I: IntoIterator<Item = Partial<T>>,
{
    let mut iter = partials.into_iter();
    let first = iter.next().ok_or_else(|| {
        DmmError::execution("combine", format!("no partials for destination {}", key))
    })?;
    if first.key() != key {
        return Err(DmmError::execution(
            "combine",
            format!("partial for {} passed to combine({})", first.key(), key),
        ));
    }
    iter.try_fold(first, Partial::merge)
}

/// Incremental reduce-by-key over partials
#[derive(Debug)]
pub struct Combiner<T> {
    slots: HashMap<OutputKey, Partial<T>>,
}

impl<T: Element> Default for Combiner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Combiner<T> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Fold `partial` into the slot for its key
    pub fn insert(&mut self, partial: Partial<T>) -> DmmResult<()> {
        match self.slots.entry(partial.key()) {
            Entry::Occupied(mut slot) => slot.get_mut().merge_in_place(&partial),
            Entry::Vacant(slot) => {
                slot.insert(partial);
                Ok(())
            }
        }
    }

    /// Number of distinct destinations seen
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drain the combined partials, sorted by key
    pub fn into_partials(self) -> Vec<Partial<T>> {
        let mut out: Vec<_> = self.slots.into_values().collect();
        out.sort_by_key(|p| p.key());
        out
    }
}
