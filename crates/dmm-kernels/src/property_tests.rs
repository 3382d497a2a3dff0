//! Property-based tests for the multiply and combine kernels
//!
//! These tests verify algebraic properties that should hold for all valid inputs

use super::*;
use dmm_core::{BlockGrid, Case, MatrixId, Tile, TileCoord, TileGenerator};
use proptest::prelude::*;

fn output_partial(key: TileCoord, size: usize, data: Vec<f64>) -> Partial<f64> {
    let tile = Tile::from_vec(MatrixId::C, key, size, data).unwrap();
    Partial::from_product(tile).unwrap()
}

/// Strategy producing between 1 and 8 partials for one 3x3 destination
fn partials_for_one_key() -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(-100i32..100, 9), 1..8)
        .prop_map(|v| v.into_iter().map(|t| t.into_iter().map(f64::from).collect()).collect())
}

proptest! {
    /// Merge order does not change the combined tile or its count
    ///
    /// Integer-valued entries keep the sums exact so any reordering compares equal.
    #[test]
    fn test_combine_order_independent(bufs in partials_for_one_key(), rotate in 0usize..8) {
        let key = TileCoord::new(1, 2);
        let forward: Vec<_> = bufs.iter().cloned().map(|b| output_partial(key, 3, b)).collect();
        let mut shuffled = forward.clone();
        let len = shuffled.len();
        shuffled.rotate_left(rotate % len);
        shuffled.reverse();

        let a = combine(key, forward).unwrap();
        let b = combine(key, shuffled).unwrap();
        prop_assert_eq!(a.tile().as_slice(), b.tile().as_slice());
        prop_assert_eq!(a.contributions(), len);
        prop_assert_eq!(b.contributions(), len);
    }

    /// Combining in two halves then merging equals one flat fold
    #[test]
    fn test_combine_associative(bufs in partials_for_one_key(), split in 0usize..8) {
        let key = TileCoord::new(0, 0);
        let all: Vec<_> = bufs.iter().cloned().map(|b| output_partial(key, 3, b)).collect();
        let split = 1 + split % all.len();

        let flat = combine(key, all.clone()).unwrap();
        if split < all.len() {
            let (left, right) = all.split_at(split);
            let l = combine(key, left.to_vec()).unwrap();
            let r = combine(key, right.to_vec()).unwrap();
            let nested = l.merge(r).unwrap();
            prop_assert_eq!(nested.tile().as_slice(), flat.tile().as_slice());
            prop_assert_eq!(nested.contributions(), flat.contributions());
        }
    }

    /// The incremental combiner agrees with per-key folds
    #[test]
    fn test_combiner_matches_combine(keys in prop::collection::vec((0usize..3, 0usize..3), 1..20)) {
        let mut combiner = Combiner::new();
        for (n, &(r, c)) in keys.iter().enumerate() {
            combiner.insert(output_partial(TileCoord::new(r, c), 2, vec![n as f64; 4])).unwrap();
        }
        for out in combiner.into_partials() {
            let expected: Vec<f64> = keys
                .iter()
                .enumerate()
                .filter(|(_, rc)| TileCoord::new(rc.0, rc.1) == out.key())
                .map(|(n, _)| n as f64)
                .collect();
            prop_assert_eq!(out.contributions(), expected.len());
            let total: f64 = expected.iter().sum();
            prop_assert_eq!(out.tile().as_slice(), &[total; 4][..]);
        }
    }

    /// Blocked multiply of generated tiles reproduces the dense reference
    #[test]
    fn test_blocked_matches_reference(
        seed in any::<u64>(),
        bi in 1usize..3,
        bk in 1usize..4,
        bj in 1usize..3,
        size in 1usize..5,
    ) {
        let case = Case::new(bi * size, bk * size, bj * size).unwrap();
        let grid = BlockGrid::new(&case, size).unwrap();
        let gen = TileGenerator::new(seed);
        let reference = reference_product::<f64>(&gen, &case).unwrap();

        for key in grid.output_keys() {
            let mut acc = Tile::zeros(MatrixId::C, key, size);
            for k in 0..grid.blocks_k() {
                let a = gen.generate_tile::<f64>(MatrixId::A, TileCoord::new(key.row, k), size).unwrap();
                let b = gen.generate_tile::<f64>(MatrixId::B, TileCoord::new(k, key.col), size).unwrap();
                multiply_accumulate(&mut acc, &a, &b).unwrap();
            }
            for r in 0..size {
                for c in 0..size {
                    let expected = reference[(key.row * size + r) * case.p() + key.col * size + c];
                    prop_assert!((acc.get(r, c) - expected).abs() < 1e-9);
                }
            }
        }
    }
}
