//! Property-based tests for partitioning and tile generation

#[cfg(test)]
mod tests {
    use crate::{assign, BlockGrid, Case, MatrixId, RangePartitioner, TileCoord, TileGenerator};
    use proptest::prelude::*;

    proptest! {
        /// Ranges cover [0, total) exactly once, in order, with no gap
        #[test]
        fn prop_partition_coverage(total in 0usize..5000, partitions in 1usize..64) {
            let parts = RangePartitioner::new(total, partitions).unwrap();

            let mut next = 0;
            for (_, range) in parts.iter() {
                prop_assert_eq!(range.start, next);
                prop_assert!(range.end >= range.start);
                next = range.end;
            }
            prop_assert_eq!(next, total);
        }

        /// Range lengths differ by at most one
        #[test]
        fn prop_partition_balanced(total in 0usize..5000, partitions in 1usize..64) {
            let parts = RangePartitioner::new(total, partitions).unwrap();
            let lens: Vec<usize> = parts.iter().map(|(_, r)| r.len()).collect();
            let min = *lens.iter().min().unwrap();
            let max = *lens.iter().max().unwrap();
            prop_assert!(max - min <= 1);
        }

        /// assign() agrees with range membership
        #[test]
        fn prop_assign_consistent(total in 1usize..2000, partitions in 1usize..40, seed in any::<usize>()) {
            let index = seed % total;
            let p = assign(total, partitions, index);
            let parts = RangePartitioner::new(total, partitions).unwrap();
            prop_assert!(p < partitions);
            prop_assert!(parts.range(p).contains(&index));
        }

        /// Generation is a pure function of its inputs
        #[test]
        fn prop_generate_tile_bit_identical(
            seed in any::<u64>(),
            row in 0usize..32,
            col in 0usize..32,
            size in 1usize..12,
            use_b in any::<bool>(),
        ) {
            let gen = TileGenerator::new(seed);
            let matrix = if use_b { MatrixId::B } else { MatrixId::A };
            let t1 = gen.generate_tile::<f32>(matrix, TileCoord::new(row, col), size).unwrap();
            let t2 = gen.generate_tile::<f32>(matrix, TileCoord::new(row, col), size).unwrap();

            let b1: Vec<u32> = t1.as_slice().iter().map(|v| v.to_bits()).collect();
            let b2: Vec<u32> = t2.as_slice().iter().map(|v| v.to_bits()).collect();
            prop_assert_eq!(b1, b2);
        }

        /// Tile coordinates enumerate each grid cell exactly once
        #[test]
        fn prop_grid_coords_unique(bi in 1usize..6, bk in 1usize..6, bj in 1usize..6, bs in 1usize..4) {
            let case = Case::new(bi * bs, bk * bs, bj * bs).unwrap();
            let grid = BlockGrid::new(&case, bs).unwrap();

            let mut seen = std::collections::HashSet::new();
            for t in 0..grid.total_a_tiles() {
                let c = grid.a_coord(t);
                prop_assert!(c.row < bi && c.col < bk);
                prop_assert!(seen.insert(c));
            }
            seen.clear();
            for t in 0..grid.total_b_tiles() {
                let c = grid.b_coord(t);
                prop_assert!(c.row < bk && c.col < bj);
                prop_assert!(seen.insert(c));
            }
        }
    }
}
