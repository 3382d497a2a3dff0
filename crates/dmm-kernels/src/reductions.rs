//! Scalar reductions used for checksums

use dmm_core::{Case, Element, Tile};

/// Sum of all entries of a finished tile, accumulated in `f64`
pub fn tile_checksum<T: Element>(tile: &Tile<T>) -> f64 {
    tile.sum()
}

/// Sum of a row (or any slice), accumulated in `f64`
pub fn slice_checksum<T: Element>(values: &[T]) -> f64 {
    values.iter().map(|v| v.as_f64()).sum()
}

/// Global checksum: sum of per-tile sums
pub fn checksum<'a, T, I>(tiles: I) -> f64
where
    T: Element,
    I: IntoIterator<Item = &'a Tile<T>>,
{
    tiles.into_iter().map(tile_checksum).sum()
}

/// `|a - b| / max(|a|, |b|, 1)`
pub fn relative_error(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() / scale
}

/// Whether two checksums agree within `tolerance` relative error
pub fn checksums_match(a: f64, b: f64, tolerance: f64) -> bool {
    relative_error(a, b) <= tolerance
}

/// Expected magnitude of the checksum of a product of standard-normal operands
///
/// The checksum is a sum of `m*n*p` independent unit-variance products, so its
/// standard deviation is `sqrt(m*n*p)`. A single draw can land arbitrarily
/// close to zero, which makes a plain relative error meaningless; comparisons
/// of generated runs normalize by this scale instead.
pub fn checksum_scale(case: &Case) -> f64 {
    (case.m() as f64 * case.n() as f64 * case.p() as f64).sqrt()
}

/// `|value - reference| <= tolerance * max(|reference|, scale)`
pub fn within_tolerance(value: f64, reference: f64, scale: f64, tolerance: f64) -> bool {
    (value - reference).abs() <= tolerance * reference.abs().max(scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmm_core::{MatrixId, TileCoord};

    #[test]
    fn test_tile_and_global_checksum() {
        let t1 = Tile::from_vec(MatrixId::C, TileCoord::new(0, 0), 2, vec![1.0f32, 2.0, 3.0, 4.0])
            .unwrap();
        let t2 = Tile::from_vec(MatrixId::C, TileCoord::new(0, 1), 2, vec![0.5f32; 4]).unwrap();

        assert_eq!(tile_checksum(&t1), 10.0);
        assert_eq!(checksum([&t1, &t2]), 12.0);
    }

    #[test]
    fn test_slice_checksum() {
        assert_eq!(slice_checksum(&[1.0f64, -2.0, 4.0]), 3.0);
        assert_eq!(slice_checksum::<f32>(&[]), 0.0);
    }

    #[test]
    fn test_relative_error() {
        assert_eq!(relative_error(100.0, 100.0), 0.0);
        assert!((relative_error(100.0, 101.0) - 0.01 / 1.01).abs() < 1e-12);
        // small magnitudes fall back to absolute error
        assert!((relative_error(0.0, 1e-6) - 1e-6).abs() < 1e-18);
        assert!(checksums_match(1000.0, 1000.001, 1e-5));
        assert!(!checksums_match(1000.0, 1001.0, 1e-5));
    }

    #[test]
    fn test_scaled_tolerance() {
        let case = Case::square(100).unwrap();
        assert_eq!(checksum_scale(&case), 1000.0);

        // near-zero reference falls back to the scale
        assert!(within_tolerance(0.005, 0.0, 1000.0, 1e-5));
        assert!(!within_tolerance(0.02, 0.0, 1000.0, 1e-5));
        // large reference uses its own magnitude
        assert!(within_tolerance(1e6 + 5.0, 1e6, 1000.0, 1e-5));
    }
}
