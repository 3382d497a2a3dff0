//! Sequential dense reference multiply
//!
//! Materializes both generated operands and multiplies them on one thread.
//! Only meant for verifying the distributed strategies on small cases.

use dmm_core::{Case, DmmResult, Element, MatrixId, TileGenerator};

use crate::multiply::row_times_matrix;
use crate::reductions::slice_checksum;

/// Full `m×p` product of the generated operands, row-major
pub fn reference_product<T: Element>(gen: &TileGenerator, case: &Case) -> DmmResult<Vec<T>> {
    let a = gen.generate_matrix::<T>(MatrixId::A, case.m(), case.n())?;
    let b = gen.generate_matrix::<T>(MatrixId::B, case.n(), case.p())?;

    let mut c = Vec::with_capacity(case.m() * case.p());
    for a_row in a.chunks_exact(case.n()) {
        c.extend(row_times_matrix(a_row, &b, case.p())?);
    }
    Ok(c)
}

/// Checksum (sum of all entries) of the reference product
pub fn reference_checksum<T: Element>(gen: &TileGenerator, case: &Case) -> DmmResult<f64> {
    Ok(slice_checksum(&reference_product::<T>(gen, case)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_shape() {
        let case = Case::new(3, 4, 5).unwrap();
        let c = reference_product::<f64>(&TileGenerator::new(1), &case).unwrap();
        assert_eq!(c.len(), 15);
    }

    #[test]
    fn test_reference_matches_naive_triple_loop() {
        let case = Case::new(5, 7, 3).unwrap();
        let gen = TileGenerator::new(9);
        let a = gen.generate_matrix::<f64>(MatrixId::A, 5, 7).unwrap();
        let b = gen.generate_matrix::<f64>(MatrixId::B, 7, 3).unwrap();

        let c = reference_product::<f64>(&gen, &case).unwrap();
        for i in 0..5 {
            for j in 0..3 {
                let mut s = 0.0;
                for k in 0..7 {
                    s += a[i * 7 + k] * b[k * 3 + j];
                }
                assert!((c[i * 3 + j] - s).abs() < 1e-12);
            }
        }
    }
}
