//! Local multiply kernels
//!
//! Both kernels walk the right operand row by row (`i-k-j` order) so the
//! innermost loop is a contiguous axpy over one row of `B` and one row of the
//! output.

use dmm_core::{DmmError, DmmResult, Element, MatrixId, Tile, TileCoord};

/// Multiply an A tile by a B tile sharing its contraction key
///
/// The result is an output (`MatrixId::C`) tile at `(a.row, b.col)`.
///
/// # Errors
///
/// Returns an execution error if the operands are not an (A, B) pair, differ
/// in size, or do not share a contraction key (`a.col != b.row`).
pub fn multiply_tile<T: Element>(a: &Tile<T>, b: &Tile<T>) -> DmmResult<Tile<T>> {
    check_pair(a, b)?;
    let key = TileCoord::new(a.coord().row, b.coord().col);
    let mut out = Tile::zeros(MatrixId::C, key, a.size());
    gemm_accumulate(a.as_slice(), b.as_slice(), out.as_mut_slice(), a.size());
    Ok(out)
}

/// Accumulate `a · b` into an existing output tile
///
/// `acc` must already sit at `(a.row, b.col)`.
pub fn multiply_accumulate<T: Element>(acc: &mut Tile<T>, a: &Tile<T>, b: &Tile<T>) -> DmmResult<()> {
    check_pair(a, b)?;
    let key = TileCoord::new(a.coord().row, b.coord().col);
    if acc.matrix() != MatrixId::C || acc.coord() != key || acc.size() != a.size() {
        return Err(DmmError::execution(
            "multiply",
            format!(
                "accumulator {}{} (size {}) cannot receive product for {} (size {})",
                acc.matrix(),
                acc.coord(),
                acc.size(),
                key,
                a.size()
            ),
        ));
    }
    let bs = a.size();
    gemm_accumulate(a.as_slice(), b.as_slice(), acc.as_mut_slice(), bs);
    Ok(())
}

/// `row[1×n] · b[n×p]`, with `b` row-major
pub fn row_times_matrix<T: Element>(row: &[T], b: &[T], p: usize) -> DmmResult<Vec<T>> {
    if row.len() * p != b.len() {
        return Err(DmmError::execution(
            "multiply",
            format!(
                "row of length {} cannot multiply a matrix of {} elements with {} columns",
                row.len(),
                b.len(),
                p
            ),
        ));
    }

    let mut out = vec![T::zero(); p];
    if p == 0 {
        return Ok(out);
    }
    for (&a_k, b_row) in row.iter().zip(b.chunks_exact(p)) {
        for (o, &b_kj) in out.iter_mut().zip(b_row) {
            *o += a_k * b_kj;
        }
    }
    Ok(out)
}

fn check_pair<T: Element>(a: &Tile<T>, b: &Tile<T>) -> DmmResult<()> {
    if a.matrix() != MatrixId::A || b.matrix() != MatrixId::B {
        return Err(DmmError::execution(
            "multiply",
            format!("expected an (A, B) tile pair, got ({}, {})", a.matrix(), b.matrix()),
        ));
    }
    if a.size() != b.size() {
        return Err(DmmError::execution(
            "multiply",
            format!("tile sizes differ: {} vs {}", a.size(), b.size()),
        ));
    }
    if a.coord().col != b.coord().row {
        return Err(DmmError::execution(
            "multiply",
            format!(
                "contraction keys differ: A{} has key {}, B{} has key {}",
                a.coord(),
                a.coord().col,
                b.coord(),
                b.coord().row
            ),
        ));
    }
    Ok(())
}

/// `c += a · b` for row-major `bs × bs` buffers
fn gemm_accumulate<T: Element>(a: &[T], b: &[T], c: &mut [T], bs: usize) {
    for (a_row, c_row) in a.chunks_exact(bs).zip(c.chunks_exact_mut(bs)) {
        for (&a_ik, b_row) in a_row.iter().zip(b.chunks_exact(bs)) {
            for (c_ij, &b_kj) in c_row.iter_mut().zip(b_row) {
                *c_ij += a_ik * b_kj;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(matrix: MatrixId, row: usize, col: usize, data: Vec<f64>) -> Tile<f64> {
        let size = (data.len() as f64).sqrt() as usize;
        Tile::from_vec(matrix, TileCoord::new(row, col), size, data).unwrap()
    }

    #[test]
    fn test_multiply_tile_2x2() {
        let a = tile(MatrixId::A, 3, 1, vec![1.0, 2.0, 3.0, 4.0]);
        let b = tile(MatrixId::B, 1, 5, vec![5.0, 6.0, 7.0, 8.0]);

        let c = multiply_tile(&a, &b).unwrap();
        assert_eq!(c.matrix(), MatrixId::C);
        assert_eq!(c.coord(), TileCoord::new(3, 5));
        assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_multiply_identity() {
        let a = tile(MatrixId::A, 0, 0, vec![1.0, 0.0, 0.0, 1.0]);
        let b = tile(MatrixId::B, 0, 0, vec![2.0, 3.0, 4.0, 5.0]);
        let c = multiply_tile(&a, &b).unwrap();
        assert_eq!(c.as_slice(), b.as_slice());
    }

    #[test]
    fn test_multiply_rejects_same_operand() {
        let a1 = tile(MatrixId::A, 0, 0, vec![1.0; 4]);
        let a2 = tile(MatrixId::A, 0, 0, vec![1.0; 4]);
        assert!(multiply_tile(&a1, &a2).is_err());
    }

    #[test]
    fn test_multiply_rejects_key_mismatch() {
        let a = tile(MatrixId::A, 0, 0, vec![1.0; 4]);
        let b = tile(MatrixId::B, 1, 0, vec![1.0; 4]);
        let err = multiply_tile(&a, &b).unwrap_err();
        assert!(err.to_string().contains("contraction keys differ"));
    }

    #[test]
    fn test_multiply_rejects_size_mismatch() {
        let a = tile(MatrixId::A, 0, 0, vec![1.0; 4]);
        let b = tile(MatrixId::B, 0, 0, vec![1.0; 9]);
        assert!(multiply_tile(&a, &b).is_err());
    }

    #[test]
    fn test_multiply_accumulate() {
        let a0 = tile(MatrixId::A, 0, 0, vec![1.0, 2.0, 3.0, 4.0]);
        let b0 = tile(MatrixId::B, 0, 1, vec![1.0, 0.0, 0.0, 1.0]);
        let a1 = tile(MatrixId::A, 0, 1, vec![1.0, 1.0, 1.0, 1.0]);
        let b1 = tile(MatrixId::B, 1, 1, vec![2.0, 0.0, 0.0, 2.0]);

        let mut acc = Tile::zeros(MatrixId::C, TileCoord::new(0, 1), 2);
        multiply_accumulate(&mut acc, &a0, &b0).unwrap();
        multiply_accumulate(&mut acc, &a1, &b1).unwrap();
        assert_eq!(acc.as_slice(), &[3.0, 4.0, 5.0, 6.0]);

        let mut wrong = Tile::zeros(MatrixId::C, TileCoord::new(1, 1), 2);
        assert!(multiply_accumulate(&mut wrong, &a0, &b0).is_err());
    }

    #[test]
    fn test_row_times_matrix() {
        let row = vec![1.0f32, 2.0];
        let b = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let out = row_times_matrix(&row, &b, 3).unwrap();
        assert_eq!(out, vec![9.0, 12.0, 15.0]);

        assert!(row_times_matrix(&row, &b, 2).is_err());
    }
}
