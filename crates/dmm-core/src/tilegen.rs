//! Deterministic operand generation
//!
//! Operand values are never stored or shipped by the driver: every worker
//! regenerates exactly the tiles (or rows) it owns. Values are standard
//! normal samples drawn from a ChaCha8 stream addressed by position:
//!
//! - the key is `seed + operand offset` (A and B use disjoint offsets),
//! - the stream id is the global row index,
//! - the word position is `column * WORDS_PER_SAMPLE`.
//!
//! Each sample consumes a fixed number of words, so any segment of any row can
//! be produced without generating its prefix, and element `(r, c)` of an
//! operand has the same value whether it is materialized as part of a tile, a
//! row, or the full matrix. Nothing depends on the partition that asks for it,
//! the tile size, or the order of requests.

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;

use crate::element::Element;
use crate::error::{DmmError, DmmResult};
use crate::tile::Tile;
use crate::types::{MatrixId, TileCoord};

/// Default generator seed
pub const DEFAULT_SEED: u64 = 0;

/// 32-bit words consumed per sample (two `u64` draws for Box-Muller)
const WORDS_PER_SAMPLE: u128 = 4;

/// Scale for mapping the top 53 bits of a `u64` into `[0, 1)`
const UNIT_SCALE: f64 = 1.0 / (1u64 << 53) as f64;

/// Pure, position-addressed generator for operand tiles and rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGenerator {
    seed: u64,
}

impl Default for TileGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl TileGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate tile `coord` of `matrix` with side `tile_size`
    ///
    /// Tile `(br, bc)` covers rows `br*bs..(br+1)*bs` and columns
    /// `bc*bs..(bc+1)*bs` of the operand.
    ///
    /// # Errors
    ///
    /// Output tiles are computed, never generated; asking for `MatrixId::C`
    /// is a validation error, as is a zero tile size.
    pub fn generate_tile<T: Element>(
        &self,
        matrix: MatrixId,
        coord: TileCoord,
        tile_size: usize,
    ) -> DmmResult<Tile<T>> {
        let key = self.operand_key(matrix)?;
        if tile_size == 0 {
            return Err(DmmError::validation("tile size must be positive"));
        }

        let mut data = vec![T::zero(); tile_size * tile_size];
        let row0 = coord.row * tile_size;
        let col0 = coord.col * tile_size;
        for (r, out) in data.chunks_exact_mut(tile_size).enumerate() {
            fill_segment(key, row0 + r, col0, out);
        }

        Tile::from_vec(matrix, coord, tile_size, data)
    }

    /// Generate row `row` of `matrix`, `cols` entries wide
    pub fn generate_row<T: Element>(
        &self,
        matrix: MatrixId,
        row: usize,
        cols: usize,
    ) -> DmmResult<Vec<T>> {
        let key = self.operand_key(matrix)?;
        let mut out = vec![T::zero(); cols];
        fill_segment(key, row, 0, &mut out);
        Ok(out)
    }

    /// Materialize a full `rows × cols` operand in row-major order
    pub fn generate_matrix<T: Element>(
        &self,
        matrix: MatrixId,
        rows: usize,
        cols: usize,
    ) -> DmmResult<Vec<T>> {
        let key = self.operand_key(matrix)?;
        let mut out = vec![T::zero(); rows * cols];
        if cols > 0 {
            for (r, row) in out.chunks_exact_mut(cols).enumerate() {
                fill_segment(key, r, 0, row);
            }
        }
        Ok(out)
    }

    fn operand_key(&self, matrix: MatrixId) -> DmmResult<u64> {
        let offset = match matrix {
            MatrixId::A => 2000,
            MatrixId::B => 3000,
            MatrixId::C => {
                return Err(DmmError::validation(
                    "output tiles are produced by the combiner and cannot be generated",
                ))
            }
        };
        Ok(self.seed.wrapping_add(offset))
    }
}

/// Fill `out` with samples `(row, col0..col0+out.len())` of the operand keyed by `key`
fn fill_segment<T: Element>(key: u64, row: usize, col0: usize, out: &mut [T]) {
    let mut rng = ChaCha8Rng::seed_from_u64(key);
    rng.set_stream(row as u64);
    rng.set_word_pos(col0 as u128 * WORDS_PER_SAMPLE);
    for v in out.iter_mut() {
        *v = T::from_f64(standard_normal(&mut rng));
    }
}

/// Box-Muller transform; consumes exactly two `u64` draws
fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    // u1 in (0, 1] keeps ln(u1) finite
    let u1 = ((rng.next_u64() >> 11) as f64 + 1.0) * UNIT_SCALE;
    let u2 = (rng.next_u64() >> 11) as f64 * UNIT_SCALE;
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
