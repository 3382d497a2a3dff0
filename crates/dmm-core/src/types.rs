//! Core type definitions for distributed matrix multiplication.
//!
//! - [`Case`]: the `(m, n, p)` problem shape, `A[m×n] · B[n×p] = C[m×p]`
//! - [`Precision`]: element precision selected once per run
//! - [`MatrixId`]: which operand a tile belongs to
//! - [`TileCoord`]: a tile's position in its matrix's tile grid
//! - [`BlockGrid`]: the `(nbI, nbK, nbJ)` tile grid derived from a case and a tile size
//!
//! # Examples
//!
//! ```
//! use dmm_core::{BlockGrid, Case};
//!
//! let case = Case::new(256, 256, 256).unwrap();
//! let grid = BlockGrid::new(&case, 128).unwrap();
//! assert_eq!(grid.blocks_i(), 2);
//! assert_eq!(grid.total_a_tiles(), 4);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DmmError, DmmResult};

/// One benchmark scenario: `A` is `m×n`, `B` is `n×p`, output is `m×p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Case {
    m: usize,
    n: usize,
    p: usize,
}

impl Case {
    /// Create a case, rejecting zero-sized dimensions
    pub fn new(m: usize, n: usize, p: usize) -> DmmResult<Self> {
        if m == 0 || n == 0 || p == 0 {
            return Err(DmmError::validation(format!(
                "dimensions must be positive, got {}x{}x{}",
                m, n, p
            )));
        }
        Ok(Self { m, n, p })
    }

    /// Square case `n×n · n×n`
    pub fn square(n: usize) -> DmmResult<Self> {
        Self::new(n, n, n)
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn p(&self) -> usize {
        self.p
    }

    /// Total number of elements of A, B and C if fully materialized
    pub fn dense_elements(&self) -> u128 {
        let (m, n, p) = (self.m as u128, self.n as u128, self.p as u128);
        m * n + n * p + m * p
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.m, self.n, self.p)
    }
}

impl FromStr for Case {
    type Err = DmmError;

    /// Parse `MxNxP` (e.g. `512x512x512`)
    fn from_str(s: &str) -> DmmResult<Self> {
        let dims: Vec<&str> = s.trim().split(['x', 'X']).collect();
        if dims.len() != 3 {
            return Err(DmmError::validation(format!(
                "case '{}' must have the form MxNxP",
                s
            )));
        }
        let mut parsed = [0usize; 3];
        for (slot, dim) in parsed.iter_mut().zip(&dims) {
            *slot = dim.trim().parse().map_err(|_| {
                DmmError::validation(format!("case '{}' has a non-numeric dimension", s))
            })?;
        }
        Self::new(parsed[0], parsed[1], parsed[2])
    }
}

/// Element precision, configured once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    /// 32-bit IEEE float
    F32,
    /// 64-bit IEEE float
    F64,
}

impl Precision {
    /// Size of one element in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            Precision::F32 => 4,
            Precision::F64 => 8,
        }
    }

    /// Canonical name (`float32` / `float64`)
    pub fn name(&self) -> &'static str {
        match self {
            Precision::F32 => "float32",
            Precision::F64 => "float64",
        }
    }

    /// Relative tolerance used when comparing checksums of this precision
    pub fn checksum_tolerance(&self) -> f64 {
        match self {
            Precision::F32 => 1e-5,
            Precision::F64 => 1e-10,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Precision {
    type Err = DmmError;

    fn from_str(s: &str) -> DmmResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "float32" | "f32" => Ok(Precision::F32),
            "float64" | "f64" => Ok(Precision::F64),
            other => Err(DmmError::validation(format!(
                "dtype must be 'float32' or 'float64', got '{}'",
                other
            ))),
        }
    }
}

/// Identifies which matrix a tile belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatrixId {
    /// Left operand `A[m×n]`
    A,
    /// Right operand `B[n×p]`
    B,
    /// Output `C[m×p]`
    C,
}

impl fmt::Display for MatrixId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            MatrixId::A => "A",
            MatrixId::B => "B",
            MatrixId::C => "C",
        };
        f.write_str(tag)
    }
}

/// Position of a tile in its matrix's tile grid (block-row, block-column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub row: usize,
    pub col: usize,
}

impl TileCoord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Destination key of a partial product: the output tile coordinate `(i, j)`
pub type OutputKey = TileCoord;

/// Contraction-dimension key shared by joining A and B tiles
pub type ContractionKey = usize;

/// Tile grid of a blocked multiplication
///
/// `nbI = m / bs`, `nbK = n / bs`, `nbJ = p / bs`. Tiles of A are enumerated
/// row-major over `nbI × nbK`, tiles of B row-major over `nbK × nbJ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockGrid {
    tile_size: usize,
    blocks_i: usize,
    blocks_k: usize,
    blocks_j: usize,
}

impl BlockGrid {
    /// Derive the grid, requiring the tile size to divide every dimension
    pub fn new(case: &Case, tile_size: usize) -> DmmResult<Self> {
        if tile_size == 0 {
            return Err(DmmError::validation("tile size must be positive"));
        }
        if case.m() % tile_size != 0 || case.n() % tile_size != 0 || case.p() % tile_size != 0 {
            return Err(DmmError::validation(format!(
                "m,n,p must be multiples of block_size={} (case {})",
                tile_size, case
            )));
        }

        Ok(Self {
            tile_size,
            blocks_i: case.m() / tile_size,
            blocks_k: case.n() / tile_size,
            blocks_j: case.p() / tile_size,
        })
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn blocks_i(&self) -> usize {
        self.blocks_i
    }

    pub fn blocks_k(&self) -> usize {
        self.blocks_k
    }

    pub fn blocks_j(&self) -> usize {
        self.blocks_j
    }

    /// Number of A tiles (`nbI * nbK`)
    pub fn total_a_tiles(&self) -> usize {
        self.blocks_i * self.blocks_k
    }

    /// Number of B tiles (`nbK * nbJ`)
    pub fn total_b_tiles(&self) -> usize {
        self.blocks_k * self.blocks_j
    }

    /// Number of output tiles (`nbI * nbJ`)
    pub fn total_output_tiles(&self) -> usize {
        self.blocks_i * self.blocks_j
    }

    /// Number of partial products the join emits (`nbI * nbK * nbJ`)
    pub fn total_partial_products(&self) -> usize {
        self.blocks_i * self.blocks_k * self.blocks_j
    }

    /// Coordinate of the A tile with global index `t` (row-major over `nbI × nbK`)
    pub fn a_coord(&self, t: usize) -> TileCoord {
        TileCoord::new(t / self.blocks_k, t % self.blocks_k)
    }

    /// Coordinate of the B tile with global index `t` (row-major over `nbK × nbJ`)
    pub fn b_coord(&self, t: usize) -> TileCoord {
        TileCoord::new(t / self.blocks_j, t % self.blocks_j)
    }

    /// Linear index of an output key (row-major over `nbI × nbJ`)
    pub fn output_index(&self, key: &OutputKey) -> usize {
        key.row * self.blocks_j + key.col
    }

    /// Iterate every output key in row-major order
    pub fn output_keys(&self) -> impl Iterator<Item = OutputKey> + '_ {
        (0..self.total_output_tiles()).map(|t| TileCoord::new(t / self.blocks_j, t % self.blocks_j))
    }
}
