//! # dmm-kernels
//!
//! Local compute kernels for distributed dense matrix multiplication.
//!
//! ## Overview
//!
//! - **Tile multiply** - `A(i,k) · B(k,j)` for one co-located pair ([`multiply_tile`])
//! - **Row multiply** - one row of `A` against the whole of `B` ([`row_times_matrix`])
//! - **Reduce-by-key** - associative, commutative merge of partial output
//!   tiles with contribution counting ([`Partial`], [`Combiner`], [`combine`])
//! - **Checksums** - `f64` sums of tiles and rows, tolerance helpers
//! - **Reference** - sequential dense product used to verify the strategies
//!
//! ## Quick Start
//!
//! ```rust
//! use dmm_core::{MatrixId, TileCoord, TileGenerator};
//! use dmm_kernels::{combine, multiply_tile, tile_checksum, Partial};
//!
//! let gen = TileGenerator::new(7);
//! let a0 = gen.generate_tile::<f64>(MatrixId::A, TileCoord::new(0, 0), 4).unwrap();
//! let b0 = gen.generate_tile::<f64>(MatrixId::B, TileCoord::new(0, 1), 4).unwrap();
//! let a1 = gen.generate_tile::<f64>(MatrixId::A, TileCoord::new(0, 1), 4).unwrap();
//! let b1 = gen.generate_tile::<f64>(MatrixId::B, TileCoord::new(1, 1), 4).unwrap();
//!
//! let parts = vec![
//!     Partial::from_product(multiply_tile(&a0, &b0).unwrap()).unwrap(),
//!     Partial::from_product(multiply_tile(&a1, &b1).unwrap()).unwrap(),
//! ];
//! let c01 = combine(TileCoord::new(0, 1), parts).unwrap();
//! assert_eq!(c01.contributions(), 2);
//! let _sum = tile_checksum(c01.tile());
//! ```

#![deny(warnings)]

pub mod combine;
pub mod multiply;
pub mod reductions;
pub mod reference;

#[cfg(test)]
mod property_tests;

pub use combine::{combine, Combiner, Partial};
pub use multiply::{multiply_accumulate, multiply_tile, row_times_matrix};
pub use reductions::{
    checksum, checksum_scale, checksums_match, relative_error, slice_checksum, tile_checksum,
    within_tolerance,
};
pub use reference::{reference_checksum, reference_product};
