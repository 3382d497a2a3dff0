//! # dmm-core
//!
//! Data model for distributed dense matrix multiplication.
//!
//! This crate provides:
//! - Problem shapes ([`Case`]), element precision ([`Precision`]) and the
//!   blocked tile grid ([`BlockGrid`])
//! - Square tile buffers ([`Tile`]) tagged with their matrix and grid coordinate
//! - A position-addressed, deterministic operand generator ([`TileGenerator`])
//! - The contiguous range partitioner and shuffle routing rule ([`partition`])
//! - The error taxonomy shared by the whole stack ([`DmmError`])
//!
//! ## Quick Start
//!
//! ```
//! use dmm_core::{BlockGrid, Case, MatrixId, RangePartitioner, TileGenerator};
//!
//! let case = Case::square(256).unwrap();
//! let grid = BlockGrid::new(&case, 128).unwrap();
//!
//! // Partition the A tiles over 4 workers
//! let parts = RangePartitioner::new(grid.total_a_tiles(), 4).unwrap();
//! let gen = TileGenerator::new(0);
//! for t in parts.range(1) {
//!     let tile = gen.generate_tile::<f32>(MatrixId::A, grid.a_coord(t), 128).unwrap();
//!     assert_eq!(tile.size(), 128);
//! }
//! ```

#![deny(warnings)]

pub mod element;
pub mod error;
pub mod partition;
pub mod tile;
pub mod tilegen;
pub mod types;

#[cfg(test)]
mod property_tests;

pub use element::Element;
pub use error::{DmmError, DmmResult};
pub use partition::{assign, route, RangePartitioner};
pub use tile::Tile;
pub use tilegen::{TileGenerator, DEFAULT_SEED};
pub use types::{BlockGrid, Case, ContractionKey, MatrixId, OutputKey, Precision, TileCoord};
