//! # dmm - distributed dense matrix multiplication
//!
//! Multiplies two dense matrices across a pool of workers with one of two
//! strategies and reports a checksum plus execution metrics:
//!
//! - **rows**: `B` is broadcast once, each worker multiplies a contiguous range
//!   of `A` rows; nothing is shuffled
//! - **blocks**: both operands are tiled, tiles are joined by contraction key
//!   through a shuffle, multiplied, and partial tiles are reduced by output
//!   key through a second shuffle
//!
//! Operands are never stored: every element is a deterministic function of
//! `(seed, matrix, row, col)`, so both strategies and the single-node
//! reference multiply see the same matrices.
//!
//! This is the **meta crate** that re-exports the stack.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dmm::prelude::*;
//!
//! let batch = BatchConfig::new()
//!     .cases(vec![Case::square(512)?])
//!     .modes(vec![Strategy::Rows, Strategy::Blocks]);
//!
//! for result in Runner::from_batch(&batch).run_batch(&batch) {
//!     println!("{}", result.summary_line());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Data model ([`core`])
//!
//! Shapes, precisions, tiles, the block grid, the position-addressed generator
//! and the partitioner.
//!
//! ```
//! use dmm::core::{BlockGrid, Case};
//!
//! let grid = BlockGrid::new(&Case::square(256).unwrap(), 128).unwrap();
//! assert_eq!(grid.total_partial_products(), 8);
//! ```
//!
//! ### Local compute ([`kernels`])
//!
//! Tile and row multiplies, the reduce-by-key combiner, checksums and the
//! sequential reference multiply.
//!
//! ### Execution ([`exec`])
//!
//! Sessions, shuffle, broadcast, strategies, the resource guard, metrics
//! sources and the batch runner.
//!
//! ### Logging ([`tracing_support`])
//!
//! Subscriber setup for the `tracing` events the stack emits.

#![deny(warnings)]

pub use dmm_core as core;
pub use dmm_exec as exec;
pub use dmm_kernels as kernels;

pub mod tracing_support;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```
    //! use dmm::prelude::*;
    //!
    //! let request = RunRequest::new(Strategy::Rows, Case::square(64).unwrap(), 2, 32, Precision::F64);
    //! assert!(request.is_ok());
    //! ```

    // Data model
    pub use crate::core::{
        BlockGrid, Case, DmmError, DmmResult, MatrixId, Precision, RangePartitioner, Tile,
        TileCoord, TileGenerator,
    };

    // Verification
    pub use crate::kernels::{checksum_scale, reference_checksum, within_tolerance};

    // Execution
    pub use crate::exec::{
        BatchConfig, ExecConfig, MetricValue, ResourceGuard, RunRequest, RunResult, RunStatus,
        Runner, Strategy,
    };
}
