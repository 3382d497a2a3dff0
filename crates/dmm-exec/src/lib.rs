//! # dmm-exec
//!
//! Execution substrate and strategies for distributed dense matrix
//! multiplication.
//!
//! ## Overview
//!
//! - [`Session`]: scoped per-run resource owning a scratch directory and the
//!   per-stage metrics; runs stages of independent tasks in parallel
//! - [`shuffle`]: bincode-encoded, spill-capable redistribution between stages
//! - [`Broadcast`]: encode-once, decode-per-task values
//! - [`strategy`]: the broadcast-row and block-shuffle strategies
//! - [`ResourceGuard`]: pre-flight dense-footprint and free-disk gates
//! - [`MetricsSource`]: read-only access to stage metrics after a run
//! - [`Runner`]: request → [`RunResult`], one result per `(case, strategy)`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dmm_core::{Case, Precision};
//! use dmm_exec::{ExecConfig, ResourceGuard, RunRequest, Runner, Strategy};
//!
//! let runner = Runner::new(
//!     ResourceGuard::new(1_500_000_000, 1_000_000_000),
//!     ExecConfig::new().local_dir("./dmm_tmp"),
//! );
//! let case = Case::square(256).unwrap();
//! let request = RunRequest::new(Strategy::Blocks, case, 4, 128, Precision::F32).unwrap();
//!
//! let result = runner.run_one(&request);
//! println!("{}", result.summary_line());
//! ```

#![deny(warnings)]

pub mod broadcast;
pub mod config;
pub mod guard;
pub mod metrics;
pub mod result;
pub mod runner;
pub mod session;
pub mod shuffle;
pub mod strategy;

pub use broadcast::Broadcast;
pub use config::{BatchConfig, ExecConfig, RunRequest, Strategy};
pub use guard::{
    estimate_dense_bytes, DiskCheck, DiskProbe, FixedDiskProbe, ResourceGuard, SysinfoDiskProbe,
    Veto, VetoKind,
};
pub use metrics::{
    MetricsSource, MetricsTotals, NoopMetricsSource, SessionMetricsSource, StageMetrics,
    UnavailableMetricsSource,
};
pub use result::{MetricValue, RunResult, RunStatus};
pub use runner::Runner;
pub use session::{Session, TaskContext};
pub use strategy::{execute, StrategyOutput};
