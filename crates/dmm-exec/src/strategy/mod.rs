//! Distributed multiplication strategies
//!
//! - [`rows`]: broadcast `B`, each task multiplies its row range of `A`
//! - [`blocks`]: tile both operands, join tiles by contraction key through a
//!   shuffle, multiply, then reduce partial tiles by output key through a
//!   second shuffle
//!
//! Both return the global checksum and their strategy-specific counters.
//! Stage-level counters are collected separately through a
//! [`MetricsSource`](crate::metrics::MetricsSource).

pub mod blocks;
pub mod rows;

use std::collections::BTreeMap;

use dmm_core::{DmmResult, Precision};

use crate::config::{RunRequest, Strategy};
use crate::result::MetricValue;
use crate::session::Session;

/// What a strategy hands back to the runner
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutput {
    pub checksum: f64,
    pub extra: BTreeMap<String, MetricValue>,
}

/// Run `request` on `session` at the request's precision
pub fn execute(session: &Session, request: &RunRequest) -> DmmResult<StrategyOutput> {
    match (request.strategy(), request.precision()) {
        (Strategy::Rows, Precision::F32) => rows::run::<f32>(session, request),
        (Strategy::Rows, Precision::F64) => rows::run::<f64>(session, request),
        (Strategy::Blocks, Precision::F32) => blocks::run::<f32>(session, request),
        (Strategy::Blocks, Precision::F64) => blocks::run::<f64>(session, request),
    }
}
