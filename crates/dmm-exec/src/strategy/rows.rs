//! Broadcast-row strategy
//!
//! The driver generates `B` whole and broadcasts it before the stage starts.
//! Each task owns a contiguous row range of `A`, regenerates those rows,
//! multiplies each by its private copy of `B` and returns the sum of its
//! output rows. Nothing is shuffled.

use std::collections::BTreeMap;

use dmm_core::{DmmResult, Element, MatrixId, RangePartitioner, TileGenerator};
use dmm_kernels::{row_times_matrix, slice_checksum};

use crate::broadcast::Broadcast;
use crate::config::RunRequest;
use crate::result::MetricValue;
use crate::session::Session;
use crate::strategy::StrategyOutput;

const NOTES: &str = "Row-based approach: broadcast B, shuffle is typically near zero.";

pub fn run<T: Element>(session: &Session, request: &RunRequest) -> DmmResult<StrategyOutput> {
    let case = request.case();
    let (m, n, p) = (case.m(), case.n(), case.p());
    let gen = TileGenerator::new(request.seed());

    let b = gen.generate_matrix::<T>(MatrixId::B, n, p)?;
    let broadcast = Broadcast::new(&b)?;
    drop(b);

    let split = RangePartitioner::new(m, request.partitions())?;
    let ranges: Vec<_> = split.iter().map(|(_, rows)| rows).collect();

    let partials = session.run_stage("rows", ranges, |ctx, rows| {
        let b: Vec<T> = broadcast.value()?;
        let mut sum = 0.0;
        for r in rows {
            let a_row = gen.generate_row::<T>(MatrixId::A, r, n)?;
            sum += slice_checksum(&row_times_matrix(&a_row, &b, p)?);
        }
        ctx.add_result_bytes(std::mem::size_of::<f64>() as u64);
        Ok(sum)
    })?;

    let mut extra = BTreeMap::new();
    extra.insert("partitions".to_string(), MetricValue::from(request.partitions()));
    extra.insert("rowsPerPart".to_string(), MetricValue::from(split.max_range_len()));
    extra.insert("broadcastBBytes".to_string(), MetricValue::from(broadcast.size_bytes()));
    extra.insert("notes".to_string(), MetricValue::from(NOTES));

    Ok(StrategyOutput {
        checksum: partials.iter().sum(),
        extra,
    })
}
