//! Batch benchmark: every configured case under every configured strategy
//!
//! Configuration comes from `DMM_*` environment variables (see
//! [`BatchConfig::from_env`]); logging from `RUST_LOG` and `DMM_LOG_FORMAT`.
//! One summary line per run is printed to stdout. The exit status is non-zero
//! only when the configuration itself is invalid; failed or skipped runs are
//! reported, not fatal.

use anyhow::{Context, Result};
use tracing::info;

use dmm::exec::{BatchConfig, Runner, RunStatus};
use dmm::tracing_support::{init_tracing, record_result, TracingConfig};

fn main() -> Result<()> {
    init_tracing(TracingConfig::default())?;

    let batch = BatchConfig::from_env().context("invalid DMM_* configuration")?;
    info!(
        cases = batch.cases.len(),
        modes = batch.modes.len(),
        precision = batch.precision.name(),
        partitions = batch.partitions,
        tile_size = batch.tile_size,
        local_dir = %batch.exec.local_dir.display(),
        "starting batch"
    );

    let runner = Runner::from_batch(&batch);
    let results = runner.run_batch(&batch);

    for result in &results {
        record_result(result);
        println!("{}", result.summary_line());
    }

    let count = |status: RunStatus| results.iter().filter(|r| r.status == status).count();
    println!(
        "{} runs: {} ok, {} skipped, {} failed",
        results.len(),
        count(RunStatus::Ok),
        count(RunStatus::Skipped),
        count(RunStatus::Failed)
    );
    Ok(())
}
