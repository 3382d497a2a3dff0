//! Run orchestration
//!
//! [`Runner::run_one`] takes a validated request through the resource guard,
//! a fresh [`Session`], the strategy, and metrics collection, and always
//! produces a [`RunResult`]. [`Runner::run_batch`] does that for every
//! `(case, strategy)` pair of a [`BatchConfig`]; no outcome of one pair stops
//! the next.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{info, info_span, warn};

use dmm_core::{DmmError, DmmResult};

use crate::config::{BatchConfig, ExecConfig, RunRequest};
use crate::guard::{ResourceGuard, Veto};
use crate::metrics::{MetricsSource, MetricsTotals, SessionMetricsSource};
use crate::result::{MetricValue, RunResult};
use crate::session::Session;
use crate::strategy;

/// Executes runs against one guard, substrate configuration and metrics source
pub struct Runner {
    guard: ResourceGuard,
    exec: ExecConfig,
    metrics: Box<dyn MetricsSource>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("guard", &self.guard)
            .field("exec", &self.exec)
            .field("metrics", &self.metrics.name())
            .finish()
    }
}

impl Runner {
    pub fn new(guard: ResourceGuard, exec: ExecConfig) -> Self {
        Self {
            guard,
            exec,
            metrics: Box::new(SessionMetricsSource),
        }
    }

    /// Runner with the batch's guard limits and substrate settings
    pub fn from_batch(batch: &BatchConfig) -> Self {
        Self::new(
            ResourceGuard::new(batch.max_dense_bytes, batch.min_free_disk_bytes),
            batch.exec.clone(),
        )
    }

    /// Replace the metrics source
    pub fn with_metrics_source<M: MetricsSource + 'static>(mut self, source: M) -> Self {
        self.metrics = Box::new(source);
        self
    }

    /// Run one request; never fails
    pub fn run_one(&self, request: &RunRequest) -> RunResult {
        let mode = request.strategy().name();
        let case = request.case();
        let span = info_span!("run", mode, case = %case, precision = request.precision().name());
        let _enter = span.enter();

        match self.preflight(request) {
            Ok(Some(veto)) => {
                warn!(reason = %veto.reason, measured = veto.measured_bytes, "[SKIP]");
                return RunResult::skipped(mode, case, request.precision(), &veto);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "[FAIL] pre-flight");
                return RunResult::failed(mode, case, request.precision(), 0.0, &e);
            }
        }

        info!(partitions = request.partitions(), tile_size = request.tile_size(), "[RUN]");
        let start = Instant::now();
        match self.execute(request) {
            Ok((checksum, extra)) => {
                let elapsed = start.elapsed().as_secs_f64();
                info!(elapsed_s = elapsed, checksum, "[OK]");
                RunResult::succeeded(
                    request.strategy(),
                    case,
                    request.precision(),
                    elapsed,
                    checksum,
                    extra,
                )
            }
            Err(e) => {
                let elapsed = start.elapsed().as_secs_f64();
                warn!(elapsed_s = elapsed, error = %e, "[FAIL]");
                RunResult::failed(mode, case, request.precision(), elapsed, &e)
            }
        }
    }

    /// Run every `(case, strategy)` pair of `batch` in order
    pub fn run_batch(&self, batch: &BatchConfig) -> Vec<RunResult> {
        let mut results = Vec::with_capacity(batch.cases.len() * batch.modes.len());
        for &case in &batch.cases {
            for &strategy in &batch.modes {
                let request = RunRequest::new(
                    strategy,
                    case,
                    batch.partitions,
                    batch.tile_size,
                    batch.precision,
                )
                .map(|r| r.with_seed(batch.seed));
                let result = match request {
                    Ok(request) => self.run_one(&request),
                    Err(e) => {
                        let mode = strategy.name();
                        warn!(mode, case = %case, error = %e, "[FAIL] validation");
                        RunResult::failed(strategy.name(), case, batch.precision, 0.0, &e)
                    }
                };
                results.push(result);
            }
        }
        let ok = results.iter().filter(|r| r.ok).count();
        info!(runs = results.len(), ok, "batch finished");
        results
    }

    /// Dense gate first, then free space on every scratch directory
    fn preflight(&self, request: &RunRequest) -> DmmResult<Option<Veto>> {
        if let Some(veto) = self
            .guard
            .check_dense(&request.case(), request.precision().size_bytes())
        {
            return Ok(Some(veto));
        }
        for dir in self.exec.guarded_dirs() {
            ensure_dir(dir)?;
        }
        self.guard.check_dirs(&self.exec.guarded_dirs())
    }

    fn execute(&self, request: &RunRequest) -> DmmResult<(f64, BTreeMap<String, MetricValue>)> {
        let session = Session::open(&self.exec)?;
        let output = strategy::execute(&session, request)?;
        let mut extra = output.extra;

        match self.metrics.stage_metrics(&session) {
            Ok(stages) => MetricsTotals::from_stages(&stages).write_extra(&mut extra),
            Err(e) => {
                warn!(source = self.metrics.name(), error = %e, "metrics unavailable");
                extra.insert("metricsNote".to_string(), MetricValue::from(metrics_note(&e)));
            }
        }

        if let Err(e) = session.close() {
            warn!(error = %e, "session scratch directory not removed");
        }
        Ok((output.checksum, extra))
    }
}

fn ensure_dir(dir: &Path) -> DmmResult<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

fn metrics_note(err: &DmmError) -> String {
    match err {
        DmmError::MetricsUnavailable { .. } => err.to_string(),
        other => format!("metrics unavailable: {}", other),
    }
}
