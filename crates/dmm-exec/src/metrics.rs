//! Per-stage execution metrics and the metrics capability
//!
//! Every stage run by a [`Session`] records one [`StageMetrics`]. After a run
//! the runner asks a [`MetricsSource`] for them once; a source that fails
//! only degrades the result to a `metricsNote`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dmm_core::{DmmError, DmmResult};

use crate::result::MetricValue;
use crate::session::Session;

/// Counters reported for one completed (or failed) stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub stage_id: usize,
    pub name: String,
    pub tasks: usize,
    pub shuffle_read_bytes: u64,
    pub shuffle_write_bytes: u64,
    pub memory_bytes_spilled: u64,
    pub disk_bytes_spilled: u64,
    /// Sum of task run times
    pub executor_run_time_ms: u64,
    pub result_size_bytes: u64,
}

/// Internal stage counters, updated concurrently by tasks
#[derive(Debug, Default)]
pub(crate) struct StageCounters {
    shuffle_read_bytes: AtomicU64,
    shuffle_write_bytes: AtomicU64,
    memory_bytes_spilled: AtomicU64,
    disk_bytes_spilled: AtomicU64,
    run_time_us: AtomicU64,
    result_size_bytes: AtomicU64,
}

impl StageCounters {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_shuffle_read(&self, bytes: u64) {
        self.shuffle_read_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn add_shuffle_write(&self, bytes: u64) {
        self.shuffle_write_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn add_spill(&self, memory_bytes: u64, disk_bytes: u64) {
        self.memory_bytes_spilled.fetch_add(memory_bytes, Ordering::Relaxed);
        self.disk_bytes_spilled.fetch_add(disk_bytes, Ordering::Relaxed);
    }

    pub(crate) fn add_run_time_us(&self, us: u64) {
        self.run_time_us.fetch_add(us, Ordering::Relaxed);
    }

    pub(crate) fn add_result_bytes(&self, bytes: u64) {
        self.result_size_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, stage_id: usize, name: &str, tasks: usize) -> StageMetrics {
        StageMetrics {
            stage_id,
            name: name.to_string(),
            tasks,
            shuffle_read_bytes: self.shuffle_read_bytes.load(Ordering::Relaxed),
            shuffle_write_bytes: self.shuffle_write_bytes.load(Ordering::Relaxed),
            memory_bytes_spilled: self.memory_bytes_spilled.load(Ordering::Relaxed),
            disk_bytes_spilled: self.disk_bytes_spilled.load(Ordering::Relaxed),
            executor_run_time_ms: self.run_time_us.load(Ordering::Relaxed) / 1000,
            result_size_bytes: self.result_size_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Run-wide totals over all stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsTotals {
    pub stages: usize,
    pub tasks: usize,
    pub shuffle_read_bytes: u64,
    pub shuffle_write_bytes: u64,
    pub memory_bytes_spilled: u64,
    pub disk_bytes_spilled: u64,
    pub executor_run_time_ms: u64,
    pub result_size_bytes: u64,
}

impl MetricsTotals {
    pub fn from_stages(stages: &[StageMetrics]) -> Self {
        stages.iter().fold(
            Self {
                stages: stages.len(),
                ..Self::default()
            },
            |mut acc, s| {
                acc.tasks += s.tasks;
                acc.shuffle_read_bytes += s.shuffle_read_bytes;
                acc.shuffle_write_bytes += s.shuffle_write_bytes;
                acc.memory_bytes_spilled += s.memory_bytes_spilled;
                acc.disk_bytes_spilled += s.disk_bytes_spilled;
                acc.executor_run_time_ms += s.executor_run_time_ms;
                acc.result_size_bytes += s.result_size_bytes;
                acc
            },
        )
    }

    /// Merge into a result's metrics map under the listener's key names
    pub fn write_extra(&self, extra: &mut BTreeMap<String, MetricValue>) {
        let entries = [
            ("stages", self.stages as u64),
            ("tasks", self.tasks as u64),
            ("shuffleReadBytes", self.shuffle_read_bytes),
            ("shuffleWriteBytes", self.shuffle_write_bytes),
            ("memoryBytesSpilled", self.memory_bytes_spilled),
            ("diskBytesSpilled", self.disk_bytes_spilled),
            ("executorRunTimeMs", self.executor_run_time_ms),
            ("resultSizeBytes", self.result_size_bytes),
        ];
        for (key, value) in entries {
            extra.insert(key.to_string(), MetricValue::Int(value));
        }
    }
}

/// Read-only access to the substrate's per-stage metrics
pub trait MetricsSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Metrics for every stage the session ran, queried once after a run
    fn stage_metrics(&self, session: &Session) -> DmmResult<Vec<StageMetrics>>;
}

/// Reads the counters the session recorded itself
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionMetricsSource;

impl MetricsSource for SessionMetricsSource {
    fn name(&self) -> &str {
        "session"
    }

    fn stage_metrics(&self, session: &Session) -> DmmResult<Vec<StageMetrics>> {
        Ok(session.stage_metrics())
    }
}

/// Reports no stages at all
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSource;

impl MetricsSource for NoopMetricsSource {
    fn name(&self) -> &str {
        "noop"
    }

    fn stage_metrics(&self, _session: &Session) -> DmmResult<Vec<StageMetrics>> {
        Ok(Vec::new())
    }
}

/// A metrics endpoint that cannot be reached
#[derive(Debug, Clone)]
pub struct UnavailableMetricsSource {
    message: String,
}

impl UnavailableMetricsSource {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl MetricsSource for UnavailableMetricsSource {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn stage_metrics(&self, _session: &Session) -> DmmResult<Vec<StageMetrics>> {
        Err(DmmError::metrics_unavailable(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let c = StageCounters::new();
        c.add_shuffle_write(100);
        c.add_shuffle_write(50);
        c.add_shuffle_read(150);
        c.add_spill(4096, 1024);
        c.add_run_time_us(2500);
        c.add_result_bytes(8);

        let s = c.snapshot(3, "reduce", 4);
        assert_eq!(s.stage_id, 3);
        assert_eq!(s.name, "reduce");
        assert_eq!(s.tasks, 4);
        assert_eq!(s.shuffle_write_bytes, 150);
        assert_eq!(s.shuffle_read_bytes, 150);
        assert_eq!(s.memory_bytes_spilled, 4096);
        assert_eq!(s.disk_bytes_spilled, 1024);
        assert_eq!(s.executor_run_time_ms, 2);
        assert_eq!(s.result_size_bytes, 8);
    }

    #[test]
    fn test_totals() {
        let stages = vec![
            StageMetrics {
                tasks: 4,
                shuffle_write_bytes: 10,
                ..Default::default()
            },
            StageMetrics {
                tasks: 4,
                shuffle_read_bytes: 10,
                disk_bytes_spilled: 7,
                ..Default::default()
            },
        ];
        let totals = MetricsTotals::from_stages(&stages);
        assert_eq!(totals.stages, 2);
        assert_eq!(totals.tasks, 8);
        assert_eq!(totals.disk_bytes_spilled, 7);

        let mut extra = BTreeMap::new();
        totals.write_extra(&mut extra);
        assert_eq!(extra["tasks"], MetricValue::Int(8));
        assert_eq!(extra["shuffleReadBytes"], MetricValue::Int(10));
        assert_eq!(extra.len(), 8);
    }
}
