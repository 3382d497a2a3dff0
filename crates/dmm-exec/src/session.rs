//! Execution session and stage executor
//!
//! A [`Session`] is acquired per run and exclusively owned by it. It holds a
//! scratch directory for shuffle spill files, removed when the session is
//! dropped or closed, and the metrics of every stage it ran.
//!
//! A stage is a set of independent tasks, one per logical partition. Each task
//! receives its input by value and returns its output by value; tasks share
//! nothing but the stage's atomic counters, and complete in any order. The
//! stage itself is a barrier: [`Session::run_stage`] returns only once every
//! task has finished, with outputs in partition order.

use parking_lot::Mutex;
use scirs2_core::parallel_ops::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, debug_span, info, info_span, warn};

use dmm_core::DmmResult;

use crate::config::ExecConfig;
use crate::metrics::{StageCounters, StageMetrics};

/// Per-task view of the running stage
pub struct TaskContext<'a> {
    stage_id: usize,
    stage: &'a str,
    partition: usize,
    counters: &'a StageCounters,
    scratch_dir: &'a Path,
    spill_threshold_bytes: usize,
}

impl<'a> TaskContext<'a> {
    pub fn stage_id(&self) -> usize {
        self.stage_id
    }

    pub fn stage(&self) -> &str {
        self.stage
    }

    /// Logical partition this task runs for
    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Directory for this session's spill files
    pub fn scratch_dir(&self) -> &Path {
        self.scratch_dir
    }

    pub fn spill_threshold_bytes(&self) -> usize {
        self.spill_threshold_bytes
    }

    pub fn add_shuffle_read(&self, bytes: u64) {
        self.counters.add_shuffle_read(bytes);
    }

    pub fn add_shuffle_write(&self, bytes: u64) {
        self.counters.add_shuffle_write(bytes);
    }

    /// Record a spill of `memory_bytes` buffered bytes as `disk_bytes` on disk
    pub fn add_spill(&self, memory_bytes: u64, disk_bytes: u64) {
        self.counters.add_spill(memory_bytes, disk_bytes);
    }

    /// Bytes handed back to the driver
    pub fn add_result_bytes(&self, bytes: u64) {
        self.counters.add_result_bytes(bytes);
    }
}

/// Scoped execution resource for one run
#[derive(Debug)]
pub struct Session {
    scratch: TempDir,
    spill_threshold_bytes: usize,
    stages: Mutex<Vec<StageMetrics>>,
    next_stage: AtomicUsize,
}

impl Session {
    /// Create the local directory if needed and a fresh scratch directory in it
    pub fn open(config: &ExecConfig) -> DmmResult<Self> {
        std::fs::create_dir_all(&config.local_dir)?;
        if let Some(dir) = &config.event_log_dir {
            std::fs::create_dir_all(dir)?;
        }
        let scratch = tempfile::Builder::new()
            .prefix("dmm-session-")
            .tempdir_in(&config.local_dir)?;
        info!(scratch = %scratch.path().display(), "session opened");

        Ok(Self {
            scratch,
            spill_threshold_bytes: config.spill_threshold_bytes,
            stages: Mutex::new(Vec::new()),
            next_stage: AtomicUsize::new(0),
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Snapshot of the metrics of every stage run so far
    pub fn stage_metrics(&self) -> Vec<StageMetrics> {
        self.stages.lock().clone()
    }

    /// Run one task per input in parallel and wait for all of them
    ///
    /// Outputs are returned in input (partition) order. The stage's metrics
    /// are recorded whether or not a task failed; the first failure is
    /// returned attributed to the stage.
    pub fn run_stage<I, O, F>(&self, name: &str, inputs: Vec<I>, task: F) -> DmmResult<Vec<O>>
    where
        I: Send,
        O: Send,
        F: Fn(&TaskContext<'_>, I) -> DmmResult<O> + Sync,
    {
        let stage_id = self.next_stage.fetch_add(1, Ordering::Relaxed);
        let partitions = inputs.len();
        let counters = StageCounters::new();
        let scratch_dir = self.scratch.path();
        let span = info_span!("stage", id = stage_id, name, tasks = partitions);
        let _enter = span.enter();
        let start = Instant::now();

        let outputs = inputs
            .into_par_iter()
            .enumerate()
            .map(|(partition, input)| {
                let _task = debug_span!(parent: &span, "task", partition).entered();
                let ctx = TaskContext {
                    stage_id,
                    stage: name,
                    partition,
                    counters: &counters,
                    scratch_dir,
                    spill_threshold_bytes: self.spill_threshold_bytes,
                };
                let t0 = Instant::now();
                let out = task(&ctx, input).map_err(|e| e.in_stage(name));
                let elapsed = t0.elapsed();
                counters.add_run_time_us(elapsed.as_micros() as u64);
                debug!(elapsed_ms = elapsed.as_millis() as u64, ok = out.is_ok(), "task finished");
                out
            })
            .collect::<DmmResult<Vec<O>>>();

        let metrics = counters.snapshot(stage_id, name, partitions);
        match &outputs {
            Ok(_) => info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                shuffle_write_bytes = metrics.shuffle_write_bytes,
                shuffle_read_bytes = metrics.shuffle_read_bytes,
                disk_bytes_spilled = metrics.disk_bytes_spilled,
                "stage finished"
            ),
            Err(e) => warn!(error = %e, "stage failed"),
        }
        self.stages.lock().push(metrics);
        outputs
    }

    /// Remove the scratch directory now, reporting any error
    ///
    /// Dropping the session removes it as well, silently.
    pub fn close(self) -> DmmResult<()> {
        let path = self.scratch.path().to_path_buf();
        self.scratch.close()?;
        debug!(scratch = %path.display(), "session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmm_core::DmmError;

    fn open_session() -> (tempfile::TempDir, Session) {
        let root = tempfile::tempdir().unwrap();
        let cfg = ExecConfig::new().local_dir(root.path().join("local"));
        let session = Session::open(&cfg).unwrap();
        (root, session)
    }

    #[test]
    fn test_stage_outputs_in_partition_order() {
        let (_root, session) = open_session();
        let out = session
            .run_stage("square", (0..16u64).collect(), |ctx, x| {
                ctx.add_result_bytes(8);
                assert_eq!(ctx.partition() as u64, x);
                Ok(x * x)
            })
            .unwrap();
        assert_eq!(out, (0..16u64).map(|x| x * x).collect::<Vec<_>>());

        let metrics = session.stage_metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].name, "square");
        assert_eq!(metrics[0].tasks, 16);
        assert_eq!(metrics[0].result_size_bytes, 128);
    }

    #[test]
    fn test_stage_failure_is_recorded() {
        let (_root, session) = open_session();
        let err = session
            .run_stage("flaky", vec![1, 2, 3], |_, x: i32| {
                if x == 2 {
                    Err(DmmError::codec("record", "truncated"))
                } else {
                    Ok(x)
                }
            })
            .unwrap_err();
        assert_eq!(err.kind(), "ExecutionError");
        assert!(err.to_string().contains("flaky"));
        assert_eq!(session.stage_metrics().len(), 1);
    }

    #[test]
    fn test_scratch_removed_on_close_and_drop() {
        let (_root, session) = open_session();
        let dir = session.scratch_dir().to_path_buf();
        assert!(dir.is_dir());
        session.close().unwrap();
        assert!(!dir.exists());

        let (_root, session) = open_session();
        let dir = session.scratch_dir().to_path_buf();
        drop(session);
        assert!(!dir.exists());
    }

    #[test]
    fn test_stage_ids_increase() {
        let (_root, session) = open_session();
        session.run_stage("a", vec![()], |_, _| Ok(())).unwrap();
        session.run_stage("b", vec![(), ()], |_, _| Ok(())).unwrap();
        let ids: Vec<_> = session.stage_metrics().iter().map(|s| s.stage_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }
}
