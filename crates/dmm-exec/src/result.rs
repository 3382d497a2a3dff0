//! Run results
//!
//! One [`RunResult`] is produced per `(strategy, case)` pair and never changed
//! afterwards. Skips and failures are results too, so a batch always yields
//! one entry per pair.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use dmm_core::{Case, DmmError, Precision};

use crate::config::Strategy;
use crate::guard::{Veto, VetoKind};

/// Value of a free-form diagnostic counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(u64),
    Float(f64),
    Text(String),
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Int(v as u64)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::Text(v) => f.write_str(v),
        }
    }
}

/// Outcome class of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    /// Vetoed by the resource guard before execution
    Skipped,
    /// Rejected by validation or failed during execution
    Failed,
}

/// Immutable record of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub mode: String,
    pub case: Case,
    pub precision: Precision,
    pub status: RunStatus,
    pub ok: bool,
    pub elapsed_s: f64,
    pub checksum: Option<f64>,
    /// `OK`, the skip reason, or `ERROR: <kind>: <message>`
    pub note: String,
    pub extra: BTreeMap<String, MetricValue>,
}

impl RunResult {
    pub fn succeeded(
        mode: Strategy,
        case: Case,
        precision: Precision,
        elapsed_s: f64,
        checksum: f64,
        extra: BTreeMap<String, MetricValue>,
    ) -> Self {
        Self {
            mode: mode.name().to_string(),
            case,
            precision,
            status: RunStatus::Ok,
            ok: true,
            elapsed_s,
            checksum: Some(checksum),
            note: "OK".to_string(),
            extra,
        }
    }

    pub fn skipped(mode: &str, case: Case, precision: Precision, veto: &Veto) -> Self {
        let mut extra = BTreeMap::new();
        let key = match veto.kind {
            VetoKind::DenseFootprint => "estimatedDenseBytes",
            VetoKind::LowDisk => "freeDiskBytes",
        };
        extra.insert(key.to_string(), MetricValue::Int(veto.measured_bytes));
        extra.insert("limitBytes".to_string(), MetricValue::Int(veto.limit_bytes));
        Self {
            mode: mode.to_string(),
            case,
            precision,
            status: RunStatus::Skipped,
            ok: false,
            elapsed_s: 0.0,
            checksum: None,
            note: veto.reason.clone(),
            extra,
        }
    }

    pub fn failed(mode: &str, case: Case, precision: Precision, elapsed_s: f64, err: &DmmError) -> Self {
        Self {
            mode: mode.to_string(),
            case,
            precision,
            status: RunStatus::Failed,
            ok: false,
            elapsed_s,
            checksum: None,
            note: format!("ERROR: {}: {}", err.kind(), err),
            extra: BTreeMap::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == RunStatus::Skipped
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    /// Integer counter from the metrics map
    pub fn extra_int(&self, key: &str) -> Option<u64> {
        match self.extra.get(key)? {
            MetricValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// One-line summary for logs and terminals
    pub fn summary_line(&self) -> String {
        let checksum = self
            .checksum
            .map(|c| format!("{:.6e}", c))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{:<7} {:<8} {:<16} {:<8} {:>9.3}s checksum={} {}",
            match self.status {
                RunStatus::Ok => "[OK]",
                RunStatus::Skipped => "[SKIP]",
                RunStatus::Failed => "[FAIL]",
            },
            self.mode,
            self.case.to_string(),
            self.precision.name(),
            self.elapsed_s,
            checksum,
            self.note
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case() -> Case {
        Case::square(256).unwrap()
    }

    #[test]
    fn test_succeeded() {
        let mut extra = BTreeMap::new();
        extra.insert("partitions".to_string(), MetricValue::from(4usize));
        let r = RunResult::succeeded(Strategy::Blocks, case(), Precision::F32, 1.5, 42.0, extra);
        assert!(r.ok);
        assert_eq!(r.note, "OK");
        assert_eq!(r.mode, "blocks");
        assert_eq!(r.extra_int("partitions"), Some(4));
        assert!(r.summary_line().starts_with("[OK]"));
        assert!(r.summary_line().contains("256x256x256"));
    }

    #[test]
    fn test_skipped_carries_measurement() {
        let veto = Veto {
            kind: VetoKind::DenseFootprint,
            reason: "Skipped: dense estimation A+B+C ≈ 1.20 GB exceeds the limit.".into(),
            measured_bytes: 1_200_000_000,
            limit_bytes: 1_000_000_000,
        };
        let r = RunResult::skipped("rows", case(), Precision::F32, &veto);
        assert!(!r.ok);
        assert!(r.is_skipped());
        assert_eq!(r.checksum, None);
        assert_eq!(r.extra_int("estimatedDenseBytes"), Some(1_200_000_000));
        assert_eq!(r.note, veto.reason);
    }

    #[test]
    fn test_failed_note() {
        let err = DmmError::execution("reduce", "boom");
        let r = RunResult::failed("blocks", case(), Precision::F64, 0.25, &err);
        assert!(r.is_failed());
        assert!(r.note.starts_with("ERROR: ExecutionError: "));
        assert!(r.note.contains("boom"));
        assert_eq!(r.elapsed_s, 0.25);
    }

    #[test]
    fn test_metric_value_untagged() {
        assert_eq!(MetricValue::from(3u64).to_string(), "3");
        assert_eq!(MetricValue::from("n/a").to_string(), "n/a");
    }
}
