//! Typed run, session and batch configuration
//!
//! Every value is checked when it is built: a [`RunRequest`] that exists is
//! safe to hand to a strategy, and no tile is ever generated for a request
//! that fails validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use dmm_core::{BlockGrid, Case, DmmError, DmmResult, Precision, DEFAULT_SEED};

/// Distributed multiplication strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Broadcast `B` whole, partition rows of `A`
    Rows,
    /// Tile both operands, join by contraction key, reduce by output key
    Blocks,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Rows => "rows",
            Strategy::Blocks => "blocks",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = DmmError;

    fn from_str(s: &str) -> DmmResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "rows" | "spark-rows" => Ok(Strategy::Rows),
            "blocks" | "spark-blocks" => Ok(Strategy::Blocks),
            other => Err(DmmError::validation(format!("unknown strategy '{}'", other))),
        }
    }
}

/// One validated `(strategy, case)` run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    strategy: Strategy,
    case: Case,
    partitions: usize,
    tile_size: usize,
    precision: Precision,
    seed: u64,
}

impl RunRequest {
    /// Build and validate a request
    ///
    /// # Errors
    ///
    /// A validation error if `partitions` or `tile_size` is zero, or if the
    /// block strategy is asked for dimensions that are not multiples of the
    /// tile size. The row strategy ignores the tile size.
    pub fn new(
        strategy: Strategy,
        case: Case,
        partitions: usize,
        tile_size: usize,
        precision: Precision,
    ) -> DmmResult<Self> {
        if partitions == 0 {
            return Err(DmmError::validation("partition count must be at least 1"));
        }
        if tile_size == 0 {
            return Err(DmmError::validation("block_size must be at least 1"));
        }
        if strategy == Strategy::Blocks {
            BlockGrid::new(&case, tile_size)?;
        }
        Ok(Self {
            strategy,
            case,
            partitions,
            tile_size,
            precision,
            seed: DEFAULT_SEED,
        })
    }

    /// Override the generator seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn case(&self) -> Case {
        self.case
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Tile grid for the block strategy
    pub fn grid(&self) -> DmmResult<BlockGrid> {
        BlockGrid::new(&self.case, self.tile_size)
    }
}

/// Execution substrate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Parent of each session's scratch directory (shuffle spill files)
    pub local_dir: PathBuf,
    /// Buffered shuffle bytes per map task before spilling to disk
    pub spill_threshold_bytes: usize,
    /// Optional event-log directory, probed for free space like `local_dir`
    pub event_log_dir: Option<PathBuf>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from("./dmm_tmp"),
            spill_threshold_bytes: 256 * 1024 * 1024, // 256MB
            event_log_dir: None,
        }
    }
}

impl ExecConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scratch directory parent
    pub fn local_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.local_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the per-task spill threshold in bytes
    pub fn spill_threshold_bytes(mut self, bytes: usize) -> Self {
        self.spill_threshold_bytes = bytes;
        self
    }

    /// Set the event-log directory
    pub fn event_log_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.event_log_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Directories the disk guard must probe before a run
    pub fn guarded_dirs(&self) -> Vec<&Path> {
        std::iter::once(self.local_dir.as_path())
            .chain(self.event_log_dir.as_deref())
            .collect()
    }
}

/// A batch of cases × strategies sharing one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub cases: Vec<Case>,
    pub modes: Vec<Strategy>,
    pub precision: Precision,
    /// Dense A+B+C ceiling in bytes
    pub max_dense_bytes: u64,
    /// Minimum free space on every guarded directory
    pub min_free_disk_bytes: u64,
    pub partitions: usize,
    pub tile_size: usize,
    pub seed: u64,
    pub exec: ExecConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            cases: [512, 1024].into_iter().filter_map(|n| Case::square(n).ok()).collect(),
            modes: vec![Strategy::Rows, Strategy::Blocks],
            precision: Precision::F32,
            max_dense_bytes: 1_500_000_000,
            min_free_disk_bytes: 6_000_000_000,
            partitions: 8,
            tile_size: 128,
            seed: DEFAULT_SEED,
            exec: ExecConfig::default(),
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cases(mut self, cases: Vec<Case>) -> Self {
        self.cases = cases;
        self
    }

    pub fn modes(mut self, modes: Vec<Strategy>) -> Self {
        self.modes = modes;
        self
    }

    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn max_dense_bytes(mut self, bytes: u64) -> Self {
        self.max_dense_bytes = bytes;
        self
    }

    pub fn min_free_disk_bytes(mut self, bytes: u64) -> Self {
        self.min_free_disk_bytes = bytes;
        self
    }

    pub fn partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn exec(mut self, exec: ExecConfig) -> Self {
        self.exec = exec;
        self
    }

    /// Defaults overridden by `DMM_*` environment variables
    pub fn from_env() -> DmmResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `DMM_*` key
    ///
    /// | Key | Format |
    /// |-----|--------|
    /// | `DMM_PARTITIONS` | integer |
    /// | `DMM_TILE_SIZE` | integer |
    /// | `DMM_PRECISION` | `float32` / `float64` |
    /// | `DMM_LOCAL_DIR` | path |
    /// | `DMM_EVENT_LOG_DIR` | path |
    /// | `DMM_SPILL_THRESHOLD_BYTES` | bytes |
    /// | `DMM_MAX_DENSE_BYTES` | bytes, `1.5e9` accepted |
    /// | `DMM_MIN_FREE_DISK_BYTES` | bytes |
    /// | `DMM_MODES` | `rows,blocks` |
    /// | `DMM_CASES` | `512x512x512,1024x1024x1024` |
    /// | `DMM_SEED` | integer |
    pub fn from_lookup<F>(lookup: F) -> DmmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("DMM_PARTITIONS") {
            cfg.partitions = parse_int("DMM_PARTITIONS", &v)?;
        }
        if let Some(v) = lookup("DMM_TILE_SIZE") {
            cfg.tile_size = parse_int("DMM_TILE_SIZE", &v)?;
        }
        if let Some(v) = lookup("DMM_PRECISION") {
            cfg.precision = v.parse()?;
        }
        if let Some(v) = lookup("DMM_LOCAL_DIR") {
            cfg.exec.local_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DMM_EVENT_LOG_DIR") {
            cfg.exec.event_log_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("DMM_SPILL_THRESHOLD_BYTES") {
            cfg.exec.spill_threshold_bytes = parse_bytes("DMM_SPILL_THRESHOLD_BYTES", &v)? as usize;
        }
        if let Some(v) = lookup("DMM_MAX_DENSE_BYTES") {
            cfg.max_dense_bytes = parse_bytes("DMM_MAX_DENSE_BYTES", &v)?;
        }
        if let Some(v) = lookup("DMM_MIN_FREE_DISK_BYTES") {
            cfg.min_free_disk_bytes = parse_bytes("DMM_MIN_FREE_DISK_BYTES", &v)?;
        }
        if let Some(v) = lookup("DMM_MODES") {
            cfg.modes = parse_list(&v)?;
        }
        if let Some(v) = lookup("DMM_CASES") {
            cfg.cases = parse_list(&v)?;
        }
        if let Some(v) = lookup("DMM_SEED") {
            cfg.seed = parse_int("DMM_SEED", &v)?;
        }

        if cfg.partitions == 0 {
            return Err(DmmError::validation("DMM_PARTITIONS must be at least 1"));
        }
        Ok(cfg)
    }
}

fn parse_int<N: FromStr>(key: &str, value: &str) -> DmmResult<N> {
    value
        .trim()
        .parse()
        .map_err(|_| DmmError::validation(format!("{} must be an integer, got '{}'", key, value)))
}

/// Byte counts may be written as integers or in float notation (`1.5e9`)
fn parse_bytes(key: &str, value: &str) -> DmmResult<u64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u64>() {
        return Ok(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => Ok(f as u64),
        _ => Err(DmmError::validation(format!(
            "{} must be a byte count, got '{}'",
            key, value
        ))),
    }
}

fn parse_list<T: FromStr<Err = DmmError>>(value: &str) -> DmmResult<Vec<T>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_strategy_names() {
        assert_eq!("rows".parse::<Strategy>().unwrap(), Strategy::Rows);
        assert_eq!("spark-blocks".parse::<Strategy>().unwrap(), Strategy::Blocks);
        assert_eq!(" Blocks ".parse::<Strategy>().unwrap(), Strategy::Blocks);

        let err = "local-naive".parse::<Strategy>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("unknown strategy"));
    }

    #[test]
    fn test_request_blocks_require_divisible_dims() {
        let case = Case::new(600, 400, 600).unwrap();
        let err = RunRequest::new(Strategy::Blocks, case, 8, 128, Precision::F32).unwrap_err();
        assert!(err.is_validation());

        let ok = RunRequest::new(Strategy::Rows, case, 8, 128, Precision::F32).unwrap();
        assert_eq!(ok.strategy(), Strategy::Rows);
        assert!(ok.grid().is_err());
    }

    #[test]
    fn test_request_rejects_zero_partitions() {
        let case = Case::square(4).unwrap();
        assert!(RunRequest::new(Strategy::Rows, case, 0, 2, Precision::F64).is_err());
        assert!(RunRequest::new(Strategy::Rows, case, 1, 0, Precision::F64).is_err());
    }

    #[test]
    fn test_request_seed() {
        let case = Case::square(4).unwrap();
        let req = RunRequest::new(Strategy::Blocks, case, 2, 2, Precision::F64).unwrap();
        assert_eq!(req.seed(), DEFAULT_SEED);
        assert_eq!(req.with_seed(99).seed(), 99);
    }

    #[test]
    fn test_batch_defaults() {
        let cfg = BatchConfig::default();
        assert_eq!(cfg.cases, vec![Case::square(512).unwrap(), Case::square(1024).unwrap()]);
        assert_eq!(cfg.modes, vec![Strategy::Rows, Strategy::Blocks]);
        assert_eq!(cfg.precision, Precision::F32);
        assert_eq!(cfg.max_dense_bytes, 1_500_000_000);
        assert_eq!(cfg.min_free_disk_bytes, 6_000_000_000);
        assert_eq!(cfg.partitions, 8);
        assert_eq!(cfg.tile_size, 128);
        assert_eq!(cfg.exec.local_dir, PathBuf::from("./dmm_tmp"));
    }

    #[test]
    fn test_batch_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("DMM_PARTITIONS", "4"),
            ("DMM_TILE_SIZE", "64"),
            ("DMM_PRECISION", "float64"),
            ("DMM_MAX_DENSE_BYTES", "2.5e9"),
            ("DMM_MODES", "spark-blocks, rows"),
            ("DMM_CASES", "256x256x256,600x400x600"),
            ("DMM_SEED", "7"),
            ("DMM_EVENT_LOG_DIR", "/tmp/events"),
        ]
        .into_iter()
        .collect();

        let cfg = BatchConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.partitions, 4);
        assert_eq!(cfg.tile_size, 64);
        assert_eq!(cfg.precision, Precision::F64);
        assert_eq!(cfg.max_dense_bytes, 2_500_000_000);
        assert_eq!(cfg.modes, vec![Strategy::Blocks, Strategy::Rows]);
        assert_eq!(cfg.cases[1], Case::new(600, 400, 600).unwrap());
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.exec.guarded_dirs().len(), 2);
    }

    #[test]
    fn test_batch_from_lookup_rejects_garbage() {
        assert!(BatchConfig::from_lookup(|k| (k == "DMM_PARTITIONS").then(|| "many".into())).is_err());
        assert!(BatchConfig::from_lookup(|k| (k == "DMM_MODES").then(|| "rows,ijk".into())).is_err());
        assert!(BatchConfig::from_lookup(|k| (k == "DMM_PARTITIONS").then(|| "0".into())).is_err());
    }
}
