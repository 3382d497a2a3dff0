//! Structured logging setup
//!
//! The library crates only emit `tracing` events: one `run` span per request,
//! one `stage` span per stage with a `task` span per partition, and
//! `[RUN]` / `[OK]` / `[SKIP]` / `[FAIL]` events on run outcomes. This module
//! installs a subscriber for them.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives (default `dmm=info,dmm_exec=info,warn`)
//! - `DMM_LOG_FORMAT`: `pretty`, `json` or `compact` (default `compact`)
//!
//! # Example
//!
//! ```no_run
//! use dmm::tracing_support::{init_tracing, TracingConfig, TracingFormat};
//!
//! init_tracing(TracingConfig {
//!     format: TracingFormat::Json,
//!     ..TracingConfig::default()
//! })?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use dmm_exec::{MetricValue, RunResult};

const DEFAULT_FILTER: &str = "dmm=info,dmm_exec=info,warn";

/// Tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Multi-line human-readable
    Pretty,
    /// One JSON object per event
    Json,
    /// One line per event
    Compact,
}

impl TracingFormat {
    /// Parse from string; anything unrecognised is `Compact`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => TracingFormat::Json,
            "pretty" => TracingFormat::Pretty,
            _ => TracingFormat::Compact,
        }
    }
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub format: TracingFormat,
    /// Filter directive (e.g. "dmm_exec=debug,info")
    pub filter: String,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_names: bool,
}

impl TracingConfig {
    /// Configuration read through `lookup` instead of the process environment
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            format: lookup("DMM_LOG_FORMAT")
                .map(|s| TracingFormat::parse(&s))
                .unwrap_or(TracingFormat::Compact),
            filter: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            with_ansi: true,
            with_target: true,
            with_thread_names: true,
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Install the global subscriber; call once at startup
pub fn init_tracing(config: TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)?;

    match config.format {
        TracingFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_ansi(config.with_ansi)
                .with_target(config.with_target)
                .with_thread_names(config.with_thread_names)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
        TracingFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(config.with_target)
                .with_thread_names(config.with_thread_names)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
        TracingFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_ansi(config.with_ansi)
                .with_target(config.with_target)
                .with_thread_names(config.with_thread_names)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
    }

    Ok(())
}

/// Emit one `metric_recorded` event per entry of a result's metrics map
pub fn record_result(result: &RunResult) {
    let span = tracing::info_span!("result", mode = %result.mode, case = %result.case);
    let _enter = span.enter();
    for (key, value) in &result.extra {
        match value {
            MetricValue::Int(v) => tracing::info!(metric = %key, value = *v, "metric_recorded"),
            MetricValue::Float(v) => tracing::info!(metric = %key, value = *v, "metric_recorded"),
            MetricValue::Text(v) => tracing::debug!(metric = %key, value = %v, "metric_recorded"),
        }
    }
}
