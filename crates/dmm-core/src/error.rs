//! Error types for distributed matrix multiplication
//!
//! The taxonomy separates failures that are detected before any tile is
//! produced ([`DmmError::Validation`]) from failures raised by a worker while a
//! run is in flight ([`DmmError::Execution`]). Resource-guard vetoes are not
//! errors and live in `dmm-exec`.

use thiserror::Error;

/// Error type for all fallible DMM operations
#[derive(Debug, Error)]
pub enum DmmError {
    /// Request rejected before execution (bad dimensions, unknown strategy, ...)
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A worker-side failure during generation, multiply, or combine
    #[error("execution error in stage '{stage}': {message}")]
    Execution { stage: String, message: String },

    /// The substrate metrics endpoint could not be reached or parsed
    #[error("metrics unavailable: {message}")]
    MetricsUnavailable { message: String },

    /// Shuffle or broadcast payload could not be encoded or decoded
    #[error("codec error ({context}): {message}")]
    Codec { context: String, message: String },

    /// Filesystem failure (spill files, disk probes)
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for DMM operations
pub type DmmResult<T> = Result<T, DmmError>;

impl DmmError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        DmmError::Validation {
            message: message.into(),
        }
    }

    /// Create an execution error attributed to a stage
    pub fn execution(stage: impl Into<String>, message: impl Into<String>) -> Self {
        DmmError::Execution {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a metrics-unavailable error
    pub fn metrics_unavailable(message: impl Into<String>) -> Self {
        DmmError::MetricsUnavailable {
            message: message.into(),
        }
    }

    /// Create a codec error
    pub fn codec(context: impl Into<String>, message: impl ToString) -> Self {
        DmmError::Codec {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error was raised before any tile was generated
    pub fn is_validation(&self) -> bool {
        matches!(self, DmmError::Validation { .. })
    }

    /// Short class name used in run notes (`ERROR: <kind>: <message>`)
    pub fn kind(&self) -> &'static str {
        match self {
            DmmError::Validation { .. } => "ValidationError",
            DmmError::Execution { .. } => "ExecutionError",
            DmmError::MetricsUnavailable { .. } => "MetricsUnavailable",
            DmmError::Codec { .. } => "CodecError",
            DmmError::Io(_) => "IoError",
        }
    }

    /// Re-attribute a non-validation error to the stage it surfaced in
    pub fn in_stage(self, stage: &str) -> Self {
        match self {
            DmmError::Validation { .. } | DmmError::Execution { .. } => self,
            other => DmmError::execution(stage, other.to_string()),
        }
    }
}
