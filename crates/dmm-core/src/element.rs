//! Numeric element abstraction for tile buffers.

use scirs2_core::numeric::{Float, NumAssign};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

use crate::types::Precision;

/// A floating-point element a tile can hold (`f32` or `f64`).
pub trait Element:
    Float + NumAssign + Debug + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Precision tag matching this type
    const PRECISION: Precision;

    /// Narrow a generated `f64` sample into this precision
    fn from_f64(value: f64) -> Self;

    /// Widen to `f64` for checksum accumulation
    fn as_f64(self) -> f64;
}

impl Element for f32 {
    const PRECISION: Precision = Precision::F32;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Element for f64 {
    const PRECISION: Precision = Precision::F64;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}
