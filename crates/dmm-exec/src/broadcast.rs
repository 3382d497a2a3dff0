//! Driver-to-worker broadcast
//!
//! The driver encodes a value once; each task decodes its own copy, so no two
//! workers ever share the decoded value.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

use dmm_core::{DmmError, DmmResult};

/// An encoded, read-only value shipped to every task of a stage
#[derive(Debug)]
pub struct Broadcast<V> {
    payload: Vec<u8>,
    _value: PhantomData<fn() -> V>,
}

impl<V: Serialize + DeserializeOwned> Broadcast<V> {
    /// Encode `value`; this completes before any task can read it
    pub fn new(value: &V) -> DmmResult<Self> {
        let payload = bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| DmmError::codec("broadcast", e))?;
        Ok(Self {
            payload,
            _value: PhantomData,
        })
    }

    /// Encoded size shipped to each worker
    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }

    /// A private decoded copy of the value
    pub fn value(&self) -> DmmResult<V> {
        let (value, _): (V, usize) =
            bincode::serde::decode_from_slice(&self.payload, bincode::config::standard())
                .map_err(|e| DmmError::codec("broadcast", e))?;
        Ok(value)
    }
}
