//! Shuffle writer, exchange and reader
//!
//! Map tasks never hand records to each other directly. A [`ShuffleWriter`]
//! encodes each record with bincode into the bucket of its destination
//! reducer; when the task's buffered bytes exceed the session's spill
//! threshold every bucket is flushed to a file in the scratch directory.
//! [`exchange`] then hands reducer `r` bucket `r` of every map output, and
//! [`read_blocks`] decodes them on the reducer side.
//!
//! Encoded bytes are the stage's shuffle write/read counters. Records are
//! concatenated without framing: bincode reports how many bytes each decode
//! consumed.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing::debug;

use dmm_core::{DmmError, DmmResult};

use crate::session::TaskContext;

/// Encoded records from one map task for one reducer
#[derive(Debug, Default)]
pub struct ShuffleBlock {
    memory: Vec<u8>,
    files: Vec<PathBuf>,
}

impl ShuffleBlock {
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty() && self.files.is_empty()
    }
}

/// All buckets written by one map task, indexed by reducer
#[derive(Debug, Default)]
pub struct MapOutput {
    blocks: Vec<ShuffleBlock>,
    records: u64,
}

impl MapOutput {
    pub fn reducers(&self) -> usize {
        self.blocks.len()
    }

    /// Records written by the map task
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Encoded bytes still held in memory, i.e. not spilled
    pub fn memory_bytes(&self) -> u64 {
        self.blocks.iter().map(|b| b.memory.len() as u64).sum()
    }
}

/// Per-task shuffle writer
pub struct ShuffleWriter<'a, R> {
    ctx: &'a TaskContext<'a>,
    shuffle: &'static str,
    buffers: Vec<Vec<u8>>,
    files: Vec<Vec<PathBuf>>,
    buffered: usize,
    spills: usize,
    records: u64,
    _record: PhantomData<fn(&R)>,
}

impl<'a, R: Serialize> ShuffleWriter<'a, R> {
    /// Writer for `reducers` destinations; `shuffle` names the spill files
    pub fn new(ctx: &'a TaskContext<'a>, shuffle: &'static str, reducers: usize) -> Self {
        Self {
            ctx,
            shuffle,
            buffers: (0..reducers).map(|_| Vec::new()).collect(),
            files: (0..reducers).map(|_| Vec::new()).collect(),
            buffered: 0,
            spills: 0,
            records: 0,
            _record: PhantomData,
        }
    }

    /// Append `record` to the bucket of `reducer`
    pub fn write(&mut self, reducer: usize, record: &R) -> DmmResult<()> {
        let buffer = self.buffers.get_mut(reducer).ok_or_else(|| {
            DmmError::execution(
                self.ctx.stage(),
                format!("record routed to reducer {} of {}", reducer, self.files.len()),
            )
        })?;
        let written =
            bincode::serde::encode_into_std_write(record, buffer, bincode::config::standard())
                .map_err(|e| DmmError::codec("shuffle write", e))?;

        self.buffered += written;
        self.records += 1;
        self.ctx.add_shuffle_write(written as u64);

        if self.buffered > self.ctx.spill_threshold_bytes() {
            self.spill()?;
        }
        Ok(())
    }

    /// Flush every non-empty bucket to its own spill file
    fn spill(&mut self) -> DmmResult<()> {
        let mut disk_bytes = 0u64;
        for (reducer, buffer) in self.buffers.iter_mut().enumerate() {
            if buffer.is_empty() {
                continue;
            }
            let path = self.ctx.scratch_dir().join(format!(
                "{}-s{}-m{}-r{}-{}.bin",
                self.shuffle,
                self.ctx.stage_id(),
                self.ctx.partition(),
                reducer,
                self.spills
            ));
            std::fs::write(&path, buffer.as_slice())?;
            disk_bytes += buffer.len() as u64;
            buffer.clear();
            self.files[reducer].push(path);
        }
        debug!(
            shuffle = self.shuffle,
            buffered = self.buffered,
            disk_bytes,
            spill = self.spills,
            "spilled shuffle buffers"
        );
        self.ctx.add_spill(self.buffered as u64, disk_bytes);
        self.buffered = 0;
        self.spills += 1;
        Ok(())
    }

    /// Close the writer, keeping unspilled buckets in memory
    pub fn finish(self) -> MapOutput {
        let blocks = self
            .buffers
            .into_iter()
            .zip(self.files)
            .map(|(memory, files)| ShuffleBlock { memory, files })
            .collect();
        MapOutput {
            blocks,
            records: self.records,
        }
    }
}

/// Redistribute map outputs: reducer `r` receives bucket `r` of every output
///
/// This is the shuffle barrier: it consumes every map output, so it can only
/// run once the map stage has completed.
pub fn exchange(outputs: Vec<MapOutput>, reducers: usize) -> DmmResult<Vec<Vec<ShuffleBlock>>> {
    let mut inboxes: Vec<Vec<ShuffleBlock>> =
        (0..reducers).map(|_| Vec::with_capacity(outputs.len())).collect();
    for (map, output) in outputs.into_iter().enumerate() {
        if output.reducers() != reducers {
            return Err(DmmError::execution(
                "exchange",
                format!(
                    "map output {} has {} buckets, expected {}",
                    map,
                    output.reducers(),
                    reducers
                ),
            ));
        }
        for (inbox, block) in inboxes.iter_mut().zip(output.blocks) {
            if !block.is_empty() {
                inbox.push(block);
            }
        }
    }
    Ok(inboxes)
}

/// Decode every record of `blocks`, deleting spill files once read
pub fn read_blocks<R: DeserializeOwned>(
    ctx: &TaskContext<'_>,
    blocks: Vec<ShuffleBlock>,
) -> DmmResult<Vec<R>> {
    let mut records = Vec::new();
    for block in blocks {
        for path in block.files {
            let bytes = std::fs::read(&path)?;
            ctx.add_shuffle_read(bytes.len() as u64);
            decode_all(&bytes, &mut records)?;
            std::fs::remove_file(&path)?;
        }
        ctx.add_shuffle_read(block.memory.len() as u64);
        decode_all(&block.memory, &mut records)?;
    }
    Ok(records)
}

fn decode_all<R: DeserializeOwned>(bytes: &[u8], out: &mut Vec<R>) -> DmmResult<()> {
    let mut offset = 0;
    while offset < bytes.len() {
        let (record, used): (R, usize) =
            bincode::serde::decode_from_slice(&bytes[offset..], bincode::config::standard())
                .map_err(|e| DmmError::codec("shuffle read", e))?;
        if used == 0 {
            return Err(DmmError::codec("shuffle read", "decoder made no progress"));
        }
        offset += used;
        out.push(record);
    }
    Ok(())
}
