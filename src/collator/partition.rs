//! Partition writer
//!
//! One writer per partition: an in-memory run of pairs and an append-only
//! disk file. The run is flushed as a single raw byte range whenever it
//! reaches the partition memory budget, and once more at close for the
//! remainder.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::config::PARTITION_BUF_MEM;
use crate::error::Result;
use crate::pair::{pairs_as_bytes, Pair, RawRecord};

/// Buffered append-only writer for one partition file
pub(crate) struct PartitionWriter<K, V> {
    /// Output file path, `<work_prefix>.<p>.part`
    path: PathBuf,

    /// In-memory run, flushed at `threshold()` pairs
    buf: Vec<Pair<K, V>>,

    /// Append-only partition file
    file: File,

    /// Pairs flushed to disk so far
    flushed: u64,
}

impl<K: RawRecord, V: RawRecord> PartitionWriter<K, V> {
    /// Flush threshold in pairs: the partition memory budget divided by the
    /// record stride.
    pub(crate) const fn threshold() -> usize {
        PARTITION_BUF_MEM / std::mem::size_of::<Pair<K, V>>()
    }

    /// Open (and truncate) the partition file and pre-reserve the run
    pub(crate) fn create(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            path,
            buf: Vec::with_capacity(Self::threshold()),
            file,
            flushed: 0,
        })
    }

    /// Append one pair, flushing if the run reaches the threshold
    pub(crate) fn append(&mut self, pair: Pair<K, V>) -> Result<()> {
        self.buf.push(pair);

        debug_assert!(self.buf.len() <= Self::threshold());
        if self.buf.len() == Self::threshold() {
            self.flush()?;
        }

        Ok(())
    }

    /// Write the run to disk as one raw byte range and clear it, keeping the
    /// reserved capacity
    pub(crate) fn flush(&mut self) -> Result<()> {
        self.file.write_all(pairs_as_bytes(&self.buf))?;
        self.flushed += self.buf.len() as u64;

        tracing::trace!(
            partition = %self.path.display(),
            pairs = self.buf.len(),
            "flushed partition run"
        );

        self.buf.clear();
        Ok(())
    }

    /// Flush the remainder, release the run's memory, and close the file.
    /// Returns the total pair count written to this partition.
    pub(crate) fn finish(mut self) -> Result<u64> {
        if !self.buf.is_empty() {
            self.flush()?;
        }
        Ok(self.flushed)
    }
}
