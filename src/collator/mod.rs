//! Collator
//!
//! Lifecycle owner for one collation: accepts deposits from many producers
//! through the buffer pool, routes them to hash partitions via the background
//! mapper, sorts every partition in parallel, and exposes iterators over the
//! result.
//!
//! ## Lifecycle
//!
//! `Open` → `Closed` → `Collated`, one way only. Deposits are accepted while
//! `Open`; `close_deposits` joins the mapper and seals the partition files;
//! `collate` sorts them; iterators are available once collated. A collator is
//! single-use.

mod collate;
mod mapper;
mod partition;

pub mod iter;

pub use iter::KeyValueIter;

use std::fs;
use std::marker::PhantomData;
use std::mem;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::utils::Backoff;

use crate::buffer::{BufferPool, StagingBuffer};
use crate::config::{Config, PARTITION_BUF_MEM, PARTITION_COUNT};
use crate::error::{CollateError, Result};
use crate::hasher::{DefaultKeyHasher, KeyHasher};
use crate::pair::{Pair, RawRecord};

use partition::PartitionWriter;

/// Lifecycle states, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Accepting deposits; the mapper is running
    Open,
    /// Deposit stream closed; partition files sealed, unsorted
    Closed,
    /// Partition files sorted; ready for iteration
    Collated,
}

/// External-memory key-value collator
///
/// Accepts `(key, value)` deposits from many concurrent producers, hash-
/// partitions them onto disk, sorts each partition, and iterates the result
/// in key-grouped order. `H` supplies the key hash that selects partitions;
/// it must be deterministic for the lifetime of the collator.
///
/// The working files live at `<work_prefix>.<p>.part` and are removed when
/// the collator is dropped.
pub struct Collator<K, V, H = DefaultKeyHasher>
where
    K: RawRecord,
    V: RawRecord,
{
    config: Config,

    /// Free/full staging-buffer sets shared with the producers and the mapper
    pool: Arc<BufferPool<K, V>>,

    /// Cleared by `close_deposits`; the mapper drains and exits once clear
    stream_incoming: Arc<AtomicBool>,

    /// The background mapper; `None` once joined
    mapper: Option<JoinHandle<Result<Vec<PartitionWriter<K, V>>>>>,

    lifecycle: Lifecycle,

    _hasher: PhantomData<fn() -> H>,
}

impl<K, V, H> Collator<K, V, H>
where
    K: RawRecord + Ord,
    V: RawRecord + Ord,
    H: KeyHasher<K> + 'static,
{
    /// Construct a collator and start its mapper thread
    ///
    /// Opens all `PARTITION_COUNT` partition files under the configured work
    /// prefix in truncate mode and stocks the buffer pool with
    /// `config.buf_count` empty staging buffers.
    pub fn new(config: Config) -> Result<Self> {
        const {
            assert!(
                mem::size_of::<Pair<K, V>>() > 0,
                "zero-sized pair records are not supported"
            );
            assert!(
                mem::size_of::<Pair<K, V>>() <= PARTITION_BUF_MEM,
                "pair record exceeds the partition memory budget"
            );
            // Raw-byte partition I/O requires the in-memory and on-disk
            // layouts to match bit-exactly.
            assert!(
                mem::size_of::<Pair<K, V>>() == mem::size_of::<K>() + mem::size_of::<V>(),
                "Pair<K, V> must be padding-free; pick key/value widths with a common alignment"
            );
        }

        if config.buf_count == 0 {
            return Err(CollateError::Config("buf_count must be at least 1".into()));
        }

        let mut partitions = Vec::with_capacity(PARTITION_COUNT);
        for p_id in 0..PARTITION_COUNT {
            partitions.push(PartitionWriter::create(config.partition_file_path(p_id))?);
        }

        let pool = Arc::new(BufferPool::new(config.buf_count));
        let stream_incoming = Arc::new(AtomicBool::new(true));

        let mapper = thread::Builder::new()
            .name("collate-mapper".to_string())
            .spawn({
                let pool = Arc::clone(&pool);
                let stream_incoming = Arc::clone(&stream_incoming);
                move || mapper::run(pool, stream_incoming, partitions, H::default())
            })
            .map_err(|e| CollateError::Thread(format!("failed to spawn mapper: {}", e)))?;

        tracing::debug!(
            partitions = PARTITION_COUNT,
            buf_count = config.buf_count,
            flush_threshold = PartitionWriter::<K, V>::threshold(),
            "collator created"
        );

        Ok(Self {
            config,
            pool,
            stream_incoming,
            mapper: Some(mapper),
            lifecycle: Lifecycle::Open,
            _hasher: PhantomData,
        })
    }

    // -------------------------------------------------------------------------
    // Deposit path
    // -------------------------------------------------------------------------

    /// Check a free staging buffer out of the pool, spinning until one is
    /// available
    ///
    /// Every acquired buffer must eventually come back through
    /// [`submit_buffer`](Self::submit_buffer); the pool never grows, so a
    /// dropped buffer starves the producers and trips the teardown check.
    /// The spin is unbounded but transient provided `buf_count` is at least
    /// the producer count.
    pub fn acquire_buffer(&self) -> StagingBuffer<K, V> {
        let backoff = Backoff::new();
        loop {
            if let Some(buf) = self.pool.fetch_free() {
                return buf;
            }
            backoff.snooze();
        }
    }

    /// Hand a filled buffer to the mapper
    pub fn submit_buffer(&self, buf: StagingBuffer<K, V>) {
        self.pool.return_full(buf);
    }

    /// Copy-in convenience: deposit a slice of pairs through one buffer
    pub fn deposit(&self, pairs: &[(K, V)]) {
        let mut buf = self.acquire_buffer();
        for &(key, value) in pairs {
            buf.push(key, value);
        }
        self.submit_buffer(buf);
    }

    /// Number of staging buffers currently in the free set
    pub fn free_buffer_count(&self) -> usize {
        self.pool.free_count()
    }

    /// Number of staging buffers currently in the full set
    pub fn full_buffer_count(&self) -> usize {
        self.pool.full_count()
    }

    // -------------------------------------------------------------------------
    // Close and collate
    // -------------------------------------------------------------------------

    /// Close the deposit stream: join the mapper, flush every partition's
    /// in-memory remainder, and seal the partition files
    ///
    /// All deposits must have been submitted before this call; producers must
    /// not touch the collator afterwards.
    pub fn close_deposits(&mut self) -> Result<()> {
        if self.lifecycle != Lifecycle::Open {
            return Err(CollateError::Misuse(
                "deposit stream is already closed".into(),
            ));
        }

        self.stream_incoming.store(false, Ordering::Release);

        let mapper = self
            .mapper
            .take()
            .ok_or_else(|| CollateError::Thread("mapper thread missing".into()))?;
        let partitions = mapper
            .join()
            .map_err(|_| CollateError::Thread("mapper thread panicked".into()))??;

        let mut total: u64 = 0;
        for writer in partitions {
            total += writer.finish()?;
        }
        self.lifecycle = Lifecycle::Closed;

        tracing::info!(pairs = total, "deposit stream closed");
        Ok(())
    }

    /// Sort every partition file with `thread_count` parallel workers
    ///
    /// Blocks until all workers finish. Afterwards each partition file holds
    /// its pairs in ascending `(key, value)` order.
    pub fn collate(&mut self, thread_count: usize) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Open => {
                return Err(CollateError::Misuse(
                    "deposit stream must be closed before collating".into(),
                ))
            }
            Lifecycle::Collated => {
                return Err(CollateError::Misuse("collection already collated".into()))
            }
            Lifecycle::Closed => {}
        }

        let started = Instant::now();
        collate::sort_all_partitions::<K, V>(&self.config.work_prefix, thread_count)?;
        self.lifecycle = Lifecycle::Collated;

        tracing::info!(
            threads = thread_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "collation complete"
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Iteration
    // -------------------------------------------------------------------------

    /// An iterator positioned at the start of the collated collection
    pub fn iter(&self) -> Result<KeyValueIter<'_, K, V>> {
        if self.lifecycle != Lifecycle::Collated {
            return Err(CollateError::Misuse(
                "collection must be collated before iterating".into(),
            ));
        }
        KeyValueIter::begin(&self.config.work_prefix)
    }

    /// The past-the-end iterator
    pub fn iter_end(&self) -> KeyValueIter<'_, K, V> {
        KeyValueIter::end(&self.config.work_prefix)
    }
}

impl<K, V, H> Drop for Collator<K, V, H>
where
    K: RawRecord,
    V: RawRecord,
{
    /// Teardown is strict: the mapper must have been joined and every staging
    /// buffer must be back in the free set, otherwise deposited data would be
    /// silently lost. Violations abort the process, as does failing to remove
    /// a partition file.
    fn drop(&mut self) {
        if self.mapper.is_some() {
            eprintln!("collator dropped while its mapper thread is still running; aborting");
            process::abort();
        }

        if self.pool.full_count() != 0 || self.pool.free_count() != self.config.buf_count {
            eprintln!("collator dropped with staging buffers still outstanding; aborting");
            process::abort();
        }

        for p_id in 0..PARTITION_COUNT {
            let path = self.config.partition_file_path(p_id);
            if let Err(e) = fs::remove_file(&path) {
                eprintln!(
                    "failed to remove partition file {}: {}; aborting",
                    path.display(),
                    e
                );
                process::abort();
            }
        }

        tracing::debug!(partitions = PARTITION_COUNT, "partition files removed");
    }
}
