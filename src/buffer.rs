//! Staging buffers and the buffer pool
//!
//! Producers deposit pairs into staging buffers checked out of a shared pool.
//! A buffer is either *free* (empty, waiting for a producer) or *full*
//! (deposited, waiting for the mapper). Buffers move by value through the two
//! pools, so ownership of the backing storage always has exactly one holder:
//! the free set, the full set, a producer, or the mapper.

use crate::pair::{Pair, RawRecord};
use crate::sync::ObjectPool;

// =============================================================================
// StagingBuffer
// =============================================================================

/// An ordered run of pairs moving between a producer, the full set, and the
/// mapper
///
/// Pairs within one buffer keep their deposit order through the mapper's
/// routing. No order holds between buffers, even from the same producer.
#[derive(Debug)]
pub struct StagingBuffer<K, V> {
    pairs: Vec<Pair<K, V>>,
}

impl<K: RawRecord, V: RawRecord> StagingBuffer<K, V> {
    pub(crate) fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append one pair
    pub fn push(&mut self, key: K, value: V) {
        self.pairs.push(Pair::new(key, value));
    }

    /// Number of deposited pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// `true` iff no pairs have been deposited
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The deposited pairs, in deposit order
    pub(crate) fn pairs(&self) -> &[Pair<K, V>] {
        &self.pairs
    }

    /// Drop the contents but keep the allocation for the next producer
    pub(crate) fn clear(&mut self) {
        self.pairs.clear();
    }
}

// =============================================================================
// BufferPool
// =============================================================================

/// The free and full staging-buffer sets
///
/// Every buffer created for the pool is in exactly one set or temporarily in
/// flight with a producer or the mapper. The pool does not police the
/// handshake; callers return every buffer they fetch.
pub struct BufferPool<K, V> {
    free: ObjectPool<StagingBuffer<K, V>>,
    full: ObjectPool<StagingBuffer<K, V>>,
}

impl<K: RawRecord, V: RawRecord> BufferPool<K, V> {
    /// Construct a pool stocked with `buf_count` empty buffers in the free set
    pub fn new(buf_count: usize) -> Self {
        let free = ObjectPool::new();
        for _ in 0..buf_count {
            free.push(StagingBuffer::new());
        }

        Self {
            free,
            full: ObjectPool::new(),
        }
    }

    /// Try to take an empty buffer for a producer
    pub fn fetch_free(&self) -> Option<StagingBuffer<K, V>> {
        self.free.fetch()
    }

    /// Try to take a deposited buffer for the mapper
    pub fn fetch_full(&self) -> Option<StagingBuffer<K, V>> {
        self.full.fetch()
    }

    /// Return a drained buffer to the free set
    pub fn return_free(&self, buf: StagingBuffer<K, V>) {
        self.free.push(buf);
    }

    /// Hand a deposited buffer to the full set
    pub fn return_full(&self, buf: StagingBuffer<K, V>) {
        self.full.push(buf);
    }

    /// Number of buffers in the free set
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of buffers in the full set
    pub fn full_count(&self) -> usize {
        self.full.len()
    }
}
