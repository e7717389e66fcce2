//! Mapper thread
//!
//! The single background thread that drains deposited buffers and routes
//! each pair to the partition selected by the low bits of its key hash.
//! Busy-polling is deliberate: the per-buffer work is CPU-bound, and the
//! handshake latency must stay below the producers' refill latency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::utils::Backoff;

use crate::buffer::{BufferPool, StagingBuffer};
use crate::config::PARTITION_COUNT;
use crate::error::Result;
use crate::hasher::KeyHasher;
use crate::pair::RawRecord;

use super::partition::PartitionWriter;

/// Mapper loop. Runs until the deposit stream is closed *and* the full set
/// has been drained, then hands the partition writers back to the collator
/// through the thread's join handle.
pub(crate) fn run<K, V, H>(
    pool: Arc<BufferPool<K, V>>,
    stream_incoming: Arc<AtomicBool>,
    mut partitions: Vec<PartitionWriter<K, V>>,
    hasher: H,
) -> Result<Vec<PartitionWriter<K, V>>>
where
    K: RawRecord,
    V: RawRecord,
    H: KeyHasher<K>,
{
    tracing::debug!("mapper started");

    let mut routed: u64 = 0;
    let backoff = Backoff::new();

    // The full set must drain even after the stream closes: a producer may
    // have submitted its last buffer right before flipping the flag.
    while stream_incoming.load(Ordering::Acquire) || pool.full_count() > 0 {
        match pool.fetch_full() {
            Some(mut buf) => {
                let res = route_buffer(&mut partitions, &hasher, &buf);
                routed += buf.len() as u64;

                // Return the buffer to the free set before surfacing any
                // flush error, so teardown still sees a quiescent pool.
                buf.clear();
                pool.return_free(buf);
                res?;

                backoff.reset();
            }
            None => backoff.snooze(),
        }
    }

    tracing::debug!(pairs = routed, "mapper drained and stopping");
    Ok(partitions)
}

/// Route every pair of one deposited buffer to its partition writer
fn route_buffer<K, V, H>(
    partitions: &mut [PartitionWriter<K, V>],
    hasher: &H,
    buf: &StagingBuffer<K, V>,
) -> Result<()>
where
    K: RawRecord,
    V: RawRecord,
    H: KeyHasher<K>,
{
    for &pair in buf.pairs() {
        let p_id = hasher.hash(&pair.key) as usize & (PARTITION_COUNT - 1);
        partitions[p_id].append(pair)?;
    }
    Ok(())
}
