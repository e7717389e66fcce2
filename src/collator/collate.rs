//! Collation workers
//!
//! After the deposit stream closes, each partition file holds its pairs in
//! arrival order. Collation rewrites every file in sorted order: worker `w`
//! of `W` owns partitions `w, w + W, w + 2W, …`, so no two workers ever touch
//! the same partition and no queue or lock is needed.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::mem;
use std::path::Path;
use std::thread;

use crate::config::{partition_file_path, PARTITION_COUNT};
use crate::error::{CollateError, Result};
use crate::pair::{pairs_as_bytes, pairs_as_bytes_mut, Pair, RawRecord};

/// Sort every partition file under `work_prefix` using `worker_count` threads
pub(crate) fn sort_all_partitions<K, V>(work_prefix: &Path, worker_count: usize) -> Result<()>
where
    K: RawRecord + Ord,
    V: RawRecord + Ord,
{
    let worker_count = worker_count.clamp(1, PARTITION_COUNT);

    let mut workers = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let work_prefix = work_prefix.to_path_buf();
        let handle = thread::Builder::new()
            .name(format!("collate-worker-{}", worker_id))
            .spawn(move || sort_worker::<K, V>(&work_prefix, worker_id, worker_count))
            .map_err(|e| CollateError::Thread(format!("failed to spawn collation worker: {}", e)))?;
        workers.push(handle);
    }

    let mut first_err = None;
    for handle in workers {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => first_err = first_err.or(Some(e)),
            Err(_) => {
                first_err = first_err
                    .or_else(|| Some(CollateError::Thread("collation worker panicked".into())));
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Sort the partitions assigned to one worker by stride
fn sort_worker<K, V>(work_prefix: &Path, worker_id: usize, stride: usize) -> Result<()>
where
    K: RawRecord + Ord,
    V: RawRecord + Ord,
{
    let pair_size = mem::size_of::<Pair<K, V>>();

    // One scratch allocation per worker, sized by its largest assigned file.
    let mut max_bytes: u64 = 0;
    for p_id in (worker_id..PARTITION_COUNT).step_by(stride) {
        let len = fs::metadata(partition_file_path(work_prefix, p_id))?.len();
        max_bytes = max_bytes.max(len);
    }
    let mut scratch = vec![Pair::<K, V>::zeroed(); max_bytes as usize / pair_size];

    let mut sorted_partitions = 0usize;
    for p_id in (worker_id..PARTITION_COUNT).step_by(stride) {
        let path = partition_file_path(work_prefix, p_id);

        let byte_len = fs::metadata(&path)?.len() as usize;
        if byte_len % pair_size != 0 {
            return Err(CollateError::Corrupt(format!(
                "{}: length {} is not a multiple of the {}-byte record stride",
                path.display(),
                byte_len,
                pair_size
            )));
        }

        let records = &mut scratch[..byte_len / pair_size];
        if !records.is_empty() {
            File::open(&path)?.read_exact(pairs_as_bytes_mut(records))?;
            records.sort_unstable();
        }

        // Unlink before rewriting: the sorted output must land on a fresh
        // inode, as overwriting the just-persisted one can stall on its
        // background flush.
        fs::remove_file(&path)?;
        File::create(&path)?.write_all(pairs_as_bytes(records))?;

        sorted_partitions += 1;
    }

    tracing::debug!(
        worker = worker_id,
        partitions = sorted_partitions,
        "collation worker finished"
    );
    Ok(())
}
