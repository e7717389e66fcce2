//! Key-value iteration over a collated collection
//!
//! Visits the sorted partition files sequentially, partition 0 through
//! partition `PARTITION_COUNT - 1`. Within a partition pairs appear in
//! sorted `(key, value)` order; across partitions the order follows partition
//! ID, so the full traversal is *partition-major*, not a single global key
//! order. A key never spans partitions (hashing routes it to exactly one),
//! so key groups are still contiguous.
//!
//! Two read modes share the partition cursor:
//! - scalar key-grouped iteration ([`KeyValueIter::key`] /
//!   [`KeyValueIter::advance`]), buffered through an internal read buffer;
//! - batched raw reads ([`KeyValueIter::read`]), thread-safe under the
//!   cursor's spin lock, filling a caller-supplied slice directly.

use std::fs::File;
use std::io::Read;
use std::marker::PhantomData;
use std::mem;
use std::path::{Path, PathBuf};
use std::process;
use std::ptr;

use crate::config::{partition_file_path, ITER_READ_MEM, PARTITION_COUNT};
use crate::error::{CollateError, Result};
use crate::pair::{pairs_as_bytes_mut, Pair, RawRecord};
use crate::sync::SpinLock;

// =============================================================================
// Cursor
// =============================================================================

/// Position within the concatenation of partition files
///
/// Invariant: after construction, `file` is `Some` iff `at_end` is `false`.
struct Cursor {
    /// The currently open partition file
    file: Option<File>,

    /// ID of the partition `file` belongs to
    partition: usize,

    /// Absolute pair index into the collated collection
    pos: u64,

    /// Whether the last partition has been exhausted
    at_end: bool,
}

// =============================================================================
// KeyValueIter
// =============================================================================

/// Cursor over a collated key-value collection
///
/// Borrows the collator so the partition files outlive every reader.
pub struct KeyValueIter<'c, K, V> {
    /// Path prefix of the partition files
    work_prefix: PathBuf,

    /// File cursor, shared between the scalar and batched paths
    state: SpinLock<Cursor>,

    /// Scalar read buffer; allocated on first scalar use
    buf: Vec<Pair<K, V>>,

    /// Pairs currently loaded in `buf`
    buf_len: usize,

    /// Index of the current pair within `buf`
    buf_idx: usize,

    _collator: PhantomData<&'c ()>,
}

impl<K: RawRecord + Ord, V: RawRecord + Ord> KeyValueIter<'_, K, V> {
    /// Scalar read-buffer capacity in pairs
    const fn read_capacity() -> usize {
        let cap = ITER_READ_MEM / mem::size_of::<Pair<K, V>>();
        if cap == 0 {
            1
        } else {
            cap
        }
    }

    /// Construct an iterator at the start of the collection
    ///
    /// Scans forward to the first non-empty partition without consuming any
    /// records, so an empty collection is immediately equal to the end
    /// iterator.
    pub(crate) fn begin(work_prefix: &Path) -> Result<Self> {
        let mut cursor = Cursor {
            file: None,
            partition: 0,
            pos: 0,
            at_end: false,
        };

        while cursor.partition < PARTITION_COUNT {
            let file = File::open(partition_file_path(work_prefix, cursor.partition))?;
            if file.metadata()?.len() > 0 {
                cursor.file = Some(file);
                break;
            }
            cursor.partition += 1;
        }
        if cursor.file.is_none() {
            cursor.at_end = true;
        }

        Ok(Self {
            work_prefix: work_prefix.to_path_buf(),
            state: SpinLock::new(cursor),
            buf: Vec::new(),
            buf_len: 0,
            buf_idx: 0,
            _collator: PhantomData,
        })
    }

    /// Construct the past-the-end sentinel
    pub(crate) fn end(work_prefix: &Path) -> Self {
        Self {
            work_prefix: work_prefix.to_path_buf(),
            state: SpinLock::new(Cursor {
                file: None,
                partition: PARTITION_COUNT,
                pos: 0,
                at_end: true,
            }),
            buf: Vec::new(),
            buf_len: 0,
            buf_idx: 0,
            _collator: PhantomData,
        }
    }

    // -------------------------------------------------------------------------
    // Scalar key-grouped iteration
    // -------------------------------------------------------------------------

    /// The key of the current pair, or `None` once the collection is
    /// exhausted
    pub fn key(&mut self) -> Result<Option<K>> {
        self.ensure_loaded()?;
        Ok((self.buf_idx < self.buf_len).then(|| self.buf[self.buf_idx].key))
    }

    /// Advance past every pair sharing the current key, stopping at the first
    /// differing key or at the end. A no-op once exhausted.
    pub fn advance(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        if self.buf_idx >= self.buf_len {
            return Ok(());
        }

        let current_key = self.buf[self.buf_idx].key;
        loop {
            self.buf_idx += 1;
            self.ensure_loaded()?;
            if self.buf_idx >= self.buf_len || self.buf[self.buf_idx].key != current_key {
                return Ok(());
            }
        }
    }

    /// Refill the scalar buffer when it is exhausted
    fn ensure_loaded(&mut self) -> Result<()> {
        if self.buf_idx < self.buf_len {
            return Ok(());
        }

        if self.state.get_mut().at_end {
            self.buf_len = 0;
            self.buf_idx = 0;
            return Ok(());
        }

        if self.buf.is_empty() {
            self.buf = vec![Pair::zeroed(); Self::read_capacity()];
        }

        self.buf_len = fill_from_files(self.state.get_mut(), &self.work_prefix, &mut self.buf)?;
        self.buf_idx = 0;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Batched parallel reads
    // -------------------------------------------------------------------------

    /// Read up to `out.len()` pairs into `out`, returning the number read.
    /// Returns 0 exactly when the collection is exhausted.
    ///
    /// Thread-safe: any number of threads may share one iterator and drain
    /// the collection cooperatively. Each call observes a consistent cursor,
    /// but pairs are handed out in partition order across callers, not per
    /// caller.
    pub fn read(&self, out: &mut [Pair<K, V>]) -> Result<usize> {
        let mut cursor = self.state.lock();
        fill_from_files(&mut cursor, &self.work_prefix, out)
    }

    /// Absolute pair index: how many pairs this iterator has consumed from
    /// the collection across both read paths
    pub fn position(&self) -> u64 {
        self.state.lock().pos
    }
}

// =============================================================================
// Shared file-advance logic
// =============================================================================

/// Fill `out` from the cursor's current partition, advancing to later
/// partitions until some pairs are read or the collection ends
fn fill_from_files<K: RawRecord, V: RawRecord>(
    cursor: &mut Cursor,
    work_prefix: &Path,
    out: &mut [Pair<K, V>],
) -> Result<usize> {
    if out.is_empty() {
        return Ok(0);
    }

    loop {
        if cursor.at_end {
            return Ok(0);
        }

        let file = cursor
            .file
            .as_mut()
            .expect("live cursor with no open partition file");
        let read = read_pairs(file, out)?;
        if read > 0 {
            cursor.pos += read as u64;
            return Ok(read);
        }

        // Current partition exhausted; the assignment closes its file.
        cursor.partition += 1;
        if cursor.partition == PARTITION_COUNT {
            cursor.file = None;
            cursor.at_end = true;
            return Ok(0);
        }
        cursor.file = Some(File::open(partition_file_path(
            work_prefix,
            cursor.partition,
        ))?);
    }
}

/// Read whole pairs from `file` until `out` is full or the file ends
fn read_pairs<K: RawRecord, V: RawRecord>(
    file: &mut File,
    out: &mut [Pair<K, V>],
) -> Result<usize> {
    let pair_size = mem::size_of::<Pair<K, V>>();
    let bytes = pairs_as_bytes_mut(out);

    let mut filled = 0;
    while filled < bytes.len() {
        let n = file.read(&mut bytes[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    // Partition files always hold a whole number of records.
    if filled % pair_size != 0 {
        return Err(CollateError::Corrupt(format!(
            "partition file ended mid-record ({} trailing bytes)",
            filled % pair_size
        )));
    }

    Ok(filled / pair_size)
}

// =============================================================================
// Equality and copying
// =============================================================================

impl<K, V> PartialEq for KeyValueIter<'_, K, V> {
    /// Two iterators are equal iff they are the same iterator, or neither has
    /// an open file and both agree on being at the end
    fn eq(&self, other: &Self) -> bool {
        if ptr::eq(self, other) {
            return true;
        }

        // Lock both cursors in address order so concurrent comparisons
        // cannot deadlock.
        let (first, second) = if (self as *const Self) < (other as *const Self) {
            (self, other)
        } else {
            (other, self)
        };
        let a = first.state.lock();
        let b = second.state.lock();

        match (&a.file, &b.file) {
            (None, None) => a.at_end == b.at_end,
            // Distinct iterators never share a file handle, so two in-use
            // iterators only compare equal reflexively.
            _ => false,
        }
    }
}

impl<K, V> Eq for KeyValueIter<'_, K, V> {}

impl<K, V> Clone for KeyValueIter<'_, K, V> {
    /// Copying is only valid for iterators that have not begun reading (no
    /// open file, no read buffer). Copying an in-use iterator aborts the
    /// process: the clone would alias the original's file offset.
    fn clone(&self) -> Self {
        let cursor = self.state.lock();
        if cursor.file.is_some() || !self.buf.is_empty() {
            eprintln!("cannot copy a key-value iterator that has begun reading; aborting");
            process::abort();
        }

        Self {
            work_prefix: self.work_prefix.clone(),
            state: SpinLock::new(Cursor {
                file: None,
                partition: cursor.partition,
                pos: cursor.pos,
                at_end: cursor.at_end,
            }),
            buf: Vec::new(),
            buf_len: 0,
            buf_idx: 0,
            _collator: PhantomData,
        }
    }
}
