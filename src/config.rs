//! Configuration for collatekv
//!
//! Centralized configuration with sensible defaults, plus the compile-time
//! constants that size the partitioning and iteration machinery.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

// =============================================================================
// Compile-Time Constants
// =============================================================================

/// Number of key partitions. Must be a power of two so that partition
/// selection reduces to masking the low bits of the key hash.
pub const PARTITION_COUNT: usize = 1 << 9;

/// Memory budget for one in-memory partition buffer, in bytes. A partition
/// buffer is flushed to its disk file once it holds this many bytes of pairs.
pub const PARTITION_BUF_MEM: usize = 1024 * 1024;

/// Memory budget for an iterator's scalar read buffer, in bytes.
pub const ITER_READ_MEM: usize = 5 * 1024 * 1024;

/// Default number of staging buffers in the buffer pool.
pub const DEFAULT_BUF_COUNT: usize = 16;

/// File extension of the temporary partition files.
pub const PARTITION_FILE_EXT: &str = "part";

// =============================================================================
// Config
// =============================================================================

/// Main configuration for a collator instance
#[derive(Debug, Clone)]
pub struct Config {
    /// Path prefix for the temporary partition files. Partition `p` lives at
    /// `<work_prefix>.<p>.part`.
    pub work_prefix: PathBuf,

    /// Number of staging buffers shared between the producers and the mapper.
    /// Should be at least the producer count; twice that is a good heuristic,
    /// since producers spin when no free buffer is available.
    pub buf_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_prefix: PathBuf::from("."),
            buf_count: DEFAULT_BUF_COUNT,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Disk path of the partition file with ID `p_id`
    pub fn partition_file_path(&self, p_id: usize) -> PathBuf {
        partition_file_path(&self.work_prefix, p_id)
    }
}

/// Disk path of partition `p_id` under the prefix `work_prefix`
pub(crate) fn partition_file_path(work_prefix: &Path, p_id: usize) -> PathBuf {
    let mut path = OsString::from(work_prefix.as_os_str());
    path.push(format!(".{}.{}", p_id, PARTITION_FILE_EXT));
    PathBuf::from(path)
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the path prefix for the partition files
    pub fn work_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.config.work_prefix = prefix.into();
        self
    }

    /// Set the staging buffer count
    pub fn buf_count(mut self, count: usize) -> Self {
        self.config.buf_count = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
