//! # collatekv
//!
//! An external-memory key-value collator:
//! - Concurrent deposits from many producers, unblocked by a recycled
//!   staging-buffer pool
//! - Hash partitioning onto disk through a single background mapper
//! - Parallel per-partition sorting
//! - Key-grouped and batched iteration over the sorted result
//!
//! Collections may be far larger than memory; only one partition buffer
//! (1 MiB) per partition plus the staging buffers are ever resident during
//! deposit, and collation touches one partition per worker at a time.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────┐  ┌──────────┐       ┌──────────┐
//! │ Producer │  │ Producer │  ...  │ Producer │
//! └────┬─────┘  └────┬─────┘       └────┬─────┘
//!      │ acquire_buffer / submit_buffer │
//! ┌────▼─────────────▼─────────────────▼───────┐
//! │                Buffer Pool                  │
//! │           (free set / full set)             │
//! └─────────────────────┬───────────────────────┘
//!                       │ fetch_full / return_free
//! ┌─────────────────────▼───────────────────────┐
//! │                   Mapper                    │
//! │        hash(key) & (PARTITION_COUNT-1)      │
//! └─────────────────────┬───────────────────────┘
//!                       │ flush at threshold
//! ┌─────────────────────▼───────────────────────┐
//! │    <prefix>.0.part ... <prefix>.511.part    │
//! │   (collate: per-partition parallel sort)    │
//! └─────────────────────┬───────────────────────┘
//!                       │
//!               ┌───────▼────────┐
//!               │  KeyValueIter  │
//!               │ (keys/batches) │
//!               └────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod pair;
pub mod hasher;
pub mod sync;
pub mod buffer;
pub mod collator;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CollateError, Result};
pub use config::{Config, ConfigBuilder, DEFAULT_BUF_COUNT, PARTITION_COUNT};
pub use pair::{Pair, RawRecord};
pub use hasher::{DefaultKeyHasher, IdentityHasher, KeyHasher};
pub use buffer::StagingBuffer;
pub use collator::{Collator, KeyValueIter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of collatekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
