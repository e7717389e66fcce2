//! Error types for collatekv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using CollateError
pub type Result<T> = std::result::Result<T, CollateError>;

/// Unified error type for collator operations
#[derive(Debug, Error)]
pub enum CollateError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Partition Errors
    // -------------------------------------------------------------------------
    #[error("Partition file corrupt: {0}")]
    Corrupt(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Thread error: {0}")]
    Thread(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Collator misuse: {0}")]
    Misuse(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
