//! Concurrency primitives
//!
//! The producer/mapper handshake holds its critical sections for the duration
//! of one handle move, so mutual exclusion is a user-space spin lock rather
//! than a kernel mutex.

pub mod pool;
pub mod spin_lock;

pub use pool::ObjectPool;
pub use spin_lock::{SpinGuard, SpinLock};
