//! Key hashing
//!
//! Keys are routed to partitions by the low bits of a caller-supplied hash.
//! The hasher must be deterministic and pure: the same key must map to the
//! same partition for the lifetime of the collator.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Maps keys to a numeric address space for partition routing
pub trait KeyHasher<K>: Default {
    /// Hash `key`. Only the low `log2(PARTITION_COUNT)` bits select the
    /// partition, so the low bits must carry entropy.
    fn hash(&self, key: &K) -> u64;
}

/// Passes integer keys through unchanged
///
/// With a power-of-two partition count this routes key `k` to partition
/// `k % PARTITION_COUNT`, which is handy when keys are already uniform.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityHasher;

macro_rules! impl_identity_hasher {
    ($($t:ty),*) => {
        $(
            impl KeyHasher<$t> for IdentityHasher {
                fn hash(&self, key: &$t) -> u64 {
                    *key as u64
                }
            }
        )*
    };
}

impl_identity_hasher!(u8, u16, u32, u64, usize);

/// Hashes any `Hash` key with SipHash
///
/// Uses `DefaultHasher::new()`, which is keyed with fixed constants, so the
/// mapping is deterministic across collator instances and runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultKeyHasher;

impl<K: Hash> KeyHasher<K> for DefaultKeyHasher {
    fn hash(&self, key: &K) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }
}
