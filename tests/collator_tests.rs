//! Tests for the collator deposit/close/collate lifecycle
//!
//! These tests verify:
//! - Conservation: pairs on disk match pairs deposited
//! - Partitioning: every pair lands in the file its key hash selects
//! - Sortedness of every partition file after collation
//! - Buffer pool quiescence after close
//! - Lifecycle misuse errors

use std::fs;
use std::path::{Path, PathBuf};

use collatekv::{CollateError, Collator, Config, IdentityHasher, PARTITION_COUNT};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

type U32Collator = Collator<u32, u32, IdentityHasher>;

fn setup_work_prefix() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let prefix = temp_dir.path().join("kv");
    (temp_dir, prefix)
}

fn new_collator(prefix: &Path, buf_count: usize) -> U32Collator {
    let config = Config::builder()
        .work_prefix(prefix)
        .buf_count(buf_count)
        .build();
    Collator::new(config).unwrap()
}

/// Read a raw partition file back as native-endian (u32, u32) records
fn read_partition(prefix: &Path, p_id: usize) -> Vec<(u32, u32)> {
    let path = PathBuf::from(format!("{}.{}.part", prefix.display(), p_id));
    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len() % 8, 0, "partition {} holds torn records", p_id);

    bytes
        .chunks_exact(8)
        .map(|c| {
            (
                u32::from_ne_bytes(c[0..4].try_into().unwrap()),
                u32::from_ne_bytes(c[4..8].try_into().unwrap()),
            )
        })
        .collect()
}

fn read_all_partitions(prefix: &Path) -> Vec<(u32, u32)> {
    (0..PARTITION_COUNT)
        .flat_map(|p| read_partition(prefix, p))
        .collect()
}

// =============================================================================
// Boundary Scenarios
// =============================================================================

#[test]
fn test_empty_collection() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 2);

    collator.close_deposits().unwrap();
    collator.collate(1).unwrap();

    for p_id in 0..PARTITION_COUNT {
        let path = format!("{}.{}.part", prefix.display(), p_id);
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }
}

#[test]
fn test_single_pair() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 2);

    collator.deposit(&[(42, 7)]);
    collator.close_deposits().unwrap();
    collator.collate(1).unwrap();

    assert_eq!(read_partition(&prefix, 42), vec![(42, 7)]);
    for p_id in (0..PARTITION_COUNT).filter(|&p| p != 42) {
        assert!(read_partition(&prefix, p_id).is_empty());
    }
}

#[test]
fn test_duplicate_keys_sorted_by_value() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 2);

    collator.deposit(&[(5, 2), (5, 3), (5, 1)]);
    collator.close_deposits().unwrap();
    collator.collate(2).unwrap();

    assert_eq!(read_partition(&prefix, 5), vec![(5, 1), (5, 2), (5, 3)]);
}

#[test]
fn test_cross_partition_identity_routing() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 4);

    // Keys 0..1024 with the identity hasher: key k belongs to partition
    // k & 511, so every partition receives exactly keys p and p + 512.
    let pairs: Vec<(u32, u32)> = (0..1024).map(|k| (k, 0)).collect();
    for chunk in pairs.chunks(100) {
        collator.deposit(chunk);
    }
    collator.close_deposits().unwrap();
    collator.collate(4).unwrap();

    for p_id in 0..PARTITION_COUNT {
        let expected = vec![(p_id as u32, 0), (p_id as u32 + 512, 0)];
        assert_eq!(read_partition(&prefix, p_id), expected);
    }
}

// =============================================================================
// Universal Properties
// =============================================================================

#[test]
fn test_conservation_across_buffers() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 4);

    let mut deposited = Vec::new();
    for round in 0..10u32 {
        let chunk: Vec<(u32, u32)> = (0..500u32)
            .map(|i| (i.wrapping_mul(2654435761) % 10_000, round * 1000 + i))
            .collect();
        deposited.extend_from_slice(&chunk);
        collator.deposit(&chunk);
    }
    collator.close_deposits().unwrap();

    let mut on_disk = read_all_partitions(&prefix);
    on_disk.sort_unstable();
    deposited.sort_unstable();
    assert_eq!(on_disk, deposited);

    drop(collator);
    assert!(!prefix.with_extension("0.part").exists());
}

#[test]
fn test_partitioning_correctness() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 2);

    let pairs: Vec<(u32, u32)> = (0..5000u32).map(|i| (i.wrapping_mul(7919), i)).collect();
    collator.deposit(&pairs);
    collator.close_deposits().unwrap();

    for p_id in 0..PARTITION_COUNT {
        for (key, _) in read_partition(&prefix, p_id) {
            assert_eq!(key as usize & (PARTITION_COUNT - 1), p_id);
        }
    }
}

#[test]
fn test_partitions_sorted_after_collate() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 2);

    // Descending keys with colliding values exercise the value tie-break
    let pairs: Vec<(u32, u32)> = (0..5000u32).rev().map(|i| (i % 700, i % 3)).collect();
    collator.deposit(&pairs);
    collator.close_deposits().unwrap();
    collator.collate(3).unwrap();

    for p_id in 0..PARTITION_COUNT {
        let records = read_partition(&prefix, p_id);
        assert!(
            records.windows(2).all(|w| w[0] <= w[1]),
            "partition {} is not sorted",
            p_id
        );
    }
}

#[test]
fn test_deposit_order_preserved_within_buffer() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 2);

    // All three keys route to partition 3; before collation the file must
    // hold them in deposit order.
    collator.deposit(&[(1027, 0), (3, 1), (515, 2)]);
    collator.close_deposits().unwrap();

    assert_eq!(
        read_partition(&prefix, 3),
        vec![(1027, 0), (3, 1), (515, 2)]
    );
}

#[test]
fn test_pool_quiescent_after_close() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 3);

    collator.deposit(&[(1, 1), (2, 2)]);
    collator.deposit(&[(3, 3)]);
    collator.close_deposits().unwrap();

    assert_eq!(collator.free_buffer_count(), 3);
    assert_eq!(collator.full_buffer_count(), 0);
}

#[test]
fn test_manual_buffer_handshake() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 1);

    let mut buf = collator.acquire_buffer();
    buf.push(9, 90);
    buf.push(9, 91);
    assert_eq!(buf.len(), 2);
    collator.submit_buffer(buf);

    collator.close_deposits().unwrap();
    assert_eq!(read_partition(&prefix, 9), vec![(9, 90), (9, 91)]);
}

// =============================================================================
// Lifecycle Errors
// =============================================================================

#[test]
fn test_collate_before_close_is_misuse() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 2);

    assert!(matches!(collator.collate(1), Err(CollateError::Misuse(_))));

    collator.close_deposits().unwrap();
}

#[test]
fn test_double_close_is_misuse() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 2);

    collator.close_deposits().unwrap();
    assert!(matches!(
        collator.close_deposits(),
        Err(CollateError::Misuse(_))
    ));
}

#[test]
fn test_iter_before_collate_is_misuse() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 2);

    collator.close_deposits().unwrap();
    assert!(matches!(collator.iter(), Err(CollateError::Misuse(_))));
}

#[test]
fn test_double_collate_is_misuse() {
    let (_temp, prefix) = setup_work_prefix();
    let mut collator = new_collator(&prefix, 2);

    collator.close_deposits().unwrap();
    collator.collate(2).unwrap();
    assert!(matches!(collator.collate(2), Err(CollateError::Misuse(_))));
}

#[test]
fn test_zero_buf_count_rejected() {
    let (_temp, prefix) = setup_work_prefix();
    let config = Config::builder().work_prefix(&prefix).buf_count(0).build();
    assert!(matches!(
        U32Collator::new(config),
        Err(CollateError::Config(_))
    ));
}
