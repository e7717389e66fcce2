//! Benchmarks for collatekv deposit, collation, and iteration

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::TempDir;

use collatekv::{Collator, Config, IdentityHasher, Pair};

type U32Collator = Collator<u32, u32, IdentityHasher>;

const PAIRS: u32 = 100_000;

/// Deposit `PAIRS` scrambled pairs through one buffer and close the stream
fn deposit_and_close(work_prefix: &std::path::Path) -> U32Collator {
    let config = Config::builder()
        .work_prefix(work_prefix)
        .buf_count(4)
        .build();
    let mut collator = U32Collator::new(config).unwrap();

    let mut buf = collator.acquire_buffer();
    for i in 0..PAIRS {
        buf.push(i.wrapping_mul(2654435761), i);
    }
    collator.submit_buffer(buf);
    collator.close_deposits().unwrap();
    collator
}

fn collate_benchmarks(c: &mut Criterion) {
    c.bench_function("deposit_close_100k", |b| {
        b.iter_batched(
            || TempDir::new().unwrap(),
            // The collator must drop before its TempDir so file removal
            // still finds the partition files; tuples drop left to right.
            |temp| (deposit_and_close(&temp.path().join("kv")), temp),
            BatchSize::PerIteration,
        );
    });

    c.bench_function("collate_100k", |b| {
        b.iter_batched(
            || {
                let temp = TempDir::new().unwrap();
                let collator = deposit_and_close(&temp.path().join("kv"));
                (collator, temp)
            },
            |(mut collator, temp)| {
                collator.collate(4).unwrap();
                (collator, temp)
            },
            BatchSize::PerIteration,
        );
    });

    c.bench_function("batched_drain_100k", |b| {
        let temp = TempDir::new().unwrap();
        let mut collator = deposit_and_close(&temp.path().join("kv"));
        collator.collate(4).unwrap();

        let mut out = vec![Pair::new(0u32, 0u32); 4096];
        b.iter(|| {
            let iter = collator.iter().unwrap();
            let mut total = 0u64;
            loop {
                let read = iter.read(&mut out).unwrap();
                if read == 0 {
                    break;
                }
                total += read as u64;
            }
            total
        });
    });
}

criterion_group!(benches, collate_benchmarks);
criterion_main!(benches);
