//! collatekv demonstration driver
//!
//! Deposits random pairs from several producer threads, collates, then
//! iterates the result both key-grouped and batched.

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, EnvFilter};

use collatekv::{Collator, Config, IdentityHasher, Pair};

/// Pairs per staging-buffer submission
const DEPOSIT_CHUNK: usize = 1 << 17;

/// collatekv demo
#[derive(Parser, Debug)]
#[command(name = "collate-demo")]
#[command(about = "External-memory key-value collation demo")]
#[command(version)]
struct Args {
    /// Path prefix for the temporary partition files
    #[arg(short, long, default_value = "./collate_demo")]
    work_prefix: String,

    /// Total number of pairs to deposit
    #[arg(short = 'n', long, default_value = "4000000")]
    pairs: u64,

    /// Number of producer threads
    #[arg(short, long, default_value = "4")]
    producers: usize,

    /// Number of collation worker threads
    #[arg(short, long, default_value = "4")]
    threads: usize,

    /// Staging buffer count (0 = twice the producer count)
    #[arg(short, long, default_value = "0")]
    buf_count: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,collatekv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("collatekv demo v{}", collatekv::VERSION);

    if let Err(e) = run(&args) {
        tracing::error!("demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> collatekv::Result<()> {
    let buf_count = if args.buf_count == 0 {
        args.producers.max(1) * 2
    } else {
        args.buf_count
    };

    let config = Config::builder()
        .work_prefix(&args.work_prefix)
        .buf_count(buf_count)
        .build();

    let mut collator: Collator<u32, u32, IdentityHasher> = Collator::new(config)?;

    // Deposit phase
    let producers = args.producers.max(1);
    let per_producer = args.pairs / producers as u64;
    tracing::info!(
        producers,
        pairs = per_producer * producers as u64,
        buf_count,
        "depositing"
    );

    std::thread::scope(|s| {
        for producer_id in 0..producers {
            let collator = &collator;
            s.spawn(move || {
                let mut rng = StdRng::seed_from_u64(producer_id as u64);
                let mut remaining = per_producer;
                while remaining > 0 {
                    let chunk = remaining.min(DEPOSIT_CHUNK as u64);
                    let mut buf = collator.acquire_buffer();
                    for i in 0..chunk {
                        buf.push(rng.gen::<u32>(), i as u32);
                    }
                    collator.submit_buffer(buf);
                    remaining -= chunk;
                }
            });
        }
    });

    collator.close_deposits()?;

    // Collation phase
    collator.collate(args.threads)?;

    // Iteration phase: key-grouped scan, then a batched drain
    let mut iter = collator.iter()?;
    let mut distinct_keys: u64 = 0;
    while iter.key()?.is_some() {
        distinct_keys += 1;
        iter.advance()?;
    }

    let reader = collator.iter()?;
    let mut batch = vec![Pair::new(0u32, 0u32); DEPOSIT_CHUNK];
    let mut total_pairs: u64 = 0;
    loop {
        let read = reader.read(&mut batch)?;
        if read == 0 {
            break;
        }
        total_pairs += read as u64;
    }

    tracing::info!(distinct_keys, total_pairs, "iteration complete");
    Ok(())
}
