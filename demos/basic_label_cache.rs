//! Per-bucket request accounting with a bounded number of live counter groups.
//!
//! Run with `RUST_LOG=counterkit=debug` to watch groups being created and
//! unregistered as buckets fall out of the cache.

use std::sync::Arc;

use counterkit::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let registry = Arc::new(MemoryRegistry::new());
    let cache = LabelCacheBuilder::new(3).try_build(Arc::clone(&registry))?;

    let traffic = [
        ("photos", 2048u64, true),
        ("logs", 512, true),
        ("photos", 4096, false),
        ("backups", 1 << 20, true),
        ("photos", 128, false),
        ("archive", 8192, true), // evicts "logs"
        ("logs", 64, false),     // "logs" comes back with fresh counters
    ];

    for (bucket, bytes, is_put) in traffic {
        cache.add(bucket)?;
        cache.increment(bucket, Counter::Requests.index(), 1);
        let slot = if is_put {
            Counter::PutBytes
        } else {
            Counter::GetBytes
        };
        cache.increment(bucket, slot.index(), bytes);
    }

    println!("resident buckets (MRU first):");
    for label in cache.labels() {
        println!(
            "  {:<8} {}={} {}={} {}={}",
            label,
            Counter::Requests,
            cache.read(&label, Counter::Requests.index()),
            Counter::PutBytes,
            cache.read(&label, Counter::PutBytes.index()),
            Counter::GetBytes,
            cache.read(&label, Counter::GetBytes.index()),
        );
    }

    println!("registered groups: {:?}", registry.labels());
    println!("registry calls:    {:?}", registry.stats());

    #[cfg(feature = "metrics")]
    println!("cache metrics:     {:?}", cache.metrics_snapshot());

    Ok(())
}
