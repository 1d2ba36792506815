use counterkit::prelude::*;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("bucket-{}", i)).collect()
}

fn warm_cache(capacity: usize) -> (LabelCache<MemoryRegistry>, Vec<String>) {
    let cache = LabelCacheBuilder::new(capacity)
        .try_build(Arc::new(MemoryRegistry::new()))
        .unwrap();
    let labels = labels(capacity);
    for label in &labels {
        cache.add(label).unwrap();
    }
    (cache, labels)
}

fn bench_get_or_create_hit(c: &mut Criterion) {
    let (cache, labels) = warm_cache(1024);
    c.bench_function("label_cache_get_or_create_hit", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let label = &labels[i % labels.len()];
            i = i.wrapping_add(1);
            let _ = std::hint::black_box(cache.get_or_create(std::hint::black_box(label)));
        })
    });
}

fn bench_eviction_churn(c: &mut Criterion) {
    let fresh = labels(4096);
    c.bench_function("label_cache_eviction_churn", |b| {
        b.iter_batched(
            || warm_cache(1024).0,
            |cache| {
                for label in &fresh {
                    cache.add(std::hint::black_box(label)).unwrap();
                }
                cache
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_increment(c: &mut Criterion) {
    let mut group = c.benchmark_group("label_cache_increment");
    for &capacity in &[16usize, 1024] {
        let (cache, labels) = warm_cache(capacity);
        let mut rng = StdRng::seed_from_u64(42);
        let picks: Vec<usize> = (0..4096).map(|_| rng.gen_range(0..capacity * 2)).collect();

        group.throughput(Throughput::Elements(picks.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &picks, |b, picks| {
            b.iter(|| {
                for &pick in picks {
                    // Half of the picks miss and exercise the no-op path.
                    let label = labels.get(pick).map_or("absent", String::as_str);
                    cache.increment(label, Counter::Requests.index(), 1);
                }
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_get_or_create_hit,
    bench_eviction_churn,
    bench_increment
);
criterion_main!(benches);
