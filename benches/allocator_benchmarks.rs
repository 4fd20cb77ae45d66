//! Throughput benchmarks for the pooled allocator, covering the slab
//! front-end, pool-backed allocation, and realloc growth paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lingopool::{Allocator, PoolConfig};

fn bench_slab_alloc_free(c: &mut Criterion) {
    let allocator = Allocator::new(PoolConfig::default()).unwrap();
    let mut group = c.benchmark_group("slab_alloc_free");
    group.throughput(Throughput::Elements(1));
    group.bench_function("64_bytes", |b| {
        b.iter(|| {
            let p = allocator.alloc(64).unwrap();
            black_box(p);
            allocator.free(Some(p));
        })
    });
    group.finish();
}

fn bench_pool_alloc_free(c: &mut Criterion) {
    let allocator = Allocator::new(PoolConfig::default()).unwrap();
    let mut group = c.benchmark_group("pool_alloc_free");
    group.throughput(Throughput::Elements(1));
    group.bench_function("4096_bytes", |b| {
        b.iter(|| {
            let p = allocator.alloc(4096).unwrap();
            black_box(p);
            allocator.free(Some(p));
        })
    });
    group.finish();
}

fn bench_request_response_burst(c: &mut Criterion) {
    let allocator = Allocator::new(PoolConfig::default()).unwrap();
    c.bench_function("request_response_burst", |b| {
        b.iter(|| {
            let mut live = Vec::with_capacity(32);
            for i in 0..32usize {
                let size = 16 << (i % 6);
                live.push(allocator.alloc(size).unwrap());
            }
            for p in live {
                allocator.free(Some(p));
            }
        })
    });
}

fn bench_realloc_growth(c: &mut Criterion) {
    let allocator = Allocator::new(
        PoolConfig::builder().max_pools(1).small_pool_size(1024 * 1024).build().unwrap(),
    )
    .unwrap();
    c.bench_function("realloc_growth_chain", |b| {
        b.iter(|| {
            let mut p = allocator.alloc(64).unwrap();
            for size in [128usize, 256, 512, 1024, 2048] {
                p = allocator.realloc(Some(p), size).unwrap();
            }
            black_box(p);
            allocator.free(Some(p));
        })
    });
}

criterion_group!(
    benches,
    bench_slab_alloc_free,
    bench_pool_alloc_free,
    bench_request_response_burst,
    bench_realloc_growth,
);
criterion_main!(benches);
