//! Concurrency and pointer-safety smoke tests, intended to also run clean
//! under `cargo miri test` (no data races, no use-after-free, no leaks).

use std::sync::Arc;
use std::thread;

use lingopool::{Allocator, PoolConfig};
use rand::Rng;

#[test]
fn eight_threads_ten_thousand_iterations_each() {
    let allocator = Arc::new(
        Allocator::new(
            PoolConfig::builder()
                .max_pools(8)
                .small_pool_size(256 * 1024)
                .large_pool_size(2 * 1024 * 1024)
                .build()
                .unwrap(),
        )
        .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let allocator = Arc::clone(&allocator);
        handles.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for _ in 0..10_000 {
                let n = rng.gen_range(1..=4096usize);
                let p = allocator.alloc(n).expect("allocation must succeed under this config");
                unsafe { std::ptr::write_bytes(p.as_ptr(), 0x5a, n.min(64)) };
                allocator.free(Some(p));
            }
        }));
    }
    for h in handles {
        h.join().expect("worker thread must not panic");
    }

    assert_eq!(allocator.stats().total_used, 0);
}

#[test]
fn concurrent_create_and_destroy_pools() {
    let allocator = Arc::new(
        Allocator::new(PoolConfig::builder().max_pools(16).small_pool_size(64 * 1024).build().unwrap())
            .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..4 {
        let allocator = Arc::clone(&allocator);
        handles.push(thread::spawn(move || {
            for _ in 0..32 {
                if let Ok(id) = allocator.create_pool(16 * 1024) {
                    let p = allocator.alloc_from(id, 256).unwrap();
                    allocator.free_to(id, p).unwrap();
                    allocator.destroy_pool(id).unwrap();
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn returned_pointers_are_aligned() {
    let allocator = Allocator::new(PoolConfig::default()).unwrap();
    for size in [0usize, 1, 15, 16, 17, 128, 129, 4096] {
        let p = allocator.alloc(size).unwrap();
        assert_eq!(p.as_ptr() as usize % 16, 0, "pointer for size {size} must be 16-byte aligned");
        allocator.free(Some(p));
    }
}
