//! Minimal end-to-end walkthrough of the pooled allocator.
//!
//! Run with `cargo run --example basic_usage` once this file is wired up
//! via a `[[example]]` entry pointing at `demos/basic_usage.rs`.

use lingopool::{Allocator, PoolConfig};

fn main() {
    env_logger::init();

    let allocator = Allocator::new(PoolConfig::default()).expect("failed to initialize allocator");

    let small = allocator.alloc(32).expect("small allocation failed");
    let medium = allocator.alloc(8 * 1024).expect("medium allocation failed");

    println!("stats after two allocations: {:?}", allocator.stats());

    allocator.free(Some(small));
    let grown = allocator.realloc(Some(medium), 64 * 1024).expect("realloc failed");
    println!("stats after realloc: {:?}", allocator.stats());

    allocator.free(Some(grown));
    println!("stats after freeing everything: {:?}", allocator.stats());
}
