//! # lingopool
//!
//! A thread-safe pooled memory allocator for bursty, short-lived allocation
//! workloads: a size-classed slab front-end for small objects, pool arenas
//! with an intrusive splitting/coalescing free list for everything else, and
//! a red-black tree index that picks the best-fit pool for a request.
//!
//! ```
//! use lingopool::{Allocator, PoolConfig};
//!
//! let allocator = Allocator::new(PoolConfig::default()).unwrap();
//! let ptr = allocator.alloc(128).expect("allocation failed");
//! allocator.free(Some(ptr));
//! ```

pub mod block;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod facade;
#[cfg(feature = "leak-detection")]
pub mod leak;
pub mod pool_arena;
pub mod rbtree;
pub mod slab;
pub mod utils;

pub use config::PoolConfig;
pub use error::{AllocatorError, AllocatorResult, PoolId};
pub use facade::{Allocator, AllocatorStats, GlobalAllocator};

#[cfg(feature = "leak-detection")]
pub use leak::LiveAllocation;
