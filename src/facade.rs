//! Allocator façade: the global entry points that route between the slab
//! front-end and pool backends and own the set of pools.
//!
//! Grounded in the original C `limdy_memory_pool_*` API surface
//! (`init`/`cleanup`/`alloc`/`free`/`realloc`/`create_pool`/`destroy_pool`/
//! `alloc_from`/`free_to`/`contains`); the global-singleton ergonomics
//! (`OnceLock`-backed, `init`/`get` accessors) follow this codebase's usual
//! manager pattern for process-wide shared state (see DESIGN.md).

use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::diagnostics;
use crate::error::{AllocatorError, AllocatorResult, PoolId};
use crate::pool_arena::Pool;
use crate::rbtree::PoolIndex;
use crate::slab::SlabCache;

#[cfg(feature = "leak-detection")]
use crate::leak::{LeakRegistry, LiveAllocation};

/// Aggregate allocator statistics, summed across all live pools. Slab
/// overhead is excluded, matching the original implementation's accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    pub total_allocated: usize,
    pub total_used: usize,
}

struct GlobalState {
    pools: HashMap<PoolId, Pool>,
    index: PoolIndex,
    large_pool: Pool,
}

/// A fully self-contained pooled allocator instance.
///
/// Most embedders construct one directly with [`Allocator::new`]; call sites
/// that want the original implementation's implicit-global-state ergonomics
/// can instead publish one through [`GlobalAllocator`].
pub struct Allocator {
    config: PoolConfig,
    state: Mutex<GlobalState>,
    slabs: SlabCache,
    next_pool_id: AtomicUsize,
    /// Count of pools currently live that were created via [`Allocator::create_pool`],
    /// tracked separately from the `config.max_pools` pools `new` pre-creates:
    /// `max_pools` caps each set independently rather than sharing one budget.
    dynamic_pools: AtomicUsize,
    #[cfg(feature = "leak-detection")]
    leaks: LeakRegistry,
}

/// Tags a slab-served pointer so `free`/`realloc` can classify it without
/// re-deriving the class from the address range on the hot path.
fn slab_class_or_pool(slabs: &SlabCache, ptr: NonNull<u8>) -> Option<usize> {
    slabs.class_containing(ptr)
}

impl Allocator {
    /// Initializes a fresh allocator: creates the large pool, pre-creates
    /// `config.max_pools` small pools and indexes them, and initializes the
    /// slab cache. On partial failure, everything already created is torn
    /// down before the error is returned.
    pub fn new(config: PoolConfig) -> AllocatorResult<Self> {
        config.validate()?;

        let large_pool = Pool::new(PoolId::LARGE, config.large_pool_size)
            .map_err(|_| AllocatorError::InitFailed("failed to allocate large pool"))?;

        let mut pools = HashMap::new();
        let mut index = PoolIndex::new();
        let next_pool_id = AtomicUsize::new(0);

        for _ in 0..config.max_pools {
            let id = PoolId(next_pool_id.fetch_add(1, Ordering::Relaxed));
            match Pool::new(id, config.small_pool_size) {
                Ok(pool) => {
                    index.insert(pool.capacity(), id);
                    pools.insert(id, pool);
                }
                Err(_) => {
                    // `pools`/`large_pool` are dropped on return, releasing
                    // whatever was already created.
                    return Err(AllocatorError::InitFailed(
                        "failed to allocate one of the pre-created small pools",
                    ));
                }
            }
        }

        Ok(Allocator {
            slabs: SlabCache::new(config.slab_objects_per_slab),
            config,
            state: Mutex::new(GlobalState { pools, index, large_pool }),
            next_pool_id,
            dynamic_pools: AtomicUsize::new(0),
            #[cfg(feature = "leak-detection")]
            leaks: LeakRegistry::new(),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Idempotent explicit teardown, kept for parity with the original
    /// `cleanup` entry point; also runs via `Drop`.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        for pool in state.pools.values() {
            pool.mark_destroyed();
        }
        state.large_pool.mark_destroyed();
    }

    /// Allocates `size` bytes, preferring the slab front-end, falling back
    /// to best-fit pool selection and finally the large pool.
    #[track_caller]
    pub fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
        if let Ok(Some(ptr)) = self.slabs.alloc(size) {
            #[cfg(feature = "leak-detection")]
            self.leaks.track(ptr.as_ptr() as usize, size);
            return Some(ptr);
        }

        let state = self.state.lock();
        let target = state.index.find_best_fit(size).and_then(|id| state.pools.get(&id));
        let result = match target {
            Some(pool) => pool.alloc(size),
            None => state.large_pool.alloc(size),
        };
        drop(state);

        match result {
            Ok(ptr) => {
                #[cfg(feature = "leak-detection")]
                self.leaks.track(ptr.as_ptr() as usize, size);
                Some(ptr)
            }
            Err(err) => {
                diagnostics::record(&err);
                None
            }
        }
    }

    /// Releases `ptr`. A no-op if `ptr` is `None`. Any detected corruption
    /// (double free, bad header) is fatal and aborts the process.
    pub fn free(&self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else { return };

        if let Some(class) = slab_class_or_pool(&self.slabs, ptr) {
            self.slabs.free(class, ptr);
            #[cfg(feature = "leak-detection")]
            self.leaks.untrack(ptr.as_ptr() as usize);
            return;
        }

        let state = self.state.lock();
        let owner = state.pools.values().find(|p| p.contains(ptr)).or_else(|| {
            state.large_pool.contains(ptr).then_some(&state.large_pool)
        });
        let result = match owner {
            Some(pool) => pool.free(ptr),
            None => Err(AllocatorError::InvalidFree { ptr: ptr.as_ptr() as usize }),
        };
        drop(state);

        match result {
            Ok(()) => {
                #[cfg(feature = "leak-detection")]
                self.leaks.untrack(ptr.as_ptr() as usize);
            }
            Err(err) if err.is_fatal() => {
                diagnostics::record(&err);
                diagnostics::fatal(err);
            }
            Err(err) => diagnostics::record(&err),
        }
    }

    /// Resizes the allocation at `ptr` to `new_size`, preserving the first
    /// `min(old_size, new_size)` bytes. `ptr = None` behaves like `alloc`;
    /// `new_size = 0` behaves like `free` followed by returning `None`.
    pub fn realloc(&self, ptr: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>> {
        let Some(ptr) = ptr else { return self.alloc(new_size) };
        if new_size == 0 {
            self.free(Some(ptr));
            return None;
        }

        if let Some(class) = slab_class_or_pool(&self.slabs, ptr) {
            let class_size = crate::config::slab_class_sizes()[class];
            if new_size <= class_size {
                return Some(ptr);
            }
            let fresh = self.alloc(new_size)?;
            // SAFETY: `ptr` is a live slab object of `class_size` bytes;
            // `fresh` is freshly allocated and at least `new_size >
            // class_size` bytes.
            unsafe { copy_and_discard(ptr, class_size, fresh) };
            self.slabs.free(class, ptr);
            #[cfg(feature = "leak-detection")]
            self.leaks.untrack(ptr.as_ptr() as usize);
            return Some(fresh);
        }

        let state = self.state.lock();
        let owner = state.pools.values().find(|p| p.contains(ptr)).or_else(|| {
            state.large_pool.contains(ptr).then_some(&state.large_pool)
        });
        let Some(pool) = owner else {
            drop(state);
            diagnostics::record(&AllocatorError::InvalidFree { ptr: ptr.as_ptr() as usize });
            return None;
        };
        match pool.try_extend_in_place(ptr, new_size) {
            Ok(Some(same)) => Some(same),
            Ok(None) => {
                let old_size = pool.payload_size(ptr).unwrap_or(0);
                drop(state);
                let fresh = self.alloc(new_size)?;
                // SAFETY: `ptr` is a live block of `old_size` bytes in
                // `pool`; `fresh` is freshly allocated and at least
                // `new_size >= old_size` bytes (grow path only).
                unsafe { copy_and_discard(ptr, old_size, fresh) };
                self.free(Some(ptr));
                Some(fresh)
            }
            Err(err) => {
                drop(state);
                diagnostics::record(&err);
                None
            }
        }
    }

    /// Sums `total_size`/`used_size` across every live pool (slab overhead
    /// excluded).
    pub fn stats(&self) -> AllocatorStats {
        let state = self.state.lock();
        let mut stats = AllocatorStats {
            total_allocated: state.large_pool.capacity(),
            total_used: state.large_pool.used_size(),
        };
        for pool in state.pools.values() {
            stats.total_allocated += pool.capacity();
            stats.total_used += pool.used_size();
        }
        stats
    }

    /// Creates an additional pool of `size` bytes. Fails with
    /// [`AllocatorError::PoolFull`] once `config.max_pools` pools already
    /// created through this method are live; the `config.max_pools` pools
    /// `new` pre-created are tracked separately and never count against this
    /// budget.
    pub fn create_pool(&self, size: usize) -> AllocatorResult<PoolId> {
        let mut state = self.state.lock();
        if self.dynamic_pools.load(Ordering::Relaxed) >= self.config.max_pools {
            return Err(AllocatorError::PoolFull { max: self.config.max_pools });
        }
        let id = PoolId(self.next_pool_id.fetch_add(1, Ordering::Relaxed));
        let pool = Pool::new(id, size)?;
        state.index.insert(pool.capacity(), id);
        state.pools.insert(id, pool);
        self.dynamic_pools.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Destroys `pool`, removing it from the index. The large pool cannot
    /// be destroyed this way.
    pub fn destroy_pool(&self, pool: PoolId) -> AllocatorResult<()> {
        if pool == PoolId::LARGE {
            return Err(AllocatorError::InvalidPool(pool));
        }
        let mut state = self.state.lock();
        let Some(p) = state.pools.remove(&pool) else {
            return Err(AllocatorError::InvalidPool(pool));
        };
        p.mark_destroyed();
        state.index.remove(pool);
        // Pools pre-created by `new` carry ids below `max_pools`; anything at
        // or above that was handed out by `create_pool` and counts against
        // its dedicated budget.
        if pool.0 >= self.config.max_pools {
            self.dynamic_pools.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn alloc_from(&self, pool: PoolId, size: usize) -> AllocatorResult<NonNull<u8>> {
        let state = self.state.lock();
        let p = self.resolve(&state, pool)?;
        p.alloc(size)
    }

    pub fn free_to(&self, pool: PoolId, ptr: NonNull<u8>) -> AllocatorResult<()> {
        let state = self.state.lock();
        let p = self.resolve(&state, pool)?;
        if !p.contains(ptr) {
            return Err(AllocatorError::InvalidFree { ptr: ptr.as_ptr() as usize });
        }
        p.free(ptr)
    }

    pub fn realloc_from(
        &self,
        pool: PoolId,
        ptr: NonNull<u8>,
        new_size: usize,
    ) -> AllocatorResult<NonNull<u8>> {
        let state = self.state.lock();
        let p = self.resolve(&state, pool)?;
        match p.try_extend_in_place(ptr, new_size)? {
            Some(same) => Ok(same),
            None => {
                let old_size = p.payload_size(ptr).unwrap_or(0);
                let fresh = p.alloc(new_size)?;
                // SAFETY: `ptr` is a live block of `old_size` bytes in `p`;
                // `fresh` was just allocated with at least `new_size` bytes.
                unsafe { copy_and_discard(ptr, old_size, fresh) };
                p.free(ptr)?;
                Ok(fresh)
            }
        }
    }

    pub fn contains(&self, pool: PoolId, ptr: NonNull<u8>) -> bool {
        let state = self.state.lock();
        self.resolve(&state, pool).map(|p| p.contains(ptr)).unwrap_or(false)
    }

    /// Full coalescing sweep of `pool`'s free list.
    pub fn defragment(&self, pool: PoolId) -> AllocatorResult<()> {
        let state = self.state.lock();
        let p = self.resolve(&state, pool)?;
        p.defragment();
        Ok(())
    }

    #[cfg(feature = "leak-detection")]
    pub fn leak_report(&self) -> Vec<LiveAllocation> {
        self.leaks.report()
    }

    fn resolve<'a>(&self, state: &'a GlobalState, pool: PoolId) -> AllocatorResult<&'a Pool> {
        if pool == PoolId::LARGE {
            Ok(&state.large_pool)
        } else {
            state.pools.get(&pool).ok_or(AllocatorError::InvalidPool(pool))
        }
    }
}

impl Drop for Allocator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Copies `len` bytes from `src` to `dst` and marks `src`'s slot as
/// logically discarded (the caller frees the original slot separately).
///
/// # Safety
/// `src` must be readable for `len` bytes and `dst` writable for `len`
/// bytes, and the two regions must not overlap (always true here: `dst` is
/// always a freshly returned allocation).
unsafe fn copy_and_discard(src: NonNull<u8>, len: usize, dst: NonNull<u8>) {
    core::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), len);
}

/// Process-wide singleton accessor, mirroring this crate's
/// `GlobalAllocatorManager` pattern for call sites that want implicit global
/// state instead of owning an [`Allocator`] value directly.
pub struct GlobalAllocator;

static GLOBAL: OnceLock<Allocator> = OnceLock::new();

impl GlobalAllocator {
    /// Initializes the process-wide allocator. Returns an error if it has
    /// already been initialized.
    pub fn init(config: PoolConfig) -> AllocatorResult<()> {
        let allocator = Allocator::new(config)?;
        GLOBAL
            .set(allocator)
            .map_err(|_| AllocatorError::InitFailed("global allocator already initialized"))
    }

    /// The process-wide allocator, if [`GlobalAllocator::init`] has run.
    pub fn get() -> Option<&'static Allocator> {
        GLOBAL.get()
    }
}
