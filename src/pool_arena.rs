//! Pool arena: one contiguous backing buffer, its intrusive free list, and
//! the locks guarding it.
//!
//! Grounded in the original C `LimdyMemoryPool` (backing buffer + free list
//! + `pthread_mutex_t` + `pthread_rwlock_t`), reimplemented with
//! `parking_lot::{Mutex, RwLock}` (see DESIGN.md for why this crate's
//! fixed-size lock-free pool allocator wasn't a fit for variable-size
//! splitting/coalescing).

use std::ptr::NonNull;

use parking_lot::{Mutex, RwLock};

use crate::block::{
    self, block_offset_from_payload, block_span, payload_offset, BlockHeader,
};
use crate::config::ALIGNMENT;
use crate::error::{AllocatorError, PoolId};
use crate::utils::align_up;

struct Body {
    buf: Box<[u8]>,
    head: u32,
    used_size: usize,
}

/// A single arena: a fixed-size backing buffer carved up by an intrusive,
/// address-ordered free list.
pub struct Pool {
    id: PoolId,
    /// Backing buffer size; also the pool-index sort key.
    capacity: usize,
    start_addr: usize,
    end_addr: usize,
    /// Guards `start_addr`/`end_addr` validity against concurrent teardown;
    /// held in read mode by [`Pool::contains`], write mode only while a
    /// pool is being torn down by the owning allocator.
    alive: RwLock<bool>,
    body: Mutex<Body>,
}

impl Pool {
    /// Allocates a fresh arena of `capacity` bytes.
    pub fn new(id: PoolId, capacity: usize) -> Result<Self, AllocatorError> {
        if capacity < block_span(0) {
            return Err(AllocatorError::InvalidArgument(
                "pool capacity too small to hold even an empty block",
            ));
        }
        let mut buf = vec![0u8; capacity].into_boxed_slice();
        let start_addr = buf.as_ptr() as usize;
        let end_addr = start_addr + buf.len();
        // SAFETY: `buf` was just allocated with length `capacity >= block_span(0)`.
        let head = unsafe { block::init_single_free_block(&mut buf) };
        Ok(Pool {
            id,
            capacity,
            start_addr,
            end_addr,
            alive: RwLock::new(true),
            body: Mutex::new(Body { buf, head, used_size: 0 }),
        })
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used_size(&self) -> usize {
        self.body.lock().used_size
    }

    /// Whether `ptr` falls within this pool's backing buffer.
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        let _guard = self.alive.read();
        let addr = ptr.as_ptr() as usize;
        addr >= self.start_addr && addr < self.end_addr
    }

    /// Marks the pool as being torn down. After this call `contains` always
    /// returns `false`; callers must guarantee no concurrent `alloc`/`free`
    /// against this pool.
    pub fn mark_destroyed(&self) {
        *self.alive.write() = false;
    }

    /// First-fit allocation of `size` bytes, split if the remainder is worth
    /// keeping as its own free block.
    pub fn alloc(&self, size: usize) -> Result<NonNull<u8>, AllocatorError> {
        let size = align_up(size.max(1), ALIGNMENT);
        let mut body = self.body.lock();
        let head = body.head;
        // SAFETY: `head` is the pool's maintained list head.
        let found = unsafe { block::find_first_fit(&body.buf, head, size as u32) };
        let Some(off) = found else {
            return Err(AllocatorError::AllocFailed { size });
        };
        // SAFETY: `off` was just found as a free block with payload >= size.
        let off = unsafe { block::split_and_take(&mut body.buf, off, size as u32) };
        body.used_size += block_span(size);
        // SAFETY: `off` now addresses a live in-use block.
        let ptr = unsafe { block::payload_ptr(&mut body.buf, off) };
        Ok(NonNull::new(ptr).expect("payload pointer within a non-empty buffer is never null"))
    }

    /// Releases `ptr`, coalescing with free neighbors. Errors (rather than
    /// aborting) when `ptr` does not belong to this pool at all; a detected
    /// double-free is reported to the caller as [`AllocatorError::Corruption`]
    /// for the allocator façade to escalate to the fatal path.
    pub fn free(&self, ptr: NonNull<u8>) -> Result<(), AllocatorError> {
        let mut body = self.body.lock();
        let off = block_offset_from_payload(self.start_addr, ptr.as_ptr() as usize)
            .ok_or(AllocatorError::InvalidFree { ptr: ptr.as_ptr() as usize })?;
        // SAFETY: `off` is derived from a pointer this pool previously
        // handed out via `payload_ptr`, or is nonsense that the magic check
        // below rejects before any further use.
        let header: BlockHeader = unsafe { block::read_header(&body.buf, off) };
        if !header.is_valid() {
            return Err(AllocatorError::Corruption("bad block header magic on free"));
        }
        if !header.in_use() {
            return Err(AllocatorError::Corruption("double free detected"));
        }
        body.used_size -= block_span(header.size as usize);
        // SAFETY: `off` addresses a valid, currently in-use block.
        let result = unsafe { block::free_and_coalesce(&mut body.buf, off) };
        let _ = result;
        Ok(())
    }

    /// Attempts in-place growth by absorbing a free successor. Returns
    /// `Ok(Some(ptr))` (unchanged `ptr`) on success, `Ok(None)` if there is
    /// no room in place (the caller must fall back to alloc-fresh + copy +
    /// free), or an error if `ptr` is not a live block of this pool.
    pub fn try_extend_in_place(
        &self,
        ptr: NonNull<u8>,
        new_size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocatorError> {
        let new_size = align_up(new_size, ALIGNMENT) as u32;
        let mut body = self.body.lock();
        let off = block_offset_from_payload(self.start_addr, ptr.as_ptr() as usize)
            .ok_or(AllocatorError::InvalidFree { ptr: ptr.as_ptr() as usize })?;
        // SAFETY: same as `free`.
        let header: BlockHeader = unsafe { block::read_header(&body.buf, off) };
        if !header.is_valid() || !header.in_use() {
            return Err(AllocatorError::Corruption("bad or freed block passed to realloc"));
        }
        if header.size >= new_size {
            return Ok(Some(ptr));
        }
        let Some(next_off) = header.next() else {
            return Ok(None);
        };
        // SAFETY: `next_off` comes from a just-read valid header.
        let next_header: BlockHeader = unsafe { block::read_header(&body.buf, next_off) };
        if next_header.in_use() {
            return Ok(None);
        }
        let available = header.size + payload_offset() as u32 + next_header.size;
        if available < new_size {
            return Ok(None);
        }
        // Absorb the successor, then re-split so any leftover becomes its
        // own free block, mirroring the split policy used on fresh alloc.
        // SAFETY: `off`'s successor is free and large enough; merging and
        // re-splitting stays within the buffer's bounds.
        unsafe {
            let mut merged = header;
            merged.size = available;
            merged.next = next_header.next;
            if let Some(nn) = next_header.next() {
                let mut nn_h = block::read_header(&body.buf, nn);
                nn_h.prev = off;
                block::write_header(&mut body.buf, nn, &nn_h);
            }
            merged.in_use = 0;
            block::write_header(&mut body.buf, off, &merged);
            let taken = block::split_and_take(&mut body.buf, off, new_size);
            debug_assert_eq!(taken, off);
        }
        body.used_size += (available - header.size) as usize;
        Ok(Some(ptr))
    }

    /// Raw byte size of the live payload at `ptr`, used by the façade to
    /// bound `memcpy` length on cross-pool realloc.
    pub fn payload_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        let body = self.body.lock();
        let off = block_offset_from_payload(self.start_addr, ptr.as_ptr() as usize)?;
        // SAFETY: bounds-checked by `block_offset_from_payload` above.
        let header = unsafe { block::read_header(&body.buf, off) };
        header.is_valid().then_some(header.size as usize)
    }

    /// Full coalescing sweep of the free list.
    pub fn defragment(&self) {
        let mut body = self.body.lock();
        let head = body.head;
        // SAFETY: `head` is the pool's maintained list head.
        unsafe { block::coalesce_all(&mut body.buf, head) };
    }
}

// SAFETY: all mutable state lives behind `Mutex`/`RwLock`; the raw pointers
// cached in `start_addr`/`end_addr` are plain addresses, not aliased
// pointers, so `Pool` is safely `Send + Sync`.
unsafe impl Send for Pool {}
unsafe impl Sync for Pool {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool(capacity: usize) -> Pool {
        Pool::new(PoolId(0), capacity).unwrap()
    }

    #[test]
    fn alloc_free_round_trip_restores_used_size() {
        let pool = test_pool(4096);
        let p = pool.alloc(100).unwrap();
        assert!(pool.used_size() > 0);
        pool.free(p).unwrap();
        assert_eq!(pool.used_size(), 0);
    }

    #[test]
    fn contains_reflects_backing_buffer_range() {
        let pool = test_pool(4096);
        let p = pool.alloc(100).unwrap();
        assert!(pool.contains(p));
        let bogus = NonNull::new(0x1 as *mut u8).unwrap();
        assert!(!pool.contains(bogus));
    }

    #[test]
    fn double_free_is_reported_as_corruption() {
        let pool = test_pool(4096);
        let p = pool.alloc(64).unwrap();
        pool.free(p).unwrap();
        let err = pool.free(p).unwrap_err();
        assert!(matches!(err, AllocatorError::Corruption(_)));
    }

    #[test]
    fn extend_in_place_absorbs_free_successor() {
        let pool = test_pool(4096);
        let a = pool.alloc(64).unwrap();
        let b = pool.alloc(64).unwrap();
        pool.free(b).unwrap();
        let extended = pool.try_extend_in_place(a, 100).unwrap();
        assert_eq!(extended, Some(a));
    }

    #[test]
    fn out_of_space_alloc_fails() {
        let pool = test_pool(256);
        let big = pool.alloc(10_000);
        assert!(matches!(big, Err(AllocatorError::AllocFailed { .. })));
    }
}
