//! Debug-build leak tracker, gated behind the `leak-detection` feature.
//!
//! Stands in for the original C heritage's `#ifdef LIMDY_MEMORY_DEBUG`
//! global allocation list: a Cargo feature is this ecosystem's equivalent of
//! a compile-time debug toggle.

use std::collections::HashMap;

use parking_lot::Mutex;

/// A single tracked live allocation.
#[derive(Debug, Clone, Copy)]
pub struct LiveAllocation {
    pub address: usize,
    pub size: usize,
    pub location: &'static core::panic::Location<'static>,
}

#[derive(Default)]
pub struct LeakRegistry {
    live: Mutex<HashMap<usize, LiveAllocation>>,
}

impl LeakRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[track_caller]
    pub fn track(&self, address: usize, size: usize) {
        let location = core::panic::Location::caller();
        self.live.lock().insert(address, LiveAllocation { address, size, location });
    }

    pub fn untrack(&self, address: usize) {
        self.live.lock().remove(&address);
    }

    /// Snapshot of every allocation that has not yet been freed.
    pub fn report(&self) -> Vec<LiveAllocation> {
        self.live.lock().values().copied().collect()
    }
}
