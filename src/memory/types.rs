/*!
 * Memory Types
 * Owned raw blocks and pool statistics
 */

use serde::{Deserialize, Serialize};
use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default block alignment, matching the general allocator's guarantee
pub const BLOCK_ALIGNMENT: usize = 16;

/// Fixed-size heap block owned by whoever holds it
///
/// Dropping a block releases it to the general allocator.
#[derive(Debug)]
pub struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: a Block is uniquely owned raw memory with no thread affinity
unsafe impl Send for Block {}

impl Block {
    /// Must-succeed allocation: aborts via `handle_alloc_error` on exhaustion
    pub(crate) fn allocate(layout: Layout) -> Self {
        match Self::try_allocate(layout) {
            Some(block) => block,
            None => alloc::handle_alloc_error(layout),
        }
    }

    /// Safe allocation: `None` on exhaustion
    pub(crate) fn try_allocate(layout: Layout) -> Option<Self> {
        debug_assert!(layout.size() > 0);
        // SAFETY: layout has non-zero size (checked at pool construction)
        let ptr = unsafe { alloc::alloc(layout) };
        NonNull::new(ptr).map(|ptr| Self { ptr, layout })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Give up ownership without releasing the memory
    pub(crate) fn into_raw(self) -> NonNull<u8> {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }

    /// Reclaim ownership of memory produced by [`Block::into_raw`]
    ///
    /// # Safety
    ///
    /// `ptr` must come from `into_raw` of a block with exactly `layout`, and
    /// must not be owned by any other `Block`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<u8>, layout: Layout) -> Self {
        Self { ptr, layout }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with self.layout and is uniquely owned
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// Free-list counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeListStats {
    pub reused_allocations: u64,
    pub fresh_allocations: u64,
    pub pooled_frees: u64,
    pub released_frees: u64,
    pub pooled_blocks: usize,
}

impl FreeListStats {
    /// Fraction of allocations served from the pool
    pub fn hit_rate(&self) -> f64 {
        let total = self.reused_allocations + self.fresh_allocations;
        if total == 0 {
            0.0
        } else {
            self.reused_allocations as f64 / total as f64
        }
    }
}

/// Lock-free counters updated on the allocation hot path
#[repr(C, align(64))]
#[derive(Default)]
pub(crate) struct AtomicFreeListStats {
    reused_allocations: AtomicU64,
    fresh_allocations: AtomicU64,
    pooled_frees: AtomicU64,
    released_frees: AtomicU64,
}

impl AtomicFreeListStats {
    #[inline(always)]
    pub fn inc_reused(&self) {
        self.reused_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_fresh(&self) {
        self.fresh_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_pooled(&self) {
        self.pooled_frees.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_released(&self) {
        self.released_frees.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, pooled_blocks: usize) -> FreeListStats {
        FreeListStats {
            reused_allocations: self.reused_allocations.load(Ordering::Relaxed),
            fresh_allocations: self.fresh_allocations.load(Ordering::Relaxed),
            pooled_frees: self.pooled_frees.load(Ordering::Relaxed),
            released_frees: self.released_frees.load(Ordering::Relaxed),
            pooled_blocks,
        }
    }
}
