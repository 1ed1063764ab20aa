/*!
 * Free List
 * Bounded recycling of fixed-size blocks
 */

use super::types::{AtomicFreeListStats, Block, FreeListStats, BLOCK_ALIGNMENT};
use crate::core::errors::{RuntimeError, RuntimeResult};
use crossbeam_queue::ArrayQueue;
use std::alloc::Layout;
use tracing::{debug, warn};

/// Pool of fixed-size blocks
///
/// # Bound
///
/// Unused blocks live in a lock-free bounded queue sized to `max_count`, so the
/// pool never holds more than `max_count` blocks, even under concurrent frees.
/// A free that finds the queue full releases the block to the allocator.
///
/// # Example
///
/// ```
/// use refcore::memory::FreeList;
///
/// let pool = FreeList::new(64, 8).unwrap();
/// let block = pool.allocate();
/// pool.free(block);
/// assert_eq!(pool.pooled_count(), 1);
/// ```
pub struct FreeList {
    layout: Layout,
    max_count: usize,
    blocks: Option<ArrayQueue<Block>>,
    stats: AtomicFreeListStats,
}

impl FreeList {
    /// Pool of `block_size`-byte blocks keeping at most `max_count` unused
    pub fn new(block_size: usize, max_count: usize) -> RuntimeResult<Self> {
        let layout = Layout::from_size_align(block_size, BLOCK_ALIGNMENT).map_err(|_| {
            RuntimeError::InvalidLayout {
                size: block_size,
                align: BLOCK_ALIGNMENT,
            }
        })?;
        Self::with_layout(layout, max_count)
    }

    /// Pool of blocks with an explicit layout
    pub fn with_layout(layout: Layout, max_count: usize) -> RuntimeResult<Self> {
        if layout.size() == 0 {
            return Err(RuntimeError::InvalidLayout {
                size: layout.size(),
                align: layout.align(),
            });
        }

        debug!(
            block_size = layout.size(),
            align = layout.align(),
            max_count,
            "free list initialized"
        );

        Ok(Self {
            layout,
            max_count,
            // ArrayQueue rejects zero capacity
            blocks: (max_count > 0).then(|| ArrayQueue::new(max_count)),
            stats: AtomicFreeListStats::default(),
        })
    }

    /// Take a block, aborting on allocator exhaustion
    #[inline]
    pub fn allocate(&self) -> Block {
        match self.pop() {
            Some(block) => block,
            None => {
                self.stats.inc_fresh();
                Block::allocate(self.layout)
            }
        }
    }

    /// Take a block, returning `None` on allocator exhaustion
    #[inline]
    pub fn try_allocate(&self) -> Option<Block> {
        match self.pop() {
            Some(block) => Some(block),
            None => {
                let block = Block::try_allocate(self.layout)?;
                self.stats.inc_fresh();
                Some(block)
            }
        }
    }

    /// Return a block; pooled if there is room, otherwise released
    pub fn free(&self, block: Block) {
        if block.layout() != self.layout {
            warn!(
                expected = self.layout.size(),
                actual = block.size(),
                "block freed to a pool with a different layout, releasing"
            );
            self.stats.inc_released();
            return;
        }

        match &self.blocks {
            Some(queue) => match queue.push(block) {
                Ok(()) => self.stats.inc_pooled(),
                Err(_full) => self.stats.inc_released(),
            },
            None => self.stats.inc_released(),
        }
    }

    #[inline]
    fn pop(&self) -> Option<Block> {
        let block = self.blocks.as_ref()?.pop()?;
        self.stats.inc_reused();
        Some(block)
    }

    #[inline]
    pub fn pooled_count(&self) -> usize {
        self.blocks.as_ref().map(|q| q.len()).unwrap_or(0)
    }

    #[inline]
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn stats(&self) -> FreeListStats {
        self.stats.snapshot(self.pooled_count())
    }
}

impl std::fmt::Debug for FreeList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreeList")
            .field("block_size", &self.layout.size())
            .field("max_count", &self.max_count)
            .field("pooled", &self.pooled_count())
            .finish()
    }
}
