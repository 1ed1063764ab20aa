/*!
 * Memory Module
 * Fixed-size block pooling
 */

pub mod free_list;
pub mod types;

// Re-export for convenience
pub use free_list::FreeList;
pub use types::{Block, FreeListStats, BLOCK_ALIGNMENT};
