/*!
 * Free List Tests
 * Pool bound under concurrent churn
 */

use refcore::memory::FreeList;
use std::sync::Arc;
use std::thread;

#[test]
fn test_pool_bound_is_exact_under_contention() {
    let pool = Arc::new(FreeList::new(128, 16).expect("Failed to create pool"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let blocks: Vec<_> = (0..8).map(|_| pool.allocate()).collect();
                    for block in blocks {
                        assert_eq!(block.size(), 128);
                        pool.free(block);
                    }
                    assert!(pool.pooled_count() <= 16);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread panicked");
    }

    let stats = pool.stats();
    assert!(stats.pooled_blocks <= 16);
    assert_eq!(stats.reused_allocations + stats.fresh_allocations, 8 * 200 * 8);
    assert_eq!(stats.pooled_frees + stats.released_frees, 8 * 200 * 8);
    assert!(stats.hit_rate() > 0.0);
}

#[test]
fn test_zero_max_count_never_pools() {
    let pool = FreeList::new(32, 0).expect("Failed to create pool");
    let block = pool.allocate();
    pool.free(block);
    assert_eq!(pool.pooled_count(), 0);
    assert_eq!(pool.stats().released_frees, 1);
}

#[test]
fn test_safe_allocation_returns_block() {
    let pool = FreeList::new(64, 2).expect("Failed to create pool");
    let block = pool.try_allocate().expect("allocation");
    assert_eq!(block.size(), 64);
    assert_eq!(block.as_ptr() as usize % refcore::memory::BLOCK_ALIGNMENT, 0);
    pool.free(block);
    assert_eq!(pool.pooled_count(), 1);
}
