use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use tracing::debug;

use crate::{block::Block, error::PoolError, garbage, pool::Pool};

/// A pool of pools: starts with one [`Pool`] and adds more as they fill
/// up. `get()` cycles through every sub-pool looking for a free slot
/// before growing, so a steady-state workload settles on however many
/// sub-pools its working set needs and stops allocating.
pub struct BlockPool {
    block_size: usize,
    nblock_per_pool: usize,
    pools: Mutex<Vec<Arc<Pool>>>,
    cursor: AtomicUsize,
}

impl BlockPool {
    pub fn new(block_size: usize, nblock_per_pool: usize) -> Result<Self, PoolError> {
        let first = Pool::new(block_size, nblock_per_pool)?;
        Ok(Self { block_size, nblock_per_pool, pools: Mutex::new(vec![first]), cursor: AtomicUsize::new(0) })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn pool_count(&self) -> usize {
        self.pools.lock().unwrap().len()
    }

    /// Returns a block, allocating a fresh sub-pool if every existing one
    /// is full. A freshly created pool is assumed to always have a free
    /// slot; that only fails if the shape itself is invalid, which
    /// [`BlockPool::new`] already validated.
    pub fn get(&self) -> Block {
        {
            let pools = self.pools.lock().unwrap();
            let start = self.cursor.load(Ordering::Relaxed) % pools.len();
            let mut i = start;
            loop {
                if let Some(block) = pools[i].try_get() {
                    self.cursor.store(i, Ordering::Relaxed);
                    return block;
                }
                i = (i + 1) % pools.len();
                if i == start {
                    break;
                }
            }
        }

        let fresh = Pool::new(self.block_size, self.nblock_per_pool)
            .expect("shape already validated by BlockPool::new");
        let block = fresh.try_get().expect("a freshly created pool always has a free slot");

        let mut pools = self.pools.lock().unwrap();
        debug!(pools = pools.len() + 1, block_size = self.block_size, "growing block pool");
        pools.push(fresh);
        self.cursor.store(pools.len() - 1, Ordering::Relaxed);
        block
    }

    /// Retires every current sub-pool and starts a fresh set at the new
    /// shape. Retired pools still holding outstanding blocks are parked
    /// on the process-wide garbage list rather than freed in place.
    pub fn reconfigure(&mut self, block_size: usize, nblock_per_pool: usize) -> Result<(), PoolError> {
        let fresh = Pool::new(block_size, nblock_per_pool)?;
        let retired = std::mem::replace(&mut *self.pools.lock().unwrap(), vec![fresh]);
        self.cursor.store(0, Ordering::Relaxed);
        self.block_size = block_size;
        self.nblock_per_pool = nblock_per_pool;
        for pool in retired {
            garbage::retire(pool);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_a_new_pool_when_the_first_is_full() {
        let bp = BlockPool::new(8, 2).unwrap();
        let _a = bp.get();
        let _b = bp.get();
        assert_eq!(bp.pool_count(), 1);
        let _c = bp.get();
        assert_eq!(bp.pool_count(), 2);
    }

    #[test]
    fn reconfigure_parks_busy_pools_on_the_garbage_list() {
        let mut bp = BlockPool::new(8, 1).unwrap();
        let outstanding = bp.get();
        bp.reconfigure(16, 1).unwrap();
        assert_eq!(bp.block_size(), 16);
        assert_eq!(bp.pool_count(), 1);
        assert!(crate::garbage_list_len() >= 1);
        drop(outstanding);
        assert_eq!(crate::garbage_list_len(), 0);
    }

    #[test]
    fn reconfigure_reaps_idle_pools_immediately() {
        let mut bp = BlockPool::new(8, 1).unwrap();
        let block = bp.get();
        drop(block);
        bp.reconfigure(16, 1).unwrap();
        assert_eq!(crate::garbage_list_len(), 0);
    }
}
