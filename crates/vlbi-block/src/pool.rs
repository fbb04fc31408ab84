use std::{
    cell::UnsafeCell,
    sync::{
        Arc,
        atomic::{AtomicU8, AtomicUsize, Ordering},
    },
};

use crate::{block::Block, error::PoolError};

/// 16 trailing bytes past the last block: some bit-unpackers read a few
/// words past the end of the buffer they're decoding.
const SLACK: usize = 16;

/// A fixed-shape arena of `nblock` slots of `block_size` bytes, each
/// guarded by an atomic use-count. `try_get` never blocks: a full scan
/// that finds no free slot returns `None` and leaves growth to
/// [`crate::BlockPool`].
pub struct Pool {
    memory: UnsafeCell<Box<[u8]>>,
    use_cnt: Box<[AtomicU8]>,
    block_size: usize,
    nblock: usize,
    next_alloc: AtomicUsize,
}

// SAFETY: `memory` is only ever sliced at the disjoint ranges
// `[slot * block_size, (slot + 1) * block_size)`, and a slot is only ever
// handed out to one live `Block` (or its `sub()` descendants) at a time -
// enforced by the `use_cnt[slot]` compare-exchange in `try_get`.
unsafe impl Sync for Pool {}

impl Pool {
    pub fn new(block_size: usize, nblock: usize) -> Result<Arc<Pool>, PoolError> {
        if block_size == 0 || nblock == 0 {
            return Err(PoolError::InvalidShape);
        }
        let total = (block_size as u64)
            .checked_mul(nblock as u64)
            .and_then(|n| n.checked_add(SLACK as u64))
            .filter(|&n| n <= u32::MAX as u64)
            .ok_or(PoolError::Overflow { block_size, nblock })?;

        let memory = vec![0u8; total as usize].into_boxed_slice();
        let use_cnt = (0..nblock).map(|_| AtomicU8::new(0)).collect::<Vec<_>>().into_boxed_slice();

        Ok(Arc::new(Pool {
            memory: UnsafeCell::new(memory),
            use_cnt,
            block_size,
            nblock,
            next_alloc: AtomicUsize::new(0),
        }))
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn nblock(&self) -> usize {
        self.nblock
    }

    pub(crate) fn use_cnt(&self, slot: usize) -> &AtomicU8 {
        &self.use_cnt[slot]
    }

    pub(crate) fn slot_ptr(&self, slot: usize) -> *mut u8 {
        unsafe { (*self.memory.get()).as_mut_ptr().add(slot * self.block_size) }
    }

    /// Scans for a free slot starting at the cursor, wrapping once. Never
    /// blocks: an empty pool just returns `None`.
    pub fn try_get(self: &Arc<Self>) -> Option<Block> {
        let start = self.next_alloc.load(Ordering::Relaxed) % self.nblock;
        let mut cur = start;
        loop {
            if self.use_cnt[cur].compare_exchange(0, 1, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
                self.next_alloc.store((cur + 1) % self.nblock, Ordering::Relaxed);
                return Some(Block::new(self.clone(), cur));
            }
            cur = (cur + 1) % self.nblock;
            if cur == start {
                return None;
            }
        }
    }

    /// True if no slot currently has an outstanding block. Used by the
    /// garbage list to decide whether a retired pool can be reaped.
    pub fn is_idle(&self) -> bool {
        self.use_cnt.iter().all(|c| c.load(Ordering::Acquire) == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_slot_pool_prevents_get_until_release() {
        let pool = Pool::new(64, 1).unwrap();
        let block = pool.try_get().expect("first get succeeds");
        assert!(pool.try_get().is_none(), "slot is occupied");
        drop(block);
        assert!(pool.try_get().is_some(), "slot freed on release");
    }

    #[test]
    fn cursor_cycles_through_all_slots() {
        let pool = Pool::new(16, 4).unwrap();
        let blocks: Vec<_> = (0..4).map(|_| pool.try_get().unwrap()).collect();
        assert!(pool.try_get().is_none());
        drop(blocks);
        assert!(pool.is_idle());
    }

    #[test]
    fn rejects_invalid_shape() {
        assert!(matches!(Pool::new(0, 4), Err(PoolError::InvalidShape)));
        assert!(matches!(Pool::new(4, 0), Err(PoolError::InvalidShape)));
    }

    #[test]
    fn rejects_overflowing_shape() {
        assert!(matches!(Pool::new(usize::MAX / 2, 4), Err(PoolError::Overflow { .. })));
    }

    #[test]
    fn block_contents_are_independently_writable() {
        let pool = Pool::new(8, 2).unwrap();
        let mut a = pool.try_get().unwrap();
        let mut b = pool.try_get().unwrap();
        a.as_mut_slice().copy_from_slice(&[1; 8]);
        b.as_mut_slice().copy_from_slice(&[2; 8]);
        assert_eq!(a.as_slice(), &[1; 8]);
        assert_eq!(b.as_slice(), &[2; 8]);
    }
}
