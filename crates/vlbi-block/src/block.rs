use std::sync::{Arc, atomic::Ordering};

use crate::{garbage, pool::Pool};

/// A reference-counted view over a range inside a pool-owned buffer: the
/// atomic data unit that moves through a `vlbi-chain` chain. A single
/// physical buffer can traverse the whole chain without copying, since
/// every step just clones or `sub()`s the same handle.
pub struct Block {
    pool: Arc<Pool>,
    slot: usize,
    offset: usize,
    len: usize,
}

impl Block {
    pub(crate) fn new(pool: Arc<Pool>, slot: usize) -> Self {
        let len = pool.block_size();
        Self { pool, slot, offset: 0, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.pool.slot_ptr(self.slot).add(self.offset), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.pool.slot_ptr(self.slot).add(self.offset), self.len) }
    }

    /// A new handle onto `self.as_slice()[offset..offset + len]`, sharing
    /// this block's use-count. The underlying slot isn't freed until
    /// every outstanding view - this one, the sub-view, and any further
    /// `sub()` of either - has been dropped.
    pub fn sub(&self, offset: usize, len: usize) -> Block {
        assert!(offset.checked_add(len).is_some_and(|end| end <= self.len), "sub-block range out of bounds");
        self.pool.use_cnt(self.slot).fetch_add(1, Ordering::AcqRel);
        Block { pool: self.pool.clone(), slot: self.slot, offset: self.offset + offset, len }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        self.pool.use_cnt(self.slot).fetch_sub(1, Ordering::AcqRel);
        garbage::sweep();
    }
}

// SAFETY: `as_slice`/`as_mut_slice` only ever reach the byte range this
// handle owns exclusively (enforced by the use-count protocol in `Pool`),
// so sending or sharing a `Block` across threads is sound.
unsafe impl Send for Block {}
unsafe impl Sync for Block {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_shares_the_slot_until_all_views_drop() {
        let pool = Pool::new(16, 1).unwrap();
        let block = pool.try_get().unwrap();
        let half = block.sub(0, 8);
        drop(block);
        assert!(pool.try_get().is_none(), "slot still referenced by `half`");
        drop(half);
        assert!(pool.try_get().is_some());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn sub_out_of_range_panics() {
        let pool = Pool::new(16, 1).unwrap();
        let block = pool.try_get().unwrap();
        let _ = block.sub(10, 10);
    }
}
