//! Process-wide garbage list for retired sub-pools.
//!
//! A `Pool` whose owning `BlockPool` has moved on (a `reconfigure` to a
//! new block size, typically) must stay readable until its last `Block`
//! drops. Each entry here is just an `Arc<Pool>`; once the only remaining
//! strong reference is the garbage list's own, the pool is idle and gets
//! dropped, which frees its arena.

use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::pool::Pool;

static GARBAGE: Lazy<Mutex<Vec<Arc<Pool>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Parks a retired pool and immediately sweeps.
pub fn retire(pool: Arc<Pool>) {
    let mut list = GARBAGE.lock().unwrap();
    list.push(pool);
    sweep_locked(&mut list);
}

/// Drops every garbage-list entry with no outstanding blocks. Called
/// after every block release and after every `retire`.
pub fn sweep() {
    let mut list = GARBAGE.lock().unwrap();
    if !list.is_empty() {
        sweep_locked(&mut list);
    }
}

fn sweep_locked(list: &mut Vec<Arc<Pool>>) {
    let before = list.len();
    list.retain(|pool| Arc::strong_count(pool) > 1);
    if list.len() != before {
        debug!(reaped = before - list.len(), remaining = list.len(), "garbage list sweep");
    }
}

#[cfg(test)]
pub(crate) fn len() -> usize {
    GARBAGE.lock().unwrap().len()
}
