//! Named queues shared across independently-built chains, e.g. a
//! recorder's output chain handing blocks to a playback chain running in
//! the same process. Registered queues share the same three-state
//! lifecycle (`Enabled` / `PopOnly` / `Disabled`) as a chain's own
//! inter-step queues, so a bus producer finishing cleanly drains the same
//! way a chain step does.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, Mutex},
};

use once_cell::sync::Lazy;
use vlbi_comm::{BoundedQueue, InQ, OutQ};

struct Entry {
    type_id: TypeId,
    queue: Arc<dyn Any + Send + Sync>,
}

static BUS: Lazy<Mutex<HashMap<String, Entry>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Returns the named bus queue's `(OutQ, InQ)` pair, creating it with
/// capacity `n` on first use. Later calls ignore `n` and return endpoints
/// onto the existing queue; callers that care should agree on a capacity
/// out of band.
pub fn get_or_create<T: Send + Sync + 'static>(name: &str, n: usize) -> (OutQ<T>, InQ<T>) {
    let mut bus = BUS.lock().unwrap();
    let entry = bus.entry(name.to_string()).or_insert_with(|| Entry {
        type_id: TypeId::of::<BoundedQueue<T>>(),
        queue: Arc::new(BoundedQueue::<T>::new(n)),
    });
    assert_eq!(
        entry.type_id,
        TypeId::of::<BoundedQueue<T>>(),
        "bus queue {name:?} already registered with a different item type"
    );
    let queue = entry
        .queue
        .clone()
        .downcast::<BoundedQueue<T>>()
        .expect("type_id check above guarantees this downcast succeeds");
    (OutQ::new(queue.clone()), InQ::new(queue))
}

/// Removes a bus queue's registration. Existing `OutQ`/`InQ` handles keep
/// working against the `Arc` they already hold; this only stops new
/// `get_or_create` calls from finding it.
pub fn remove(name: &str) {
    BUS.lock().unwrap().remove(name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_lookups_share_the_same_queue() {
        let (tx, rx) = get_or_create::<i32>("test-bus-a", 4);
        let (tx2, _rx2) = get_or_create::<i32>("test-bus-a", 4);
        assert!(tx2.push(7));
        assert_eq!(rx.pop(), Some(7));
        remove("test-bus-a");
        let _ = tx;
    }

    #[test]
    #[should_panic(expected = "different item type")]
    fn mismatched_type_panics() {
        let _ = get_or_create::<i32>("test-bus-b", 4);
        let _ = get_or_create::<String>("test-bus-b", 4);
    }

    #[test]
    fn removed_name_is_recreated_fresh() {
        let (tx, _rx) = get_or_create::<i32>("test-bus-c", 4);
        tx.push(1);
        remove("test-bus-c");
        let (_tx2, rx2) = get_or_create::<i32>("test-bus-c", 4);
        assert_eq!(rx2.try_pop(), None);
    }
}
