use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex},
};

/// Lifecycle state of a [`BoundedQueue`].
///
/// Transitions only ever move forward: `Enabled` -> `PopOnly` -> `Disabled`,
/// or `Enabled` -> `Disabled` directly. `resize_enable_push` is the only way
/// back to `Enabled`, and is meant to be called before a queue is shared with
/// any worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Enabled,
    PopOnly,
    Disabled,
}

struct Inner<T> {
    buf: VecDeque<T>,
    capacity: usize,
    state: QueueState,
}

/// A bounded, multi-producer multi-consumer queue with a three-state
/// lifecycle.
///
/// Unlike a plain channel, a `BoundedQueue` distinguishes "the producer
/// finished cleanly, let consumers drain what's left" (`PopOnly`) from
/// "abort now, wake everyone" (`Disabled`). A chain stop sequence needs both:
/// enabling pop-only on every inter-step queue lets drains cascade in order,
/// while disabling a queue directly is how a cancel callback breaks a worker
/// out of a blocking push or pop immediately.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner { buf: VecDeque::with_capacity(capacity), capacity, state: QueueState::Enabled }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Blocks while `enabled && full`. Returns `true` if the item was
    /// stored, `false` if the queue was disabled or switched to pop-only
    /// while waiting.
    pub fn push(&self, item: T) -> bool {
        let mut guard = self.inner.lock().unwrap();
        loop {
            match guard.state {
                QueueState::Disabled | QueueState::PopOnly => return false,
                QueueState::Enabled => {
                    if guard.buf.len() < guard.capacity {
                        guard.buf.push_back(item);
                        self.not_empty.notify_one();
                        return true;
                    }
                    guard = self.not_full.wait(guard).unwrap();
                }
            }
        }
    }

    /// Never blocks. `false` on full or not-enabled.
    pub fn try_push(&self, item: T) -> bool {
        let mut guard = self.inner.lock().unwrap();
        if guard.state != QueueState::Enabled || guard.buf.len() >= guard.capacity {
            return false;
        }
        guard.buf.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Blocks while `enabled && empty`. Returns `None` when the queue
    /// becomes pop-only-and-empty, or is disabled.
    pub fn pop(&self) -> Option<T> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if let Some(item) = guard.buf.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            match guard.state {
                QueueState::Disabled => return None,
                QueueState::PopOnly => return None,
                QueueState::Enabled => {
                    guard = self.not_empty.wait(guard).unwrap();
                }
            }
        }
    }

    /// Never blocks.
    pub fn try_pop(&self) -> Option<T> {
        let mut guard = self.inner.lock().unwrap();
        let item = guard.buf.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Installs capacity `n`, sets state to `Enabled`, and wakes all
    /// waiters. Meant to be called once, before the queue is shared with
    /// any worker.
    pub fn resize_enable_push(&self, n: usize) {
        let mut guard = self.inner.lock().unwrap();
        guard.capacity = n;
        guard.state = QueueState::Enabled;
        drop(guard);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Closes the push endpoint; pop drains the remainder then returns
    /// `None`.
    pub fn enable_pop_only(&self) {
        let mut guard = self.inner.lock().unwrap();
        if guard.state == QueueState::Enabled {
            guard.state = QueueState::PopOnly;
        }
        drop(guard);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Both endpoints fail immediately, dropping any buffered contents.
    pub fn disable(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.state = QueueState::Disabled;
        drop(guard);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Drops contents without touching state.
    pub fn clear(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.buf.clear();
        drop(guard);
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity
    }

    pub fn state(&self) -> QueueState {
        self.inner.lock().unwrap().state
    }
}

/// Pop-only endpoint handle, shared with the upstream step's `OutQ`.
#[derive(Clone)]
pub struct InQ<T> {
    queue: Arc<BoundedQueue<T>>,
}

impl<T> InQ<T> {
    pub fn new(queue: Arc<BoundedQueue<T>>) -> Self {
        Self { queue }
    }

    pub fn pop(&self) -> Option<T> {
        self.queue.pop()
    }

    pub fn try_pop(&self) -> Option<T> {
        self.queue.try_pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn inner(&self) -> &Arc<BoundedQueue<T>> {
        &self.queue
    }
}

/// Push-only endpoint handle.
#[derive(Clone)]
pub struct OutQ<T> {
    queue: Arc<BoundedQueue<T>>,
}

impl<T> OutQ<T> {
    pub fn new(queue: Arc<BoundedQueue<T>>) -> Self {
        Self { queue }
    }

    pub fn push(&self, item: T) -> bool {
        self.queue.push(item)
    }

    pub fn try_push(&self, item: T) -> bool {
        self.queue.try_push(item)
    }

    pub fn enable_pop_only(&self) {
        self.queue.enable_pop_only()
    }

    pub fn disable(&self) {
        self.queue.disable()
    }

    pub fn inner(&self) -> &Arc<BoundedQueue<T>> {
        &self.queue
    }
}

/// Creates a linked `OutQ`/`InQ` pair over a fresh queue of capacity `n`.
pub fn channel<T>(n: usize) -> (OutQ<T>, InQ<T>) {
    let queue = Arc::new(BoundedQueue::new(n));
    (OutQ::new(queue.clone()), InQ::new(queue))
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn basic_push_pop() {
        let (tx, rx) = channel::<i32>(4);
        assert!(tx.push(1));
        assert!(tx.push(2));
        assert_eq!(rx.pop(), Some(1));
        assert_eq!(rx.pop(), Some(2));
    }

    #[test]
    fn try_push_fails_when_full() {
        let q = BoundedQueue::new(2);
        assert!(q.try_push(1));
        assert!(q.try_push(2));
        assert!(!q.try_push(3));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn enable_pop_only_drains_then_stops() {
        let q = BoundedQueue::new(4);
        assert!(q.push(1));
        assert!(q.push(2));
        q.enable_pop_only();
        assert!(!q.push(3));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn disable_fails_both_endpoints_immediately() {
        let q = BoundedQueue::new(4);
        assert!(q.push(1));
        q.disable();
        assert!(!q.push(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn clear_drops_contents_without_touching_state() {
        let q = BoundedQueue::new(4);
        q.push(1);
        q.push(2);
        q.clear();
        assert_eq!(q.len(), 0);
        assert_eq!(q.state(), QueueState::Enabled);
        assert!(q.push(3));
    }

    #[test]
    fn blocking_pop_wakes_on_disable() {
        let q = Arc::new(BoundedQueue::<i32>::new(4));
        let q2 = q.clone();
        let h = thread::spawn(move || q2.pop());
        thread::sleep(std::time::Duration::from_millis(20));
        q.disable();
        assert_eq!(h.join().unwrap(), None);
    }

    #[test]
    fn blocking_push_wakes_on_pop_only() {
        let q = Arc::new(BoundedQueue::<i32>::new(1));
        assert!(q.push(1));
        let q2 = q.clone();
        let h = thread::spawn(move || q2.push(2));
        thread::sleep(std::time::Duration::from_millis(20));
        q.enable_pop_only();
        assert_eq!(h.join().unwrap(), false);
    }

    #[test]
    fn multithread_produce_consume() {
        let (tx, rx) = channel::<usize>(16);
        let total = 10_000usize;
        let producer = {
            let tx = tx.clone();
            thread::spawn(move || {
                for i in 0..total {
                    tx.push(i);
                }
            })
        };
        let mut sum = 0usize;
        let mut count = 0usize;
        while count < total {
            if let Some(v) = rx.pop() {
                sum += v;
                count += 1;
            }
        }
        producer.join().unwrap();
        assert_eq!(sum, (0..total).sum());
    }
}
