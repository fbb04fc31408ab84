use std::{
    any::Any,
    sync::{Arc, Condvar, Mutex},
    thread::{self, JoinHandle},
};

use tracing::{debug, info, warn};
use vlbi_comm::{InQ, OutQ, channel};

use crate::{
    error::ChainError,
    sigusr1,
    step::{Step, StepFn, StepId},
};

/// Per-step synchronization handle shared between the control thread and
/// every worker of that step. `stop()` sets `cancelled` and broadcasts
/// `condvar` under the step mutex so a worker parked on a condition
/// variable (e.g. a bounded queue wait) wakes immediately; workers parked
/// in a blocking syscall instead get `SIGUSR1` against their registered
/// thread id, which `install_handler`'s no-op handler turns into `EINTR`.
pub struct StepSync {
    cancelled: Mutex<bool>,
    condvar: Condvar,
    tids: Mutex<Vec<libc::pthread_t>>,
}

impl StepSync {
    fn new() -> Self {
        Self {
            cancelled: Mutex::new(false),
            condvar: Condvar::new(),
            tids: Mutex::new(Vec::new()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap()
    }

    /// Blocks until either `cancelled` is set or the timeout elapses,
    /// returning `true` if cancellation woke it. Workers that poll an
    /// otherwise-idle source (rather than blocking in a queue or socket
    /// read) can use this instead of a bare sleep.
    pub fn wait_timeout(&self, timeout: std::time::Duration) -> bool {
        let guard = self.cancelled.lock().unwrap();
        if *guard {
            return true;
        }
        let (guard, _) = self.condvar.wait_timeout(guard, timeout).unwrap();
        *guard
    }

    fn register_thread(&self) {
        self.tids.lock().unwrap().push(unsafe { libc::pthread_self() });
    }

    fn cancel(&self) {
        *self.cancelled.lock().unwrap() = true;
        self.condvar.notify_all();
        for tid in self.tids.lock().unwrap().iter() {
            sigusr1::interrupt_thread(*tid);
        }
    }
}

/// Blocks delivery of `SIGUSR1` against the calling thread. Called on the
/// control thread before spawning workers so the signal mask a freshly
/// spawned thread inherits starts blocked; each worker then explicitly
/// unblocks it for itself right before registering its thread id, so a
/// raised `SIGUSR1` can only ever land on a worker that asked for it.
fn block_sigusr1() {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGUSR1);
        libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
    }
}

fn unblock_sigusr1() {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGUSR1);
        libc::pthread_sigmask(libc::SIG_UNBLOCK, &set, std::ptr::null_mut());
    }
}

enum Endpoints<T> {
    /// Source step: no inbound, fresh outbound.
    Producer(OutQ<T>),
    /// Middle step: inbound from the previous step's outbound, fresh
    /// outbound for the next step.
    Transformer(InQ<T>, OutQ<T>),
    /// Sink step: inbound only.
    Consumer(InQ<T>),
}

/// An ordered pipeline of [`Step`]s connected by bounded queues, one
/// thread (or `nthreads` threads) per step. Steps are added in source to
/// sink order; each step's inbound queue is the previous step's outbound
/// queue, and a fresh outbound queue is created for every step that isn't
/// a consumer.
pub struct Chain<T> {
    capacity: usize,
    steps: Vec<Arc<Step<T>>>,
    endpoints: Vec<Endpoints<T>>,
    syncs: Vec<Arc<StepSync>>,
    cancel_hooks: Vec<Option<Box<dyn Fn() + Send + Sync>>>,
    finalizers: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    handles: Vec<(StepId, &'static str, JoinHandle<()>)>,
    pending_inq: Option<InQ<T>>,
    next_id: StepId,
    running: bool,
}

impl<T: Send + 'static> Chain<T> {
    /// `capacity` bounds every inter-step queue the chain creates.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            steps: Vec::new(),
            endpoints: Vec::new(),
            syncs: Vec::new(),
            cancel_hooks: Vec::new(),
            finalizers: Mutex::new(Vec::new()),
            handles: Vec::new(),
            pending_inq: None,
            next_id: 0,
            running: false,
        }
    }

    /// Appends a step. The step's inbound queue is the previous step's
    /// outbound queue; a fresh outbound queue of the chain's configured
    /// capacity is created unless `entry` is a consumer.
    pub fn add<U: Send + Sync + 'static>(
        &mut self,
        name: &'static str,
        entry: StepFn<T>,
        nthreads: usize,
        user_data: Arc<Mutex<U>>,
    ) -> StepId {
        assert!(nthreads >= 1, "step {name} needs at least one thread");

        let id = self.next_id;
        self.next_id += 1;

        let inq = self.pending_inq.take();
        let endpoints = match (entry.is_consumer(), inq) {
            (true, Some(inq)) => Endpoints::Consumer(inq),
            (true, None) => {
                // A consumer with no predecessor is degenerate but not
                // invalid: it simply never receives anything.
                let (_outq, inq) = channel(self.capacity);
                Endpoints::Consumer(inq)
            }
            (false, maybe_inq) => {
                let (outq, next_inq) = channel(self.capacity);
                self.pending_inq = Some(next_inq);
                match maybe_inq {
                    Some(inq) => Endpoints::Transformer(inq, outq),
                    None => Endpoints::Producer(outq),
                }
            }
        };

        let step = Arc::new(Step {
            id,
            name,
            nthreads,
            entry,
            user_data: user_data as Arc<dyn Any + Send + Sync>,
        });

        self.steps.push(step);
        self.endpoints.push(endpoints);
        self.syncs.push(Arc::new(StepSync::new()));
        self.cancel_hooks.push(None);
        id
    }

    /// Attaches a callback invoked (on the control thread, during `stop`)
    /// when `stepid` is cancelled, before its cancellation flag is set.
    pub fn register_cancel<F>(&mut self, stepid: StepId, hook: F) -> Result<(), ChainError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let idx = self.index_of(stepid)?;
        self.cancel_hooks[idx] = Some(Box::new(hook));
        Ok(())
    }

    /// Attaches a callback run once, after every worker thread has
    /// exited, in registration order.
    pub fn register_final<F>(&mut self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.finalizers.lock().unwrap().push(Box::new(hook));
    }

    fn index_of(&self, stepid: StepId) -> Result<usize, ChainError> {
        self.steps
            .iter()
            .position(|s| s.id == stepid)
            .ok_or(ChainError::UnknownStep(stepid))
    }

    /// Spawns every step's worker threads. Steps are started leaf
    /// (consumer) to root (producer) so a step never starts feeding a
    /// successor that isn't listening yet.
    pub fn run(&mut self) -> Result<(), ChainError> {
        if self.running {
            return Err(ChainError::AlreadyRunning);
        }

        block_sigusr1();

        for i in (0..self.steps.len()).rev() {
            let step = self.steps[i].clone();
            let sync = self.syncs[i].clone();
            let (inq, outq) = match &self.endpoints[i] {
                Endpoints::Producer(outq) => (None, Some(outq.clone())),
                Endpoints::Transformer(inq, outq) => (Some(inq.clone()), Some(outq.clone())),
                Endpoints::Consumer(inq) => (Some(inq.clone()), None),
            };

            info!(step = step.name, kind = step.entry.kind(), nthreads = step.nthreads, "starting step");
            let step_id = step.id;
            let step_name = step.name;
            for _ in 0..step.nthreads {
                let step = step.clone();
                let sync = sync.clone();
                let inq = inq.clone();
                let outq = outq.clone();
                let handle = thread::spawn(move || {
                    sigusr1::install_handler();
                    unblock_sigusr1();
                    sync.register_thread();
                    match &step.entry {
                        StepFn::Producer(f) => {
                            f(outq.as_ref().expect("producer step has an outbound queue"), &sync)
                        }
                        StepFn::Transformer(f) => f(
                            inq.as_ref().expect("transformer step has an inbound queue"),
                            outq.as_ref().expect("transformer step has an outbound queue"),
                            &sync,
                        ),
                        StepFn::Consumer(f) => {
                            f(inq.as_ref().expect("consumer step has an inbound queue"), &sync)
                        }
                    }
                    debug!(step = step.name, "worker exited");
                });
                self.handles.push((step_id, step_name, handle));
            }
        }

        self.running = true;
        Ok(())
    }

    /// Cancels every step, drains queues in order, joins all workers, and
    /// runs finalizers. Idempotent only in the sense that calling it while
    /// not running is an error; it is not safe to call twice.
    pub fn stop(&mut self) -> Result<(), ChainError> {
        if !self.running {
            return Err(ChainError::NotRunning);
        }

        for (i, sync) in self.syncs.iter().enumerate() {
            if let Some(hook) = &self.cancel_hooks[i] {
                hook();
            }
            sync.cancel();
        }

        for endpoints in &self.endpoints {
            match endpoints {
                Endpoints::Producer(outq) | Endpoints::Transformer(_, outq) => {
                    outq.enable_pop_only();
                }
                Endpoints::Consumer(_) => {}
            }
        }

        let mut panicked = None;
        for (step_id, step_name, handle) in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!(step = step_name, "worker thread panicked");
                panicked.get_or_insert((step_id, step_name));
            }
        }

        for finalizer in self.finalizers.lock().unwrap().drain(..) {
            finalizer();
        }

        self.running = false;

        if let Some((step, name)) = panicked {
            return Err(ChainError::WorkerPanicked { step, name });
        }
        Ok(())
    }

    /// Invokes `f` against `stepid`'s user-data under its mutex. Returns
    /// `None` if `stepid` is unknown or `U` doesn't match the type the
    /// step was `add`ed with.
    pub fn communicate<U, F, R>(&self, stepid: StepId, f: F) -> Option<R>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&mut U) -> R,
    {
        let idx = self.index_of(stepid).ok()?;
        let any = self.steps[idx].user_data.clone();
        let mutex = any.downcast::<Mutex<U>>().ok()?;
        let mut guard = mutex.lock().unwrap();
        Some(f(&mut guard))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::step::user_data;

    #[test]
    fn producer_transformer_consumer_moves_items() {
        let mut chain: Chain<u64> = Chain::new(8);
        let produced = user_data(0u64..10);
        let sum = user_data(0u64);

        let p_data = produced.clone();
        let producer = chain.add(
            "producer",
            StepFn::Producer(Box::new(move |outq, sync| {
                loop {
                    let next = { p_data.lock().unwrap().next() };
                    match next {
                        Some(v) => {
                            if !outq.push(v) {
                                break;
                            }
                        }
                        None => break,
                    }
                    if sync.is_cancelled() {
                        break;
                    }
                }
                outq.enable_pop_only();
            })),
            1,
            produced,
        );

        let s_data = sum.clone();
        let consumer = chain.add(
            "consumer",
            StepFn::Consumer(Box::new(move |inq, _sync| {
                while let Some(v) = inq.pop() {
                    *s_data.lock().unwrap() += v;
                }
            })),
            1,
            sum.clone(),
        );

        let _ = producer;
        chain.run().unwrap();
        // Give the producer a moment to drain; the consumer blocks until
        // pop-only + empty yields a clean exit.
        std::thread::sleep(std::time::Duration::from_millis(50));
        chain.stop().unwrap();

        let total: u64 = chain.communicate(consumer, |s: &mut u64| *s).unwrap();
        assert_eq!(total, 45);
    }

    #[test]
    fn stop_on_idle_producer_still_joins() {
        let mut chain: Chain<u64> = Chain::new(4);
        let hits = user_data(AtomicU64::new(0));
        let h = hits.clone();

        let producer = chain.add(
            "idle-producer",
            StepFn::Producer(Box::new(move |_outq, sync| {
                while !sync.wait_timeout(std::time::Duration::from_millis(5)) {
                    h.lock().unwrap().fetch_add(1, Ordering::Relaxed);
                }
            })),
            1,
            hits.clone(),
        );

        chain.run().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        chain.stop().unwrap();

        let count: u64 = chain
            .communicate(producer, |a: &mut AtomicU64| a.load(Ordering::Relaxed))
            .unwrap();
        assert!(count > 0);
    }

    #[test]
    fn unknown_step_is_an_error() {
        let chain: Chain<u64> = Chain::new(4);
        assert!(matches!(chain.communicate::<u64, _, ()>(999, |_| ()), None));
    }
}
