//! A bounded worker pool that lazily spawns threads to drain a shared queue.
//!
//! The pool is the execution substrate for everything in this crate:
//! continuations queued on a settling promise, chained callbacks, and tasks
//! handed directly to [`WorkerPool::submit`]. It grows one thread at a time
//! as work arrives, up to a fixed maximum, and each worker exits as soon as
//! it observes an empty queue. A worker never re-enters the pool once it has
//! exited; a later `submit` spawns a fresh one.
//!
//! Tasks submitted here are fire-and-forget: a task that panics is caught,
//! logged, and discarded, and the worker keeps draining the queue. Work that
//! needs a failure channel should go through [`Promise::run`] instead, which
//! reports panics and errors as a rejection.
//!
//! [`Promise::run`]: crate::promise::Promise::run

use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

/// A unit of work accepted by the pool.
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

// -----------------------------------------------------------------------------
// Worker pool

/// A bounded set of worker threads draining a shared task queue.
///
/// `WorkerPool` is a cheap-to-clone handle; clones share the same queue and
/// workers. The pool is created with a fixed capacity and never resizes.
/// There is no global instance: construct one and pass it to the promise
/// constructors that need it. The capacity bounds concurrency, not queue
/// length; `submit` never blocks.
///
/// ```
/// use pact::pool::WorkerPool;
///
/// let pool = WorkerPool::new(4);
/// pool.submit(|| println!("ran on a pool thread"));
/// pool.wait_until_idle();
/// ```
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    /// Maximum number of concurrently live workers.
    max_workers: usize,
    /// Queue and worker bookkeeping, behind a single mutex. The spawn
    /// decision in `submit` and the exit decision in the worker loop both
    /// read and write `running` in the same critical section that mutates
    /// the queue; that is what keeps the worker count at or below
    /// `max_workers` and ensures no task is left behind by an exiting
    /// worker. Padded so contention on this lock does not share a cache
    /// line with the read-only capacity.
    shared: CachePadded<Mutex<PoolShared>>,
}

struct PoolShared {
    /// Tasks not yet claimed by a worker.
    queue: VecDeque<Task>,
    /// Number of live workers, incremented before spawning and decremented
    /// by the worker in the same critical section in which it observes an
    /// empty queue.
    running: usize,
    /// Total workers ever spawned; used to label worker threads in traces.
    spawned: u64,
    /// Join handles of every worker spawned so far, drained by
    /// `wait_until_idle`.
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Creates a pool that will run at most `max_workers` tasks
    /// concurrently.
    ///
    /// # Panics
    ///
    /// Panics if `max_workers` is zero.
    pub fn new(max_workers: usize) -> WorkerPool {
        assert!(max_workers > 0, "worker pool needs at least one worker");
        WorkerPool {
            inner: Arc::new(PoolInner {
                max_workers,
                shared: CachePadded::new(Mutex::new(PoolShared {
                    queue: VecDeque::new(),
                    running: 0,
                    spawned: 0,
                    workers: Vec::new(),
                })),
            }),
        }
    }

    /// The pool's fixed capacity.
    pub fn max_workers(&self) -> usize {
        self.inner.max_workers
    }

    /// Enqueues a task and, if the pool is below capacity, spawns a worker
    /// to serve it. Returns immediately; the submitter never blocks on the
    /// task.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut shared = self.inner.shared.lock();
        shared.queue.push_back(Box::new(task));

        // The check-and-increment must happen under the same lock as the
        // push: two submitters racing past capacity would otherwise both
        // observe "below max" and overshoot it.
        if shared.running < self.inner.max_workers {
            shared.running += 1;
            shared.spawned += 1;
            let worker = shared.spawned;
            tracing::trace!(worker, "spawning pool worker");
            let inner = Arc::clone(&self.inner);
            let handle = thread::spawn(move || worker_loop(inner, worker));
            shared.workers.push(handle);
        }
    }

    /// Drops every task that has not yet been claimed by a worker. Tasks
    /// already dispatched continue to run.
    pub fn discard(&self) {
        let mut shared = self.inner.shared.lock();
        let dropped = shared.queue.len();
        shared.queue.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded queued tasks");
        }
    }

    /// Blocks until every worker spawned so far has exited, which happens
    /// once the queue is fully drained.
    ///
    /// Safe to call while other threads keep submitting; each newly spawned
    /// worker is joined as well, so this returns only at a moment when the
    /// pool was observed with no live workers. The caller is responsible for
    /// knowing that submission has stopped if it needs a deterministic
    /// quiescence point. Must not be called from a pool worker, which would
    /// join itself.
    pub fn wait_until_idle(&self) {
        loop {
            let handle = self.inner.shared.lock().workers.pop();
            match handle {
                Some(handle) => {
                    let _ = handle.join();
                }
                None => break,
            }
        }
    }
}

impl Default for WorkerPool {
    /// A pool with the conventional capacity of ten workers.
    fn default() -> WorkerPool {
        WorkerPool::new(10)
    }
}

// -----------------------------------------------------------------------------
// Worker loop

/// Drains the queue until it is observed empty, then exits.
///
/// The empty-queue check and the live-count decrement happen in one critical
/// section: a concurrent `submit` either pushes before the check (and this
/// worker claims the task) or locks after the decrement (and sees a pool
/// below capacity, spawning a replacement). There is no window in which a
/// queued task has no worker coming for it.
fn worker_loop(inner: Arc<PoolInner>, worker: u64) {
    loop {
        let task = {
            let mut shared = inner.shared.lock();
            match shared.queue.pop_front() {
                Some(task) => task,
                None => {
                    shared.running -= 1;
                    break;
                }
            }
        };

        // One task's panic must never take the worker down with it; the
        // queue behind it still has to drain.
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::debug!(worker, "pool task panicked; continuing");
        }
    }
    tracing::trace!(worker, "pool worker exiting");
}
