//! The deferred/promise pair and continuation chaining.
//!
//! A [`Deferred`] is the write capability for one settlement cell; the
//! [`Promise`] is its read-only view. The split is static: holding a
//! `Promise` gives no way to settle it, so handing promises to consumers
//! never leaks the producer's authority. Both are cheap handle clones over
//! the same shared cell, which stays alive as long as any handle (or any
//! continuation derived from one) does.
//!
//! Chaining produces a new pair on the same pool. The chained callback
//! always runs on a pool worker, even when the parent was already settled
//! when the chain was registered, so a `then` never settles its derived
//! promise before returning, and long chains cannot grow the settling
//! thread's stack.

use std::{
    error::Error,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{
    cell::{Cell, State},
    error::{panic_failure, Failure},
    pool::WorkerPool,
};

// -----------------------------------------------------------------------------
// Deferred

/// The producer half of a promise: the only handle that can settle it.
///
/// Both settling operations are safe to race: the first transition out of
/// pending wins, and every later attempt is a silent no-op.
///
/// Dropping every `Deferred` clone without settling leaves the promise
/// pending forever; blocked readers will not be woken.
pub struct Deferred<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Deferred<T> {
    /// Creates a settlement cell scheduled on `pool` and returns its paired
    /// write and read handles.
    pub fn new(pool: &WorkerPool) -> (Deferred<T>, Promise<T>) {
        let cell = Cell::new(pool.clone());
        (
            Deferred {
                cell: Arc::clone(&cell),
            },
            Promise { cell },
        )
    }

    /// Another read-only view of this deferred's promise.
    pub fn promise(&self) -> Promise<T> {
        Promise {
            cell: Arc::clone(&self.cell),
        }
    }

    /// Fulfills the promise with `value`. No-op if no longer pending.
    pub fn resolve(&self, value: T) {
        self.cell.fulfill(value);
    }

    /// Resolves the promise with another promise: this one enters the
    /// resolving state and adopts `source`'s outcome (the same value or
    /// failure, not a re-wrapped copy) once `source` settles. If `source`
    /// is already settled, the outcome is adopted immediately. No-op if no
    /// longer pending.
    pub fn adopt(&self, source: Promise<T>)
    where
        T: Clone + Send + 'static,
    {
        self.cell.adopt(source);
    }

    /// Rejects the promise with an error. No-op if no longer pending.
    pub fn reject<E>(&self, failure: E)
    where
        E: Error + Send + Sync + 'static,
    {
        self.cell.reject(Arc::new(failure));
    }

    /// Rejects the promise with an existing shared payload, propagating it
    /// unchanged rather than wrapping it again. No-op if no longer pending.
    pub fn reject_failure(&self, failure: Failure) {
        self.cell.reject(failure);
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Deferred<T> {
        Deferred {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cell.fmt_handle("Deferred", f)
    }
}

// -----------------------------------------------------------------------------
// Promise

/// A read-only view of a deferred computation that settles exactly once.
///
/// ```
/// use pact::prelude::*;
///
/// let pool = WorkerPool::new(2);
/// let (deferred, promise) = Deferred::new(&pool);
/// let doubled = promise.then(|n| Ok(n * 2));
/// deferred.resolve(21);
/// assert_eq!(doubled.result().ok(), Some(42));
/// ```
pub struct Promise<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Promise<T> {
    pub(crate) fn cell(&self) -> &Arc<Cell<T>> {
        &self.cell
    }

    /// The pool this promise schedules its continuations on.
    pub fn pool(&self) -> &WorkerPool {
        self.cell.pool()
    }

    /// The current lifecycle state. A terminal answer is stable; a
    /// non-terminal one may be stale by the time the caller looks at it.
    pub fn state(&self) -> State {
        self.cell.state()
    }

    /// Whether the promise has settled with a value.
    #[inline]
    pub fn is_fulfilled(&self) -> bool {
        self.state() == State::Fulfilled
    }

    /// Whether the promise has settled with a failure.
    #[inline]
    pub fn is_rejected(&self) -> bool {
        self.state() == State::Rejected
    }

    /// Blocks the calling thread until the promise settles, either way.
    pub fn wait(&self) {
        self.cell.wait();
    }

    /// Blocks until settled, then returns the value, or `None` if the
    /// promise was rejected.
    pub fn value(&self) -> Option<T>
    where
        T: Clone,
    {
        self.cell.wait_outcome().ok()
    }

    /// Blocks until settled, then returns the failure, or `None` if the
    /// promise was fulfilled.
    pub fn failure(&self) -> Option<Failure> {
        self.cell.wait_failure()
    }

    /// Blocks until settled, then returns the outcome: the value, or the
    /// stored failure as an `Err`.
    pub fn result(&self) -> Result<T, Failure>
    where
        T: Clone,
    {
        self.cell.wait_outcome()
    }

    /// The outcome if already settled, without blocking.
    pub fn try_result(&self) -> Option<Result<T, Failure>>
    where
        T: Clone,
    {
        self.cell.try_outcome()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Promise<T> {
        Promise {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cell.fmt_handle("Promise", f)
    }
}

// -----------------------------------------------------------------------------
// Chaining

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// Transforms this promise's value, producing a derived promise.
    ///
    /// Once this promise fulfills, `on_fulfilled` runs on the pool with a
    /// clone of the value; the derived promise takes the callback's `Ok`
    /// as its value or its `Err` as a rejection. A callback panic also
    /// rejects the derived promise, carrying [`TaskPanic`]. If this promise
    /// rejects, the failure propagates to the derived promise unchanged and
    /// the callback never runs.
    ///
    /// [`TaskPanic`]: crate::error::TaskPanic
    pub fn then<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, Failure> + Send + 'static,
    {
        self.derive(
            move |value, deferred| match guard_callback(move || on_fulfilled(value)) {
                Ok(value) => deferred.resolve(value),
                Err(failure) => deferred.reject_failure(failure),
            },
            |failure, deferred| deferred.reject_failure(failure),
        )
    }

    /// Like [`Promise::then`], but the callback continues with another
    /// promise: the derived promise adopts the returned promise's eventual
    /// outcome instead of fulfilling with it as a value. This is how chains
    /// of asynchronous steps compose without nesting promise types.
    pub fn chain<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<Promise<U>, Failure> + Send + 'static,
    {
        self.derive(
            move |value, deferred| match guard_callback(move || on_fulfilled(value)) {
                Ok(source) => deferred.adopt(source),
                Err(failure) => deferred.reject_failure(failure),
            },
            |failure, deferred| deferred.reject_failure(failure),
        )
    }

    /// Handles this promise's failure, producing a derived promise of the
    /// same value type.
    ///
    /// Once this promise rejects, `on_rejected` runs on the pool with the
    /// stored failure; returning `Ok` *fulfills* the derived promise (the
    /// rejection is caught), returning `Err` rejects it with the new
    /// failure. If this promise fulfills, the value passes through and the
    /// callback never runs.
    pub fn rescue<F>(&self, on_rejected: F) -> Promise<T>
    where
        F: FnOnce(Failure) -> Result<T, Failure> + Send + 'static,
    {
        self.derive(
            |value, deferred| deferred.resolve(value),
            move |failure, deferred| match guard_callback(move || on_rejected(failure)) {
                Ok(value) => deferred.resolve(value),
                Err(failure) => deferred.reject_failure(failure),
            },
        )
    }

    /// Chains handlers for both channels at once: `on_fulfilled` for the
    /// value, `on_rejected` for the failure. Either handler settles the
    /// derived promise with its own outcome, so a rejection handler that
    /// returns `Ok` converts the rejection into fulfillment.
    pub fn then_rescue<U, F, G>(&self, on_fulfilled: F, on_rejected: G) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, Failure> + Send + 'static,
        G: FnOnce(Failure) -> Result<U, Failure> + Send + 'static,
    {
        self.derive(
            move |value, deferred| match guard_callback(move || on_fulfilled(value)) {
                Ok(value) => deferred.resolve(value),
                Err(failure) => deferred.reject_failure(failure),
            },
            move |failure, deferred| match guard_callback(move || on_rejected(failure)) {
                Ok(value) => deferred.resolve(value),
                Err(failure) => deferred.reject_failure(failure),
            },
        )
    }

    /// Creates the derived pair and registers the continuation that routes
    /// this promise's outcome to one of the two handlers, on the pool.
    fn derive<U, OK, ERR>(&self, on_fulfilled: OK, on_rejected: ERR) -> Promise<U>
    where
        U: Send + 'static,
        OK: FnOnce(T, &Deferred<U>) + Send + 'static,
        ERR: FnOnce(Failure, &Deferred<U>) + Send + 'static,
    {
        let (deferred, derived) = Deferred::new(self.pool());
        let parent = Arc::clone(&self.cell);
        let pool = self.pool().clone();
        self.cell.when_settled(Box::new(move || {
            // Even when the parent is already terminal, the chained work is
            // posted rather than run on the registering thread.
            pool.submit(move || {
                if let Some(outcome) = parent.try_outcome() {
                    match outcome {
                        Ok(value) => on_fulfilled(value, &deferred),
                        Err(failure) => on_rejected(failure, &deferred),
                    }
                }
            });
        }));
        derived
    }
}

/// Runs a user callback, converting a panic into a failure so it settles
/// the derived promise instead of unwinding through a pool worker.
pub(crate) fn guard_callback<R>(
    callback: impl FnOnce() -> Result<R, Failure>,
) -> Result<R, Failure> {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(outcome) => outcome,
        Err(payload) => Err(panic_failure(payload)),
    }
}
