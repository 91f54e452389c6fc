//! Instant constructors and aggregate combinators over fixed sets of
//! promises.
//!
//! `all` and `all_settled` register one continuation per input and share a
//! mutex-guarded countdown that reaches zero exactly once across all inputs.
//! That single zero-crossing is what settles the aggregate, so concurrent
//! terminal transitions of several inputs cannot double-resolve it. The
//! countdown has its own dedicated mutex (never a cell's and never the
//! pool's), so a combinator can observe its inputs without any
//! lock-ordering hazard.

use std::{error::Error, sync::Arc};

use parking_lot::Mutex;

use crate::{
    error::Failure,
    pool::WorkerPool,
    promise::{guard_callback, Deferred, Promise},
};

impl<T> Promise<T> {
    /// A promise already fulfilled with `value`.
    pub fn resolved(pool: &WorkerPool, value: T) -> Promise<T> {
        let (deferred, promise) = Deferred::new(pool);
        deferred.resolve(value);
        promise
    }

    /// A promise already rejected with `failure`.
    pub fn rejected<E>(pool: &WorkerPool, failure: E) -> Promise<T>
    where
        E: Error + Send + Sync + 'static,
    {
        let (deferred, promise) = Deferred::new(pool);
        deferred.reject(failure);
        promise
    }

    /// Runs `task` on the pool and returns the promise of its outcome.
    ///
    /// Unlike a bare [`WorkerPool::submit`], failures have somewhere to go:
    /// an `Err` return or a panic rejects the promise instead of being
    /// discarded by the worker.
    pub fn run<F>(pool: &WorkerPool, task: F) -> Promise<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, Failure> + Send + 'static,
    {
        let (deferred, promise) = Deferred::new(pool);
        pool.submit(move || match guard_callback(task) {
            Ok(value) => deferred.resolve(value),
            Err(failure) => deferred.reject_failure(failure),
        });
        promise
    }

    /// Fulfills with every input's value, in input order, once all inputs
    /// have fulfilled. Rejects with the failure of the first input observed
    /// to reject, without waiting for the rest. An empty input fulfills
    /// immediately with an empty list.
    pub fn all(pool: &WorkerPool, promises: Vec<Promise<T>>) -> Promise<Vec<T>>
    where
        T: Clone + Send + 'static,
    {
        if promises.is_empty() {
            return Promise::resolved(pool, Vec::new());
        }

        let (deferred, promise) = Deferred::new(pool);
        let inputs = Arc::new(promises);
        // Counts fulfillments only, so it hits zero iff every input
        // fulfilled. A rejection settles the aggregate directly and any
        // remaining countdown traffic becomes a no-op against the settled
        // cell.
        let remaining = Arc::new(Mutex::new(inputs.len()));

        for input in inputs.iter() {
            let watched = input.clone();
            let inputs = Arc::clone(&inputs);
            let remaining = Arc::clone(&remaining);
            let deferred = deferred.clone();
            input.cell().when_settled(Box::new(move || {
                if watched.is_fulfilled() {
                    let done = {
                        let mut left = remaining.lock();
                        *left -= 1;
                        *left == 0
                    };
                    if done {
                        let values = inputs.iter().filter_map(Promise::value).collect();
                        deferred.resolve(values);
                    }
                } else if let Some(failure) = watched.failure() {
                    deferred.reject_failure(failure);
                }
            }));
        }

        promise
    }

    /// Fulfills with the original list of promises once every one of them
    /// has settled, whichever way each went. An empty input fulfills
    /// immediately with an empty list.
    pub fn all_settled(pool: &WorkerPool, promises: Vec<Promise<T>>) -> Promise<Vec<Promise<T>>>
    where
        T: Send + 'static,
    {
        if promises.is_empty() {
            return Promise::resolved(pool, Vec::new());
        }

        let (deferred, promise) = Deferred::new(pool);
        let inputs = Arc::new(promises);
        // Counts every terminal outcome, so it always reaches zero.
        let remaining = Arc::new(Mutex::new(inputs.len()));

        for input in inputs.iter() {
            let inputs = Arc::clone(&inputs);
            let remaining = Arc::clone(&remaining);
            let deferred = deferred.clone();
            input.cell().when_settled(Box::new(move || {
                let done = {
                    let mut left = remaining.lock();
                    *left -= 1;
                    *left == 0
                };
                if done {
                    deferred.resolve(inputs.as_ref().clone());
                }
            }));
        }

        promise
    }
}
