//! The settlement cell: the state machine shared by a deferred and every
//! promise handle derived from it.
//!
//! A cell settles exactly once. It starts out pending, may pass through a
//! transient resolving phase (when it was resolved with another, not yet
//! settled promise), and ends fulfilled or rejected. The terminal outcome is
//! immutable once written.
//!
//! Each cell is guarded by exactly one mutex; no two cells ever share one.
//! The terminal transition happens synchronously on whichever thread calls
//! resolve or reject, broadcasts the cell's condvar to release blocked
//! readers, and hands every queued continuation to the worker pool, one
//! pool task per continuation, never inline on the settling thread.

use std::{fmt, mem, sync::Arc};

use parking_lot::{Condvar, Mutex};

use crate::{error::Failure, pool::WorkerPool, promise::Promise};

/// A callback registered to run once the cell reaches a terminal state.
pub(crate) type Continuation = Box<dyn FnOnce() + Send + 'static>;

// -----------------------------------------------------------------------------
// Observable state

/// The externally observable lifecycle of a promise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Not yet settled.
    Pending,
    /// Resolved with another promise whose outcome is still unknown.
    Resolving,
    /// Settled with a value. Terminal.
    Fulfilled,
    /// Settled with a failure. Terminal.
    Rejected,
}

// -----------------------------------------------------------------------------
// Cell

/// The shared core behind a [`Deferred`]/[`Promise`] pair.
///
/// The non-terminal variants own the continuation list, so a terminal cell
/// structurally cannot hold undispatched continuations: settling *is*
/// draining.
///
/// [`Deferred`]: crate::promise::Deferred
enum CellState<T> {
    Pending { continuations: Vec<Continuation> },
    Resolving { continuations: Vec<Continuation> },
    Fulfilled(T),
    Rejected(Failure),
}

pub(crate) struct Cell<T> {
    state: Mutex<CellState<T>>,
    /// Broadcast on the terminal transition, while the state mutex is held.
    settled: Condvar,
    /// Executes continuations and chained callbacks.
    pool: WorkerPool,
}

impl<T> Cell<T> {
    pub(crate) fn new(pool: WorkerPool) -> Arc<Cell<T>> {
        Arc::new(Cell {
            state: Mutex::new(CellState::Pending {
                continuations: Vec::new(),
            }),
            settled: Condvar::new(),
            pool,
        })
    }

    pub(crate) fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub(crate) fn state(&self) -> State {
        match &*self.state.lock() {
            CellState::Pending { .. } => State::Pending,
            CellState::Resolving { .. } => State::Resolving,
            CellState::Fulfilled(_) => State::Fulfilled,
            CellState::Rejected(_) => State::Rejected,
        }
    }

    // -------------------------------------------------------------------------
    // Settling

    /// Settles the cell from its pending state with a plain value.
    /// A no-op unless the cell is still pending.
    pub(crate) fn fulfill(&self, value: T) {
        self.settle(Ok(value), false);
    }

    /// Settles the cell from its pending state with a failure.
    /// A no-op unless the cell is still pending.
    pub(crate) fn reject(&self, failure: Failure) {
        self.settle(Err(failure), false);
    }

    /// Resolves the cell with another promise: the cell moves to the
    /// resolving state and copies `source`'s outcome verbatim once `source`
    /// settles. If `source` is already settled its outcome is taken right
    /// away. A no-op unless the cell is still pending.
    pub(crate) fn adopt(self: &Arc<Self>, source: Promise<T>)
    where
        T: Clone + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            match &mut *state {
                CellState::Pending { continuations } => {
                    // Continuations registered while pending stay queued
                    // across the transition into resolving.
                    let continuations = mem::take(continuations);
                    *state = CellState::Resolving { continuations };
                }
                _ => return,
            }
        }

        let dependent = Arc::clone(self);
        let origin = Arc::clone(source.cell());
        origin.when_settled(Box::new(move || {
            if let Some(outcome) = source.cell().try_outcome() {
                dependent.settle(outcome, true);
            }
        }));
    }

    /// Performs the terminal transition. `from_resolving` selects which
    /// source state is eligible: direct resolve/reject transitions out of
    /// `Pending`, while an adopted outcome transitions out of `Resolving`.
    /// Any other combination is a stale racer and leaves the cell untouched.
    ///
    /// All blocked readers are woken, and every queued continuation is
    /// submitted to the pool individually after the lock is released.
    fn settle(&self, outcome: Result<T, Failure>, from_resolving: bool) {
        let continuations = {
            let mut state = self.state.lock();
            let eligible = match &*state {
                CellState::Pending { .. } => !from_resolving,
                CellState::Resolving { .. } => from_resolving,
                _ => false,
            };
            if !eligible {
                return;
            }
            let terminal = match outcome {
                Ok(value) => CellState::Fulfilled(value),
                Err(failure) => CellState::Rejected(failure),
            };
            let previous = mem::replace(&mut *state, terminal);
            self.settled.notify_all();
            match previous {
                CellState::Pending { continuations }
                | CellState::Resolving { continuations } => continuations,
                _ => Vec::new(),
            }
        };

        tracing::trace!(continuations = continuations.len(), "promise settled");
        for continuation in continuations {
            self.pool.submit(continuation);
        }
    }

    // -------------------------------------------------------------------------
    // Continuations

    /// Registers a callback to run once the cell settles. On a cell that is
    /// already terminal the callback runs inline, on the registering thread,
    /// before this returns; otherwise it is queued and later dispatched to
    /// the pool by the terminal transition.
    pub(crate) fn when_settled(&self, continuation: Continuation) {
        let continuation = {
            let mut state = self.state.lock();
            match &mut *state {
                CellState::Pending { continuations }
                | CellState::Resolving { continuations } => {
                    continuations.push(continuation);
                    return;
                }
                _ => continuation,
            }
        };
        // Already terminal. The lock is released first: the callback is free
        // to touch this cell again.
        continuation();
    }

    // -------------------------------------------------------------------------
    // Reading

    /// The terminal outcome, or `None` while the cell is unsettled.
    pub(crate) fn try_outcome(&self) -> Option<Result<T, Failure>>
    where
        T: Clone,
    {
        match &*self.state.lock() {
            CellState::Fulfilled(value) => Some(Ok(value.clone())),
            CellState::Rejected(failure) => Some(Err(Arc::clone(failure))),
            _ => None,
        }
    }

    /// Blocks the calling thread until the cell settles.
    pub(crate) fn wait(&self) {
        let mut state = self.state.lock();
        while matches!(
            &*state,
            CellState::Pending { .. } | CellState::Resolving { .. }
        ) {
            self.settled.wait(&mut state);
        }
    }

    /// Blocks until the cell settles, then returns the outcome. The value
    /// is cloned out; the failure is a reference copy of the stored payload.
    pub(crate) fn wait_outcome(&self) -> Result<T, Failure>
    where
        T: Clone,
    {
        let mut state = self.state.lock();
        loop {
            match &*state {
                CellState::Fulfilled(value) => return Ok(value.clone()),
                CellState::Rejected(failure) => return Err(Arc::clone(failure)),
                _ => self.settled.wait(&mut state),
            }
        }
    }

    /// Blocks until the cell settles, then returns the failure if it was
    /// rejected. Unlike [`Cell::wait_outcome`] this never clones the value,
    /// so it carries no `Clone` bound.
    pub(crate) fn wait_failure(&self) -> Option<Failure> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                CellState::Fulfilled(_) => return None,
                CellState::Rejected(failure) => return Some(Arc::clone(failure)),
                _ => self.settled.wait(&mut state),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Formatting

    /// Renders the cell as `name { state, .. }` with the value or failure
    /// when terminal, for the `Debug` impls of the public handle types.
    pub(crate) fn fmt_handle(&self, name: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result
    where
        T: fmt::Debug,
    {
        let state = self.state.lock();
        let mut out = f.debug_struct(name);
        match &*state {
            CellState::Pending { .. } => out.field("state", &State::Pending),
            CellState::Resolving { .. } => out.field("state", &State::Resolving),
            CellState::Fulfilled(value) => {
                out.field("state", &State::Fulfilled).field("value", value)
            }
            CellState::Rejected(failure) => {
                out.field("state", &State::Rejected).field("failure", failure)
            }
        };
        out.finish()
    }
}
