//! Thread-safe promises backed by a bounded worker pool.
//!
//! Pact provides a deferred/promise pair for composing asynchronous,
//! possibly-failing computations across threads without manual lock
//! management at each call site. A producer obtains a [`Deferred`], hands
//! the read-only [`Promise`] to consumers, and later resolves or rejects it
//! exactly once; consumers block on the outcome or chain further work with
//! `then` and `rescue`. Settlement releases blocked readers and schedules
//! every registered continuation onto a [`WorkerPool`], a fixed-capacity
//! set of lazily spawned threads that also runs caller-submitted tasks.
//!
//! Resolving a promise with another promise flattens: the dependent promise
//! adopts the inner one's eventual outcome, so chains of arbitrary length
//! compose without nested promise types.
//!
//! There is no global executor. Construct a pool, keep it for the lifetime
//! of the owning scope, and pass it wherever promises are created; tests
//! can drain it with [`WorkerPool::wait_until_idle`] to assert on eventual
//! effects deterministically.
//!
//! ```
//! use pact::prelude::*;
//!
//! let pool = WorkerPool::new(4);
//! let (deferred, promise) = Deferred::new(&pool);
//! let greeting = promise.then(|name: String| Ok(format!("hello, {name}")));
//! deferred.resolve("world".to_string());
//! assert_eq!(greeting.value().as_deref(), Some("hello, world"));
//! ```
//!
//! [`Deferred`]: promise::Deferred
//! [`Promise`]: promise::Promise
//! [`WorkerPool`]: pool::WorkerPool
//! [`WorkerPool::wait_until_idle`]: pool::WorkerPool::wait_until_idle

mod cell;
mod combinators;

pub mod error;
pub mod pool;
pub mod promise;

pub use cell::State;

pub mod prelude {
    pub use crate::{
        error::{Failure, TaskPanic},
        pool::WorkerPool,
        promise::{Deferred, Promise},
        State,
    };
}
