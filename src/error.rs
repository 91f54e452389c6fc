//! Failure payloads and the crate's error types.
//!
//! A rejected promise carries an opaque, shared failure payload. The payload
//! is reference-counted so that propagating a rejection through a chain of
//! promises hands every dependent the *same* error object rather than a
//! re-wrapped copy; callers can observe this with [`Arc::ptr_eq`].

use std::{any::Any, error::Error, sync::Arc};

use thiserror::Error;

// -----------------------------------------------------------------------------
// Failure payload

/// The failure payload stored by a rejected promise.
///
/// Any error type can become a `Failure`; rejection boundaries require
/// `E: Error + Send + Sync + 'static` and wrap the value once, at the point
/// where it first enters a promise. From then on, cloning a `Failure` clones
/// the `Arc`, so a rejection that flows through `then` chains, adoption, or
/// `Promise::all` always refers to the original error value.
///
/// [`Promise::all`]: crate::promise::Promise::all
pub type Failure = Arc<dyn Error + Send + Sync + 'static>;

// -----------------------------------------------------------------------------
// Panic capture

/// The failure recorded when a chaining callback or a [`Promise::run`] task
/// panics instead of returning an error.
///
/// The panic payload's message is preserved when it is a string (the common
/// case for `panic!("...")`).
///
/// [`Promise::run`]: crate::promise::Promise::run
#[derive(Debug, Error)]
#[error("task panicked: {message}")]
pub struct TaskPanic {
    message: String,
}

impl TaskPanic {
    /// The message carried by the panic, or a placeholder for non-string
    /// payloads.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Converts a payload caught by `catch_unwind` into a [`Failure`].
pub(crate) fn panic_failure(payload: Box<dyn Any + Send>) -> Failure {
    let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    };
    Arc::new(TaskPanic { message })
}
