//! Assertion helpers shared by the integration suites.

#![allow(dead_code)]

use std::fmt;

use pact::prelude::*;

/// The stock error used by tests that just need something rejectable.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Boom(pub &'static str);

pub fn an_error() -> Boom {
    Boom("bang")
}

pub fn check_pending<T: Clone + fmt::Debug>(promise: &Promise<T>) {
    assert_eq!(promise.state(), State::Pending);
    assert!(!promise.is_fulfilled());
    assert!(!promise.is_rejected());
    assert!(promise.try_result().is_none());
}

pub fn check_fulfilled<T: Clone + PartialEq + fmt::Debug>(promise: &Promise<T>, value: T) {
    assert_eq!(promise.state(), State::Fulfilled);
    assert!(promise.is_fulfilled());
    assert!(!promise.is_rejected());
    assert_eq!(promise.value(), Some(value));
    assert!(promise.failure().is_none());
}

pub fn check_rejected<T: Clone + fmt::Debug>(promise: &Promise<T>, message: &str) {
    assert_eq!(promise.state(), State::Rejected);
    assert!(!promise.is_fulfilled());
    assert!(promise.is_rejected());
    assert!(promise.value().is_none());
    assert_eq!(
        promise.failure().map(|f| f.to_string()).as_deref(),
        Some(message)
    );
}
