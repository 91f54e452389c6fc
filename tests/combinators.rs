//! Instant constructors, `run`, and the aggregate combinators.

mod common;

use std::{sync::Arc, thread, time::Duration};

use common::{an_error, check_fulfilled, check_pending, check_rejected, Boom};
use pact::prelude::*;

#[test]
fn resolved_is_immediately_fulfilled() {
    let pool = WorkerPool::new(2);
    let promise = Promise::resolved(&pool, 7);
    check_fulfilled(&promise, 7);
}

#[test]
fn rejected_is_immediately_rejected() {
    let pool = WorkerPool::new(2);
    let promise = Promise::<i32>::rejected(&pool, an_error());
    check_rejected(&promise, "bang");
}

#[test]
fn run_executes_on_the_pool() {
    let pool = WorkerPool::new(2);
    let promise = Promise::run(&pool, || {
        thread::sleep(Duration::from_millis(50));
        Ok(7)
    });
    check_pending(&promise);
    assert_eq!(promise.value(), Some(7));
}

#[test]
fn run_rejects_on_error() {
    let pool = WorkerPool::new(2);
    let promise: Promise<i32> = Promise::run(&pool, || Err(Arc::new(an_error()) as Failure));
    promise.wait();
    check_rejected(&promise, "bang");
}

#[test]
fn run_rejects_on_panic() {
    let pool = WorkerPool::new(2);
    let promise: Promise<i32> = Promise::run(&pool, || panic!("kaboom"));
    promise.wait();
    let failure = promise.failure().unwrap();
    let panic = failure.downcast_ref::<TaskPanic>().unwrap();
    assert_eq!(panic.message(), "kaboom");
}

#[test]
fn all_of_nothing_fulfills_immediately() {
    let pool = WorkerPool::new(2);
    let promise = Promise::<i32>::all(&pool, Vec::new());
    check_fulfilled(&promise, Vec::new());
}

#[test]
fn all_fulfills_in_input_order() {
    let pool = WorkerPool::new(2);
    let (first, p1) = Deferred::new(&pool);
    let (second, p2) = Deferred::new(&pool);
    let all = Promise::all(&pool, vec![p1, p2]);
    check_pending(&all);

    // Settle in reverse order; values still come back in input order.
    second.resolve(8);
    assert_ne!(all.state(), State::Fulfilled);
    first.resolve(7);
    assert_eq!(all.value(), Some(vec![7, 8]));
}

#[test]
fn all_rejects_with_the_first_rejection() {
    let pool = WorkerPool::new(2);
    let (first, p1) = Deferred::new(&pool);
    let (second, p2) = Deferred::new(&pool);
    let (third, p3) = Deferred::new(&pool);
    let all = Promise::all(&pool, vec![p1, p2, p3]);
    check_pending(&all);

    first.resolve(7);
    third.reject(an_error());
    all.wait();
    check_rejected(&all, "bang");

    // A straggler fulfilling later leaves the aggregate untouched.
    second.resolve(8);
    pool.wait_until_idle();
    check_rejected(&all, "bang");
}

#[test]
fn all_under_racing_rejections_settles_once() {
    let pool = WorkerPool::new(4);
    let (first, p1) = Deferred::<i32>::new(&pool);
    let (second, p2) = Deferred::<i32>::new(&pool);
    let all = Promise::all(&pool, vec![p1, p2]);

    let racers = [
        thread::spawn(move || first.reject(Boom("a"))),
        thread::spawn(move || second.reject(Boom("b"))),
    ];
    for racer in racers {
        racer.join().unwrap();
    }

    all.wait();
    pool.wait_until_idle();
    let message = all.failure().map(|f| f.to_string()).unwrap();
    assert!(message == "a" || message == "b");
}

#[test]
fn all_settled_of_nothing_fulfills_immediately() {
    let pool = WorkerPool::new(2);
    let promise = Promise::<i32>::all_settled(&pool, Vec::new());
    promise.wait();
    assert!(promise.is_fulfilled());
    assert_eq!(promise.value().map(|settled| settled.len()), Some(0));
}

#[test]
fn all_settled_waits_for_every_outcome() {
    let pool = WorkerPool::new(2);
    let (first, p1) = Deferred::new(&pool);
    let (second, p2) = Deferred::new(&pool);
    let promise = Promise::all_settled(&pool, vec![p1, p2]);
    check_pending(&promise);

    first.resolve(7);
    assert_ne!(promise.state(), State::Fulfilled);

    second.reject(an_error());
    let settled = promise.value().unwrap();
    assert_eq!(settled.len(), 2);
    assert_eq!(settled[0].value(), Some(7));
    assert!(settled[1].is_rejected());
    assert_eq!(
        settled[1].failure().map(|f| f.to_string()).as_deref(),
        Some("bang")
    );
}
