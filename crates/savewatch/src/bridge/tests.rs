// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::unwrap_used)] // test scaffolding

use super::*;
use futures::executor::block_on;
use futures::FutureExt;
use std::thread;
use std::time::{Duration, Instant};

fn settle(pool: &WaitPool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while pool.active_waits() != 0 {
        assert!(Instant::now() < deadline, "registrations were not released");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn signal_resolves_with_selector_result() {
    let pool = WaitPool::new();
    let signal = Signal::auto_reset().expect("signal");
    let token = CancellationToken::new().expect("token");

    let mut fut = pool
        .wait_as_future(&signal, |base: u32| Ok(base * 2), 21, &token)
        .expect("register");
    assert!((&mut fut).now_or_never().is_none());

    signal.set();
    assert_eq!(block_on(fut).expect("outcome"), 42);
    settle(&pool);
}

#[test]
fn token_resolves_canceled_with_that_token() {
    let pool = WaitPool::new();
    let signal = Signal::auto_reset().expect("signal");
    let token = CancellationToken::new().expect("token");

    let fut = pool
        .wait_as_future(&signal, |()| Ok(()), (), &token)
        .expect("register");
    token.cancel();

    let err = block_on(fut).expect_err("canceled");
    assert_eq!(err.canceled_token(), Some(&token));

    // A later set has nobody listening.
    settle(&pool);
    signal.set();
    assert!(signal.is_set());
}

#[test]
fn already_cancelled_token_wins() {
    let pool = WaitPool::new();
    let signal = Signal::auto_reset().expect("signal");
    let token = CancellationToken::new().expect("token");
    token.cancel();

    let fut = pool
        .wait_as_future(&signal, |()| Ok(1u8), (), &token)
        .expect("register");
    assert!(block_on(fut).expect_err("canceled").is_canceled());
}

#[test]
fn selector_error_faults_the_future() {
    let pool = WaitPool::new();
    let signal = Signal::auto_reset().expect("signal");
    let token = CancellationToken::new().expect("token");

    let fut = pool
        .wait_as_future(&signal, |()| -> std::result::Result<u8, BoxError> { Err("boom".into()) }, (), &token)
        .expect("register");
    signal.set();

    match block_on(fut) {
        Err(Error::Faulted(err)) => assert_eq!(err.to_string(), "boom"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    settle(&pool);
}

#[test]
fn selector_panic_faults_the_future() {
    let pool = WaitPool::new();
    let signal = Signal::auto_reset().expect("signal");
    let token = CancellationToken::new().expect("token");

    let fut = pool
        .wait_as_future(&signal, |()| -> std::result::Result<u8, BoxError> { panic!("selector exploded") }, (), &token)
        .expect("register");
    signal.set();

    match block_on(fut) {
        Err(Error::Faulted(err)) => assert!(err.to_string().contains("selector exploded")),
        other => panic!("unexpected outcome: {other:?}"),
    }

    // The worker survived the panic.
    let again = pool
        .wait_as_future(&signal, |()| Ok(7u8), (), &token)
        .expect("register");
    signal.set();
    assert_eq!(block_on(again).expect("outcome"), 7);
}

#[test]
fn convenience_variants_reduce_to_the_primitive() {
    let signal = Signal::manual_reset().expect("signal");
    let token = CancellationToken::new().expect("token");
    signal.set();

    block_on(wait_signal(&signal, &token).expect("register")).expect("unit");
    assert_eq!(
        block_on(wait_signal_with_value(&signal, "fixed", &token).expect("register")).expect("value"),
        "fixed"
    );
    assert_eq!(
        block_on(wait_signal_with(&signal, || 3 + 4, &token).expect("register")).expect("thunk"),
        7
    );
}

#[test]
fn dropping_the_future_releases_registrations() {
    let pool = WaitPool::new();
    let signal = Signal::auto_reset().expect("signal");
    let token = CancellationToken::new().expect("token");

    let fut = pool
        .wait_as_future(&signal, |()| Ok(()), (), &token)
        .expect("register");
    drop(fut);
    settle(&pool);

    signal.set();
    thread::sleep(Duration::from_millis(20));
    assert!(signal.is_set(), "no watch may consume the signal after drop");
}

#[test]
fn shutdown_abandons_pending_waits() {
    let pool = WaitPool::new();
    let signal = Signal::auto_reset().expect("signal");
    let token = CancellationToken::new().expect("token");

    let fut = pool
        .wait_as_future(&signal, |()| Ok(()), (), &token)
        .expect("register");
    pool.shutdown();

    assert!(matches!(block_on(fut), Err(Error::Abandoned)));
    assert!(matches!(
        pool.wait_as_future(&signal, |()| Ok(()), (), &token),
        Err(Error::Abandoned)
    ));
}

#[test]
fn pool_grows_past_one_worker() {
    let pool = WaitPool::new();
    let token = CancellationToken::new().expect("token");
    let signals: Vec<Signal> = (0..70).map(|_| Signal::auto_reset().expect("signal")).collect();

    let futures: Vec<_> = signals
        .iter()
        .enumerate()
        .map(|(i, s)| pool.wait_as_future(s, Ok, i, &token).expect("register"))
        .collect();

    // One cancel watch plus one signal watch per wait.
    assert!(pool.worker_count() >= 140usize.div_ceil(WATCHES_PER_WORKER));

    for signal in &signals {
        signal.set();
    }
    let results: Vec<usize> = futures
        .into_iter()
        .map(|f| block_on(f).expect("outcome"))
        .collect();
    assert_eq!(results, (0..70).collect::<Vec<_>>());
    settle(&pool);
}

#[tokio::test]
async fn future_is_runtime_agnostic() {
    let signal = Signal::auto_reset().expect("signal");
    let token = CancellationToken::new().expect("token");
    let fut = wait_signal_with_value(&signal, 5u64, &token).expect("register");

    let setter = signal.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        setter.set();
    });

    let value = tokio::time::timeout(Duration::from_secs(2), fut)
        .await
        .expect("resolved in time")
        .expect("outcome");
    assert_eq!(value, 5);
}
