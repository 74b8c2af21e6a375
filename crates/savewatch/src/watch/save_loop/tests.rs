// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::unwrap_used)] // test scaffolding

use super::*;
use crate::logging::MemoryLogger;
use crate::rt::Signal;
use crate::watch::{Monitored, SaveError, SharedCollection};
use std::hash::{Hash, Hasher};
use std::sync::atomic::AtomicUsize;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Doc {
    name: &'static str,
    signal: Signal,
    behavior: Behavior,
    attempts: Arc<AtomicUsize>,
    saves: Arc<AtomicUsize>,
}

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
}

impl Doc {
    fn new(name: &'static str, behavior: Behavior) -> Self {
        Self {
            name,
            signal: Signal::auto_reset().expect("signal"),
            behavior,
            attempts: Arc::new(AtomicUsize::new(0)),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl PartialEq for Doc {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Doc {}

impl Hash for Doc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for Doc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Doc({})", self.name)
    }
}

impl Monitored for Doc {
    fn signal(&self) -> Option<Signal> {
        Some(self.signal.clone())
    }

    fn save(&self) -> std::result::Result<(), SaveError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => {
                self.saves.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Behavior::Fail => Err(SaveError::new("disk full")),
            Behavior::Panic => panic!("save exploded"),
        }
    }
}

struct Harness {
    collection: Arc<SharedCollection<Doc>>,
    logger: MemoryLogger,
    lifecycle: CancellationToken,
    status: LoopStatus,
    handle: JoinHandle<LoopReport>,
}

impl Harness {
    fn start(chunk_size: usize) -> Self {
        let collection = Arc::new(SharedCollection::new().expect("collection"));
        let logger = MemoryLogger::new();
        let save_loop = SaveLoop::new(
            Arc::clone(&collection),
            collection.notifier().clone(),
            Arc::new(logger.clone()),
        )
        .with_chunk_size(chunk_size)
        .expect("chunk size");
        let status = save_loop.status();

        let lifecycle = CancellationToken::new().expect("token");
        let token = lifecycle.clone();
        let handle = thread::spawn(move || save_loop.run(&token));

        Self {
            collection,
            logger,
            lifecycle,
            status,
            handle,
        }
    }

    fn stop(self) -> LoopReport {
        self.lifecycle.cancel();
        self.handle.join().expect("save loop thread")
    }
}

fn eventually(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn saves_fire_once_failures_are_isolated_and_new_entries_are_picked_up() {
    let harness = Harness::start(DEFAULT_CHUNK_SIZE);
    let a = Doc::new("A", Behavior::Succeed);
    let b = Doc::new("B", Behavior::Fail);
    harness.collection.insert(a.clone());
    harness.collection.insert(b.clone());

    a.signal.set();
    eventually("A saved", || a.saves() == 1);

    b.signal.set();
    eventually("B attempted", || b.attempts() == 1);
    eventually("B failure logged", || harness.logger.count(LogLevel::Critical) == 1);

    // Still alive: B is retried, A still serviced.
    b.signal.set();
    eventually("B retried", || b.attempts() == 2);

    let c = Doc::new("C", Behavior::Succeed);
    harness.collection.insert(c.clone());
    c.signal.set();
    eventually("C saved", || c.saves() == 1);

    thread::sleep(Duration::from_millis(30));
    assert_eq!(a.saves(), 1, "A fires exactly once");
    assert_eq!(c.saves(), 1);

    let logger = harness.logger.clone();
    let report = harness.stop();
    assert_eq!(report.state, LoopState::Stopped);
    assert_eq!(report.saves, 2);
    assert_eq!(report.failed_saves, 2);
    assert!(report.rebuilds >= 2, "initial build plus the C insertion");

    let critical = logger
        .records()
        .into_iter()
        .filter(|r| r.level == LogLevel::Critical)
        .collect::<Vec<_>>();
    assert_eq!(critical.len(), 2);
    assert_eq!(critical[0].context, "save-loop");
    assert_eq!(critical[0].error.as_deref(), Some("disk full"));
}

#[test]
fn panicking_save_does_not_stop_the_loop() {
    let harness = Harness::start(DEFAULT_CHUNK_SIZE);
    let bad = Doc::new("bad", Behavior::Panic);
    let good = Doc::new("good", Behavior::Succeed);
    harness.collection.insert(bad.clone());
    harness.collection.insert(good.clone());

    bad.signal.set();
    eventually("panic caught", || harness.logger.count(LogLevel::Critical) == 1);

    good.signal.set();
    eventually("good saved", || good.saves() == 1);

    let report = harness.stop();
    assert_eq!(report.failed_saves, 1);
    assert_eq!(report.saves, 1);
}

#[test]
fn entries_beyond_the_first_chunk_are_serviced() {
    let harness = Harness::start(DEFAULT_CHUNK_SIZE);
    let docs: Vec<Doc> = (0..100)
        .map(|i| Doc::new(Box::leak(format!("doc-{i}").into_boxed_str()), Behavior::Succeed))
        .collect();
    for doc in &docs {
        harness.collection.insert(doc.clone());
    }

    for index in [0, 59, 60, 99] {
        docs[index].signal.set();
        eventually("entry saved", || docs[index].saves() == 1);
    }

    let report = harness.stop();
    assert_eq!(report.saves, 4);
}

#[test]
fn removed_entries_are_no_longer_watched() {
    let harness = Harness::start(2);
    let a = Doc::new("A", Behavior::Succeed);
    let b = Doc::new("B", Behavior::Succeed);
    harness.collection.insert(a.clone());
    harness.collection.insert(b.clone());

    b.signal.set();
    eventually("B saved", || b.saves() == 1);

    assert!(harness.collection.remove(&a));
    a.signal.set();

    // B's next save proves the loop went round after the removal.
    b.signal.set();
    eventually("B saved again", || b.saves() == 2);

    assert_eq!(a.attempts(), 0);
    assert!(a.signal.is_set(), "a removed entry's signal is never consumed");
    harness.stop();
}

#[test]
fn lifecycle_cancel_stops_a_waiting_loop() {
    let harness = Harness::start(DEFAULT_CHUNK_SIZE);
    eventually("loop waiting", || harness.status.get() == LoopState::Waiting);

    let status = harness.status.clone();
    let report = harness.stop();
    assert_eq!(report.state, LoopState::Stopped);
    assert_eq!(status.get(), LoopState::Stopped);
    assert!(report.state.is_terminal());
}

#[test]
fn already_cancelled_lifecycle_runs_no_iteration() {
    let collection = Arc::new(SharedCollection::<Doc>::new().expect("collection"));
    let save_loop = SaveLoop::new(
        Arc::clone(&collection),
        collection.notifier().clone(),
        Arc::new(MemoryLogger::new()),
    );
    let lifecycle = CancellationToken::new().expect("token");
    lifecycle.cancel();

    let report = save_loop.run(&lifecycle);
    assert_eq!(report.state, LoopState::Stopped);
    assert_eq!(report.iterations, 0);
}

struct BrokenTarget {
    shared: Signal,
}

impl SaveTarget for BrokenTarget {
    type Entry = u8;

    fn entries(&self) -> std::result::Result<Vec<u8>, BoxError> {
        Ok(vec![1, 2])
    }

    fn signal_of(&self, _entry: &u8) -> Option<Signal> {
        Some(self.shared.clone())
    }

    fn save(&self, _entry: &u8) -> std::result::Result<(), SaveError> {
        Ok(())
    }
}

struct FailingSnapshot;

impl SaveTarget for FailingSnapshot {
    type Entry = u8;

    fn entries(&self) -> std::result::Result<Vec<u8>, BoxError> {
        Err("collection unavailable".into())
    }

    fn signal_of(&self, _entry: &u8) -> Option<Signal> {
        None
    }

    fn save(&self, _entry: &u8) -> std::result::Result<(), SaveError> {
        Ok(())
    }
}

#[test]
fn snapshot_failure_aborts() {
    let logger = MemoryLogger::new();
    let save_loop = SaveLoop::new(
        Arc::new(FailingSnapshot),
        ChangeNotifier::new().expect("notifier"),
        Arc::new(logger.clone()),
    );
    let lifecycle = CancellationToken::new().expect("token");

    let report = save_loop.run(&lifecycle);
    assert_eq!(report.state, LoopState::Aborted);
    assert_eq!(save_loop.status().get(), LoopState::Aborted);

    let errors: Vec<_> = logger
        .records()
        .into_iter()
        .filter(|r| r.level == LogLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("collection unavailable")));
}

#[test]
fn shared_signal_aborts_the_rebuild() {
    let save_loop = SaveLoop::new(
        Arc::new(BrokenTarget {
            shared: Signal::auto_reset().expect("signal"),
        }),
        ChangeNotifier::new().expect("notifier"),
        Arc::new(MemoryLogger::new()),
    );
    let lifecycle = CancellationToken::new().expect("token");

    assert_eq!(save_loop.run(&lifecycle).state, LoopState::Aborted);
}

#[test]
fn chunk_size_is_bounded() {
    let make = || {
        SaveLoop::new(
            Arc::new(FailingSnapshot),
            ChangeNotifier::new().expect("notifier"),
            Arc::new(MemoryLogger::new()),
        )
    };
    assert!(make().with_chunk_size(0).is_err());
    assert!(make().with_chunk_size(MAX_CHUNK_SIZE + 1).is_err());
    assert!(make().with_chunk_size(MAX_CHUNK_SIZE).is_ok());
}

fn rebuild_count(logger: &MemoryLogger) -> usize {
    logger
        .records()
        .iter()
        .filter(|r| {
            r.message
                .as_deref()
                .is_some_and(|m| m.starts_with("entry collection changed"))
        })
        .count()
}

#[test]
fn notifier_alone_rebuilds_without_invoking() {
    let harness = Harness::start(DEFAULT_CHUNK_SIZE);
    let a = Doc::new("A", Behavior::Succeed);
    harness.collection.insert(a.clone());
    eventually("A watched", || {
        harness.logger.records().iter().any(|r| {
            r.message
                .as_deref()
                .is_some_and(|m| m.ends_with("-> 1 entries"))
        })
    });
    eventually("waiting", || harness.status.get() == LoopState::Waiting);
    let before = rebuild_count(&harness.logger);

    harness.collection.notifier().notify();
    eventually("rebuilt on notify", || rebuild_count(&harness.logger) == before + 1);
    eventually("waiting again", || harness.status.get() == LoopState::Waiting);
    assert_eq!(a.attempts(), 0, "a bare change signal saves nothing");

    a.signal.set();
    eventually("A saved", || a.saves() == 1);

    let report = harness.stop();
    assert_eq!(report.state, LoopState::Stopped);
    assert_eq!(report.saves, 1);
    assert_eq!(report.failed_saves, 0);
}

#[test]
fn equal_entry_inserted_twice_keeps_the_loop_alive() {
    let harness = Harness::start(DEFAULT_CHUNK_SIZE);
    let a = Doc::new("A", Behavior::Succeed);
    harness.collection.insert(a.clone());
    a.signal.set();
    eventually("A saved", || a.saves() == 1);

    let before = rebuild_count(&harness.logger);
    harness.collection.insert(a.clone());
    eventually("rebuilt with the duplicate", || rebuild_count(&harness.logger) > before);
    eventually("waiting", || harness.status.get() == LoopState::Waiting);

    a.signal.set();
    eventually("A saved again", || a.saves() == 2);
    assert_eq!(a.attempts(), 2, "one slot, one save per signal");

    assert!(harness.collection.remove(&a));
    eventually("one copy left", || harness.collection.len() == 1);
    a.signal.set();
    eventually("remaining copy still watched", || a.saves() == 3);

    let report = harness.stop();
    assert_eq!(report.state, LoopState::Stopped);
    assert_eq!(report.failed_saves, 0);
}
