// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared pool of wait workers servicing one-shot signal registrations.
//!
//! Each worker owns up to [`WATCHES_PER_WORKER`] registrations and blocks in
//! one native wait over `[wake] ++ watched signals`. Registering never blocks
//! the caller: the command is queued and the worker's wake signal set. A
//! fired registration is removed before its callback runs, so every callback
//! runs at most once. A new worker is spawned when all existing ones are full.

use crate::error::{Error, Result};
use crate::rt::{wait_any_native, Signal, MAX_WAIT_OBJECTS};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Registrations one worker can hold next to its wake signal.
pub const WATCHES_PER_WORKER: usize = MAX_WAIT_OBJECTS - 1;

/// Callback run on a pool worker when its signal fires.
pub(crate) type WaitCallback = Box<dyn FnOnce() + Send + 'static>;

static GLOBAL_POOL: OnceLock<WaitPool> = OnceLock::new();

enum Command {
    Register {
        id: u64,
        signal: Signal,
        callback: WaitCallback,
    },
    Unregister {
        id: u64,
    },
    Shutdown,
}

/// Pool of background wait workers.
#[derive(Clone)]
pub struct WaitPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    workers: Mutex<Vec<Worker>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

struct Worker {
    commands: Sender<Command>,
    wake: Signal,
    load: Arc<AtomicUsize>,
    thread: Option<JoinHandle<()>>,
}

impl WaitPool {
    /// Create a private pool. Workers are spawned on first registration.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                workers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Process-wide pool used by the free bridge functions.
    pub fn global() -> &'static WaitPool {
        GLOBAL_POOL.get_or_init(WaitPool::new)
    }

    /// Run `callback` once on a pool worker after `signal` fires.
    pub(crate) fn register(&self, signal: &Signal, callback: WaitCallback) -> Result<RegisteredWait> {
        let mut workers = self.inner.workers.lock();
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(Error::Abandoned);
        }

        let position = match workers
            .iter()
            .position(|w| w.load.load(Ordering::Acquire) < WATCHES_PER_WORKER)
        {
            Some(position) => position,
            None => {
                let index = workers.len();
                workers.push(Worker::spawn(index)?);
                index
            }
        };
        let worker = &workers[position];

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        worker.load.fetch_add(1, Ordering::AcqRel);
        worker
            .commands
            .send(Command::Register {
                id,
                signal: signal.clone(),
                callback,
            })
            .map_err(|_| Error::Abandoned)?;
        worker.wake.set();

        log::trace!("[wait-pool] registered wait {} on signal {}", id, signal.id());

        Ok(RegisteredWait {
            id,
            commands: worker.commands.clone(),
            wake: worker.wake.clone(),
            released: AtomicBool::new(false),
        })
    }

    /// Number of registrations currently held by all workers.
    pub fn active_waits(&self) -> usize {
        self.inner
            .workers
            .lock()
            .iter()
            .map(|w| w.load.load(Ordering::Acquire))
            .sum()
    }

    /// Number of spawned workers.
    pub fn worker_count(&self) -> usize {
        self.inner.workers.lock().len()
    }

    /// Stop every worker and join it. Pending registrations are dropped
    /// without running, which resolves their futures as abandoned.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        let mut workers = self.inner.workers.lock();
        for worker in workers.iter_mut() {
            worker.stop();
            if let Some(handle) = worker.thread.take() {
                if handle.join().is_err() {
                    log::warn!("[wait-pool] worker panicked during shutdown");
                }
            }
        }
    }
}

impl Default for WaitPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        // Detach: a worker may be the one dropping the last handle.
        for worker in self.workers.get_mut().iter() {
            worker.stop();
        }
    }
}

impl Worker {
    fn spawn(index: usize) -> Result<Self> {
        let (commands, rx) = unbounded::<Command>();
        let wake = Signal::auto_reset()?;
        let load = Arc::new(AtomicUsize::new(0));

        let thread_wake = wake.clone();
        let thread_load = Arc::clone(&load);
        let thread = thread::Builder::new()
            .name(format!("savewatch-wait-{index}"))
            .spawn(move || worker_loop(index, rx, thread_wake, thread_load))?;

        log::debug!("[wait-pool] spawned worker {}", index);

        Ok(Self {
            commands,
            wake,
            load,
            thread: Some(thread),
        })
    }

    fn stop(&self) {
        let _ = self.commands.send(Command::Shutdown);
        self.wake.set();
    }
}

struct Watch {
    id: u64,
    signal: Signal,
    callback: WaitCallback,
}

fn worker_loop(index: usize, commands: Receiver<Command>, wake: Signal, load: Arc<AtomicUsize>) {
    let mut watches: Vec<Watch> = Vec::new();

    loop {
        loop {
            match commands.try_recv() {
                Ok(Command::Register {
                    id,
                    signal,
                    callback,
                }) => watches.push(Watch {
                    id,
                    signal,
                    callback,
                }),
                Ok(Command::Unregister { id }) => {
                    if let Some(pos) = watches.iter().position(|w| w.id == id) {
                        watches.remove(pos);
                        load.fetch_sub(1, Ordering::AcqRel);
                    }
                }
                Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => {
                    log::debug!(
                        "[wait-pool] worker {} exiting, dropping {} registrations",
                        index,
                        watches.len()
                    );
                    return;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        let fired = {
            let mut handles: Vec<&Signal> = Vec::with_capacity(watches.len() + 1);
            handles.push(&wake);
            handles.extend(watches.iter().map(|w| &w.signal));
            wait_any_native(&handles, None)
        };

        match fired {
            Ok(Some(0) | None) => {}
            Ok(Some(slot)) => {
                let watch = watches.remove(slot - 1);
                load.fetch_sub(1, Ordering::AcqRel);
                log::trace!("[wait-pool] wait {} fired", watch.id);

                let callback = watch.callback;
                if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
                    log::error!("[wait-pool] callback for wait {} panicked", watch.id);
                }
            }
            Err(err) => {
                log::error!("[wait-pool] worker {} wait failed: {}", index, err);
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

/// Handle to a pending pool registration.
///
/// Dropping the handle unregisters the wait.
pub struct RegisteredWait {
    id: u64,
    commands: Sender<Command>,
    wake: Signal,
    released: AtomicBool,
}

impl RegisteredWait {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the registration. Returns `false` if already unregistered.
    ///
    /// Unregistering a wait that already fired is harmless.
    pub fn unregister(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        if self.commands.send(Command::Unregister { id: self.id }).is_ok() {
            self.wake.set();
        }
        true
    }
}

impl Drop for RegisteredWait {
    fn drop(&mut self) {
        self.unregister();
    }
}
