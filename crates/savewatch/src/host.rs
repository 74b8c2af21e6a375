// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dedicated thread hosting a [`SaveLoop`].
//!
//! [`SaveWorker`] owns the lifecycle token of the loop it starts. Shutdown is
//! cooperative: the token is cancelled and the thread joined within a bounded
//! timeout. A thread that does not stop in time is detached, never killed.
//!
//! Debug builds also run a monitor thread that logs [`ThreadDiagnostics`]
//! for the save thread every `monitor_interval_secs`.

use crate::config::WatchConfig;
use crate::error::{Error, Result};
use crate::logging::{LogLevel, LogRecord, Logger};
use crate::rt::CancellationToken;
use crate::watch::{ChangeNotifier, LoopReport, LoopState, LoopStatus, SaveLoop, SaveTarget};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

const CONTEXT: &str = "host";

/// Longest accepted thread name, in bytes.
pub const MAX_THREAD_NAME_LEN: usize = 255;

/// Why `name` cannot name a thread, if it cannot.
pub fn thread_name_problem(name: &str) -> Option<&'static str> {
    if name.len() > MAX_THREAD_NAME_LEN {
        Some("longer than 255 bytes")
    } else if name.contains(['\0', '\n', '\r']) {
        Some("contains a NUL, newline or carriage return")
    } else {
        None
    }
}

/// Reject names longer than [`MAX_THREAD_NAME_LEN`] or containing `\0`,
/// `\n` or `\r`.
pub fn validate_thread_name(name: &str) -> Result<()> {
    match thread_name_problem(name) {
        Some(reason) => Err(Error::InvalidThreadName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Point-in-time view of the save thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDiagnostics {
    pub name: String,
    pub alive: bool,
    pub state: LoopState,
    pub id: ThreadId,
}

impl ThreadDiagnostics {
    /// Record carrying every diagnostic as a structured field.
    pub fn to_record(&self, level: LogLevel, context: &'static str, message: impl Into<String>) -> LogRecord {
        LogRecord::message(level, context, message)
            .with_field("name", &self.name)
            .with_field("alive", self.alive)
            .with_field("state", self.state)
            .with_field("id", format!("{:?}", self.id))
    }
}

impl fmt::Display for ThreadDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ name: {}, alive: {}, state: {}, id: {:?} }}",
            self.name, self.alive, self.state, self.id
        )
    }
}

struct Probe {
    name: String,
    id: ThreadId,
    alive: Arc<AtomicBool>,
    status: LoopStatus,
}

impl Probe {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn snapshot(&self) -> ThreadDiagnostics {
        ThreadDiagnostics {
            name: self.name.clone(),
            alive: self.is_alive(),
            state: self.status.get(),
            id: self.id,
        }
    }
}

/// Clears the alive flag when the save thread exits, panics included.
struct AliveGuard(Arc<AtomicBool>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Running {
    lifecycle: CancellationToken,
    handle: JoinHandle<LoopReport>,
    done: Receiver<()>,
    probe: Arc<Probe>,
    monitor: Option<JoinHandle<()>>,
}

/// Runs one save loop on a named thread.
pub struct SaveWorker {
    config: WatchConfig,
    logger: Arc<dyn Logger>,
    running: Option<Running>,
}

impl SaveWorker {
    /// Create a stopped worker. The configuration is validated here.
    pub fn new(config: WatchConfig, logger: Arc<dyn Logger>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            logger,
            running: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Spawn the save thread over `target`.
    ///
    /// Fails with [`Error::AlreadyRunning`] while a previous loop is alive. A
    /// loop that already terminated on its own is reaped first.
    pub fn start<T>(&mut self, target: Arc<T>, notifier: ChangeNotifier) -> Result<()>
    where
        T: SaveTarget + 'static,
    {
        let name = self.config.thread_name.clone();
        if self.running.as_ref().is_some_and(|r| r.probe.is_alive()) {
            return Err(Error::AlreadyRunning { name });
        }
        if let Some(stale) = self.running.take() {
            self.reap(stale);
        }
        validate_thread_name(&name)?;

        let save_loop = SaveLoop::new(target, notifier, Arc::clone(&self.logger))
            .with_chunk_size(self.config.chunk_width())?;
        let status = save_loop.status();
        let lifecycle = CancellationToken::new()?;
        let alive = Arc::new(AtomicBool::new(true));
        let (done_tx, done) = bounded::<()>(1);

        let handle = {
            let token = lifecycle.clone();
            let alive = Arc::clone(&alive);
            thread::Builder::new().name(name.clone()).spawn(move || {
                let _alive = AliveGuard(alive);
                let report = save_loop.run(&token);
                let _ = done_tx.send(());
                report
            })?
        };

        let probe = Arc::new(Probe {
            name,
            id: handle.thread().id(),
            alive,
            status,
        });
        self.logger
            .log(probe.snapshot().to_record(LogLevel::Info, CONTEXT, "save thread started"));

        let monitor = self.spawn_monitor(&probe, &lifecycle);

        self.running = Some(Running {
            lifecycle,
            handle,
            done,
            probe,
            monitor,
        });
        Ok(())
    }

    /// `true` while the save thread is alive.
    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| r.probe.is_alive())
    }

    pub fn diagnostics(&self) -> Option<ThreadDiagnostics> {
        self.running.as_ref().map(|r| r.probe.snapshot())
    }

    /// Cancel the loop and join its thread within `timeout`.
    ///
    /// Returns `Ok(None)` if nothing was started. On [`Error::JoinTimeout`]
    /// the thread is detached and keeps its lifecycle token cancelled.
    pub fn shutdown(&mut self, timeout: Duration) -> Result<Option<LoopReport>> {
        let Some(running) = self.running.take() else {
            return Ok(None);
        };

        running.lifecycle.cancel();
        if let Err(RecvTimeoutError::Timeout) = running.done.recv_timeout(timeout) {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            self.logger.error(
                CONTEXT,
                &format!("save thread did not stop within {timeout_ms}ms, detaching"),
            );
            return Err(Error::JoinTimeout { timeout_ms });
        }

        if let Some(monitor) = running.monitor {
            let _ = monitor.join();
        }

        match running.handle.join() {
            Ok(report) => {
                self.logger.info(
                    CONTEXT,
                    &format!(
                        "save thread stopped: {:?} ({} iterations, {} saved, {} failed)",
                        report.state, report.iterations, report.saves, report.failed_saves
                    ),
                );
                Ok(Some(report))
            }
            Err(_) => {
                self.logger.error(CONTEXT, "save thread panicked");
                Err(Error::WorkerPanicked)
            }
        }
    }

    /// Join a loop that already terminated on its own.
    fn reap(&self, stale: Running) {
        stale.lifecycle.cancel();
        if let Some(monitor) = stale.monitor {
            let _ = monitor.join();
        }
        match stale.handle.join() {
            Ok(report) => self.logger.warn(
                CONTEXT,
                &format!("previous save thread had terminated: {:?}", report.state),
            ),
            Err(_) => self.logger.warn(CONTEXT, "previous save thread had panicked"),
        }
    }

    #[cfg(debug_assertions)]
    fn spawn_monitor(&self, probe: &Arc<Probe>, lifecycle: &CancellationToken) -> Option<JoinHandle<()>> {
        let spawned = lifecycle.child().map_err(Error::from).and_then(|token| {
            let probe = Arc::clone(probe);
            let logger = Arc::clone(&self.logger);
            let interval = self.config.monitor_interval();
            thread::Builder::new()
                .name("savewatch-monitor".into())
                .spawn(move || monitor_loop(&probe, &token, interval, logger.as_ref()))
                .map_err(Error::from)
        });

        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                self.logger.log(
                    LogRecord::message(LogLevel::Warn, CONTEXT, "diagnostics monitor not started")
                        .with_error(Box::new(err)),
                );
                None
            }
        }
    }

    #[cfg(not(debug_assertions))]
    fn spawn_monitor(&self, _probe: &Arc<Probe>, _lifecycle: &CancellationToken) -> Option<JoinHandle<()>> {
        None
    }
}

impl Drop for SaveWorker {
    fn drop(&mut self) {
        if self.running.is_some() {
            let timeout = self.config.shutdown_timeout();
            if let Err(err) = self.shutdown(timeout) {
                log::warn!("[host] save worker dropped without a clean stop: {}", err);
            }
        }
    }
}

#[cfg(debug_assertions)]
fn monitor_loop(probe: &Probe, token: &CancellationToken, interval: Duration, logger: &dyn Logger) {
    const MONITOR: &str = "monitor";

    loop {
        let diagnostics = probe.snapshot();
        if !diagnostics.alive {
            logger.log(diagnostics.to_record(LogLevel::Error, MONITOR, "save thread is no longer alive"));
            break;
        }
        logger.log(diagnostics.to_record(LogLevel::Debug, MONITOR, "save thread"));

        match token.wait_timeout(interval) {
            Ok(true) => {
                logger.debug(MONITOR, "monitor canceled");
                break;
            }
            Ok(false) => {}
            Err(err) => {
                logger.log(
                    LogRecord::message(LogLevel::Error, MONITOR, "monitor wait failed")
                        .with_error(Box::new(err)),
                );
                break;
            }
        }
    }
    logger.debug(MONITOR, "exiting the monitor thread");
}
