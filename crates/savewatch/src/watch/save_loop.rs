// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Change-driven save loop.
//!
//! One iteration:
//!
//! 1. **DetectingDrift**: snapshot the entries; rebuild the [`WaitSet`] if the
//!    membership or the notifier generation changed.
//! 2. **Waiting**: multiplexed wait over the set with a per-iteration token
//!    linked to the lifecycle token.
//! 3. **Invoking**: save the entry whose signal fired. Failures are logged
//!    at Critical and never leave the loop.
//!
//! A snapshot or rebuild failure, or a failing native wait, aborts the loop.
//! Cancelling the lifecycle token stops it at its next wait.

use super::snapshot::{Slot, WaitSet};
use super::source::{ChangeNotifier, SaveTarget};
use crate::error::{BoxError, Error, Result};
use crate::logging::{LogLevel, LogRecord, Logger};
use crate::mux::{self, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::rt::CancellationToken;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const CONTEXT: &str = "save-loop";

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    /// Not started yet.
    Idle = 0,
    DetectingDrift = 1,
    Waiting = 2,
    Invoking = 3,
    /// Terminated by a snapshot, rebuild or wait failure.
    Aborted = 4,
    /// Terminated by the lifecycle token.
    Stopped = 5,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::DetectingDrift,
            2 => Self::Waiting,
            3 => Self::Invoking,
            4 => Self::Aborted,
            5 => Self::Stopped,
            _ => Self::Idle,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Aborted | Self::Stopped)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shared, lock-free view of a loop's [`LoopState`].
#[derive(Debug, Clone, Default)]
pub struct LoopStatus(Arc<AtomicU8>);

impl LoopStatus {
    pub fn get(&self) -> LoopState {
        LoopState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: LoopState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Counters returned when the loop terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    pub state: LoopState,
    pub iterations: u64,
    pub saves: u64,
    pub failed_saves: u64,
    pub rebuilds: u64,
}

impl Default for LoopReport {
    fn default() -> Self {
        Self {
            state: LoopState::Idle,
            iterations: 0,
            saves: 0,
            failed_saves: 0,
            rebuilds: 0,
        }
    }
}

enum Step {
    Continue,
    Stop,
    Abort,
}

/// The save loop over one [`SaveTarget`].
pub struct SaveLoop<T: SaveTarget> {
    target: Arc<T>,
    notifier: ChangeNotifier,
    logger: Arc<dyn Logger>,
    chunk_size: usize,
    status: LoopStatus,
}

impl<T: SaveTarget> SaveLoop<T> {
    pub fn new(target: Arc<T>, notifier: ChangeNotifier, logger: Arc<dyn Logger>) -> Self {
        Self {
            target,
            notifier,
            logger,
            chunk_size: DEFAULT_CHUNK_SIZE,
            status: LoopStatus::default(),
        }
    }

    /// Override the multiplexer chunk width (`1..=MAX_CHUNK_SIZE`).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::OutOfRange {
                name: "chunk_size",
                value: i64::try_from(chunk_size).unwrap_or(i64::MAX),
                reason: "must be between 1 and the native ceiling minus the cancellation slot",
            });
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    #[must_use]
    pub fn status(&self) -> LoopStatus {
        self.status.clone()
    }

    /// Run until `lifecycle` is cancelled or an unrecoverable failure.
    pub fn run(&self, lifecycle: &CancellationToken) -> LoopReport {
        let mut report = LoopReport::default();
        let mut wait_set: Option<WaitSet<T::Entry>> = None;

        self.logger.info(CONTEXT, "save loop started");

        let terminal = loop {
            if lifecycle.is_cancelled() {
                break LoopState::Stopped;
            }
            report.iterations += 1;
            self.logger.trace(CONTEXT, "iteration starting");

            self.status.set(LoopState::DetectingDrift);
            match self.refresh(&mut wait_set) {
                Ok(true) => report.rebuilds += 1,
                Ok(false) => {}
                Err(err) => {
                    self.logger.log(
                        LogRecord::message(LogLevel::Error, CONTEXT, "failed to update the entry snapshot")
                            .with_error(Box::new(err)),
                    );
                    break LoopState::Aborted;
                }
            }
            let Some(current) = wait_set.as_ref() else {
                break LoopState::Aborted;
            };

            let iteration = match lifecycle.child() {
                Ok(token) => token,
                Err(err) => {
                    self.logger.log_error(LogLevel::Error, CONTEXT, Box::new(err));
                    break LoopState::Aborted;
                }
            };

            self.status.set(LoopState::Waiting);
            let step = match mux::wait_any(current.signals(), self.chunk_size, &iteration) {
                Ok(signal) => {
                    match current.resolve(&signal) {
                        Slot::Changed => self.logger.debug(CONTEXT, "entry collection change signaled"),
                        Slot::Entry(entry) => {
                            self.status.set(LoopState::Invoking);
                            self.invoke(entry, &mut report);
                        }
                        Slot::Unknown => self.logger.debug(CONTEXT, "no entry for the fired signal"),
                    }
                    Step::Continue
                }
                Err(Error::Canceled(_)) if lifecycle.is_cancelled() => Step::Stop,
                Err(Error::Canceled(_)) => {
                    self.logger.debug(CONTEXT, "wait canceled for the current iteration");
                    Step::Continue
                }
                Err(err) => {
                    self.logger.log(
                        LogRecord::message(LogLevel::Error, CONTEXT, "save loop wait failed")
                            .with_error(Box::new(err)),
                    );
                    Step::Abort
                }
            };
            iteration.cancel();

            match step {
                Step::Continue => {}
                Step::Stop => break LoopState::Stopped,
                Step::Abort => break LoopState::Aborted,
            }
        };

        self.status.set(terminal);
        report.state = terminal;
        self.logger.warn(
            CONTEXT,
            &format!(
                "exiting save loop: {} after {} iterations ({} saved, {} failed)",
                terminal, report.iterations, report.saves, report.failed_saves
            ),
        );
        report
    }

    /// Rebuild `wait_set` if the membership drifted. Returns `true` on rebuild.
    fn refresh(&self, wait_set: &mut Option<WaitSet<T::Entry>>) -> Result<bool> {
        // Read before the snapshot: a change racing the snapshot bumps the
        // generation past this value and is caught next iteration.
        let generation = self.notifier.generation();
        let entries = self.target.entries().map_err(Error::Snapshot)?;

        if let Some(current) = wait_set.as_ref() {
            if !current.has_drifted(&entries, generation) {
                return Ok(false);
            }
        }

        let before = wait_set.as_ref().map_or(0, WaitSet::entry_count);
        let rebuilt = WaitSet::build(&*self.target, self.notifier.signal(), entries, generation)?;
        self.logger.info(
            CONTEXT,
            &format!(
                "entry collection changed, watching {} -> {} entries",
                before,
                rebuilt.entry_count()
            ),
        );
        *wait_set = Some(rebuilt);
        Ok(true)
    }

    fn invoke(&self, entry: &T::Entry, report: &mut LoopReport) {
        self.logger.debug(CONTEXT, &format!("change detected for {:?}", entry));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.target.save(entry)));
        let failure: BoxError = match outcome {
            Ok(Ok(())) => {
                report.saves += 1;
                self.logger.debug(CONTEXT, &format!("saved {:?}", entry));
                return;
            }
            Ok(Err(err)) => Box::new(err),
            Err(_) => "save action panicked".into(),
        };

        report.failed_saves += 1;
        self.logger.log(
            LogRecord::message(LogLevel::Critical, CONTEXT, format!("failed to save {:?}", entry))
                .with_error(failure),
        );
    }
}

#[cfg(test)]
mod tests;
