// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types shared by every savewatch component.
//!
//! Argument errors surface synchronously to the direct caller; cancellation
//! carries the token that fired so callers can tell their own lifecycle token
//! apart from an internal one.

use crate::config::ConfigError;
use crate::rt::CancellationToken;
use std::io;
use thiserror::Error;

/// Boxed error used for collaborator and selector failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by savewatch operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Argument errors
    // ========================================================================
    /// A required argument was absent.
    #[error("argument '{name}' must not be absent")]
    InvalidArgument { name: &'static str },

    /// A numeric argument was outside its accepted range.
    #[error("argument '{name}' is out of range ({value}): {reason}")]
    OutOfRange {
        name: &'static str,
        value: i64,
        reason: &'static str,
    },

    /// More signals were handed to one native wait than the platform allows.
    #[error("{count} signals exceed the native wait ceiling of {max}")]
    TooManySignals { count: usize, max: usize },

    // ========================================================================
    // Wait outcomes
    // ========================================================================
    /// The cancellation token fired before any watched signal.
    #[error("operation canceled (token {})", .0.id())]
    Canceled(CancellationToken),

    /// The result selector of a bridged wait failed or panicked.
    #[error("wait result selector failed: {0}")]
    Faulted(#[source] BoxError),

    /// The wait pool shut down before the registration completed.
    #[error("wait registration abandoned before completion")]
    Abandoned,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // ========================================================================
    // Save loop
    // ========================================================================
    /// The entry collaborator could not produce a snapshot.
    #[error("entry snapshot failed: {0}")]
    Snapshot(#[source] BoxError),

    /// Two entries resolved to the same signal while rebuilding the wait set.
    #[error("signal {signal_id} is shared by more than one entry")]
    DuplicateSignal { signal_id: u64 },

    // ========================================================================
    // Worker host
    // ========================================================================
    #[error("invalid thread name {name:?}: {reason}")]
    InvalidThreadName { name: String, reason: &'static str },

    /// `start` was called on a worker that is already running.
    #[error("save worker '{name}' is already running")]
    AlreadyRunning { name: String },

    #[error("save worker did not stop within {timeout_ms}ms")]
    JoinTimeout { timeout_ms: u64 },

    #[error("save worker thread panicked")]
    WorkerPanicked,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns the token carried by a cancellation error.
    pub fn canceled_token(&self) -> Option<&CancellationToken> {
        match self {
            Self::Canceled(token) => Some(token),
            _ => None,
        }
    }

    /// `true` for [`Error::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }
}
