// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wait-to-future bridge.
//!
//! Turns one blocking wait on a [`Signal`] into a [`WaitFuture`] without
//! parking a thread per wait. Two watches are registered with a
//! [`WaitPool`]: one on the signal, one on the cancellation token's signal.
//! Whichever fires first publishes the outcome; the other watch is released.
//!
//! # Example
//!
//! ```no_run
//! use savewatch::bridge;
//! use savewatch::{CancellationToken, Signal};
//!
//! let signal = Signal::auto_reset()?;
//! let token = CancellationToken::new()?;
//! let fut = bridge::wait_signal_with_value(&signal, 42u32, &token)?;
//!
//! signal.set();
//! assert_eq!(futures::executor::block_on(fut)?, 42);
//! # Ok::<(), savewatch::Error>(())
//! ```

mod future;
mod pool;

pub use future::WaitFuture;
pub use pool::{RegisteredWait, WaitPool, WATCHES_PER_WORKER};

use crate::error::{BoxError, Error, Result};
use crate::rt::{CancellationToken, Signal};
use future::PendingWait;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

impl WaitPool {
    /// Wait for `signal` and resolve with `selector(state)`.
    ///
    /// Resolves with [`Error::Canceled`] carrying `token` if the token fires
    /// first, and with [`Error::Faulted`] if the selector fails or panics.
    /// Only registration failures are returned synchronously.
    pub fn wait_as_future<S, R, F>(
        &self,
        signal: &Signal,
        selector: F,
        state: S,
        token: &CancellationToken,
    ) -> Result<WaitFuture<R>>
    where
        S: Send + 'static,
        R: Send + 'static,
        F: FnOnce(S) -> std::result::Result<R, BoxError> + Send + 'static,
    {
        let (pending, future) = PendingWait::new();

        let on_cancel = {
            let pending = Arc::clone(&pending);
            let token = token.clone();
            Box::new(move || {
                if pending.complete(Err(Error::Canceled(token))) {
                    log::trace!("[bridge] wait canceled");
                }
            })
        };
        let cancel_registration = self.register(token.wait_handle(), on_cancel)?;

        let on_signal = {
            let pending = Arc::clone(&pending);
            Box::new(move || {
                if pending.is_completed() {
                    return;
                }
                let outcome = match panic::catch_unwind(AssertUnwindSafe(move || selector(state))) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(Error::Faulted(err)),
                    Err(payload) => Err(Error::Faulted(panic_message(payload.as_ref()).into())),
                };
                pending.complete(outcome);
            })
        };
        // On failure the cancel registration unregisters itself when dropped.
        let signal_registration = self.register(signal, on_signal)?;

        pending.attach([cancel_registration, signal_registration]);
        Ok(future)
    }
}

/// [`WaitPool::wait_as_future`] on the global pool.
pub fn wait_as_future<S, R, F>(
    signal: &Signal,
    selector: F,
    state: S,
    token: &CancellationToken,
) -> Result<WaitFuture<R>>
where
    S: Send + 'static,
    R: Send + 'static,
    F: FnOnce(S) -> std::result::Result<R, BoxError> + Send + 'static,
{
    WaitPool::global().wait_as_future(signal, selector, state, token)
}

/// Resolve with `()` once `signal` fires.
pub fn wait_signal(signal: &Signal, token: &CancellationToken) -> Result<WaitFuture<()>> {
    wait_signal_with_value(signal, (), token)
}

/// Resolve with `value` once `signal` fires.
pub fn wait_signal_with_value<R>(
    signal: &Signal,
    value: R,
    token: &CancellationToken,
) -> Result<WaitFuture<R>>
where
    R: Send + 'static,
{
    wait_signal_with(signal, move || value, token)
}

/// Resolve with `f()` once `signal` fires.
pub fn wait_signal_with<R, F>(signal: &Signal, f: F, token: &CancellationToken) -> Result<WaitFuture<R>>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    wait_as_future(signal, move |()| Ok(f()), (), token)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("selector panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("selector panicked: {msg}")
    } else {
        "selector panicked".to_string()
    }
}

#[cfg(test)]
mod tests;
