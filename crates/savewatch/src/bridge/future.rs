// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Completion slot shared by the two registrations of one bridged wait.

use super::pool::RegisteredWait;
use crate::error::{Error, Result};
use futures::channel::oneshot;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

/// First-writer-wins completion plus the registrations to release with it.
pub(crate) struct PendingWait<R> {
    tx: Mutex<Option<oneshot::Sender<Result<R>>>>,
    registrations: Mutex<Vec<RegisteredWait>>,
}

impl<R> PendingWait<R> {
    pub(crate) fn new() -> (Arc<Self>, WaitFuture<R>) {
        let (tx, rx) = oneshot::channel();
        let pending = Arc::new(Self {
            tx: Mutex::new(Some(tx)),
            registrations: Mutex::new(Vec::new()),
        });
        let future = WaitFuture {
            rx,
            pending: Arc::downgrade(&pending),
        };
        (pending, future)
    }

    #[must_use]
    pub(crate) fn is_completed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Publish `outcome` if nothing was published yet. Returns `true` for the
    /// winning writer.
    pub(crate) fn complete(&self, outcome: Result<R>) -> bool {
        let Some(tx) = self.tx.lock().take() else {
            return false;
        };
        // The receiver may already be gone; the outcome is dropped then.
        let _ = tx.send(outcome);
        self.release();
        true
    }

    /// Store the registrations. Releases them at once if a watch fired
    /// while they were being made.
    pub(crate) fn attach(&self, registrations: impl IntoIterator<Item = RegisteredWait>) {
        self.registrations.lock().extend(registrations);
        if self.is_completed() {
            self.release();
        }
    }

    /// Drop the completion slot without publishing and release everything.
    fn abandon(&self) {
        drop(self.tx.lock().take());
        self.release();
    }

    fn release(&self) {
        let registrations: Vec<RegisteredWait> = self.registrations.lock().drain(..).collect();
        for registration in &registrations {
            registration.unregister();
        }
    }
}

/// Future returned by the bridge. Resolves exactly once.
///
/// Dropping it before completion releases both pool registrations.
#[must_use = "futures do nothing unless polled"]
pub struct WaitFuture<R> {
    rx: oneshot::Receiver<Result<R>>,
    pending: Weak<PendingWait<R>>,
}

impl<R> Future for WaitFuture<R> {
    type Output = Result<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(Error::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R> Drop for WaitFuture<R> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.upgrade() {
            pending.abandon();
        }
    }
}

impl<R> fmt::Debug for WaitFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitFuture")
            .field("pending", &(self.pending.strong_count() > 0))
            .finish()
    }
}
