// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cancellation tokens that can sit in a native wait.
//!
//! Each token owns a manual-reset [`Signal`], so a cancelled token stays
//! observable by every later wait that includes it. Child tokens are
//! cancelled together with their parent but can also be cancelled alone.

use super::signal::Signal;
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Cooperative cancellation flag with an attached waitable signal.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    signal: Signal,
    children: Mutex<Vec<Weak<TokenInner>>>,
}

impl CancellationToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                signal: Signal::manual_reset()?,
                children: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Create a token that is cancelled whenever `self` is.
    ///
    /// Cancelling the child does not affect the parent. A child created from
    /// an already cancelled parent starts cancelled.
    pub fn child(&self) -> io::Result<Self> {
        let child = Self::new()?;

        {
            let mut children = self.inner.children.lock();
            children.retain(|hook| hook.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }

        // `cancel` flips the flag before draining children, so checking after
        // the push cannot miss a concurrent cancellation.
        if self.is_cancelled() {
            child.cancel();
        }

        Ok(child)
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Signal that becomes (and stays) set once the token is cancelled.
    #[must_use]
    pub fn wait_handle(&self) -> &Signal {
        &self.inner.signal
    }

    /// Block until cancelled or `timeout` elapses. Returns `true` if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
        if self.is_cancelled() {
            return Ok(true);
        }
        self.inner.signal.wait_one(Some(timeout))
    }

    /// Identity of this token (the id of its signal).
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.signal.id()
    }
}

impl TokenInner {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.signal.set();

        let children: Vec<Arc<TokenInner>> = self
            .children
            .lock()
            .drain(..)
            .filter_map(|hook| hook.upgrade())
            .collect();

        for child in children {
            child.cancel();
        }
    }
}

impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for CancellationToken {}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("id", &self.id())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
