// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entry sources: the capability the save loop drives, the change notifier
//! producers poke, and a ready-made mutex-guarded collection.

use crate::error::BoxError;
use crate::rt::Signal;
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by one entry's save action.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SaveError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl SaveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for SaveError {
    fn from(err: io::Error) -> Self {
        Self::with_source("I/O error while saving", err)
    }
}

/// What the save loop needs from the host application.
///
/// `entries` must return a full copy of the current membership; the loop
/// never holds a live view. Equality of `Entry` is the identity used to
/// detect membership drift.
pub trait SaveTarget: Send + Sync {
    type Entry: Clone + Eq + Hash + fmt::Debug + Send;

    /// Snapshot of the current entries.
    fn entries(&self) -> Result<Vec<Self::Entry>, BoxError>;

    /// Signal that fires when `entry` needs saving. Entries without one are
    /// not watched.
    fn signal_of(&self, entry: &Self::Entry) -> Option<Signal>;

    /// Persist `entry`.
    fn save(&self, entry: &Self::Entry) -> Result<(), SaveError>;
}

/// Collection-changed notification: one auto-reset signal plus a
/// generation counter.
///
/// Producers call [`notify`](Self::notify) after every membership change.
/// Bursts of notifications coalesce into one wake-up; the generation still
/// advances once per call so a consumer that compares generations never
/// misses a change.
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

struct NotifierInner {
    signal: Signal,
    generation: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            inner: Arc::new(NotifierInner {
                signal: Signal::auto_reset()?,
                generation: AtomicU64::new(0),
            }),
        })
    }

    /// Record a change and wake the consumer.
    pub fn notify(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.signal.set();
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn signal(&self) -> &Signal {
        &self.inner.signal
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("signal", &self.inner.signal.id())
            .field("generation", &self.generation())
            .finish()
    }
}

/// Entry that knows its own signal and how to save itself.
pub trait Monitored {
    fn signal(&self) -> Option<Signal>;

    fn save(&self) -> Result<(), SaveError>;
}

/// Mutex-guarded multiset of entries with a built-in [`ChangeNotifier`].
///
/// Every mutation notifies after the lock is released.
pub struct SharedCollection<E> {
    items: Mutex<Vec<E>>,
    notifier: ChangeNotifier,
}

impl<E: Clone + PartialEq> SharedCollection<E> {
    pub fn new() -> io::Result<Self> {
        Ok(Self::with_notifier(ChangeNotifier::new()?))
    }

    pub fn with_notifier(notifier: ChangeNotifier) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            notifier,
        }
    }

    pub fn insert(&self, entry: E) {
        self.items.lock().push(entry);
        self.notifier.notify();
    }

    /// Remove one occurrence of `entry`. Returns `false` if absent.
    pub fn remove(&self, entry: &E) -> bool {
        let removed = {
            let mut items = self.items.lock();
            match items.iter().position(|e| e == entry) {
                Some(pos) => {
                    items.swap_remove(pos);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.notifier.notify();
        }
        removed
    }

    /// Full copy of the current members.
    pub fn snapshot(&self) -> Vec<E> {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    #[must_use]
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl<E> SaveTarget for SharedCollection<E>
where
    E: Monitored + Clone + Eq + Hash + fmt::Debug + Send,
{
    type Entry = E;

    fn entries(&self) -> Result<Vec<E>, BoxError> {
        Ok(self.snapshot())
    }

    fn signal_of(&self, entry: &E) -> Option<Signal> {
        entry.signal()
    }

    fn save(&self, entry: &E) -> Result<(), SaveError> {
        entry.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_notifier_coalesces_but_counts_every_change() {
        let notifier = ChangeNotifier::new().expect("notifier");
        notifier.notify();
        notifier.notify();
        notifier.notify();

        assert_eq!(notifier.generation(), 3);
        assert!(notifier
            .signal()
            .wait_one(Some(std::time::Duration::ZERO))
            .expect("wait"));
        assert!(!notifier.signal().is_set());
    }

    #[test]
    fn test_collection_mutations_notify() {
        let collection = SharedCollection::<u32>::new().expect("collection");
        collection.insert(1);
        collection.insert(2);
        collection.insert(2);
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.notifier().generation(), 3);

        assert!(collection.remove(&2));
        assert!(!collection.remove(&7));
        assert_eq!(collection.notifier().generation(), 4);

        let mut members = collection.snapshot();
        members.sort_unstable();
        assert_eq!(members, vec![1, 2]);
    }

    #[test]
    fn test_save_error_keeps_its_source() {
        let err = SaveError::from(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        assert_eq!(err.message(), "I/O error while saving");
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("read-only"));
        assert!(SaveError::new("plain").source().is_none());
    }
}
