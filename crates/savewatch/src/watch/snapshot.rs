// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Snapshot of the signals the save loop waits on.
//!
//! A [`WaitSet`] is rebuilt from scratch whenever the membership drifts and
//! never patched in place. Slot 0 is always the collection-changed signal
//! and maps to no entry.

use super::source::SaveTarget;
use crate::error::{Error, Result};
use crate::rt::Signal;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// What a fired signal refers to.
#[derive(Debug, PartialEq, Eq)]
pub enum Slot<'a, E> {
    /// The collection-changed signal.
    Changed,
    /// A monitored entry.
    Entry(&'a E),
    /// Not part of this snapshot.
    Unknown,
}

/// Ordered signal → entry mapping owned by the save loop.
#[derive(Debug)]
pub struct WaitSet<E> {
    slots: Vec<(Signal, Option<E>)>,
    index: HashMap<Signal, usize>,
    members: HashSet<E>,
    member_count: usize,
    generation: u64,
}

impl<E: Clone + Eq + Hash> WaitSet<E> {
    /// Build the snapshot for `entries`.
    ///
    /// Entries whose signal cannot be resolved are skipped. Equal entries
    /// fold into one slot. Two distinct entries sharing one signal fail with
    /// [`Error::DuplicateSignal`].
    pub fn build<T>(target: &T, changed: &Signal, entries: Vec<E>, generation: u64) -> Result<Self>
    where
        T: SaveTarget<Entry = E> + ?Sized,
    {
        let mut slots = Vec::with_capacity(entries.len() + 1);
        let mut index = HashMap::with_capacity(entries.len() + 1);

        slots.push((changed.clone(), None));
        index.insert(changed.clone(), 0);

        let member_count = entries.len();
        let mut members = HashSet::with_capacity(member_count);

        for entry in entries {
            if members.contains(&entry) {
                continue;
            }
            if let Some(signal) = target.signal_of(&entry) {
                if index.insert(signal.clone(), slots.len()).is_some() {
                    return Err(Error::DuplicateSignal {
                        signal_id: signal.id(),
                    });
                }
                slots.push((signal, Some(entry.clone())));
            }
            members.insert(entry);
        }

        Ok(Self {
            slots,
            index,
            members,
            member_count,
            generation,
        })
    }

    /// `true` when `entries` differs from the snapshot or the notifier
    /// generation moved since it was taken.
    pub fn has_drifted(&self, entries: &[E], generation: u64) -> bool {
        generation != self.generation
            || entries.len() != self.member_count
            || entries.iter().any(|e| !self.members.contains(e))
    }

    /// Signals in slot order, changed signal first.
    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.slots.iter().map(|(signal, _)| signal)
    }

    pub fn resolve(&self, signal: &Signal) -> Slot<'_, E> {
        match self.index.get(signal).map(|&i| &self.slots[i].1) {
            Some(None) => Slot::Changed,
            Some(Some(entry)) => Slot::Entry(entry),
            None => Slot::Unknown,
        }
    }

    /// Number of watched entries, not counting the changed slot.
    pub fn entry_count(&self) -> usize {
        self.slots.len() - 1
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::watch::SaveError;

    /// Entry `n` is watched through `signals[n % len]` unless `n` is odd and
    /// `skip_odd` is set.
    struct Fixture {
        signals: Vec<Signal>,
        skip_odd: bool,
    }

    impl Fixture {
        fn new(count: usize) -> Self {
            Self {
                signals: (0..count).map(|_| Signal::auto_reset().expect("signal")).collect(),
                skip_odd: false,
            }
        }
    }

    impl SaveTarget for Fixture {
        type Entry = usize;

        fn entries(&self) -> std::result::Result<Vec<usize>, BoxError> {
            Ok((0..self.signals.len()).collect())
        }

        fn signal_of(&self, entry: &usize) -> Option<Signal> {
            if self.skip_odd && entry % 2 == 1 {
                return None;
            }
            let slot = entry.checked_rem(self.signals.len())?;
            self.signals.get(slot).cloned()
        }

        fn save(&self, _entry: &usize) -> std::result::Result<(), SaveError> {
            Ok(())
        }
    }

    #[test]
    fn test_changed_slot_is_first() {
        let fixture = Fixture::new(3);
        let changed = Signal::auto_reset().expect("signal");
        let set = WaitSet::build(&fixture, &changed, vec![0, 1, 2], 0).expect("build");

        let signals: Vec<&Signal> = set.signals().collect();
        assert_eq!(signals.len(), 4);
        assert_eq!(signals[0], &changed);
        assert_eq!(set.resolve(&changed), Slot::Changed);
        assert_eq!(set.resolve(&fixture.signals[2]), Slot::Entry(&2));
        assert_eq!(set.entry_count(), 3);

        let stranger = Signal::auto_reset().expect("signal");
        assert_eq!(set.resolve(&stranger), Slot::Unknown);
    }

    #[test]
    fn test_entries_without_signal_are_skipped() {
        let mut fixture = Fixture::new(4);
        fixture.skip_odd = true;
        let changed = Signal::auto_reset().expect("signal");

        let set = WaitSet::build(&fixture, &changed, vec![0, 1, 2, 3], 0).expect("build");
        assert_eq!(set.entry_count(), 2);
        assert_eq!(set.resolve(&fixture.signals[1]), Slot::Unknown);

        // Skipped entries are still members; no drift for the same input.
        assert!(!set.has_drifted(&[0, 1, 2, 3], 0));
    }

    #[test]
    fn test_drift_detection() {
        let fixture = Fixture::new(3);
        let changed = Signal::auto_reset().expect("signal");
        let set = WaitSet::build(&fixture, &changed, vec![0, 1, 2], 5).expect("build");

        assert!(!set.has_drifted(&[2, 0, 1], 5));
        assert!(set.has_drifted(&[0, 1], 5), "count changed");
        assert!(set.has_drifted(&[0, 1, 7], 5), "member replaced");
        assert!(set.has_drifted(&[0, 1, 2], 6), "generation advanced");
    }

    #[test]
    fn test_shared_signal_is_rejected() {
        let fixture = Fixture::new(2);
        let changed = Signal::auto_reset().expect("signal");

        let err = WaitSet::build(&fixture, &changed, vec![0, 1, 2], 0).expect_err("duplicate");
        assert!(matches!(err, Error::DuplicateSignal { signal_id } if signal_id == fixture.signals[0].id()));

        let err = WaitSet::build(&fixture, &fixture.signals[1], vec![1], 0).expect_err("collides with changed");
        assert!(matches!(err, Error::DuplicateSignal { .. }));
    }

    #[test]
    fn test_equal_entries_share_one_slot() {
        let fixture = Fixture::new(3);
        let changed = Signal::auto_reset().expect("signal");

        let set = WaitSet::build(&fixture, &changed, vec![0, 1, 0, 2, 1], 0).expect("build");
        assert_eq!(set.entry_count(), 3);
        assert_eq!(set.resolve(&fixture.signals[0]), Slot::Entry(&0));
        assert!(!set.has_drifted(&[0, 1, 0, 2, 1], 0));
        assert!(set.has_drifted(&[0, 1, 2], 0), "multiplicity changed");
    }
}
