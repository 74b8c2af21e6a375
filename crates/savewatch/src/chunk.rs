// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lazy, order-preserving partitioning of a sequence into bounded groups.
//!
//! Every chunk but the last holds exactly `chunk_size` items, and the
//! concatenation of all chunks is the source. The source is pulled once, one
//! chunk at a time.

use crate::error::{Error, Result};
use std::iter::FusedIterator;

/// Partition `source` into chunks of `chunk_size`.
///
/// This is the checked entry point for callers whose inputs come from outside
/// (configuration, FFI): an absent source is [`Error::InvalidArgument`] and a
/// non-positive size is [`Error::OutOfRange`].
///
/// # Example
///
/// ```
/// use savewatch::chunk;
///
/// let chunks: Vec<Vec<u32>> = chunk(Some(1..=5), 2)?.collect();
/// assert_eq!(chunks, vec![vec![1, 2], vec![3, 4], vec![5]]);
/// # Ok::<(), savewatch::Error>(())
/// ```
pub fn chunk<I>(source: Option<I>, chunk_size: isize) -> Result<Chunks<I::IntoIter>>
where
    I: IntoIterator,
{
    let source = source.ok_or(Error::InvalidArgument { name: "source" })?;

    let size = usize::try_from(chunk_size)
        .ok()
        .filter(|size| *size > 0)
        .ok_or(Error::OutOfRange {
            name: "chunk_size",
            value: chunk_size as i64,
            reason: "the chunk size must be greater than 0",
        })?;

    Chunks::new(source, size)
}

/// Iterator adapter produced by [`chunk`] and [`ChunkExt::chunked`].
#[derive(Debug, Clone)]
pub struct Chunks<I> {
    iter: I,
    size: usize,
    done: bool,
}

impl<I: Iterator> Chunks<I> {
    /// Wrap `source`, rejecting a zero `size`.
    pub fn new<S>(source: S, size: usize) -> Result<Self>
    where
        S: IntoIterator<IntoIter = I>,
    {
        if size == 0 {
            return Err(Error::OutOfRange {
                name: "chunk_size",
                value: 0,
                reason: "the chunk size must be greater than 0",
            });
        }

        Ok(Self {
            iter: source.into_iter(),
            size,
            done: false,
        })
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.size
    }
}

impl<I: Iterator> Iterator for Chunks<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = Vec::with_capacity(self.size);
        for item in self.iter.by_ref() {
            buf.push(item);
            if buf.len() == self.size {
                return Some(buf);
            }
        }

        // Source exhausted; never poll it again.
        self.done = true;
        if buf.is_empty() {
            None
        } else {
            Some(buf)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let (lo, hi) = self.iter.size_hint();
        (lo.div_ceil(self.size), hi.map(|hi| hi.div_ceil(self.size)))
    }
}

impl<I: Iterator> FusedIterator for Chunks<I> {}

/// `.chunked(n)` on any iterable.
pub trait ChunkExt: IntoIterator + Sized {
    /// See [`Chunks::new`].
    fn chunked(self, size: usize) -> Result<Chunks<Self::IntoIter>> {
        Chunks::new(self, size)
    }
}

impl<T: IntoIterator> ChunkExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_chunk_counts_and_concatenation() {
        for len in 0..50usize {
            for size in 1..12usize {
                let source: Vec<usize> = (0..len).collect();
                let chunks: Vec<Vec<usize>> = chunk(Some(source.clone()), size as isize)
                    .expect("valid chunking")
                    .collect();

                assert_eq!(chunks.len(), len.div_ceil(size), "len={len} size={size}");
                assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= size));
                if let Some((last, full)) = chunks.split_last() {
                    assert!(full.iter().all(|c| c.len() == size));
                    assert!(last.len() <= size);
                }
                assert_eq!(chunks.concat(), source);
            }
        }
    }

    #[test]
    fn test_chunk_empty_source_yields_nothing() {
        let mut chunks = chunk(Some(Vec::<u8>::new()), 3).expect("valid chunking");
        assert!(chunks.next().is_none());
        assert!(chunks.next().is_none());
    }

    #[test]
    fn test_chunk_absent_source() {
        let err = chunk::<Vec<u8>>(None, 3).expect_err("absent source must fail");
        assert!(matches!(err, Error::InvalidArgument { name: "source" }));
    }

    #[test]
    fn test_chunk_non_positive_size() {
        for size in [0isize, -1, isize::MIN] {
            let err = chunk(Some(vec![1, 2, 3]), size).expect_err("size must be positive");
            match err {
                Error::OutOfRange { name, value, .. } => {
                    assert_eq!(name, "chunk_size");
                    assert_eq!(value, size as i64);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        assert!(vec![1].chunked(0).is_err());
    }

    #[test]
    fn test_chunk_is_lazy_and_single_pass() {
        let pulled = Cell::new(0usize);
        let source = (0..10).inspect(|_| pulled.set(pulled.get() + 1));

        let mut chunks = source.chunked(4).expect("valid chunking");
        assert_eq!(pulled.get(), 0);

        assert_eq!(chunks.next(), Some(vec![0, 1, 2, 3]));
        assert_eq!(pulled.get(), 4);

        let rest: Vec<_> = chunks.collect();
        assert_eq!(rest, vec![vec![4, 5, 6, 7], vec![8, 9]]);
        assert_eq!(pulled.get(), 10);
    }

    #[test]
    fn test_chunk_size_hint() {
        let chunks = (0..61).chunked(60).expect("valid chunking");
        assert_eq!(chunks.size_hint(), (2, Some(2)));
        assert_eq!(chunks.chunk_size(), 60);
    }
}
