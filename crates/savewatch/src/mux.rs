// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Chunked multiplexer: wait-any over more signals than one native call takes.
//!
//! The signal set is partitioned with [`Chunks`](crate::chunk::Chunks) and
//! every native call receives `[cancellation] ++ chunk`, so the usable chunk
//! width is `MAX_WAIT_OBJECTS - 1`.
//!
//! Chunks are scanned in source order and the first signaled one wins: a
//! signal that keeps firing in chunk 0 is always served before anything in
//! chunk 1. A single chunk is waited on with no timeout. With several chunks a
//! pass is a zero-timeout sweep over every chunk followed by one bounded slice
//! ([`WAIT_SLICE`]) per chunk, repeated until something fires.

use crate::chunk::ChunkExt;
use crate::error::{Error, Result};
use crate::rt::{wait_any_native, CancellationToken, Signal, MAX_WAIT_OBJECTS};
use std::time::{Duration, Instant};

/// Default chunk width; `DEFAULT_CHUNK_SIZE + 1` stays under the ceiling.
pub const DEFAULT_CHUNK_SIZE: usize = 60;

/// Largest chunk width that still leaves room for the cancellation slot.
pub const MAX_CHUNK_SIZE: usize = MAX_WAIT_OBJECTS - 1;

/// Per-chunk blocking slice used when the set spans several chunks.
pub const WAIT_SLICE: Duration = Duration::from_millis(25);

/// Block until one of `signals` fires and return it.
///
/// Fails with [`Error::Canceled`] carrying `token` if the token fires first;
/// cancellation is never reported as a data signal. An empty set waits on
/// the token alone.
pub fn wait_any<'a, I>(signals: I, chunk_size: usize, token: &'a CancellationToken) -> Result<Signal>
where
    I: IntoIterator<Item = &'a Signal>,
{
    let handles = build_handles(signals, chunk_size, token)?;
    loop {
        if let Some(signal) = wait_handles(&handles, token, None)? {
            return Ok(signal);
        }
    }
}

/// Like [`wait_any`], but gives up after `timeout` and returns `Ok(None)`.
pub fn wait_any_timeout<'a, I>(
    signals: I,
    chunk_size: usize,
    token: &'a CancellationToken,
    timeout: Duration,
) -> Result<Option<Signal>>
where
    I: IntoIterator<Item = &'a Signal>,
{
    let handles = build_handles(signals, chunk_size, token)?;
    wait_handles(&handles, token, Some(Instant::now() + timeout))
}

fn build_handles<'a, I>(
    signals: I,
    chunk_size: usize,
    token: &'a CancellationToken,
) -> Result<Vec<Vec<&'a Signal>>>
where
    I: IntoIterator<Item = &'a Signal>,
{
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(Error::OutOfRange {
            name: "chunk_size",
            value: i64::try_from(chunk_size).unwrap_or(i64::MAX),
            reason: "must be between 1 and the native ceiling minus the cancellation slot",
        });
    }

    let cancel = token.wait_handle();
    let handles = signals
        .into_iter()
        .chunked(chunk_size)?
        .map(|chunk| {
            let mut handles = Vec::with_capacity(chunk.len() + 1);
            handles.push(cancel);
            handles.extend(chunk);
            handles
        })
        .collect();

    Ok(handles)
}

fn wait_handles(
    handles: &[Vec<&Signal>],
    token: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<Option<Signal>> {
    match handles {
        [] => {
            let cancel = token.wait_handle();
            match wait_any_native(&[cancel], remaining(deadline))? {
                Some(_) => Err(Error::Canceled(token.clone())),
                None => Ok(None),
            }
        }
        [only] => probe(only, remaining(deadline), token),
        _ => loop {
            for chunk in handles {
                if let Some(signal) = probe(chunk, Some(Duration::ZERO), token)? {
                    return Ok(Some(signal));
                }
            }

            for chunk in handles {
                let slice = match remaining(deadline) {
                    None => WAIT_SLICE,
                    Some(left) if left.is_zero() => return Ok(None),
                    Some(left) => left.min(WAIT_SLICE),
                };
                if let Some(signal) = probe(chunk, Some(slice), token)? {
                    return Ok(Some(signal));
                }
            }
        },
    }
}

/// One native call over `[cancellation] ++ chunk`.
fn probe(
    chunk: &[&Signal],
    timeout: Option<Duration>,
    token: &CancellationToken,
) -> Result<Option<Signal>> {
    match wait_any_native(chunk, timeout)? {
        Some(0) => {
            log::trace!("[mux] cancellation slot fired (token {})", token.id());
            Err(Error::Canceled(token.clone()))
        }
        Some(index) => Ok(Some(chunk[index].clone())),
        None => Ok(None),
    }
}

fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}
