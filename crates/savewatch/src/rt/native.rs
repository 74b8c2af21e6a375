// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded native wait-any.
//!
//! Blocks until the first of at most [`MAX_WAIT_OBJECTS`] signals fires and
//! reports its index. When several are signaled the lowest index wins, and an
//! auto-reset signal is consumed by being reported.
//!
//! - On Linux/Unix: `poll` over the eventfds, then a `read` to claim the
//!   auto-reset ones (a lost race re-enters the poll).
//! - On Windows: `WaitForMultipleObjects`.

use super::signal::Signal;
use crate::error::{Error, Result};
use std::time::{Duration, Instant};

/// Platform ceiling of signals per native wait call.
///
/// Mirrors `MAXIMUM_WAIT_OBJECTS` on Windows and is enforced on every
/// platform so behavior does not depend on the host.
pub const MAX_WAIT_OBJECTS: usize = 64;

/// Wait for any of `signals`.
///
/// Returns `Ok(Some(index))` for the signal observed, `Ok(None)` when
/// `timeout` elapsed first. `None` as timeout waits forever.
pub fn wait_any_native(signals: &[&Signal], timeout: Option<Duration>) -> Result<Option<usize>> {
    if signals.is_empty() {
        return Err(Error::InvalidArgument { name: "signals" });
    }
    if signals.len() > MAX_WAIT_OBJECTS {
        return Err(Error::TooManySignals {
            count: signals.len(),
            max: MAX_WAIT_OBJECTS,
        });
    }

    let deadline = timeout.map(|t| Instant::now() + t);
    platform::wait_any(signals, deadline)
}

/// Milliseconds left until `deadline`, rounded up so a sub-millisecond
/// remainder still blocks instead of spinning.
fn remaining_ms(deadline: Option<Instant>) -> Option<u64> {
    deadline.map(|d| {
        let left = d.saturating_duration_since(Instant::now());
        let ms = left.as_millis();
        let rounded = if left.as_nanos() % 1_000_000 != 0 { ms + 1 } else { ms };
        u64::try_from(rounded).unwrap_or(u64::MAX)
    })
}

// =============================================================================
// Unix implementation (poll)
// =============================================================================
#[cfg(unix)]
mod platform {
    use std::io;
    use std::time::Instant;

    use super::{remaining_ms, Signal};
    use crate::error::{Error, Result};

    pub fn wait_any(signals: &[&Signal], deadline: Option<Instant>) -> Result<Option<usize>> {
        let mut pollfds: Vec<libc::pollfd> = signals
            .iter()
            .map(|signal| libc::pollfd {
                fd: signal.raw(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        loop {
            let timeout_ms: libc::c_int = match remaining_ms(deadline) {
                None => -1,
                Some(ms) => libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX),
            };

            for pfd in &mut pollfds {
                pfd.revents = 0;
            }

            // nfds is bounded by MAX_WAIT_OBJECTS.
            #[allow(clippy::cast_possible_truncation)]
            let nfds = pollfds.len() as libc::nfds_t;
            // SAFETY: pollfds is a live Vec of initialized pollfd structures of length nfds.
            let res = unsafe { libc::poll(pollfds.as_mut_ptr(), nfds, timeout_ms) };
            if res == 0 {
                return Ok(None);
            }
            if res < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(Error::Io(err));
            }

            for (index, pfd) in pollfds.iter().enumerate() {
                if pfd.revents & libc::POLLNVAL != 0 {
                    return Err(Error::Io(io::Error::from_raw_os_error(libc::EBADF)));
                }
                if pfd.revents & libc::POLLIN != 0 && signals[index].try_consume() {
                    return Ok(Some(index));
                }
            }

            // Every readable auto-reset signal was claimed by another waiter.
            log::trace!("[rt] native wait lost all races, re-polling");
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(None);
            }
        }
    }
}

// =============================================================================
// Windows implementation (WaitForMultipleObjects)
// =============================================================================
#[cfg(windows)]
mod platform {
    use std::io;
    use std::time::Instant;

    use super::{remaining_ms, Signal};
    use crate::error::{Error, Result};

    const INFINITE: u32 = 0xFFFFFFFF;
    const WAIT_OBJECT_0: u32 = 0;
    const WAIT_ABANDONED_0: u32 = 0x80;
    const WAIT_TIMEOUT: u32 = 258;

    extern "system" {
        fn WaitForMultipleObjects(
            nCount: u32,
            lpHandles: *const *mut std::ffi::c_void,
            bWaitAll: i32,
            dwMilliseconds: u32,
        ) -> u32;
    }

    pub fn wait_any(signals: &[&Signal], deadline: Option<Instant>) -> Result<Option<usize>> {
        let handles: Vec<*mut std::ffi::c_void> = signals.iter().map(|s| s.raw()).collect();
        let timeout_ms = remaining_ms(deadline)
            .map(|ms| u32::try_from(ms).unwrap_or(INFINITE - 1))
            .unwrap_or(INFINITE);

        // count is bounded by MAX_WAIT_OBJECTS.
        #[allow(clippy::cast_possible_truncation)]
        let count = handles.len() as u32;
        // SAFETY: handles holds `count` valid event handles kept alive by `signals`.
        let result = unsafe { WaitForMultipleObjects(count, handles.as_ptr(), 0, timeout_ms) };

        if result == WAIT_TIMEOUT {
            return Ok(None);
        }
        if (WAIT_OBJECT_0..WAIT_OBJECT_0 + count).contains(&result) {
            return Ok(Some((result - WAIT_OBJECT_0) as usize));
        }
        if (WAIT_ABANDONED_0..WAIT_ABANDONED_0 + count).contains(&result) {
            return Ok(Some((result - WAIT_ABANDONED_0) as usize));
        }
        Err(Error::Io(io::Error::last_os_error()))
    }
}
