// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Waitable signals backed by kernel event objects.
//!
//! - On Linux/Unix: one non-blocking `eventfd` per signal.
//! - On Windows: one kernel Event object per signal.
//!
//! A [`Signal`] is either auto-reset (a wait that observes it clears it
//! atomically) or manual-reset (it stays signaled until [`Signal::reset`]).
//! Clones share the same kernel object; equality and hashing use a
//! process-unique id so signals can key a map.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a signal returns to the unsignaled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Cleared by the first wait that observes it.
    AutoReset,
    /// Stays signaled until explicitly reset.
    ManualReset,
}

/// A waitable two-state object.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    id: u64,
    mode: ResetMode,
    handle: platform::EventHandle,
}

impl Signal {
    /// Create a new, unsignaled signal.
    pub fn new(mode: ResetMode) -> io::Result<Self> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

        let handle = platform::create_event(mode)?;

        Ok(Self {
            inner: Arc::new(SignalInner { id, mode, handle }),
        })
    }

    /// Create an auto-reset signal.
    pub fn auto_reset() -> io::Result<Self> {
        Self::new(ResetMode::AutoReset)
    }

    /// Create a manual-reset signal.
    pub fn manual_reset() -> io::Result<Self> {
        Self::new(ResetMode::ManualReset)
    }

    /// Process-unique identifier of the underlying object.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn mode(&self) -> ResetMode {
        self.inner.mode
    }

    /// Transition to signaled. Setting an already signaled object is a no-op.
    pub fn set(&self) {
        platform::signal_event(&self.inner.handle);
    }

    /// Transition to unsignaled.
    pub fn reset(&self) {
        platform::reset_event(&self.inner.handle);
    }

    /// Check the state without consuming an auto-reset signal.
    #[must_use]
    pub fn is_set(&self) -> bool {
        platform::peek_event(&self.inner.handle, self.inner.mode)
    }

    /// Block until signaled or until `timeout` elapses (`None` waits forever).
    ///
    /// Returns `Ok(true)` when the signal was observed; an auto-reset signal
    /// is consumed by that observation.
    pub fn wait_one(&self, timeout: Option<Duration>) -> io::Result<bool> {
        let signaled = super::native::wait_any_native(&[self], timeout).map_err(|err| match err {
            crate::Error::Io(io_err) => io_err,
            other => io::Error::other(other.to_string()),
        })?;
        Ok(signaled.is_some())
    }

    pub(crate) fn raw(&self) -> platform::RawEvent {
        platform::raw(&self.inner.handle)
    }

    /// Claim an observed wake-up.
    ///
    /// Returns `false` when another waiter consumed an auto-reset signal first.
    pub(crate) fn try_consume(&self) -> bool {
        match self.inner.mode {
            ResetMode::ManualReset => true,
            ResetMode::AutoReset => platform::consume_event(&self.inner.handle),
        }
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Signal {}

impl Hash for Signal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("mode", &self.inner.mode)
            .finish()
    }
}

impl Drop for SignalInner {
    fn drop(&mut self) {
        platform::close_event(&self.handle);
    }
}

// =============================================================================
// Unix implementation (eventfd)
// =============================================================================
#[cfg(unix)]
pub(crate) mod platform {
    use std::io;
    use std::os::fd::RawFd;

    use super::ResetMode;

    const EVENTFD_FLAGS: libc::c_int = libc::EFD_NONBLOCK | libc::EFD_CLOEXEC;

    pub type EventHandle = RawFd;
    pub type RawEvent = RawFd;

    pub fn create_event(_mode: ResetMode) -> io::Result<EventHandle> {
        // SAFETY: eventfd is invoked with valid flags and no shared state.
        let fd = unsafe { libc::eventfd(0, EVENTFD_FLAGS) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(fd)
    }

    pub fn raw(handle: &EventHandle) -> RawEvent {
        *handle
    }

    pub fn signal_event(handle: &EventHandle) {
        let value: u64 = 1;
        let payload = value.to_ne_bytes();
        loop {
            // SAFETY: payload references a stack buffer with the 8-byte eventfd payload.
            let ret = unsafe { libc::write(*handle, payload.as_ptr().cast(), payload.len()) };
            if ret >= 0 {
                break;
            }

            let err = io::Error::last_os_error();
            let kind = err.kind();
            if kind == io::ErrorKind::Interrupted {
                continue;
            }
            if kind == io::ErrorKind::WouldBlock {
                break;
            }
            log::debug!("[rt] signal eventfd write failed: {}", err);
            break;
        }
    }

    /// Read the counter back to zero. Returns `true` if it was non-zero.
    pub fn consume_event(handle: &EventHandle) -> bool {
        let mut payload = [0u8; 8];
        loop {
            // SAFETY: payload is a stack buffer sized to the eventfd read requirements (8 bytes).
            let ret = unsafe { libc::read(*handle, payload.as_mut_ptr().cast(), payload.len()) };
            if ret >= 0 {
                return true;
            }

            let err = io::Error::last_os_error();
            let kind = err.kind();
            if kind == io::ErrorKind::Interrupted {
                continue;
            }
            if kind != io::ErrorKind::WouldBlock {
                log::debug!("[rt] signal eventfd read failed: {}", err);
            }
            return false;
        }
    }

    pub fn reset_event(handle: &EventHandle) {
        let _ = consume_event(handle);
    }

    pub fn peek_event(handle: &EventHandle, _mode: ResetMode) -> bool {
        let mut pollfd = libc::pollfd {
            fd: *handle,
            events: libc::POLLIN,
            revents: 0,
        };

        loop {
            // SAFETY: poll_target points to our stack-allocated pollfd structure.
            let poll_target = std::ptr::addr_of_mut!(pollfd);
            let res = unsafe { libc::poll(poll_target, 1, 0) };
            if res < 0 && io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return res > 0 && (pollfd.revents & libc::POLLIN) != 0;
        }
    }

    pub fn close_event(handle: &EventHandle) {
        // SAFETY: eventfd was obtained via libc::eventfd and is closed once here.
        unsafe {
            libc::close(*handle);
        }
    }
}

// =============================================================================
// Windows implementation (kernel Event object)
// =============================================================================
#[cfg(windows)]
pub(crate) mod platform {
    use std::io;

    use super::ResetMode;

    const WAIT_OBJECT_0: u32 = 0;

    pub type RawEvent = *mut std::ffi::c_void;

    // Opaque handle wrapper (HANDLE is *mut c_void on Windows)
    pub struct EventHandle(std::os::windows::io::RawHandle);

    // SAFETY: Windows Event objects are inherently thread-safe kernel objects.
    unsafe impl Send for EventHandle {}
    unsafe impl Sync for EventHandle {}

    extern "system" {
        fn CreateEventW(
            lpEventAttributes: *const std::ffi::c_void,
            bManualReset: i32,
            bInitialState: i32,
            lpName: *const u16,
        ) -> *mut std::ffi::c_void;

        fn SetEvent(hEvent: *mut std::ffi::c_void) -> i32;
        fn ResetEvent(hEvent: *mut std::ffi::c_void) -> i32;
        fn WaitForSingleObject(hHandle: *mut std::ffi::c_void, dwMilliseconds: u32) -> u32;
        fn CloseHandle(hObject: *mut std::ffi::c_void) -> i32;
    }

    pub fn create_event(mode: ResetMode) -> io::Result<EventHandle> {
        let manual = i32::from(mode == ResetMode::ManualReset);
        // SAFETY: CreateEventW FFI with null security attributes and name (valid for unnamed event)
        let handle = unsafe { CreateEventW(std::ptr::null(), manual, 0, std::ptr::null()) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(EventHandle(handle as std::os::windows::io::RawHandle))
    }

    pub fn raw(handle: &EventHandle) -> RawEvent {
        handle.0 as *mut _
    }

    pub fn signal_event(handle: &EventHandle) {
        // SAFETY: SetEvent FFI with valid event handle from CreateEventW
        unsafe {
            SetEvent(handle.0 as *mut _);
        }
    }

    /// Kernel waits already consume auto-reset events.
    pub fn consume_event(_handle: &EventHandle) -> bool {
        true
    }

    pub fn reset_event(handle: &EventHandle) {
        // SAFETY: ResetEvent FFI with valid event handle from CreateEventW
        unsafe {
            ResetEvent(handle.0 as *mut _);
        }
    }

    pub fn peek_event(handle: &EventHandle, mode: ResetMode) -> bool {
        // SAFETY: WaitForSingleObject FFI with valid event handle from CreateEventW
        let signaled = unsafe { WaitForSingleObject(handle.0 as *mut _, 0) } == WAIT_OBJECT_0;
        if signaled && mode == ResetMode::AutoReset {
            // The zero-timeout wait consumed it; put it back.
            signal_event(handle);
        }
        signaled
    }

    pub fn close_event(handle: &EventHandle) {
        // SAFETY: CloseHandle FFI with valid event handle from CreateEventW, called once in Drop
        unsafe {
            CloseHandle(handle.0 as *mut _);
        }
    }
}
