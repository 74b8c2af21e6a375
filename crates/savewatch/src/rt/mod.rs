// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime primitives: waitable signals, the bounded native wait-any, and
//! cancellation tokens built on top of them.

pub mod cancel;
pub mod native;
pub mod signal;

pub use cancel::CancellationToken;
pub use native::{wait_any_native, MAX_WAIT_OBJECTS};
pub use signal::{ResetMode, Signal};
