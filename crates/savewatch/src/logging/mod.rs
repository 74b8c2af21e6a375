// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging collaborator used by the save loop and the worker host.
//!
//! Internal plumbing (pool, multiplexer) logs straight through the `log`
//! facade. Components that report to an embedder take an
//! `Arc<dyn Logger>` instead, so the host application decides where records
//! go:
//!
//! - [`LogFacade`] forwards to `log` (and from there to whatever subscriber
//!   the binary installed).
//! - [`MemoryLogger`] keeps records for inspection.

mod output;
mod record;

pub use output::{CapturedRecord, LogFacade, Logger, MemoryLogger};
pub use record::{format_fields, format_line, LogField, LogLevel, LogRecord};
