// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # savewatch - change-driven saving over native wait-any
//!
//! Waits on an unbounded, mutating set of waitable signals using a native
//! wait-any primitive that accepts at most [`MAX_WAIT_OBJECTS`] objects per
//! call, and saves exactly the entry whose signal fired.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use savewatch::logging::LogFacade;
//! use savewatch::watch::SharedCollection;
//! use savewatch::{SaveWorker, WatchConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//! # use savewatch::watch::{Monitored, SaveError};
//! # use savewatch::Signal;
//! # #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! # struct Doc(u32);
//! # impl Monitored for Doc {
//! #     fn signal(&self) -> Option<Signal> { None }
//! #     fn save(&self) -> Result<(), SaveError> { Ok(()) }
//! # }
//!
//! fn main() -> savewatch::Result<()> {
//!     let docs = Arc::new(SharedCollection::<Doc>::new()?);
//!     let mut worker = SaveWorker::new(WatchConfig::default(), Arc::new(LogFacade::default()))?;
//!
//!     worker.start(Arc::clone(&docs), docs.notifier().clone())?;
//!     docs.insert(Doc(1));
//!
//!     worker.shutdown(Duration::from_secs(5))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  host      SaveWorker: named thread, bounded shutdown, diagnostics  |
//! +---------------------------------------------------------------------+
//! |  watch     SaveLoop: drift detection -> wait -> save                |
//! |            WaitSet snapshot, ChangeNotifier, SaveTarget             |
//! +---------------------------------------------------------------------+
//! |  mux       chunked wait-any over any number of signals              |
//! |  bridge    single wait -> Future, serviced by a shared WaitPool     |
//! +---------------------------------------------------------------------+
//! |  rt        Signal (eventfd / Win32 event), native wait, tokens      |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`chunk`](mod@chunk) - bounded, order-preserving partitioning
//! - [`rt`] - signals, native wait-any, cancellation tokens
//! - [`mux`] - chunked multiplexer
//! - [`bridge`] - wait-to-future bridge
//! - [`watch`] - snapshot builder and save loop
//! - [`host`] - worker thread host
//! - [`logging`] - logger collaborator
//! - [`config`] - TOML configuration

pub mod bridge;
pub mod chunk;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod mux;
pub mod rt;
pub mod watch;

pub use chunk::{chunk, ChunkExt, Chunks};
pub use config::{ConfigError, WatchConfig};
pub use error::{BoxError, Error, Result};
pub use host::{validate_thread_name, SaveWorker, ThreadDiagnostics};
pub use mux::{wait_any, wait_any_timeout, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
pub use rt::{CancellationToken, ResetMode, Signal, MAX_WAIT_OBJECTS};
