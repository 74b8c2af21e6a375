// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Change-driven saving of a mutable collection of entries.
//!
//! The host application exposes its entries through [`SaveTarget`] and pokes
//! a [`ChangeNotifier`] whenever membership changes. [`SaveLoop`] waits on
//! every entry's signal at once and saves exactly the entry that fired.
//!
//! ```no_run
//! use savewatch::logging::LogFacade;
//! use savewatch::watch::{SaveLoop, SharedCollection};
//! use savewatch::CancellationToken;
//! use std::sync::Arc;
//! # use savewatch::watch::{Monitored, SaveError};
//! # use savewatch::Signal;
//! # #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! # struct Doc(u32);
//! # impl Monitored for Doc {
//! #     fn signal(&self) -> Option<Signal> { None }
//! #     fn save(&self) -> Result<(), SaveError> { Ok(()) }
//! # }
//!
//! let docs = Arc::new(SharedCollection::<Doc>::new()?);
//! let save_loop = SaveLoop::new(
//!     Arc::clone(&docs),
//!     docs.notifier().clone(),
//!     Arc::new(LogFacade::default()),
//! );
//!
//! let lifecycle = CancellationToken::new()?;
//! let report = save_loop.run(&lifecycle);
//! println!("{report:?}");
//! # Ok::<(), std::io::Error>(())
//! ```

mod save_loop;
mod snapshot;
mod source;

pub use save_loop::{LoopReport, LoopState, LoopStatus, SaveLoop};
pub use snapshot::{Slot, WaitSet};
pub use source::{ChangeNotifier, Monitored, SaveError, SaveTarget, SharedCollection};
