// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Synthetic document store: documents that get edited and saved as JSON.

use parking_lot::Mutex;
use savewatch::watch::{Monitored, SaveError, SharedCollection};
use savewatch::{CancellationToken, Signal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// On-disk form of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: u64,
    pub title: String,
    pub revision: u64,
    pub lines: Vec<String>,
}

struct DocumentState {
    revision: u64,
    lines: Vec<String>,
}

/// One open document. Clones share state; identity is the id.
#[derive(Clone)]
pub struct Document {
    id: u64,
    title: Arc<str>,
    path: Arc<Path>,
    state: Arc<Mutex<DocumentState>>,
    dirty: Signal,
}

impl Document {
    pub fn open(id: u64, out_dir: &Path) -> std::io::Result<Self> {
        Ok(Self {
            id,
            title: format!("document {id}").into(),
            path: out_dir.join(format!("doc-{id}.json")).into(),
            state: Arc::new(Mutex::new(DocumentState {
                revision: 0,
                lines: Vec::new(),
            })),
            dirty: Signal::auto_reset()?,
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a line and mark the document dirty.
    pub fn edit(&self, line: impl Into<String>) {
        {
            let mut state = self.state.lock();
            state.revision += 1;
            state.lines.push(line.into());
        }
        self.dirty.set();
    }

    pub fn record(&self) -> DocumentRecord {
        let state = self.state.lock();
        DocumentRecord {
            id: self.id,
            title: self.title.to_string(),
            revision: state.revision,
            lines: state.lines.clone(),
        }
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document#{}", self.id)
    }
}

impl Monitored for Document {
    fn signal(&self) -> Option<Signal> {
        Some(self.dirty.clone())
    }

    /// Write to a temporary file, then rename over the target.
    fn save(&self) -> Result<(), SaveError> {
        let record = self.record();
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| SaveError::with_source(format!("encoding {:?}", self), e))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(id = self.id, revision = record.revision, "document saved");
        Ok(())
    }
}

/// Edits random documents until `token` fires. With `churn`, documents are
/// occasionally closed and new ones opened.
pub struct Editor {
    docs: Arc<SharedCollection<Document>>,
    out_dir: PathBuf,
    interval: Duration,
    churn: bool,
    next_id: AtomicU64,
    rng: fastrand::Rng,
}

impl Editor {
    pub fn new(
        docs: Arc<SharedCollection<Document>>,
        out_dir: PathBuf,
        interval: Duration,
        churn: bool,
    ) -> Self {
        let next_id = docs.snapshot().iter().map(Document::id).max().map_or(0, |id| id + 1);
        Self {
            docs,
            out_dir,
            interval,
            churn,
            next_id: AtomicU64::new(next_id),
            rng: fastrand::Rng::new(),
        }
    }

    /// Open `count` documents.
    pub fn open_documents(&self, count: usize) -> std::io::Result<()> {
        for _ in 0..count {
            self.open_one()?;
        }
        Ok(())
    }

    fn open_one(&self) -> std::io::Result<Document> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let doc = Document::open(id, &self.out_dir)?;
        self.docs.insert(doc.clone());
        tracing::info!(id, "document opened");
        Ok(doc)
    }

    /// One editing step.
    pub fn step(&mut self) -> std::io::Result<()> {
        let open = self.docs.snapshot();

        if self.churn && self.rng.u8(..20) == 0 {
            if open.len() > 1 {
                let doc = &open[self.rng.usize(..open.len())];
                self.docs.remove(doc);
                tracing::info!(id = doc.id(), "document closed");
            }
            let doc = self.open_one()?;
            doc.edit("created");
            return Ok(());
        }

        if open.is_empty() {
            return Ok(());
        }
        let doc = &open[self.rng.usize(..open.len())];
        doc.edit(format!("edit {}", self.rng.u32(..)));
        Ok(())
    }

    pub fn run(mut self, token: &CancellationToken) {
        loop {
            if let Err(err) = self.step() {
                tracing::warn!("edit failed: {}", err);
            }
            match token.wait_timeout(self.interval) {
                Ok(false) => {}
                Ok(true) => break,
                Err(err) => {
                    tracing::error!("editor wait failed: {}", err);
                    break;
                }
            }
        }
        tracing::debug!("editor stopped");
    }
}
