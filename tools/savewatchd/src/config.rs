// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Daemon configuration file: the library's `[watch]` table plus `[daemon]`.

use savewatch::{ConfigError, WatchConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonFile {
    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub daemon: DaemonSettings,
}

/// Synthetic workload settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonSettings {
    /// Directory the documents are saved to.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Documents open at start.
    #[serde(default = "default_documents")]
    pub documents: usize,

    /// Pause between two edits.
    #[serde(default = "default_edit_interval")]
    pub edit_interval_ms: u64,

    /// Open and close documents while editing.
    #[serde(default = "default_true")]
    pub churn: bool,

    /// Stop after this many seconds (0 runs until Ctrl+C).
    #[serde(default)]
    pub run_secs: u64,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("savewatch-out")
}

fn default_documents() -> usize {
    8
}

fn default_edit_interval() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            documents: default_documents(),
            edit_interval_ms: default_edit_interval(),
            churn: true,
            run_secs: 0,
        }
    }
}

impl DaemonFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let file: Self = toml::from_str(&content)?;
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.watch.validate()?;
        if self.daemon.edit_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "daemon.edit_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
