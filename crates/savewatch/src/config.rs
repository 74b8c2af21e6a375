// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Save-loop configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! chunk_size = 60
//! monitor_interval_secs = 3
//! thread_name = "savewatch::save-loop"
//! shutdown_timeout_ms = 5000
//! ```

use crate::host::thread_name_problem;
use crate::mux::MAX_CHUNK_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Save worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Signals per native wait, not counting the cancellation slot.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i64,

    /// Diagnostics monitor period (debug builds only).
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,

    /// Name of the save loop thread.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// How long `shutdown` waits for the loop thread to exit.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

fn default_chunk_size() -> i64 {
    60
}

fn default_monitor_interval() -> u64 {
    3
}

fn default_thread_name() -> String {
    "savewatch::save-loop".to_string()
}

fn default_shutdown_timeout() -> u64 {
    5000
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            monitor_interval_secs: default_monitor_interval(),
            thread_name: default_thread_name(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

impl WatchConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size < 1 || self.chunk_size > MAX_CHUNK_SIZE as i64 {
            return Err(ConfigError::Invalid(format!(
                "chunk_size {} must be between 1 and {}",
                self.chunk_size, MAX_CHUNK_SIZE
            )));
        }

        if self.monitor_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "monitor_interval_secs must be greater than 0".into(),
            ));
        }

        if let Some(reason) = thread_name_problem(&self.thread_name) {
            return Err(ConfigError::Invalid(format!(
                "thread_name {:?}: {}",
                self.thread_name, reason
            )));
        }

        Ok(())
    }

    /// Chunk width as `usize`. Only meaningful after [`validate`](Self::validate).
    pub fn chunk_width(&self) -> usize {
        usize::try_from(self.chunk_size).unwrap_or(MAX_CHUNK_SIZE)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
