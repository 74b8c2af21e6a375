// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logger collaborator and its two stock implementations.

use super::record::{field_value, format_fields, format_line, LogField, LogLevel, LogRecord};
use crate::error::BoxError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Destination for save-loop and host records.
///
/// Implementations must be thread-safe; the save loop and the diagnostics
/// monitor log from their own threads.
pub trait Logger: Send + Sync {
    /// Emit one record.
    fn log(&self, record: LogRecord);

    fn trace(&self, context: &'static str, message: &str) {
        self.log(LogRecord::message(LogLevel::Trace, context, message));
    }

    fn debug(&self, context: &'static str, message: &str) {
        self.log(LogRecord::message(LogLevel::Debug, context, message));
    }

    fn info(&self, context: &'static str, message: &str) {
        self.log(LogRecord::message(LogLevel::Info, context, message));
    }

    fn warn(&self, context: &'static str, message: &str) {
        self.log(LogRecord::message(LogLevel::Warn, context, message));
    }

    fn error(&self, context: &'static str, message: &str) {
        self.log(LogRecord::message(LogLevel::Error, context, message));
    }

    fn critical(&self, context: &'static str, message: &str) {
        self.log(LogRecord::message(LogLevel::Critical, context, message));
    }

    /// Log `error` at `level`.
    fn log_error(&self, level: LogLevel, context: &'static str, error: BoxError) {
        self.log(LogRecord::error(level, context, error));
    }
}

/// Forwards records to the `log` facade with `[context] message` lines.
///
/// Critical records go out at `log::Level::Error` prefixed with `CRITICAL`.
/// A record carrying both a message and an error produces two lines.
/// Structured fields are appended to the message line as `{k=v, ...}`.
#[derive(Debug, Clone, Copy)]
pub struct LogFacade {
    min_level: LogLevel,
}

impl LogFacade {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    #[must_use]
    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn emit(level: LogLevel, line: &str) {
        let Some(lvl) = level.to_log_level() else {
            return;
        };
        if level == LogLevel::Critical {
            log::log!(lvl, "CRITICAL {}", line);
        } else {
            log::log!(lvl, "{}", line);
        }
    }
}

impl Default for LogFacade {
    fn default() -> Self {
        Self::new(LogLevel::Trace)
    }
}

impl Logger for LogFacade {
    fn log(&self, record: LogRecord) {
        if record.level == LogLevel::None || self.min_level == LogLevel::None || record.level < self.min_level {
            return;
        }

        let fields = format_fields(&record.fields);
        match (&record.message, fields.is_empty()) {
            (Some(message), true) => Self::emit(record.level, &format_line(record.context, message)),
            (Some(message), false) => {
                Self::emit(record.level, &format_line(record.context, &format!("{message} {fields}")));
            }
            (None, false) => Self::emit(record.level, &format_line(record.context, &fields)),
            (None, true) => {}
        }
        if let Some(error) = &record.error {
            Self::emit(record.level, &format_line(record.context, &error.to_string()));
        }
    }
}

/// Flattened copy of a record kept by [`MemoryLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    pub level: LogLevel,
    pub context: &'static str,
    pub message: Option<String>,
    pub error: Option<String>,
    pub fields: Vec<LogField>,
}

impl CapturedRecord {
    pub fn field(&self, key: &str) -> Option<&str> {
        field_value(&self.fields, key)
    }
}

/// Keeps every record in memory. Used by tests and embedders that want to
/// inspect what the loop reported.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogger {
    records: Arc<Mutex<Vec<CapturedRecord>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records.lock().clone()
    }

    /// Number of records logged at exactly `level`.
    pub fn count(&self, level: LogLevel) -> usize {
        self.records.lock().iter().filter(|r| r.level == level).count()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Logger for MemoryLogger {
    fn log(&self, record: LogRecord) {
        if record.level == LogLevel::None {
            return;
        }
        self.records.lock().push(CapturedRecord {
            level: record.level,
            context: record.context,
            message: record.message,
            error: record.error.map(|e| e.to_string()),
            fields: record.fields,
        });
    }
}
