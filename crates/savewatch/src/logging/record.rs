// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Log levels and the record handed to a [`Logger`](super::Logger).

use crate::error::BoxError;
use std::fmt;

/// Severity of a record, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Never emitted; used as a filter that silences everything.
    None = 0,
    Trace = 1,
    Debug = 2,
    Info = 3,
    Warn = 4,
    Error = 5,
    /// Failure that the caller survives but an operator must see.
    Critical = 6,
}

impl LogLevel {
    /// Returns the string representation of the log level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE ",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warn => "WARN ",
            Self::Error => "ERROR",
            Self::Critical => "CRIT ",
        }
    }

    /// Matching `log` crate level. `None` has no counterpart.
    pub fn to_log_level(self) -> Option<log::Level> {
        match self {
            Self::None => None,
            Self::Trace => Some(log::Level::Trace),
            Self::Debug => Some(log::Level::Debug),
            Self::Info => Some(log::Level::Info),
            Self::Warn => Some(log::Level::Warn),
            Self::Error | Self::Critical => Some(log::Level::Error),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().trim_end())
    }
}

/// Key/value pair carried alongside a record.
pub type LogField = (&'static str, String);

/// One log event: a message, an error, or both, plus the caller context.
#[derive(Debug)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: Option<String>,
    pub error: Option<BoxError>,
    /// Component or call site that produced the record.
    pub context: &'static str,
    /// Structured fields, in insertion order.
    pub fields: Vec<LogField>,
}

impl LogRecord {
    pub fn message(level: LogLevel, context: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            message: Some(message.into()),
            error: None,
            context,
            fields: Vec::new(),
        }
    }

    pub fn error(level: LogLevel, context: &'static str, error: BoxError) -> Self {
        Self {
            level,
            message: None,
            error: Some(error),
            context,
            fields: Vec::new(),
        }
    }

    /// Attach an error to a message record.
    #[must_use]
    pub fn with_error(mut self, error: BoxError) -> Self {
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }

    /// Value of the first field named `key`.
    pub fn field(&self, key: &str) -> Option<&str> {
        field_value(&self.fields, key)
    }
}

pub(crate) fn field_value<'a>(fields: &'a [LogField], key: &str) -> Option<&'a str> {
    fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
}

/// `{k=v, k=v}` rendering of `fields`, empty when there are none.
pub fn format_fields(fields: &[LogField]) -> String {
    if fields.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", pairs.join(", "))
}

/// `[context] message`, the format every record line uses.
pub fn format_line(context: &str, message: &str) -> String {
    if context.is_empty() {
        message.to_string()
    } else {
        format!("[{context}] {message}")
    }
}
