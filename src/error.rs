// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replay job.
//!
//! Errors are categorized by the collaborator that produced them and carry
//! the operation that failed, so a single log line is enough to diagnose a
//! failed cycle.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Source` | Yes | Event store read failed (connection drop, storage fault) |
//! | `Sink` | Yes | Message bus rejected a publish or offset query |
//! | `Config` | No | Configuration invalid |
//! | `InvalidOffset` | No | Offset string could not be parsed |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! The replay job retries every fault raised inside a cycle, whatever its
//! category. [`ReplayError::is_retryable()`] only decides how loudly the
//! fault is logged: transient faults are warnings, the rest are errors that
//! likely need an operator.
//!
//! Cancellation is never represented here. A stop request ends the job
//! through its own control-flow path and is never counted as a fault.

use thiserror::Error;

/// Result type alias for replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Errors that can occur while replaying events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// Event store read failure.
    ///
    /// Occurs when opening a read or while iterating the event stream.
    /// Retryable: the next cycle resumes from the sink's offset.
    #[error("Event source error ({operation}): {message}")]
    Source { operation: String, message: String },

    /// Message bus failure.
    ///
    /// Occurs when querying the latest accepted offset or publishing.
    /// Retryable: the failed event is re-read on the next cycle because the
    /// sink's offset has not moved past it.
    #[error("Event sink error ({operation}): {message}")]
    Sink { operation: String, message: String },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An offset could not be parsed.
    #[error("Invalid offset: {0}")]
    InvalidOffset(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReplayError {
    /// Create a source error for the given operation.
    pub fn source(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a sink error for the given operation.
    pub fn sink(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sink {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Check if this error is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Source { .. } => true,
            Self::Sink { .. } => true,
            Self::Config(_) => false,
            Self::InvalidOffset(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Short label for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Source { .. } => "source",
            Self::Sink { .. } => "sink",
            Self::Config(_) => "config",
            Self::InvalidOffset(_) => "invalid_offset",
            Self::Internal(_) => "internal",
        }
    }
}
