//! Error types for probe-runner
//!
//! Two families live here:
//! - [`Error`] covers everything that can fail *around* a batch: configuration,
//!   input selection, output I/O, pool lifecycle and shutdown transitions.
//! - [`ProbeError`] is a local invocation failure. It is produced and consumed
//!   inside a single worker invocation and never reaches the dispatcher.

use crate::types::ShutdownState;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for probe-runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for probe-runner
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency_limit")
        key: Option<String>,
    },

    /// Input selection could not produce a list of work items
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Input file is missing or is not a regular file
    #[error("input file not found: {}", path.display())]
    InputFileNotFound {
        /// The path that was requested
        path: PathBuf,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker pool has been torn down and no longer accepts submissions
    #[error("worker pool is closed")]
    PoolClosed,

    /// An execution slot thread could not be spawned
    #[error("failed to spawn execution slot {slot}: {source}")]
    SlotSpawn {
        /// Index of the slot that failed to start
        slot: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Attempted shutdown state transition is not allowed
    #[error("invalid shutdown transition from {from} to {to}")]
    InvalidTransition {
        /// State the coordinator was in
        from: ShutdownState,
        /// State that was requested
        to: ShutdownState,
    },
}

impl Error {
    /// Build a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error belongs to the fail-fast configuration category
    ///
    /// The binary exits with code 1 for these and code 2 for anything else.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config { .. } | Error::InvalidInput(_) | Error::InputFileNotFound { .. }
        )
    }
}

/// Local invocation failure
///
/// Raised while performing the blocking operation for one work item. It is
/// logged at debug level and the item is treated as non-success.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The outbound request failed (connection refused, DNS, TLS, ...)
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The per-call timeout expired
    #[error("request timed out")]
    Timeout,

    /// The worker function panicked inside its execution slot
    #[error("worker panicked: {0}")]
    Panicked(String),

    /// The invocation was dropped by a forced pool teardown before it ran
    #[error("invocation abandoned by pool teardown")]
    Abandoned,

    /// Any other failure reported by a caller-supplied probe
    #[error("{0}")]
    Other(String),
}

impl ProbeError {
    /// Classify a reqwest error, folding timeouts into [`ProbeError::Timeout`]
    pub fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout
        } else {
            ProbeError::Request(err)
        }
    }
}
