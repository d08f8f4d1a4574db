//! Sink-specific error types.
//!
//! None of these stop a sweep. They are logged at the probe boundary and,
//! for pushes, optionally handed to the retry queue.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while writing to either sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Appending to the local log failed (disk full, permission denied, ...).
    #[error("failed to append to '{}': {source}", path.display())]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote client could not be set up. Fatal at startup only.
    #[error("remote setup failed: {0}")]
    Connect(String),

    /// Transport-level push failure (DNS, connection refused, TLS, ...).
    #[error("push to '{path}' failed: {reason}")]
    Push { path: String, reason: String },

    /// The push did not finish within the configured timeout.
    #[error("push to '{path}' timed out after {timeout:?}")]
    Timeout { path: String, timeout: Duration },

    /// The remote answered with a non-success status.
    #[error("push to '{path}' rejected with status {status}: {body}")]
    Rejected {
        path: String,
        status: u16,
        body: String,
    },
}
