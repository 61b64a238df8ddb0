//! Error types for the Neuron telemetry adapter.
//!
//! Only construction-time failures surface through [`MonitorError`]. Once a
//! monitor is running, parse failures and stream termination are logged and
//! absorbed so that stats callers never observe an error.

use std::io;
use thiserror::Error;

/// Error type for telemetry operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The external binary could not be located on `PATH`.
    #[error("binary '{0}' not found; is the AWS Neuron SDK installed?")]
    BinaryNotFound(String),

    /// The external binary was found but could not be launched.
    #[error("failed to launch '{binary}': {message}")]
    SpawnFailed {
        /// The binary that failed to launch.
        binary: String,
        /// Error message describing the failure.
        message: String,
    },

    /// A standard stream of the child was not captured.
    #[error("child {0} stream was not captured")]
    StreamUnavailable(&'static str),

    /// Writing the generated tool configuration failed.
    #[error("failed to materialize monitor configuration: {0}")]
    ConfigMaterialize(#[source] io::Error),

    /// Encoding the generated tool configuration failed.
    #[error("failed to encode monitor configuration: {0}")]
    ConfigEncode(#[source] serde_json::Error),

    /// Settings parsing error with line number.
    #[error("configuration error at line {line}: {message}")]
    ConfigParse {
        /// Line number where the error occurred (1-indexed).
        line: usize,
        /// Error message describing the issue.
        message: String,
    },

    /// Settings file not found.
    #[error("configuration file not found: {0}")]
    ConfigNotFound(String),

    /// Invalid settings value.
    #[error("invalid configuration value for '{key}': {message}")]
    ConfigInvalid {
        /// The settings key with invalid value.
        key: String,
        /// Error message describing why the value is invalid.
        message: String,
    },

    /// A monitor report line could not be decoded.
    #[error("malformed monitor report: {0}")]
    ReportDecode(#[from] serde_json::Error),

    /// Generic I/O failure while managing the child process.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MonitorError {
    /// Maps a spawn failure to the right variant, keeping "not found" distinct.
    pub(crate) fn from_spawn(binary: &str, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::BinaryNotFound(binary.to_string()),
            _ => Self::SpawnFailed { binary: binary.to_string(), message: err.to_string() },
        }
    }
}

/// Result type alias for telemetry operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
