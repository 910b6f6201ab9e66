//! Error types for the wavescope-scan crate.
//!
//! Field absence is never an error: it is resolved by the sticky/volatile
//! policy in [`crate::reconciler`]. What remains is:
//!
//! - [`BatchFailure`]: one poll cycle produced no usable batch.
//! - [`ConfigError`]: loading or validating a [`crate::config::ScanConfig`].
//! - [`CaptureError`]: lifecycle errors of the packet-capture child process.
//! - [`ScanError`]: top-level aggregator with `From` conversions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenient `Result` alias for crate-level operations.
pub type ScanResult<T> = Result<T, ScanError>;

// ---------------------------------------------------------------------------
// BatchFailure
// ---------------------------------------------------------------------------

/// A whole poll cycle failed; no observations were produced.
///
/// Failures are batch-level by construction: a source either returns a
/// complete (possibly partial-per-field) batch or one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchFailure {
    /// The external tool is not installed or not on `PATH`.
    #[error("{tool} not found; is it installed?")]
    ToolMissing {
        /// Name of the missing executable.
        tool: String,
    },

    /// The tool ran but exited unsuccessfully.
    #[error("{tool} exited with {code:?}: {stderr}")]
    NonZeroExit {
        /// Name of the executable.
        tool: String,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// The tool did not finish within the configured timeout.
    #[error("{tool} timed out after {after_ms} ms")]
    Timeout {
        /// Name of the executable.
        tool: String,
        /// Timeout that elapsed.
        after_ms: u64,
    },

    /// Spawning or talking to the tool failed for another reason.
    #[error("{tool} I/O error: {message}")]
    Io {
        /// Name of the executable.
        tool: String,
        /// Underlying error text.
        message: String,
    },

    /// A scripted source has no more cycles to replay.
    #[error("replay source exhausted")]
    Exhausted,
}

impl BatchFailure {
    /// Map an I/O error from spawning `tool` to the matching failure.
    pub fn from_spawn(tool: &str, err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::ToolMissing {
                tool: tool.to_owned(),
            }
        } else {
            Self::Io {
                tool: tool.to_owned(),
                message: err.to_string(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced when loading or validating a [`ScanConfig`].
///
/// [`ScanConfig`]: crate::config::ScanConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file or its directory could not be written.
    #[error("Failed to write config file {path}: {source}")]
    FileWrite {
        /// Path that was written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be serialized.
    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    /// The file contents are not valid JSON for a config.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why it is invalid.
        reason: String,
    },
}

impl ConfigError {
    /// Construct an [`ConfigError::InvalidValue`].
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Lifecycle errors of the packet-capture child process.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// `start` was called while a capture is already running.
    #[error("a capture is already running (pid {pid:?})")]
    AlreadyRunning {
        /// Process id of the running capture, if known.
        pid: Option<u32>,
    },

    /// `stop` was called with no capture running.
    #[error("no capture is running")]
    NotRunning,

    /// The capture process could not be started.
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        /// Program that was launched.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Other I/O error while managing the capture.
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// ScanError
// ---------------------------------------------------------------------------

/// Top-level error type for wavescope-scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Failed to parse a MAC address string (expected `aa:bb:cc:dd:ee:ff`).
    #[error("failed to parse MAC address from '{input}': expected aa:bb:cc:dd:ee:ff")]
    MacParseFailed {
        /// The input string that could not be parsed.
        input: String,
    },

    /// A poll cycle failed.
    #[error("scan batch failed: {0}")]
    Batch(#[from] BatchFailure),

    /// Configuration problem.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Packet-capture lifecycle problem.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_not_found_maps_to_tool_missing() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        assert_eq!(
            BatchFailure::from_spawn("nmcli", &err),
            BatchFailure::ToolMissing {
                tool: "nmcli".into()
            }
        );
    }

    #[test]
    fn spawn_other_error_maps_to_io() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let failure = BatchFailure::from_spawn("iw", &err);
        assert!(matches!(failure, BatchFailure::Io { ref tool, .. } if tool == "iw"));
    }

    #[test]
    fn batch_failure_display() {
        let failure = BatchFailure::Timeout {
            tool: "nmcli".into(),
            after_ms: 8000,
        };
        assert_eq!(failure.to_string(), "nmcli timed out after 8000 ms");
    }

    #[test]
    fn batch_failure_converts_into_scan_error() {
        let err: ScanError = BatchFailure::Exhausted.into();
        assert!(matches!(err, ScanError::Batch(BatchFailure::Exhausted)));
    }
}
