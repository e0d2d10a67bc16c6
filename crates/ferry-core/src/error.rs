//! Error types for Ferry.
//!
//! The upload store itself never fails; these errors come from the edges
//! around it: opening progress streams, decoding their events, and loading
//! configuration.

use std::io;

use thiserror::Error;

/// A specialized `Result` type for Ferry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Ferry.
#[derive(Error, Debug)]
pub enum Error {
    /// The progress endpoint URL could not be built
    #[error("invalid progress endpoint '{url}': {reason}")]
    InvalidEndpoint {
        /// The offending URL
        url: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Connecting to the progress endpoint failed
    #[error("failed to connect to progress stream for '{key}': {reason}")]
    ConnectFailed {
        /// Upload key the stream was opened for
        key: String,
        /// Underlying failure
        reason: String,
    },

    /// The progress endpoint answered with a non-success status
    #[error("progress endpoint returned HTTP {status} for '{key}'")]
    BadStatus {
        /// Upload key the stream was opened for
        key: String,
        /// HTTP status code
        status: u16,
    },

    /// The progress stream broke while reading
    #[error("progress stream for '{0}' was interrupted: {1}")]
    StreamInterrupted(String, String),

    /// The progress stream stayed silent for too long
    #[error("progress stream for '{key}' idle for {secs} seconds")]
    StreamIdle {
        /// Upload key
        key: String,
        /// Idle timeout in seconds
        secs: u64,
    },

    /// A progress event payload could not be decoded
    #[error("malformed progress event for '{key}': {reason}")]
    MalformedEvent {
        /// Upload key
        key: String,
        /// Decoder error
        reason: String,
    },

    /// Closing a stream failed
    #[error("failed to close stream for '{0}': {1}")]
    CloseFailed(String, String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns whether reopening the stream could plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. } | Self::StreamInterrupted(..) | Self::StreamIdle { .. }
        )
    }
}
