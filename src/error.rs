//! Error types for cycle-twin operations.
//!
//! Only configuration, transport and recorder failures surface as errors.
//! Malformed inbound messages and out-of-range cycles are not errors: the
//! core drops them and keeps running.

use std::io;
use thiserror::Error;

/// Result type alias using [`TwinError`].
pub type Result<T> = std::result::Result<T, TwinError>;

/// Errors that can occur while configuring or running the twin.
#[derive(Debug, Error)]
pub enum TwinError {
    /// I/O error (config files, sockets, recorder file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration parsing error with line number.
    #[error("configuration error at line {line}: {message}")]
    ConfigParse {
        /// Line number where the error occurred (1-indexed).
        line: usize,
        /// Error message describing the issue.
        message: String,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    ConfigNotFound(String),

    /// Invalid configuration value.
    #[error("invalid configuration value for '{key}': {message}")]
    ConfigInvalid {
        /// The configuration key with invalid value.
        key: String,
        /// Error message describing why the value is invalid.
        message: String,
    },

    /// Outbound payload could not be encoded.
    #[error("JSON encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The transport failed to deliver or accept a message.
    #[error("transport error: {0}")]
    Transport(String),

    /// The peer closed the connection.
    #[error("transport connection closed by peer")]
    ConnectionClosed,

    /// The recorder sink could not be opened.
    #[error("recorder error: {0}")]
    Recorder(String),
}

impl TwinError {
    /// Returns true if the error came from the transport and a reconnect
    /// may recover from it.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ConnectionClosed | Self::Io(_))
    }
}
