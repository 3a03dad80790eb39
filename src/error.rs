//! Error types for the acquisition core.

use thiserror::Error;

/// Result type alias using [`AcquireError`].
pub type Result<T> = std::result::Result<T, AcquireError>;

/// Errors produced while acquiring metric samples.
///
/// Every failure in the core resolves to one of these variants; nothing
/// panics or aborts the process. Variants are string-carrying so the error
/// can be cloned into broadcast events after the underlying client error
/// (which is not `Clone`) has been consumed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcquireError {
    /// Network-level failure: connection refused, DNS, timeout, broken socket.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status code.
    #[error("Unexpected HTTP status {code}: {message}")]
    Status { code: u16, message: String },

    /// The payload could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A manual trigger was rejected because it arrived inside the debounce
    /// window. Not a failure in the usual sense; "ignored, try again later".
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Automatic reconnection gave up after the configured number of
    /// attempts. Terminal for the session until `connect()` is called again.
    #[error("Reconnect attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AcquireError {
    /// Create a transport error.
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an HTTP status error, preserving the status code.
    pub fn status_error(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode_error(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a rate-limited (debounce rejection) error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited(message.into())
    }

    /// Create a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
