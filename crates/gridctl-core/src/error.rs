//! Error types for gridctl-core.

use thiserror::Error;

use crate::crypto::CryptError;

/// Main error type for control plane operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or invalid configuration.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Malformed or unsupported control command.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Codec error during envelope encoding/decoding.
    #[error("codec error: {message}")]
    Codec { message: String },

    /// Cipher failure while sealing or opening a message.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptError),

    /// Requested host is not a member of the grid.
    #[error("invalid server hostname [{host}]")]
    InvalidHost { host: String },

    /// Transport layer error talking to a peer.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Illegal admission state transition.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// Catalog membership query failed.
    #[error("catalog error: {message}")]
    Catalog { message: String },

    /// Companion process lookup or termination failed.
    #[error("process error: {message}")]
    Process { message: String },
}

impl Error {
    /// Returns true if this error came from talking to a peer and a retry
    /// against the same host may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::Timeout | Error::Io(_)
        )
    }

    /// Returns true if this error invalidates the whole inbound request
    /// rather than a single host's fragment.
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            Error::Protocol { .. } | Error::Codec { .. } | Error::Crypto(_) | Error::Config { .. }
        )
    }
}

/// Convenience result type for control plane operations.
pub type Result<T> = std::result::Result<T, Error>;
