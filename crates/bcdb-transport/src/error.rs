//! Error types for the transport layer.

use thiserror::Error;

use crate::messages::StatusCode;

/// Errors that can occur while dispatching a call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with an error status.
    #[error("server returned {code}: {message}")]
    Status { code: StatusCode, message: String },

    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A frame or body could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A frame exceeded the maximum size.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The peer closed the connection mid-call.
    #[error("connection closed")]
    ConnectionClosed,

    /// Connecting or reading took too long.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The server sent a response that does not fit the request.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The transport has no way to carry this request.
    #[error("{0} is not supported by this transport")]
    Unsupported(&'static str),

    /// The transport configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TransportError {
    /// Shorthand for a status error.
    pub fn status(code: StatusCode, message: impl Into<String>) -> Self {
        TransportError::Status {
            code,
            message: message.into(),
        }
    }

    /// The server status, if this error carries one.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            TransportError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
