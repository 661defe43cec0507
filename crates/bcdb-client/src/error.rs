//! Error types for the client.

use bcdb_core::ValidationError;
use bcdb_transport::{StatusCode, TransportError};
use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request was rejected before it was sent.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The object or ACL does not exist, or was deleted.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller lacks the required permission, or the server did not
    /// accept its credentials.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Transport-level failure, or an error status with no dedicated variant.
    #[error("transport error: {0}")]
    Transport(TransportError),
}

const NOT_AUTHORIZED: &str = "not authorized";

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Status { code, message } => match code {
                // Rejected credentials are not told apart from missing rights.
                StatusCode::Unauthenticated => {
                    ClientError::PermissionDenied(NOT_AUTHORIZED.into())
                }
                StatusCode::NotFound => ClientError::NotFound(message),
                StatusCode::PermissionDenied => ClientError::PermissionDenied(message),
                _ => ClientError::Transport(TransportError::Status { code, message }),
            },
            other => ClientError::Transport(other),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
