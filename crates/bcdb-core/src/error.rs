//! Error types for the BCDB core.

use thiserror::Error;

/// Low-level cryptographic errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

/// Errors raised while deriving or loading an identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("invalid seed: expected {expected} bytes, got {got}")]
    InvalidSeed { expected: usize, got: usize },

    #[error("invalid identity file: {0}")]
    InvalidIdentityFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client-side validation failures. These are raised before any request is
/// signed or dispatched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid tag '{0}': keys starting with ':' are reserved for the server")]
    InvalidTag(String),

    #[error("invalid permission string '{0}': expected 3 characters in the form 'rwd' with '-' for missing permissions")]
    InvalidPermissionString(String),

    #[error("invalid validity window: {0} seconds, must be positive")]
    InvalidValidityWindow(i64),
}

/// Reasons a verifier rejects an authorization header.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("malformed authorization header: {0}")]
    Malformed(String),

    #[error("unknown key id: {0}")]
    UnknownKey(u64),

    #[error("signature verification failed")]
    BadSignature,

    #[error("header expired at {expires} (now {now})")]
    Expired { expires: u64, now: u64 },

    #[error("header not valid before {created} (now {now})")]
    NotYetValid { created: u64, now: u64 },
}

impl From<CoreError> for VerifyError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => VerifyError::BadSignature,
            CoreError::MalformedSignature(msg) => VerifyError::Malformed(msg),
        }
    }
}
