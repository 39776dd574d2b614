//! Error types for private-key store operations.

use thiserror::Error;

/// Errors that can occur in TPM operations.
#[derive(Debug, Error)]
pub enum TpmError {
    #[error("Private key not found: {key_name}")]
    KeyNotFound { key_name: String },

    #[error("Private key already exists: {key_name}")]
    KeyExists { key_name: String },

    #[error("Unsupported key parameters: {reason}")]
    UnsupportedKeyParams { reason: String },

    #[error("Unsupported TPM locator: {locator}")]
    UnsupportedLocator { locator: String },

    #[error("Cryptographic error: {reason}")]
    Crypto { reason: String },

    #[error("Key store is unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TpmError {
    pub(crate) fn crypto(reason: impl std::fmt::Display) -> Self {
        TpmError::Crypto {
            reason: reason.to_string(),
        }
    }
}

/// Result type for TPM operations.
pub type TpmResult<T> = Result<T, TpmError>;
