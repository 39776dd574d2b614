//! Core error types

use thiserror::Error;

/// Core error type for name handling and configuration
#[derive(Debug, Error)]
pub enum CoreError {
    /// A name URI could not be parsed
    #[error("Invalid name URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Wire-encoded bytes could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration is malformed or names an unsupported store
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
