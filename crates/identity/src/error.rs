//! Error types for PIB and identity-manager operations.
//!
//! The PIB distinguishes three failure classes so callers can react
//! differently: a missing entity or unset default ([`PibError::NotFound`]) is
//! routinely recovered by creating it, a broken storage medium
//! ([`PibError::Storage`]) is not, and a naming-rule violation
//! ([`PibError::InvalidArgument`]) is a programming mistake.

use ndnsec_core::Name;
use std::fmt;
use thiserror::Error;

/// What a [`PibError::NotFound`] was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Identity,
    Key,
    Certificate,
    DefaultIdentity,
    DefaultKey,
    DefaultCertificate,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Identity => "Identity",
            EntityKind::Key => "Key",
            EntityKind::Certificate => "Certificate",
            EntityKind::DefaultIdentity => "Default identity",
            EntityKind::DefaultKey => "Default key",
            EntityKind::DefaultCertificate => "Default certificate",
        };
        f.write_str(label)
    }
}

/// Errors reported by [`crate::pib::PibImpl`] backends and the PIB front end.
#[derive(Debug, Error)]
pub enum PibError {
    /// The requested entity does not exist, or the requested default is unset
    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    /// The storage medium failed or returned bytes that cannot be decoded
    #[error("PIB storage error: {0}")]
    Storage(String),

    /// A child name does not belong to the given parent, or a certificate name is malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl PibError {
    pub fn not_found(kind: EntityKind, name: &Name) -> Self {
        PibError::NotFound {
            kind,
            name: name.to_uri(),
        }
    }

    /// Stored bytes could not be decoded back into a name or certificate.
    pub fn corrupt(what: &str, reason: impl fmt::Display) -> Self {
        PibError::Storage(format!("cannot decode stored {}: {}", what, reason))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PibError::NotFound { .. })
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, PibError::Storage(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, PibError::InvalidArgument(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for PibError {
    fn from(e: rusqlite::Error) -> Self {
        PibError::Storage(e.to_string())
    }
}

/// Result type for PIB operations.
pub type PibResult<T> = Result<T, PibError>;

/// Errors that can occur in identity-manager operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// PIB errors
    #[error("PIB error: {0}")]
    Pib(#[from] PibError),

    /// Private key store errors
    #[error("TPM error: {0}")]
    Tpm(#[from] ndnsec_crypto::TpmError),

    /// Core errors
    #[error("Core error: {0}")]
    Core(#[from] ndnsec_core::CoreError),

    /// Strict identity creation found an identity that already has a default certificate
    #[error("Identity already exists: {identity}")]
    IdentityExists { identity: String },

    /// Signing parameters could not be parsed or resolved
    #[error("Invalid signing info: {0}")]
    InvalidSigningInfo(String),

    /// The key's algorithm has no supported signature type
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The PIB is paired with a different TPM than the one configured
    #[error("TPM locator mismatch: PIB expects '{pib}', configured '{tpm}'")]
    LocatorMismatch { pib: String, tpm: String },

    /// Certificate preparation rejected its inputs
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IdentityError {
    /// Whether the underlying cause is a missing PIB entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, IdentityError::Pib(e) if e.is_not_found())
    }
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;
