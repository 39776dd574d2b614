//! Signing parameters: who signs a packet and how.
//!
//! The string form is what command-line tools and configuration accept:
//!
//! | String              | Meaning                                        |
//! |---------------------|------------------------------------------------|
//! | `""`                | default identity, its default key and cert     |
//! | `id:/alice`         | default certificate of `/alice`'s default key  |
//! | `key:/alice/KSK-1`  | default certificate of that key                |
//! | `cert:/alice/KEY/…` | that certificate                               |
//!
//! `id:/localhost/identity/digest-sha256` selects digest-only signing.

use crate::error::IdentityError;
use ndnsec_core::Name;
use ndnsec_crypto::DigestAlgorithm;
use std::fmt;
use std::str::FromStr;

/// Reserved identity selecting a SHA-256 digest instead of a signature.
pub const DIGEST_SHA256_IDENTITY: &str = "/localhost/identity/digest-sha256";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerType {
    /// Default identity of the PIB
    Null,
    Id,
    Key,
    Cert,
    /// Digest only, no signer
    Sha256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningInfo {
    signer_type: SignerType,
    signer_name: Name,
    digest_algorithm: DigestAlgorithm,
}

impl SigningInfo {
    fn with_signer(signer_type: SignerType, signer_name: Name) -> Self {
        Self {
            signer_type,
            signer_name,
            digest_algorithm: DigestAlgorithm::Sha256,
        }
    }

    pub fn by_identity(identity: Name) -> Self {
        if identity == digest_sha256_identity() {
            return Self::digest_sha256();
        }
        Self::with_signer(SignerType::Id, identity)
    }

    pub fn by_key(key_name: Name) -> Self {
        Self::with_signer(SignerType::Key, key_name)
    }

    pub fn by_certificate(cert_name: Name) -> Self {
        Self::with_signer(SignerType::Cert, cert_name)
    }

    pub fn digest_sha256() -> Self {
        Self::with_signer(SignerType::Sha256, Name::new())
    }

    pub fn signer_type(&self) -> SignerType {
        self.signer_type
    }

    /// Identity, key or certificate name, depending on the signer type.
    pub fn signer_name(&self) -> &Name {
        &self.signer_name
    }

    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }
}

impl Default for SigningInfo {
    fn default() -> Self {
        Self::with_signer(SignerType::Null, Name::new())
    }
}

fn digest_sha256_identity() -> Name {
    Name::from_uri(DIGEST_SHA256_IDENTITY).unwrap_or_default()
}

impl fmt::Display for SigningInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signer_type {
            SignerType::Null => Ok(()),
            SignerType::Id => write!(f, "id:{}", self.signer_name),
            SignerType::Key => write!(f, "key:{}", self.signer_name),
            SignerType::Cert => write!(f, "cert:{}", self.signer_name),
            SignerType::Sha256 => write!(f, "id:{}", DIGEST_SHA256_IDENTITY),
        }
    }
}

impl FromStr for SigningInfo {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::default());
        }

        let (scheme, uri) = s.split_once(':').ok_or_else(|| {
            IdentityError::InvalidSigningInfo(format!("missing signer type in '{}'", s))
        })?;
        let name = Name::from_uri(uri)
            .map_err(|e| IdentityError::InvalidSigningInfo(format!("'{}': {}", s, e)))?;

        match scheme {
            "id" => Ok(Self::by_identity(name)),
            "key" => Ok(Self::by_key(name)),
            "cert" => Ok(Self::by_certificate(name)),
            other => Err(IdentityError::InvalidSigningInfo(format!(
                "unknown signer type '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!("".parse::<SigningInfo>().unwrap().signer_type(), SignerType::Null);

        let id: SigningInfo = "id:/alice".parse().unwrap();
        assert_eq!(id.signer_type(), SignerType::Id);
        assert_eq!(id.signer_name(), &Name::from_uri("/alice").unwrap());

        let key: SigningInfo = "key:/alice/KSK-1".parse().unwrap();
        assert_eq!(key.signer_type(), SignerType::Key);

        let cert: SigningInfo = "cert:/alice/KEY/KSK-1/ID-CERT/%FD%01".parse().unwrap();
        assert_eq!(cert.signer_type(), SignerType::Cert);
    }

    #[test]
    fn test_digest_identity_selects_sha256() {
        let info: SigningInfo = format!("id:{}", DIGEST_SHA256_IDENTITY).parse().unwrap();
        assert_eq!(info.signer_type(), SignerType::Sha256);
        assert_eq!(info.digest_algorithm(), DigestAlgorithm::Sha256);
    }

    #[test]
    fn test_display_round_trips() {
        for text in ["", "id:/alice", "key:/alice/KSK-1", "cert:/a/KEY/k/ID-CERT"] {
            let info: SigningInfo = text.parse().unwrap();
            assert_eq!(info.to_string(), text);
        }
        assert_eq!(
            SigningInfo::digest_sha256().to_string(),
            format!("id:{}", DIGEST_SHA256_IDENTITY)
        );
    }

    #[test]
    fn test_invalid_forms() {
        assert!(matches!(
            "alice".parse::<SigningInfo>(),
            Err(IdentityError::InvalidSigningInfo(_))
        ));
        assert!(matches!(
            "user:/alice".parse::<SigningInfo>(),
            Err(IdentityError::InvalidSigningInfo(_))
        ));
        assert!("id:alice".parse::<SigningInfo>().is_err());
    }
}
