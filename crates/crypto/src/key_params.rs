//! Key algorithms and generation parameters.

use crate::error::{TpmError, TpmResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default RSA modulus size in bits.
pub const DEFAULT_RSA_KEY_SIZE: u32 = 2048;
/// Default (and only supported) EC key size: NIST P-256.
pub const DEFAULT_EC_KEY_SIZE: u32 = 256;
/// Smallest RSA modulus accepted for new keys.
pub const MIN_RSA_KEY_SIZE: u32 = 1024;

/// Asymmetric key algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Rsa,
    Ec,
}

impl KeyType {
    /// Detect the algorithm of a DER-encoded SubjectPublicKeyInfo.
    pub fn from_public_key_der(der: &[u8]) -> TpmResult<Self> {
        use p256::pkcs8::DecodePublicKey;
        use rsa::pkcs8::DecodePublicKey as _;

        if p256::PublicKey::from_public_key_der(der).is_ok() {
            return Ok(KeyType::Ec);
        }
        if rsa::RsaPublicKey::from_public_key_der(der).is_ok() {
            return Ok(KeyType::Rsa);
        }
        Err(TpmError::crypto("public key is neither RSA nor EC P-256"))
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Rsa => f.write_str("RSA"),
            KeyType::Ec => f.write_str("EC"),
        }
    }
}

/// Parameters for generating a new key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyParams {
    Rsa { size: u32 },
    Ec { size: u32 },
}

impl KeyParams {
    pub fn rsa() -> Self {
        KeyParams::Rsa {
            size: DEFAULT_RSA_KEY_SIZE,
        }
    }

    pub fn ec() -> Self {
        KeyParams::Ec {
            size: DEFAULT_EC_KEY_SIZE,
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeyParams::Rsa { .. } => KeyType::Rsa,
            KeyParams::Ec { .. } => KeyType::Ec,
        }
    }

    /// Build parameters from configuration values (`"rsa"` / `"ec"` and a size).
    pub fn from_config(algorithm: &str, size: u32) -> TpmResult<Self> {
        let params = match algorithm.to_ascii_lowercase().as_str() {
            "rsa" => KeyParams::Rsa { size },
            "ec" | "ecdsa" => KeyParams::Ec { size },
            other => {
                return Err(TpmError::UnsupportedKeyParams {
                    reason: format!("unknown key algorithm '{}'", other),
                })
            }
        };
        params.validate()?;
        Ok(params)
    }

    /// Reject sizes the key generators cannot produce.
    pub fn validate(&self) -> TpmResult<()> {
        match *self {
            KeyParams::Rsa { size } if size < MIN_RSA_KEY_SIZE => Err(TpmError::UnsupportedKeyParams {
                reason: format!("RSA key size {} is below {}", size, MIN_RSA_KEY_SIZE),
            }),
            KeyParams::Ec { size } if size != DEFAULT_EC_KEY_SIZE => Err(TpmError::UnsupportedKeyParams {
                reason: format!("EC key size {} is not supported (only P-256)", size),
            }),
            _ => Ok(()),
        }
    }
}

impl Default for KeyParams {
    fn default() -> Self {
        KeyParams::rsa()
    }
}

/// Digest algorithm used for signing. Only SHA-256 is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        assert_eq!(KeyParams::from_config("EC", 256).unwrap(), KeyParams::ec());
        assert_eq!(
            KeyParams::from_config("rsa", 4096).unwrap(),
            KeyParams::Rsa { size: 4096 }
        );
        assert!(KeyParams::from_config("dsa", 1024).is_err());
        assert!(KeyParams::from_config("ec", 384).is_err());
        assert!(KeyParams::from_config("rsa", 512).is_err());
    }

    #[test]
    fn test_key_type_rejects_garbage() {
        assert!(KeyType::from_public_key_der(&[1, 2, 3]).is_err());
    }
}
