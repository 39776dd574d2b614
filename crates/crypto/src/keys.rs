//! Private key material held by the TPM implementations.
//!
//! Keys never leave this crate in usable form: callers see public key DER,
//! signatures, and (for persistence inside [`crate::TpmFile`]) zeroized
//! PKCS#8 buffers.

use crate::error::{TpmError, TpmResult};
use crate::key_params::{DigestAlgorithm, KeyParams, KeyType};
use rand::rngs::OsRng;
use sha2::Sha256;
use signature::{SignatureEncoding, Signer};
use std::fmt;
use zeroize::Zeroizing;

/// An RSA or EC P-256 private key.
pub enum PrivateKey {
    Rsa(rsa::RsaPrivateKey),
    Ec(p256::SecretKey),
}

impl PrivateKey {
    /// Generate a fresh key pair from the operating system RNG.
    pub fn generate(params: &KeyParams) -> TpmResult<Self> {
        params.validate()?;
        match *params {
            KeyParams::Rsa { size } => rsa::RsaPrivateKey::new(&mut OsRng, size as usize)
                .map(PrivateKey::Rsa)
                .map_err(TpmError::crypto),
            KeyParams::Ec { .. } => Ok(PrivateKey::Ec(p256::SecretKey::random(&mut OsRng))),
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            PrivateKey::Rsa(_) => KeyType::Rsa,
            PrivateKey::Ec(_) => KeyType::Ec,
        }
    }

    /// DER-encoded SubjectPublicKeyInfo of the matching public key.
    pub fn public_key_der(&self) -> TpmResult<Vec<u8>> {
        match self {
            PrivateKey::Rsa(key) => {
                use rsa::pkcs8::EncodePublicKey;
                key.to_public_key()
                    .to_public_key_der()
                    .map(|doc| doc.as_bytes().to_vec())
                    .map_err(TpmError::crypto)
            }
            PrivateKey::Ec(key) => {
                use p256::pkcs8::EncodePublicKey;
                key.public_key()
                    .to_public_key_der()
                    .map(|doc| doc.as_bytes().to_vec())
                    .map_err(TpmError::crypto)
            }
        }
    }

    /// PKCS#8 DER encoding of the private key; the buffer is wiped on drop.
    pub fn to_pkcs8_der(&self) -> TpmResult<Zeroizing<Vec<u8>>> {
        let der = match self {
            PrivateKey::Rsa(key) => {
                use rsa::pkcs8::EncodePrivateKey;
                key.to_pkcs8_der()
                    .map(|doc| doc.as_bytes().to_vec())
                    .map_err(TpmError::crypto)?
            }
            PrivateKey::Ec(key) => {
                use p256::pkcs8::EncodePrivateKey;
                key.to_pkcs8_der()
                    .map(|doc| doc.as_bytes().to_vec())
                    .map_err(TpmError::crypto)?
            }
        };
        Ok(Zeroizing::new(der))
    }

    /// Parse a PKCS#8 DER private key of either supported algorithm.
    pub fn from_pkcs8_der(der: &[u8]) -> TpmResult<Self> {
        use p256::pkcs8::DecodePrivateKey;
        use rsa::pkcs8::DecodePrivateKey as _;

        if let Ok(key) = p256::SecretKey::from_pkcs8_der(der) {
            return Ok(PrivateKey::Ec(key));
        }
        rsa::RsaPrivateKey::from_pkcs8_der(der)
            .map(PrivateKey::Rsa)
            .map_err(TpmError::crypto)
    }

    /// Sign `data`. RSA uses PKCS#1 v1.5; EC produces a DER-encoded ECDSA signature.
    pub fn sign(&self, data: &[u8], digest: DigestAlgorithm) -> TpmResult<Vec<u8>> {
        match digest {
            DigestAlgorithm::Sha256 => {}
        }

        match self {
            PrivateKey::Rsa(key) => {
                let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
                let signature = signing_key.try_sign(data).map_err(TpmError::crypto)?;
                Ok(signature.to_vec())
            }
            PrivateKey::Ec(key) => {
                let signing_key = p256::ecdsa::SigningKey::from(key);
                let signature: p256::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(TpmError::crypto)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}, <redacted>)", self.key_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::verify_signature;

    #[test]
    fn test_ec_sign_and_verify() {
        let key = PrivateKey::generate(&KeyParams::ec()).unwrap();
        let public = key.public_key_der().unwrap();
        let signature = key.sign(b"payload", DigestAlgorithm::Sha256).unwrap();

        assert!(verify_signature(&public, b"payload", &signature).unwrap());
        assert!(!verify_signature(&public, b"tampered", &signature).unwrap());
    }

    #[test]
    fn test_rsa_sign_and_verify() {
        let key = PrivateKey::generate(&KeyParams::Rsa { size: 1024 }).unwrap();
        assert_eq!(key.key_type(), KeyType::Rsa);

        let public = key.public_key_der().unwrap();
        assert_eq!(KeyType::from_public_key_der(&public).unwrap(), KeyType::Rsa);

        let signature = key.sign(b"payload", DigestAlgorithm::Sha256).unwrap();
        assert!(verify_signature(&public, b"payload", &signature).unwrap());
    }

    #[test]
    fn test_pkcs8_round_trip_keeps_public_key() {
        let key = PrivateKey::generate(&KeyParams::ec()).unwrap();
        let der = key.to_pkcs8_der().unwrap();
        let restored = PrivateKey::from_pkcs8_der(&der).unwrap();

        assert_eq!(restored.key_type(), KeyType::Ec);
        assert_eq!(restored.public_key_der().unwrap(), key.public_key_der().unwrap());
    }

    #[test]
    fn test_debug_redacts_material() {
        let key = PrivateKey::generate(&KeyParams::ec()).unwrap();
        assert_eq!(format!("{:?}", key), "PrivateKey(EC, <redacted>)");
    }
}
