//! Signature verification against DER-encoded public keys.

use crate::error::{TpmError, TpmResult};
use crate::key_params::KeyType;
use sha2::{Digest, Sha256};
use signature::Verifier;

/// Verify `signature` over `data` with a DER-encoded public key.
///
/// Returns `Ok(false)` for a well-formed key and a non-matching or malformed
/// signature, and an error only when the public key itself cannot be parsed.
pub fn verify_signature(public_key_der: &[u8], data: &[u8], signature: &[u8]) -> TpmResult<bool> {
    match KeyType::from_public_key_der(public_key_der)? {
        KeyType::Ec => {
            use p256::pkcs8::DecodePublicKey;

            let verifying_key = p256::ecdsa::VerifyingKey::from_public_key_der(public_key_der)
                .map_err(TpmError::crypto)?;
            let Ok(signature) = p256::ecdsa::Signature::from_der(signature) else {
                return Ok(false);
            };
            Ok(verifying_key.verify(data, &signature).is_ok())
        }
        KeyType::Rsa => {
            use rsa::pkcs8::DecodePublicKey;

            let public_key =
                rsa::RsaPublicKey::from_public_key_der(public_key_der).map_err(TpmError::crypto)?;
            let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public_key);
            let Ok(signature) = rsa::pkcs1v15::Signature::try_from(signature) else {
                return Ok(false);
            };
            Ok(verifying_key.verify(data, &signature).is_ok())
        }
    }
}

/// SHA-256 digest used by digest-only signatures.
pub fn digest_sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

/// Check a digest-only signature.
pub fn verify_digest_sha256(data: &[u8], digest: &[u8]) -> bool {
    digest_sha256(data) == digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_sha256_known_vector() {
        assert_eq!(
            hex::encode(digest_sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(verify_digest_sha256(b"abc", &digest_sha256(b"abc")));
        assert!(!verify_digest_sha256(b"abd", &digest_sha256(b"abc")));
    }

    #[test]
    fn test_unparseable_key_is_an_error() {
        assert!(verify_signature(&[0u8; 8], b"data", b"sig").is_err());
    }
}
