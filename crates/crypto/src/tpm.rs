//! The private-key store ("TPM") capability.
//!
//! A TPM holds private keys indexed by key name and exposes only key
//! generation, existence checks, public-key export and signing. Private key
//! bytes are never returned.

use crate::error::{TpmError, TpmResult};
use crate::key_params::{DigestAlgorithm, KeyParams, KeyType};
use crate::tpm_file::TpmFile;
use crate::tpm_memory::TpmMemory;
use ndnsec_core::config::{
    default_ndn_dir, Locator, TPM_FILE_SCHEME, TPM_MEMORY_SCHEME, TPM_OSX_KEYCHAIN_SCHEME,
};
use ndnsec_core::Name;
use std::sync::Arc;
use tracing::info;

/// Private-key store paired with a PIB.
pub trait Tpm: Send + Sync {
    /// Canonical locator of this store, recorded in the paired PIB.
    fn locator(&self) -> String;

    fn has_key(&self, key_name: &Name) -> TpmResult<bool>;

    /// Generate and store a key pair, returning the public key as DER.
    ///
    /// Fails with [`TpmError::KeyExists`] if `key_name` is already in use.
    fn generate_key_pair(&self, key_name: &Name, params: &KeyParams) -> TpmResult<Vec<u8>>;

    /// Delete a key pair. Deleting an unknown key is a no-op.
    fn delete_key_pair(&self, key_name: &Name) -> TpmResult<()>;

    fn get_public_key(&self, key_name: &Name) -> TpmResult<Vec<u8>>;

    fn get_key_type(&self, key_name: &Name) -> TpmResult<KeyType>;

    /// Sign `data` with the private key stored under `key_name`.
    fn sign(&self, data: &[u8], key_name: &Name, digest: DigestAlgorithm) -> TpmResult<Vec<u8>>;
}

/// Open the TPM named by `locator`.
pub fn open_tpm(locator: &Locator) -> TpmResult<Arc<dyn Tpm>> {
    match locator.scheme.as_str() {
        TPM_FILE_SCHEME | "" => {
            let dir = locator.directory_or(default_ndn_dir().join("ndnsec-key-file"));
            info!(path = %dir.display(), "Opening file TPM");
            Ok(Arc::new(TpmFile::open_with_locator(dir, &locator.location)?))
        }
        TPM_MEMORY_SCHEME => Ok(Arc::new(TpmMemory::new())),
        TPM_OSX_KEYCHAIN_SCHEME => Err(TpmError::UnsupportedLocator {
            locator: format!("{} (platform keychain is not available)", locator.canonical()),
        }),
        _ => Err(TpmError::UnsupportedLocator {
            locator: locator.canonical(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory_tpm() {
        let tpm = open_tpm(&Locator::parse("tpm-memory:")).unwrap();
        assert_eq!(tpm.locator(), "tpm-memory:");
    }

    #[test]
    fn test_osx_keychain_rejected() {
        assert!(matches!(
            open_tpm(&Locator::parse("tpm-osxkeychain:")),
            Err(TpmError::UnsupportedLocator { .. })
        ));
        assert!(open_tpm(&Locator::parse("tpm-hsm:")).is_err());
    }
}
