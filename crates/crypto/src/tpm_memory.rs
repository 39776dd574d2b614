//! Process-local TPM, used for ephemeral key chains and tests.

use crate::error::{TpmError, TpmResult};
use crate::key_params::{DigestAlgorithm, KeyParams, KeyType};
use crate::keys::PrivateKey;
use crate::tpm::Tpm;
use ndnsec_core::config::TPM_MEMORY_SCHEME;
use ndnsec_core::Name;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Default)]
pub struct TpmMemory {
    keys: RwLock<HashMap<Name, PrivateKey>>,
}

impl TpmMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> TpmResult<RwLockReadGuard<'_, HashMap<Name, PrivateKey>>> {
        self.keys.read().map_err(|e| TpmError::Unavailable {
            reason: format!("key table lock poisoned: {}", e),
        })
    }

    fn write(&self) -> TpmResult<RwLockWriteGuard<'_, HashMap<Name, PrivateKey>>> {
        self.keys.write().map_err(|e| TpmError::Unavailable {
            reason: format!("key table lock poisoned: {}", e),
        })
    }

    fn with_key<T>(&self, key_name: &Name, f: impl FnOnce(&PrivateKey) -> TpmResult<T>) -> TpmResult<T> {
        let keys = self.read()?;
        let key = keys.get(key_name).ok_or_else(|| TpmError::KeyNotFound {
            key_name: key_name.to_uri(),
        })?;
        f(key)
    }
}

impl Tpm for TpmMemory {
    fn locator(&self) -> String {
        format!("{}:", TPM_MEMORY_SCHEME)
    }

    fn has_key(&self, key_name: &Name) -> TpmResult<bool> {
        Ok(self.read()?.contains_key(key_name))
    }

    fn generate_key_pair(&self, key_name: &Name, params: &KeyParams) -> TpmResult<Vec<u8>> {
        let mut keys = self.write()?;
        if keys.contains_key(key_name) {
            return Err(TpmError::KeyExists {
                key_name: key_name.to_uri(),
            });
        }

        let key = PrivateKey::generate(params)?;
        let public_key = key.public_key_der()?;
        keys.insert(key_name.clone(), key);

        debug!(key = %key_name, key_type = %params.key_type(), "Generated key pair in memory TPM");
        Ok(public_key)
    }

    fn delete_key_pair(&self, key_name: &Name) -> TpmResult<()> {
        if self.write()?.remove(key_name).is_some() {
            debug!(key = %key_name, "Deleted key pair from memory TPM");
        }
        Ok(())
    }

    fn get_public_key(&self, key_name: &Name) -> TpmResult<Vec<u8>> {
        self.with_key(key_name, |key| key.public_key_der())
    }

    fn get_key_type(&self, key_name: &Name) -> TpmResult<KeyType> {
        self.with_key(key_name, |key| Ok(key.key_type()))
    }

    fn sign(&self, data: &[u8], key_name: &Name, digest: DigestAlgorithm) -> TpmResult<Vec<u8>> {
        self.with_key(key_name, |key| key.sign(data, digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::verify_signature;

    fn key_name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn test_generate_sign_delete() {
        let tpm = TpmMemory::new();
        let name = key_name("/alice/KSK-1");

        assert!(!tpm.has_key(&name).unwrap());
        let public = tpm.generate_key_pair(&name, &KeyParams::ec()).unwrap();
        assert!(tpm.has_key(&name).unwrap());
        assert_eq!(tpm.get_public_key(&name).unwrap(), public);
        assert_eq!(tpm.get_key_type(&name).unwrap(), KeyType::Ec);

        let signature = tpm.sign(b"data", &name, DigestAlgorithm::Sha256).unwrap();
        assert!(verify_signature(&public, b"data", &signature).unwrap());

        tpm.delete_key_pair(&name).unwrap();
        assert!(!tpm.has_key(&name).unwrap());
        tpm.delete_key_pair(&name).unwrap();
    }

    #[test]
    fn test_duplicate_generation_rejected() {
        let tpm = TpmMemory::new();
        let name = key_name("/alice/KSK-1");
        tpm.generate_key_pair(&name, &KeyParams::ec()).unwrap();

        assert!(matches!(
            tpm.generate_key_pair(&name, &KeyParams::ec()),
            Err(TpmError::KeyExists { .. })
        ));
    }

    #[test]
    fn test_sign_with_missing_key() {
        let tpm = TpmMemory::new();
        assert!(matches!(
            tpm.sign(b"data", &key_name("/nobody/KSK-1"), DigestAlgorithm::Sha256),
            Err(TpmError::KeyNotFound { .. })
        ));
    }
}
