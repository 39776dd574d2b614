//! In-memory PIB (`pib-memory:`).

use super::{check_certificate_parent, check_key_parent, PibImpl};
use crate::certificate::Certificate;
use crate::error::{EntityKind, PibError, PibResult};
use crate::naming::{extract_identity_from_key_name, extract_key_name_from_cert_name};
use ndnsec_core::config::PIB_MEMORY_SCHEME;
use ndnsec_core::Name;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryState {
    tpm_locator: String,

    identities: BTreeSet<Name>,
    default_identity: Option<Name>,

    /// key name -> key bits
    keys: BTreeMap<Name, Vec<u8>>,
    /// identity -> default key name
    default_keys: BTreeMap<Name, Name>,

    certificates: BTreeMap<Name, Certificate>,
    /// key name -> default certificate name
    default_certificates: BTreeMap<Name, Name>,
}

impl MemoryState {
    fn add_identity(&mut self, identity: &Name) {
        self.identities.insert(identity.clone());
        if self.default_identity.is_none() {
            self.default_identity = Some(identity.clone());
        }
    }

    fn add_key(&mut self, identity: &Name, key_name: &Name, key_bits: &[u8]) {
        self.add_identity(identity);
        self.keys.insert(key_name.clone(), key_bits.to_vec());
        self.default_keys
            .entry(identity.clone())
            .or_insert_with(|| key_name.clone());
    }

    fn remove_key(&mut self, key_name: &Name) {
        let certificates: Vec<Name> = self
            .certificates
            .keys()
            .filter(|name| extract_key_name_from_cert_name(name).ok().as_ref() == Some(key_name))
            .cloned()
            .collect();
        for cert_name in certificates {
            self.certificates.remove(&cert_name);
        }
        self.default_certificates.remove(key_name);

        self.keys.remove(key_name);
        let identity = extract_identity_from_key_name(key_name);
        if self.default_keys.get(&identity) == Some(key_name) {
            self.default_keys.remove(&identity);
        }
    }
}

/// PIB kept entirely in process memory.
#[derive(Debug, Default)]
pub struct PibMemory {
    state: RwLock<MemoryState>,
}

impl PibMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> PibResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|e| PibError::Storage(format!("PIB lock poisoned: {}", e)))
    }

    fn write(&self) -> PibResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|e| PibError::Storage(format!("PIB lock poisoned: {}", e)))
    }
}

impl PibImpl for PibMemory {
    fn locator(&self) -> String {
        format!("{}:", PIB_MEMORY_SCHEME)
    }

    fn set_tpm_locator(&self, tpm_locator: &str) -> PibResult<()> {
        self.write()?.tpm_locator = tpm_locator.to_string();
        Ok(())
    }

    fn get_tpm_locator(&self) -> PibResult<String> {
        Ok(self.read()?.tpm_locator.clone())
    }

    fn has_identity(&self, identity: &Name) -> PibResult<bool> {
        Ok(self.read()?.identities.contains(identity))
    }

    fn add_identity(&self, identity: &Name) -> PibResult<()> {
        self.write()?.add_identity(identity);
        debug!(identity = %identity, "Added identity");
        Ok(())
    }

    fn remove_identity(&self, identity: &Name) -> PibResult<()> {
        let mut state = self.write()?;
        let keys: Vec<Name> = state
            .keys
            .keys()
            .filter(|key| extract_identity_from_key_name(key) == *identity)
            .cloned()
            .collect();
        for key_name in &keys {
            state.remove_key(key_name);
        }
        state.default_keys.remove(identity);

        state.identities.remove(identity);
        if state.default_identity.as_ref() == Some(identity) {
            state.default_identity = None;
        }
        debug!(identity = %identity, keys = keys.len(), "Removed identity");
        Ok(())
    }

    fn clear_identities(&self) -> PibResult<()> {
        let mut state = self.write()?;
        state.certificates.clear();
        state.default_certificates.clear();
        state.keys.clear();
        state.default_keys.clear();
        state.identities.clear();
        state.default_identity = None;
        debug!("Cleared all identities");
        Ok(())
    }

    fn get_identities(&self) -> PibResult<BTreeSet<Name>> {
        Ok(self.read()?.identities.clone())
    }

    fn set_default_identity(&self, identity: &Name) -> PibResult<()> {
        let mut state = self.write()?;
        state.identities.insert(identity.clone());
        state.default_identity = Some(identity.clone());
        debug!(identity = %identity, "Set default identity");
        Ok(())
    }

    fn get_default_identity(&self) -> PibResult<Name> {
        self.read()?
            .default_identity
            .clone()
            .ok_or_else(|| PibError::not_found(EntityKind::DefaultIdentity, &Name::new()))
    }

    fn has_key(&self, key_name: &Name) -> PibResult<bool> {
        Ok(self.read()?.keys.contains_key(key_name))
    }

    fn add_key(&self, identity: &Name, key_name: &Name, key_bits: &[u8]) -> PibResult<()> {
        check_key_parent(identity, key_name)?;
        self.write()?.add_key(identity, key_name, key_bits);
        debug!(identity = %identity, key = %key_name, "Added key");
        Ok(())
    }

    fn remove_key(&self, key_name: &Name) -> PibResult<()> {
        self.write()?.remove_key(key_name);
        debug!(key = %key_name, "Removed key");
        Ok(())
    }

    fn get_key_bits(&self, key_name: &Name) -> PibResult<Vec<u8>> {
        self.read()?
            .keys
            .get(key_name)
            .cloned()
            .ok_or_else(|| PibError::not_found(EntityKind::Key, key_name))
    }

    fn get_keys_of_identity(&self, identity: &Name) -> PibResult<BTreeSet<Name>> {
        Ok(self
            .read()?
            .keys
            .keys()
            .filter(|key| extract_identity_from_key_name(key) == *identity)
            .cloned()
            .collect())
    }

    fn set_default_key_of_identity(&self, identity: &Name, key_name: &Name) -> PibResult<()> {
        check_key_parent(identity, key_name)?;
        let mut state = self.write()?;
        if !state.keys.contains_key(key_name) {
            return Err(PibError::not_found(EntityKind::Key, key_name));
        }
        state.default_keys.insert(identity.clone(), key_name.clone());
        debug!(identity = %identity, key = %key_name, "Set default key");
        Ok(())
    }

    fn get_default_key_of_identity(&self, identity: &Name) -> PibResult<Name> {
        let state = self.read()?;
        if !state.identities.contains(identity) {
            return Err(PibError::not_found(EntityKind::Identity, identity));
        }
        state
            .default_keys
            .get(identity)
            .cloned()
            .ok_or_else(|| PibError::not_found(EntityKind::DefaultKey, identity))
    }

    fn has_certificate(&self, cert_name: &Name) -> PibResult<bool> {
        Ok(self.read()?.certificates.contains_key(cert_name))
    }

    fn add_certificate(&self, certificate: &Certificate) -> PibResult<()> {
        let key_name = certificate.key_name()?;
        let identity = extract_identity_from_key_name(&key_name);

        let mut state = self.write()?;
        state.add_key(&identity, &key_name, certificate.public_key());
        state
            .certificates
            .insert(certificate.name().clone(), certificate.clone());
        state
            .default_certificates
            .entry(key_name.clone())
            .or_insert_with(|| certificate.name().clone());
        debug!(key = %key_name, certificate = %certificate.name(), "Added certificate");
        Ok(())
    }

    fn remove_certificate(&self, cert_name: &Name) -> PibResult<()> {
        let mut state = self.write()?;
        state.certificates.remove(cert_name);
        if let Ok(key_name) = extract_key_name_from_cert_name(cert_name) {
            if state.default_certificates.get(&key_name) == Some(cert_name) {
                state.default_certificates.remove(&key_name);
            }
        }
        debug!(certificate = %cert_name, "Removed certificate");
        Ok(())
    }

    fn get_certificate(&self, cert_name: &Name) -> PibResult<Certificate> {
        self.read()?
            .certificates
            .get(cert_name)
            .cloned()
            .ok_or_else(|| PibError::not_found(EntityKind::Certificate, cert_name))
    }

    fn get_certificates_of_key(&self, key_name: &Name) -> PibResult<BTreeSet<Name>> {
        Ok(self
            .read()?
            .certificates
            .keys()
            .filter(|name| extract_key_name_from_cert_name(name).ok().as_ref() == Some(key_name))
            .cloned()
            .collect())
    }

    fn set_default_certificate_of_key(
        &self,
        key_name: &Name,
        cert_name: &Name,
    ) -> PibResult<()> {
        check_certificate_parent(key_name, cert_name)?;
        let mut state = self.write()?;
        if !state.certificates.contains_key(cert_name) {
            return Err(PibError::not_found(EntityKind::Certificate, cert_name));
        }
        state
            .default_certificates
            .insert(key_name.clone(), cert_name.clone());
        debug!(key = %key_name, certificate = %cert_name, "Set default certificate");
        Ok(())
    }

    fn get_default_certificate_of_key(&self, key_name: &Name) -> PibResult<Certificate> {
        let state = self.read()?;
        if !state.keys.contains_key(key_name) {
            return Err(PibError::not_found(EntityKind::Key, key_name));
        }
        state
            .default_certificates
            .get(key_name)
            .and_then(|cert_name| state.certificates.get(cert_name))
            .cloned()
            .ok_or_else(|| PibError::not_found(EntityKind::DefaultCertificate, key_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pib::conformance;

    #[test]
    fn test_memory_conformance() {
        conformance::run_all(&PibMemory::new());
    }

    #[test]
    fn test_tpm_locator_defaults_to_empty() {
        let pib = PibMemory::new();
        assert_eq!(pib.get_tpm_locator().unwrap(), "");
        pib.set_tpm_locator("tpm-memory:").unwrap();
        assert_eq!(pib.get_tpm_locator().unwrap(), "tpm-memory:");
    }
}
