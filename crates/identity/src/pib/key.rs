use super::{check_certificate_parent, lock, CertificateContainer, PibImpl};
use crate::certificate::Certificate;
use crate::error::{EntityKind, PibError, PibResult};
use crate::naming::extract_identity_from_key_name;
use ndnsec_core::Name;
use std::sync::{Arc, Mutex};
use tracing::info;

/// A public key of an identity, with its certificates.
pub struct Key {
    name: Name,
    identity: Name,
    default_certificate: Mutex<Option<Arc<Certificate>>>,
    certificates: CertificateContainer,
    pib: Arc<dyn PibImpl>,
}

impl Key {
    /// Handle over a key that exists in the backend.
    pub(crate) fn load(key_name: Name, pib: Arc<dyn PibImpl>) -> PibResult<Self> {
        if !pib.has_key(&key_name)? {
            return Err(PibError::not_found(EntityKind::Key, &key_name));
        }
        let certificates = CertificateContainer::new(key_name.clone(), Arc::clone(&pib))?;
        Ok(Self {
            identity: extract_identity_from_key_name(&key_name),
            name: key_name,
            default_certificate: Mutex::new(None),
            certificates,
            pib,
        })
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn identity(&self) -> &Name {
        &self.identity
    }

    /// DER-encoded public key, read from the backend.
    pub fn public_key(&self) -> PibResult<Vec<u8>> {
        self.pib.get_key_bits(&self.name)
    }

    pub fn certificates(&self) -> &CertificateContainer {
        &self.certificates
    }

    pub fn get_certificate(&self, cert_name: &Name) -> PibResult<Arc<Certificate>> {
        self.certificates.get(cert_name)
    }

    pub(crate) fn add_certificate(&self, certificate: &Certificate) -> PibResult<Arc<Certificate>> {
        check_certificate_parent(&self.name, certificate.name())?;
        if certificate.public_key() != self.public_key()?.as_slice() {
            return Err(PibError::InvalidArgument(format!(
                "certificate {} does not match the public key of {}",
                certificate.name(),
                self.name
            )));
        }
        let certificate = self.certificates.add(certificate)?;

        // A replaced default certificate must not keep serving its stale copy.
        let mut default = lock(&self.default_certificate, "default certificate")?;
        if default.as_ref().map(|cert| cert.name()) == Some(certificate.name()) {
            *default = Some(Arc::clone(&certificate));
        }
        Ok(certificate)
    }

    pub(crate) fn remove_certificate(&self, cert_name: &Name) -> PibResult<()> {
        check_certificate_parent(&self.name, cert_name)?;
        {
            let mut default = lock(&self.default_certificate, "default certificate")?;
            if default.as_ref().map(|cert| cert.name()) == Some(cert_name) {
                *default = None;
            }
        }
        self.certificates.remove(cert_name)
    }

    pub(crate) fn set_default_certificate(&self, cert_name: &Name) -> PibResult<Arc<Certificate>> {
        check_certificate_parent(&self.name, cert_name)?;
        let certificate = self.certificates.get(cert_name)?;
        self.pib.set_default_certificate_of_key(&self.name, cert_name)?;

        *lock(&self.default_certificate, "default certificate")? = Some(Arc::clone(&certificate));
        info!(key = %self.name, certificate = %cert_name, "Default certificate changed");
        Ok(certificate)
    }

    /// Add `certificate` and make it this key's default.
    pub(crate) fn set_default_certificate_from(
        &self,
        certificate: &Certificate,
    ) -> PibResult<Arc<Certificate>> {
        self.add_certificate(certificate)?;
        self.set_default_certificate(certificate.name())
    }

    pub fn get_default_certificate(&self) -> PibResult<Arc<Certificate>> {
        let mut default = lock(&self.default_certificate, "default certificate")?;
        if let Some(cached) = default.as_ref() {
            return Ok(Arc::clone(cached));
        }

        let certificate = Arc::new(self.pib.get_default_certificate_of_key(&self.name)?);
        *default = Some(Arc::clone(&certificate));
        Ok(certificate)
    }

    #[doc(hidden)]
    pub fn is_consistent(&self) -> PibResult<bool> {
        self.certificates.is_consistent()
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.name)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pib::conformance::make_certificate;
    use crate::pib::PibMemory;

    fn setup() -> (Arc<dyn PibImpl>, Key) {
        let pib: Arc<dyn PibImpl> = Arc::new(PibMemory::new());
        let key_name = Name::from_uri("/alice/KSK-1").unwrap();
        pib.add_key(&Name::from_uri("/alice").unwrap(), &key_name, b"bits")
            .unwrap();
        let key = Key::load(key_name, Arc::clone(&pib)).unwrap();
        (pib, key)
    }

    #[test]
    fn test_load_missing_key() {
        let pib: Arc<dyn PibImpl> = Arc::new(PibMemory::new());
        assert!(Key::load(Name::from_uri("/alice/KSK-1").unwrap(), pib)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_default_certificate_by_vacancy_then_explicit() {
        let (_pib, key) = setup();
        assert!(key.get_default_certificate().unwrap_err().is_not_found());

        let c1 = make_certificate(key.name(), 1, b"bits");
        let c2 = make_certificate(key.name(), 2, b"bits");
        key.add_certificate(&c1).unwrap();
        key.add_certificate(&c2).unwrap();
        assert_eq!(*key.get_default_certificate().unwrap(), c1);

        key.set_default_certificate(c2.name()).unwrap();
        assert_eq!(*key.get_default_certificate().unwrap(), c2);

        key.remove_certificate(c2.name()).unwrap();
        assert!(key.get_default_certificate().unwrap_err().is_not_found());
        assert!(key.is_consistent().unwrap());
    }

    #[test]
    fn test_mismatched_public_key_rejected() {
        let (pib, key) = setup();
        let cert = make_certificate(key.name(), 1, b"other bits");
        assert!(key.add_certificate(&cert).unwrap_err().is_invalid_argument());
        assert!(!pib.has_certificate(cert.name()).unwrap());
    }

    #[test]
    fn test_overwritten_default_certificate_is_refreshed() {
        let (pib, key) = setup();
        let original = make_certificate(key.name(), 1, b"bits");
        key.add_certificate(&original).unwrap();
        assert_eq!(*key.get_default_certificate().unwrap(), original);

        let mut replacement = original.clone();
        replacement.signature_value = vec![0xAB; 4];
        key.add_certificate(&replacement).unwrap();

        let stored = pib.get_certificate(original.name()).unwrap();
        assert_eq!(stored, replacement);
        assert_eq!(*key.get_certificate(original.name()).unwrap(), stored);
        assert_eq!(*key.get_default_certificate().unwrap(), stored);
    }

    #[test]
    fn test_public_key_reads_through_backend() {
        let (pib, key) = setup();
        assert_eq!(key.public_key().unwrap(), b"bits");

        pib.add_key(&Name::from_uri("/alice").unwrap(), key.name(), b"rotated")
            .unwrap();
        assert_eq!(key.public_key().unwrap(), b"rotated");
    }

    #[test]
    fn test_returned_certificate_is_shared_not_copied() {
        let (_pib, key) = setup();
        let cert = make_certificate(key.name(), 1, b"bits");
        key.add_certificate(&cert).unwrap();

        let first = key.get_certificate(cert.name()).unwrap();
        let second = key.get_certificate(cert.name()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
