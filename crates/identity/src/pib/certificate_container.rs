use super::{check_certificate_parent, lock, PibImpl};
use crate::certificate::Certificate;
use crate::error::PibResult;
use ndnsec_core::Name;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// Certificates of one key.
///
/// Holds the certificate names reported by the backend and lazily caches
/// certificates as they are read. Cached certificates are shared as
/// `Arc<Certificate>` and never mutated.
pub struct CertificateContainer {
    key_name: Name,
    names: Mutex<BTreeSet<Name>>,
    cache: Mutex<HashMap<Name, Arc<Certificate>>>,
    pib: Arc<dyn PibImpl>,
}

impl CertificateContainer {
    pub(crate) fn new(key_name: Name, pib: Arc<dyn PibImpl>) -> PibResult<Self> {
        let names = pib.get_certificates_of_key(&key_name)?;
        Ok(Self {
            key_name,
            names: Mutex::new(names),
            cache: Mutex::new(HashMap::new()),
            pib,
        })
    }

    pub fn key_name(&self) -> &Name {
        &self.key_name
    }

    pub fn names(&self) -> PibResult<BTreeSet<Name>> {
        Ok(lock(&self.names, "certificate names")?.clone())
    }

    pub fn len(&self) -> PibResult<usize> {
        Ok(lock(&self.names, "certificate names")?.len())
    }

    pub fn is_empty(&self) -> PibResult<bool> {
        Ok(self.len()? == 0)
    }

    pub(crate) fn add(&self, certificate: &Certificate) -> PibResult<Arc<Certificate>> {
        check_certificate_parent(&self.key_name, certificate.name())?;
        self.pib.add_certificate(certificate)?;

        let certificate = Arc::new(certificate.clone());
        lock(&self.names, "certificate names")?.insert(certificate.name().clone());
        lock(&self.cache, "certificate cache")?
            .insert(certificate.name().clone(), Arc::clone(&certificate));
        Ok(certificate)
    }

    pub(crate) fn remove(&self, cert_name: &Name) -> PibResult<()> {
        check_certificate_parent(&self.key_name, cert_name)?;
        self.pib.remove_certificate(cert_name)?;

        lock(&self.names, "certificate names")?.remove(cert_name);
        lock(&self.cache, "certificate cache")?.remove(cert_name);
        Ok(())
    }

    pub fn get(&self, cert_name: &Name) -> PibResult<Arc<Certificate>> {
        check_certificate_parent(&self.key_name, cert_name)?;
        if let Some(cached) = lock(&self.cache, "certificate cache")?.get(cert_name) {
            return Ok(Arc::clone(cached));
        }

        let certificate = Arc::new(self.pib.get_certificate(cert_name)?);
        lock(&self.cache, "certificate cache")?
            .insert(cert_name.clone(), Arc::clone(&certificate));
        Ok(certificate)
    }

    /// Compare the cached name set with a full backend scan.
    #[doc(hidden)]
    pub fn is_consistent(&self) -> PibResult<bool> {
        let stored = self.pib.get_certificates_of_key(&self.key_name)?;
        Ok(*lock(&self.names, "certificate names")? == stored)
    }
}

impl std::fmt::Debug for CertificateContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateContainer")
            .field("key_name", &self.key_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pib::conformance::make_certificate;
    use crate::pib::PibMemory;

    fn setup() -> (Arc<dyn PibImpl>, Name) {
        let pib: Arc<dyn PibImpl> = Arc::new(PibMemory::new());
        let key = Name::from_uri("/alice/KSK-1").unwrap();
        pib.add_key(&Name::from_uri("/alice").unwrap(), &key, b"bits")
            .unwrap();
        (pib, key)
    }

    #[test]
    fn test_add_get_remove() {
        let (pib, key) = setup();
        let container = CertificateContainer::new(key.clone(), Arc::clone(&pib)).unwrap();
        assert!(container.is_empty().unwrap());

        let cert = make_certificate(&key, 1, b"bits");
        container.add(&cert).unwrap();
        assert_eq!(container.len().unwrap(), 1);
        assert_eq!(*container.get(cert.name()).unwrap(), cert);
        assert!(pib.has_certificate(cert.name()).unwrap());
        assert!(container.is_consistent().unwrap());

        container.remove(cert.name()).unwrap();
        assert!(container.is_empty().unwrap());
        assert!(container.get(cert.name()).unwrap_err().is_not_found());
        assert!(container.is_consistent().unwrap());
    }

    #[test]
    fn test_loads_existing_names() {
        let (pib, key) = setup();
        pib.add_certificate(&make_certificate(&key, 1, b"bits")).unwrap();
        pib.add_certificate(&make_certificate(&key, 2, b"bits")).unwrap();

        let container = CertificateContainer::new(key, pib).unwrap();
        assert_eq!(container.len().unwrap(), 2);
        assert!(container.is_consistent().unwrap());
    }

    #[test]
    fn test_foreign_certificate_rejected() {
        let (pib, key) = setup();
        let container = CertificateContainer::new(key, Arc::clone(&pib)).unwrap();
        let other = make_certificate(&Name::from_uri("/bob/KSK-1").unwrap(), 1, b"bits");

        assert!(container.add(&other).unwrap_err().is_invalid_argument());
        assert!(!pib.has_identity(&Name::from_uri("/bob").unwrap()).unwrap());
    }
}
