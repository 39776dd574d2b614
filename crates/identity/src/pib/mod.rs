//! Public Information Base: identities, their public keys, and the
//! certificates issued over those keys.
//!
//! [`PibImpl`] is the storage contract. Three backends implement it with the
//! same observable behaviour:
//!
//! - [`PibMemory`] keeps everything in process memory
//! - [`PibSqlite3`] persists to `pib.db` in a directory (`pib-sqlite3:`)
//! - [`PibPlatformSqlite`] runs the same schema and queries through
//!   positional raw-buffer binding, for hosts that hand over a database file
//!
//! [`Pib`] is the caching front end handed to applications.

mod certificate_container;
#[cfg(any(test, feature = "testutil"))]
pub mod conformance;
mod facade;
mod identity;
mod key;
mod memory;
#[cfg(feature = "sqlite")]
mod platform;
#[cfg(feature = "sqlite")]
mod sql;
#[cfg(feature = "sqlite")]
mod sqlite3;

pub use certificate_container::CertificateContainer;
pub use facade::Pib;
pub use identity::Identity;
pub use key::Key;
pub use memory::PibMemory;
#[cfg(feature = "sqlite")]
pub use platform::PibPlatformSqlite;
#[cfg(feature = "sqlite")]
pub use sqlite3::PibSqlite3;

use crate::certificate::Certificate;
use crate::error::{PibError, PibResult};
#[cfg(feature = "sqlite")]
use ndnsec_core::config::{default_ndn_dir, PIB_SQLITE3_SCHEME};
use ndnsec_core::config::{Locator, PIB_MEMORY_SCHEME};
use ndnsec_core::Name;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
#[cfg(feature = "sqlite")]
use tracing::info;

/// Storage contract shared by every PIB backend.
///
/// Adding an entity creates its missing ancestors, and the first entity in a
/// scope becomes that scope's default. Removing an entity removes its
/// descendants. Lookups of unknown entities fail with
/// [`PibError::NotFound`]; enumerations of unknown parents return empty sets.
pub trait PibImpl: Send + Sync {
    /// Canonical locator of this PIB.
    fn locator(&self) -> String;

    fn set_tpm_locator(&self, tpm_locator: &str) -> PibResult<()>;

    /// Locator of the paired TPM, or an empty string if none is recorded.
    fn get_tpm_locator(&self) -> PibResult<String>;

    fn has_identity(&self, identity: &Name) -> PibResult<bool>;

    fn add_identity(&self, identity: &Name) -> PibResult<()>;

    fn remove_identity(&self, identity: &Name) -> PibResult<()>;

    fn clear_identities(&self) -> PibResult<()>;

    fn get_identities(&self) -> PibResult<BTreeSet<Name>>;

    /// Make `identity` the default, creating it if needed.
    fn set_default_identity(&self, identity: &Name) -> PibResult<()>;

    fn get_default_identity(&self) -> PibResult<Name>;

    fn has_key(&self, key_name: &Name) -> PibResult<bool>;

    /// Insert or overwrite a key of `identity`.
    fn add_key(&self, identity: &Name, key_name: &Name, key_bits: &[u8]) -> PibResult<()>;

    fn remove_key(&self, key_name: &Name) -> PibResult<()>;

    fn get_key_bits(&self, key_name: &Name) -> PibResult<Vec<u8>>;

    fn get_keys_of_identity(&self, identity: &Name) -> PibResult<BTreeSet<Name>>;

    fn set_default_key_of_identity(&self, identity: &Name, key_name: &Name) -> PibResult<()>;

    fn get_default_key_of_identity(&self, identity: &Name) -> PibResult<Name>;

    fn has_certificate(&self, cert_name: &Name) -> PibResult<bool>;

    /// Insert or overwrite a certificate. The owning key is created, or its
    /// bits replaced, from the certificate's public key.
    fn add_certificate(&self, certificate: &Certificate) -> PibResult<()>;

    fn remove_certificate(&self, cert_name: &Name) -> PibResult<()>;

    fn get_certificate(&self, cert_name: &Name) -> PibResult<Certificate>;

    fn get_certificates_of_key(&self, key_name: &Name) -> PibResult<BTreeSet<Name>>;

    fn set_default_certificate_of_key(&self, key_name: &Name, cert_name: &Name)
        -> PibResult<()>;

    fn get_default_certificate_of_key(&self, key_name: &Name) -> PibResult<Certificate>;
}

/// Lock a front-end cache, reporting poisoning as a storage failure.
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> PibResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|e| PibError::Storage(format!("{} lock poisoned: {}", what, e)))
}

/// Reject a key that does not belong to `identity`.
pub(crate) fn check_key_parent(identity: &Name, key_name: &Name) -> PibResult<()> {
    if key_name.is_empty() || crate::naming::extract_identity_from_key_name(key_name) != *identity {
        return Err(PibError::InvalidArgument(format!(
            "key {} does not belong to identity {}",
            key_name, identity
        )));
    }
    Ok(())
}

/// Reject a certificate that does not belong to `key_name`.
pub(crate) fn check_certificate_parent(key_name: &Name, cert_name: &Name) -> PibResult<()> {
    if crate::naming::extract_key_name_from_cert_name(cert_name)? != *key_name {
        return Err(PibError::InvalidArgument(format!(
            "certificate {} does not belong to key {}",
            cert_name, key_name
        )));
    }
    Ok(())
}

/// Open the PIB named by `locator`.
pub fn open_pib(locator: &Locator) -> PibResult<Arc<dyn PibImpl>> {
    match locator.scheme.as_str() {
        #[cfg(feature = "sqlite")]
        PIB_SQLITE3_SCHEME | "" => {
            let dir = locator.directory_or(default_ndn_dir());
            info!(path = %dir.display(), "Opening SQLite PIB");
            Ok(Arc::new(PibSqlite3::open_with_locator(dir, &locator.location)?))
        }
        PIB_MEMORY_SCHEME => Ok(Arc::new(PibMemory::new())),
        other => Err(PibError::InvalidArgument(format!(
            "unsupported PIB scheme '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory_pib() {
        let pib = open_pib(&Locator::parse("pib-memory:")).unwrap();
        assert_eq!(pib.locator(), "pib-memory:");
        assert!(pib.get_identities().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        assert!(matches!(
            open_pib(&Locator::parse("pib-mysql:/tmp")),
            Err(e) if e.is_invalid_argument()
        ));
    }

    #[test]
    fn test_parent_checks() {
        let alice = Name::from_uri("/alice").unwrap();
        let key = Name::from_uri("/alice/KSK-1").unwrap();
        assert!(check_key_parent(&alice, &key).is_ok());
        assert!(check_key_parent(&Name::from_uri("/bob").unwrap(), &key).is_err());

        let cert = Name::from_uri("/alice/KEY/KSK-1/ID-CERT/%FD%01").unwrap();
        assert!(check_certificate_parent(&key, &cert).is_ok());
        assert!(check_certificate_parent(&Name::from_uri("/alice/KSK-2").unwrap(), &cert).is_err());
    }
}
