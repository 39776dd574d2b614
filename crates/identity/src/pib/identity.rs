use super::{check_key_parent, lock, Key, PibImpl};
use crate::error::{EntityKind, PibError, PibResult};
use ndnsec_core::Name;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Keys of one identity, loaded on demand.
struct KeyContainer {
    identity: Name,
    names: Mutex<BTreeSet<Name>>,
    cache: Mutex<HashMap<Name, Arc<Key>>>,
    pib: Arc<dyn PibImpl>,
}

impl KeyContainer {
    fn new(identity: Name, pib: Arc<dyn PibImpl>) -> PibResult<Self> {
        let names = pib.get_keys_of_identity(&identity)?;
        Ok(Self {
            identity,
            names: Mutex::new(names),
            cache: Mutex::new(HashMap::new()),
            pib,
        })
    }

    fn add(&self, key_bits: &[u8], key_name: &Name) -> PibResult<Arc<Key>> {
        check_key_parent(&self.identity, key_name)?;
        self.pib.add_key(&self.identity, key_name, key_bits)?;

        // Overwriting a key replaces its cached handle.
        let key = Arc::new(Key::load(key_name.clone(), Arc::clone(&self.pib))?);
        lock(&self.names, "key names")?.insert(key_name.clone());
        lock(&self.cache, "key cache")?.insert(key_name.clone(), Arc::clone(&key));
        Ok(key)
    }

    fn remove(&self, key_name: &Name) -> PibResult<()> {
        check_key_parent(&self.identity, key_name)?;
        self.pib.remove_key(key_name)?;

        lock(&self.names, "key names")?.remove(key_name);
        lock(&self.cache, "key cache")?.remove(key_name);
        Ok(())
    }

    fn get(&self, key_name: &Name) -> PibResult<Arc<Key>> {
        check_key_parent(&self.identity, key_name)?;
        if let Some(cached) = lock(&self.cache, "key cache")?.get(key_name) {
            return Ok(Arc::clone(cached));
        }

        let key = Arc::new(Key::load(key_name.clone(), Arc::clone(&self.pib))?);
        lock(&self.cache, "key cache")?.insert(key_name.clone(), Arc::clone(&key));
        Ok(key)
    }

    fn is_consistent(&self) -> PibResult<bool> {
        let stored = self.pib.get_keys_of_identity(&self.identity)?;
        if *lock(&self.names, "key names")? != stored {
            return Ok(false);
        }
        for key in lock(&self.cache, "key cache")?.values() {
            if !key.is_consistent()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A principal in the PIB, owning zero or more keys.
pub struct Identity {
    name: Name,
    default_key: Mutex<Option<Arc<Key>>>,
    keys: KeyContainer,
    pib: Arc<dyn PibImpl>,
}

impl Identity {
    /// Handle over an identity that exists in the backend.
    pub(crate) fn load(name: Name, pib: Arc<dyn PibImpl>) -> PibResult<Self> {
        if !pib.has_identity(&name)? {
            return Err(PibError::not_found(EntityKind::Identity, &name));
        }
        let keys = KeyContainer::new(name.clone(), Arc::clone(&pib))?;
        Ok(Self {
            name,
            default_key: Mutex::new(None),
            keys,
            pib,
        })
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn key_names(&self) -> PibResult<BTreeSet<Name>> {
        Ok(lock(&self.keys.names, "key names")?.clone())
    }

    pub fn get_key(&self, key_name: &Name) -> PibResult<Arc<Key>> {
        self.keys.get(key_name)
    }

    pub(crate) fn add_key(&self, key_bits: &[u8], key_name: &Name) -> PibResult<Arc<Key>> {
        let key = self.keys.add(key_bits, key_name)?;

        // A replaced default key must not keep serving its stale handle.
        let mut default = lock(&self.default_key, "default key")?;
        if default.as_ref().map(|k| k.name()) == Some(key_name) {
            *default = Some(Arc::clone(&key));
        }
        Ok(key)
    }

    pub(crate) fn remove_key(&self, key_name: &Name) -> PibResult<()> {
        check_key_parent(&self.name, key_name)?;
        {
            let mut default = lock(&self.default_key, "default key")?;
            if default.as_ref().map(|k| k.name()) == Some(key_name) {
                *default = None;
            }
        }
        self.keys.remove(key_name)
    }

    pub(crate) fn set_default_key(&self, key_name: &Name) -> PibResult<Arc<Key>> {
        let key = self.keys.get(key_name)?;
        self.pib.set_default_key_of_identity(&self.name, key_name)?;

        *lock(&self.default_key, "default key")? = Some(Arc::clone(&key));
        info!(identity = %self.name, key = %key_name, "Default key changed");
        Ok(key)
    }

    /// Add a key and make it this identity's default.
    pub(crate) fn set_default_key_from(
        &self,
        key_bits: &[u8],
        key_name: &Name,
    ) -> PibResult<Arc<Key>> {
        self.add_key(key_bits, key_name)?;
        self.set_default_key(key_name)
    }

    pub fn get_default_key(&self) -> PibResult<Arc<Key>> {
        if let Some(cached) = lock(&self.default_key, "default key")?.as_ref() {
            return Ok(Arc::clone(cached));
        }

        let key_name = self.pib.get_default_key_of_identity(&self.name)?;
        let key = self.keys.get(&key_name)?;
        *lock(&self.default_key, "default key")? = Some(Arc::clone(&key));
        Ok(key)
    }

    #[doc(hidden)]
    pub fn is_consistent(&self) -> PibResult<bool> {
        self.keys.is_consistent()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pib::PibMemory;

    fn setup() -> (Arc<dyn PibImpl>, Identity) {
        let pib: Arc<dyn PibImpl> = Arc::new(PibMemory::new());
        let name = Name::from_uri("/alice").unwrap();
        pib.add_identity(&name).unwrap();
        let identity = Identity::load(name, Arc::clone(&pib)).unwrap();
        (pib, identity)
    }

    #[test]
    fn test_default_key_by_vacancy_then_explicit() {
        let (_pib, identity) = setup();
        let k1 = Name::from_uri("/alice/KSK-1").unwrap();
        let k2 = Name::from_uri("/alice/KSK-2").unwrap();

        assert!(identity.get_default_key().unwrap_err().is_not_found());
        identity.add_key(b"one", &k1).unwrap();
        identity.add_key(b"two", &k2).unwrap();
        assert_eq!(identity.get_default_key().unwrap().name(), &k1);

        identity.set_default_key(&k2).unwrap();
        assert_eq!(identity.get_default_key().unwrap().name(), &k2);
        assert_eq!(identity.key_names().unwrap().len(), 2);
        assert!(identity.is_consistent().unwrap());
    }

    #[test]
    fn test_remove_default_key() {
        let (pib, identity) = setup();
        let key = Name::from_uri("/alice/KSK-1").unwrap();
        identity.add_key(b"bits", &key).unwrap();
        identity.get_default_key().unwrap();

        identity.remove_key(&key).unwrap();
        assert!(identity.get_default_key().unwrap_err().is_not_found());
        assert!(!pib.has_key(&key).unwrap());
        assert!(identity.get_key(&key).unwrap_err().is_not_found());
        assert!(identity.is_consistent().unwrap());
    }

    #[test]
    fn test_foreign_key_rejected_before_backend() {
        let (pib, identity) = setup();
        let bob_key = Name::from_uri("/bob/KSK-1").unwrap();

        assert!(identity.add_key(b"bits", &bob_key).unwrap_err().is_invalid_argument());
        assert!(identity.set_default_key(&bob_key).unwrap_err().is_invalid_argument());
        assert!(!pib.has_key(&bob_key).unwrap());
        assert!(!pib.has_identity(&Name::from_uri("/bob").unwrap()).unwrap());
    }

    #[test]
    fn test_overwritten_key_refreshes_handle() {
        let (_pib, identity) = setup();
        let key = Name::from_uri("/alice/KSK-1").unwrap();
        identity.add_key(b"old", &key).unwrap();
        assert_eq!(identity.get_default_key().unwrap().public_key().unwrap(), b"old");

        identity.add_key(b"new", &key).unwrap();
        assert_eq!(identity.get_default_key().unwrap().public_key().unwrap(), b"new");
        assert_eq!(identity.get_key(&key).unwrap().public_key().unwrap(), b"new");
    }

    #[test]
    fn test_load_unknown_identity() {
        let pib: Arc<dyn PibImpl> = Arc::new(PibMemory::new());
        assert!(Identity::load(Name::from_uri("/ghost").unwrap(), pib)
            .unwrap_err()
            .is_not_found());
    }
}
