use super::{lock, open_pib, Identity, PibImpl};
use crate::error::PibResult;
use ndnsec_core::config::Locator;
use ndnsec_core::Name;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Caching front end over one [`PibImpl`].
///
/// Identity, key and certificate handles are created on first access and
/// shared afterwards. Handles keep only names and the backend reference, so
/// dropping a cache entry is all it takes to invalidate it. Mutators are
/// crate-private: only the identity manager changes the PIB.
///
/// Two live `Pib` instances over one store do not see each other's changes.
pub struct Pib {
    backend: Arc<dyn PibImpl>,
    identity_names: Mutex<BTreeSet<Name>>,
    identities: Mutex<HashMap<Name, Arc<Identity>>>,
    default_identity: Mutex<Option<Arc<Identity>>>,
}

impl Pib {
    pub fn new(backend: Arc<dyn PibImpl>) -> PibResult<Self> {
        let identity_names = backend.get_identities()?;
        Ok(Self {
            backend,
            identity_names: Mutex::new(identity_names),
            identities: Mutex::new(HashMap::new()),
            default_identity: Mutex::new(None),
        })
    }

    pub fn open(locator: &Locator) -> PibResult<Self> {
        Self::new(open_pib(locator)?)
    }

    /// The storage backend.
    pub fn backend(&self) -> &Arc<dyn PibImpl> {
        &self.backend
    }

    pub fn locator(&self) -> String {
        self.backend.locator()
    }

    pub fn tpm_locator(&self) -> PibResult<String> {
        self.backend.get_tpm_locator()
    }

    pub(crate) fn set_tpm_locator(&self, tpm_locator: &str) -> PibResult<()> {
        self.backend.set_tpm_locator(tpm_locator)
    }

    /// Remove every identity and record a new TPM locator.
    pub(crate) fn reset(&self, tpm_locator: &str) -> PibResult<()> {
        warn!(pib = %self.locator(), tpm = tpm_locator, "Resetting PIB");
        self.backend.clear_identities()?;
        self.backend.set_tpm_locator(tpm_locator)?;

        lock(&self.identity_names, "identity names")?.clear();
        lock(&self.identities, "identity cache")?.clear();
        *lock(&self.default_identity, "default identity")? = None;
        Ok(())
    }

    pub fn identity_names(&self) -> PibResult<BTreeSet<Name>> {
        Ok(lock(&self.identity_names, "identity names")?.clone())
    }

    pub fn get_identity(&self, identity: &Name) -> PibResult<Arc<Identity>> {
        if let Some(cached) = lock(&self.identities, "identity cache")?.get(identity) {
            return Ok(Arc::clone(cached));
        }

        let loaded = Arc::new(Identity::load(identity.clone(), Arc::clone(&self.backend))?);
        lock(&self.identities, "identity cache")?
            .insert(identity.clone(), Arc::clone(&loaded));
        Ok(loaded)
    }

    pub fn get_default_identity(&self) -> PibResult<Arc<Identity>> {
        if let Some(cached) = lock(&self.default_identity, "default identity")?.as_ref() {
            return Ok(Arc::clone(cached));
        }

        let name = self.backend.get_default_identity()?;
        let identity = self.get_identity(&name)?;
        *lock(&self.default_identity, "default identity")? = Some(Arc::clone(&identity));
        Ok(identity)
    }

    pub(crate) fn add_identity(&self, identity: &Name) -> PibResult<Arc<Identity>> {
        self.backend.add_identity(identity)?;
        lock(&self.identity_names, "identity names")?.insert(identity.clone());
        self.get_identity(identity)
    }

    pub(crate) fn remove_identity(&self, identity: &Name) -> PibResult<()> {
        {
            let mut default = lock(&self.default_identity, "default identity")?;
            if default.as_ref().map(|id| id.name()) == Some(identity) {
                *default = None;
            }
        }
        self.backend.remove_identity(identity)?;

        lock(&self.identity_names, "identity names")?.remove(identity);
        lock(&self.identities, "identity cache")?.remove(identity);
        Ok(())
    }

    pub(crate) fn set_default_identity(&self, identity: &Name) -> PibResult<Arc<Identity>> {
        self.backend.set_default_identity(identity)?;
        lock(&self.identity_names, "identity names")?.insert(identity.clone());

        let handle = self.get_identity(identity)?;
        *lock(&self.default_identity, "default identity")? = Some(Arc::clone(&handle));
        info!(identity = %identity, "Default identity changed");
        Ok(handle)
    }

    /// Compare every cached name set with a full backend scan.
    #[doc(hidden)]
    pub fn is_consistent(&self) -> PibResult<bool> {
        let stored = self.backend.get_identities()?;
        if *lock(&self.identity_names, "identity names")? != stored {
            return Ok(false);
        }
        for identity in lock(&self.identities, "identity cache")?.values() {
            if !identity.is_consistent()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl std::fmt::Debug for Pib {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pib")
            .field("locator", &self.backend.locator())
            .finish_non_exhaustive()
    }
}
