//! Shared fixtures for key chain integration tests

use ndnsec_core::Name;
use ndnsec_crypto::{KeyParams, TpmMemory};
use ndnsec_identity::pib::PibMemory;
use ndnsec_identity::{IdentityManager, Pib};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Parse a name URI, panicking on malformed test input
pub fn name(uri: &str) -> Name {
    Name::from_uri(uri).unwrap()
}

/// Fresh directory path under the system temp dir; not created
pub fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ndnsec_{}_{}", label, uuid::Uuid::new_v4()))
}

/// Manager over an in-memory PIB and TPM, generating EC keys by default
pub fn memory_manager() -> IdentityManager {
    ndnsec_core::logging::init_for_tests();
    let pib = Pib::new(Arc::new(PibMemory::new())).unwrap();
    IdentityManager::new(pib, Arc::new(TpmMemory::new())).with_key_params(KeyParams::ec())
}

/// Key ids carry a millisecond timestamp; two keys of one identity need distinct ones
pub fn next_key_id() {
    std::thread::sleep(Duration::from_millis(2));
}
