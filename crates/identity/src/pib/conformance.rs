//! Behavioural conformance suite for [`PibImpl`] backends.
//!
//! Every backend must pass every function here. Each check clears the store
//! first, so the functions can run in any order against one instance.
//!
//! ```ignore
//! ndnsec_identity::pib::conformance::run_all(&PibMemory::new());
//! ```

use super::PibImpl;
use crate::certificate::{Certificate, ValidityPeriod};
use crate::naming::infer_certificate_name;
use ndnsec_core::Name;

fn name(uri: &str) -> Name {
    Name::from_uri(uri).expect("valid test name")
}

/// A certificate for `key_name` carrying `public_key`.
pub fn make_certificate(key_name: &Name, version: u64, public_key: &[u8]) -> Certificate {
    let cert_name = infer_certificate_name(key_name, None, version).expect("valid key name");
    Certificate::new(cert_name, public_key.to_vec(), ValidityPeriod::new(0, u64::MAX))
}

fn reset(pib: &dyn PibImpl) {
    pib.clear_identities().expect("clear identities");
}

/// Run the whole suite.
pub fn run_all(pib: &dyn PibImpl) {
    tpm_locator_round_trip(pib);
    add_identity_is_idempotent(pib);
    first_identity_becomes_default(pib);
    set_default_identity_switches_and_creates(pib);
    missing_entities_report_not_found(pib);
    add_key_creates_identity_and_default(pib);
    default_key_is_exclusive(pib);
    add_certificate_creates_ancestors(pib);
    add_certificate_overwrites_key_bits(pib);
    default_certificate_is_exclusive(pib);
    remove_identity_cascades(pib);
    remove_key_cascades(pib);
    remove_certificate_clears_default(pib);
    parent_mismatch_leaves_store_unchanged(pib);
    clear_identities_removes_everything(pib);
}

pub fn tpm_locator_round_trip(pib: &dyn PibImpl) {
    pib.set_tpm_locator("tpm-file:/tmp/a").unwrap();
    assert_eq!(pib.get_tpm_locator().unwrap(), "tpm-file:/tmp/a");
    pib.set_tpm_locator("tpm-memory:").unwrap();
    assert_eq!(pib.get_tpm_locator().unwrap(), "tpm-memory:");
}

pub fn add_identity_is_idempotent(pib: &dyn PibImpl) {
    reset(pib);
    let alice = name("/alice");

    pib.add_identity(&alice).unwrap();
    assert!(pib.has_identity(&alice).unwrap());
    assert!(pib.get_identities().unwrap().contains(&alice));

    pib.add_identity(&alice).unwrap();
    assert_eq!(pib.get_identities().unwrap().len(), 1);
}

pub fn first_identity_becomes_default(pib: &dyn PibImpl) {
    reset(pib);
    let alice = name("/alice");
    let bob = name("/bob");

    pib.add_identity(&alice).unwrap();
    assert_eq!(pib.get_default_identity().unwrap(), alice);

    pib.add_identity(&bob).unwrap();
    assert_eq!(pib.get_default_identity().unwrap(), alice);
}

pub fn set_default_identity_switches_and_creates(pib: &dyn PibImpl) {
    reset(pib);
    let alice = name("/alice");
    let bob = name("/bob");
    let carol = name("/carol");

    pib.add_identity(&alice).unwrap();
    pib.add_identity(&bob).unwrap();
    pib.set_default_identity(&bob).unwrap();
    assert_eq!(pib.get_default_identity().unwrap(), bob);

    pib.set_default_identity(&carol).unwrap();
    assert!(pib.has_identity(&carol).unwrap());
    assert_eq!(pib.get_default_identity().unwrap(), carol);
    assert_eq!(pib.get_identities().unwrap().len(), 3);
}

pub fn missing_entities_report_not_found(pib: &dyn PibImpl) {
    reset(pib);
    let alice = name("/alice");
    let key = name("/alice/KSK-1");
    let cert = make_certificate(&key, 1, b"bits");

    assert!(pib.get_default_identity().unwrap_err().is_not_found());
    assert!(pib.get_key_bits(&key).unwrap_err().is_not_found());
    assert!(pib.get_certificate(cert.name()).unwrap_err().is_not_found());
    assert!(pib.get_default_key_of_identity(&alice).unwrap_err().is_not_found());
    assert!(pib.get_default_certificate_of_key(&key).unwrap_err().is_not_found());
    assert!(pib.get_keys_of_identity(&alice).unwrap().is_empty());
    assert!(pib.get_certificates_of_key(&key).unwrap().is_empty());
    assert!(!pib.has_key(&key).unwrap());
    assert!(!pib.has_certificate(cert.name()).unwrap());

    pib.add_identity(&alice).unwrap();
    assert!(pib.get_default_key_of_identity(&alice).unwrap_err().is_not_found());
    assert!(pib
        .set_default_key_of_identity(&alice, &key)
        .unwrap_err()
        .is_not_found());

    pib.add_key(&alice, &key, b"bits").unwrap();
    assert!(pib.get_default_certificate_of_key(&key).unwrap_err().is_not_found());
    assert!(pib
        .set_default_certificate_of_key(&key, cert.name())
        .unwrap_err()
        .is_not_found());

    // Removing unknown entities is not an error.
    pib.remove_identity(&name("/nobody")).unwrap();
    pib.remove_key(&name("/nobody/KSK-1")).unwrap();
    pib.remove_certificate(&name("/nobody/KEY/KSK-1/ID-CERT/%FD%01")).unwrap();
}

pub fn add_key_creates_identity_and_default(pib: &dyn PibImpl) {
    reset(pib);
    let alice = name("/alice");
    let k1 = name("/alice/KSK-1");
    let k2 = name("/alice/DSK-2");

    pib.add_key(&alice, &k1, b"one").unwrap();
    assert!(pib.has_identity(&alice).unwrap());
    assert_eq!(pib.get_default_identity().unwrap(), alice);
    assert_eq!(pib.get_default_key_of_identity(&alice).unwrap(), k1);
    assert_eq!(pib.get_key_bits(&k1).unwrap(), b"one");

    pib.add_key(&alice, &k2, b"two").unwrap();
    assert_eq!(pib.get_default_key_of_identity(&alice).unwrap(), k1);
    assert_eq!(pib.get_keys_of_identity(&alice).unwrap().len(), 2);

    pib.add_key(&alice, &k1, b"uno").unwrap();
    assert_eq!(pib.get_key_bits(&k1).unwrap(), b"uno");
    assert_eq!(pib.get_keys_of_identity(&alice).unwrap().len(), 2);
}

pub fn default_key_is_exclusive(pib: &dyn PibImpl) {
    reset(pib);
    let alice = name("/alice");
    let k1 = name("/alice/KSK-1");
    let k2 = name("/alice/KSK-2");

    pib.add_key(&alice, &k1, b"one").unwrap();
    pib.add_key(&alice, &k2, b"two").unwrap();

    pib.set_default_key_of_identity(&alice, &k1).unwrap();
    pib.set_default_key_of_identity(&alice, &k2).unwrap();
    assert_eq!(pib.get_default_key_of_identity(&alice).unwrap(), k2);

    pib.set_default_key_of_identity(&alice, &k1).unwrap();
    assert_eq!(pib.get_default_key_of_identity(&alice).unwrap(), k1);
}

pub fn add_certificate_creates_ancestors(pib: &dyn PibImpl) {
    reset(pib);
    let alice = name("/alice");
    let key = name("/alice/KSK-1");
    let cert = make_certificate(&key, 1, b"bits");

    pib.add_certificate(&cert).unwrap();
    assert!(pib.has_identity(&alice).unwrap());
    assert!(pib.has_key(&key).unwrap());
    assert!(pib.has_certificate(cert.name()).unwrap());
    assert_eq!(pib.get_key_bits(&key).unwrap(), b"bits");
    assert_eq!(pib.get_default_identity().unwrap(), alice);
    assert_eq!(pib.get_default_key_of_identity(&alice).unwrap(), key);
    assert_eq!(pib.get_default_certificate_of_key(&key).unwrap(), cert);
    assert_eq!(pib.get_certificate(cert.name()).unwrap(), cert);
}

pub fn add_certificate_overwrites_key_bits(pib: &dyn PibImpl) {
    reset(pib);
    let alice = name("/alice");
    let key = name("/alice/KSK-1");

    pib.add_key(&alice, &key, b"old").unwrap();
    let cert = make_certificate(&key, 1, b"new");
    pib.add_certificate(&cert).unwrap();
    assert_eq!(pib.get_key_bits(&key).unwrap(), b"new");

    // Same name, new content.
    let mut replacement = cert.clone();
    replacement.validity = ValidityPeriod::new(5, 10);
    pib.add_certificate(&replacement).unwrap();
    assert_eq!(pib.get_certificate(cert.name()).unwrap(), replacement);
    assert_eq!(pib.get_certificates_of_key(&key).unwrap().len(), 1);
}

pub fn default_certificate_is_exclusive(pib: &dyn PibImpl) {
    reset(pib);
    let key = name("/alice/KSK-1");
    let c1 = make_certificate(&key, 1, b"bits");
    let c2 = make_certificate(&key, 2, b"bits");

    pib.add_certificate(&c1).unwrap();
    pib.add_certificate(&c2).unwrap();
    assert_eq!(pib.get_default_certificate_of_key(&key).unwrap(), c1);

    pib.set_default_certificate_of_key(&key, c2.name()).unwrap();
    assert_eq!(pib.get_default_certificate_of_key(&key).unwrap(), c2);

    pib.set_default_certificate_of_key(&key, c1.name()).unwrap();
    assert_eq!(pib.get_default_certificate_of_key(&key).unwrap(), c1);
}

pub fn remove_identity_cascades(pib: &dyn PibImpl) {
    reset(pib);
    let alice = name("/alice");
    let bob = name("/bob");
    let alice_key = name("/alice/KSK-1");
    let bob_key = name("/bob/KSK-1");
    let alice_cert = make_certificate(&alice_key, 1, b"a");
    let bob_cert = make_certificate(&bob_key, 1, b"b");

    pib.add_certificate(&alice_cert).unwrap();
    pib.add_certificate(&bob_cert).unwrap();
    assert_eq!(pib.get_default_identity().unwrap(), alice);

    pib.remove_identity(&alice).unwrap();
    assert!(!pib.has_identity(&alice).unwrap());
    assert!(!pib.has_key(&alice_key).unwrap());
    assert!(!pib.has_certificate(alice_cert.name()).unwrap());
    assert!(pib.get_default_identity().unwrap_err().is_not_found());

    assert!(pib.has_identity(&bob).unwrap());
    assert!(pib.has_key(&bob_key).unwrap());
    assert!(pib.has_certificate(bob_cert.name()).unwrap());
    assert_eq!(pib.get_default_key_of_identity(&bob).unwrap(), bob_key);

    // Re-adding starts from a clean slate.
    pib.add_identity(&alice).unwrap();
    assert!(pib.get_keys_of_identity(&alice).unwrap().is_empty());
    assert_eq!(pib.get_default_identity().unwrap(), alice);
}

pub fn remove_key_cascades(pib: &dyn PibImpl) {
    reset(pib);
    let alice = name("/alice");
    let key = name("/alice/KSK-1");
    let other = name("/alice/KSK-2");
    let c1 = make_certificate(&key, 1, b"bits");
    let c2 = make_certificate(&key, 2, b"bits");

    pib.add_certificate(&c1).unwrap();
    pib.add_certificate(&c2).unwrap();
    pib.add_key(&alice, &other, b"other").unwrap();

    pib.remove_key(&key).unwrap();
    assert!(!pib.has_key(&key).unwrap());
    assert!(pib.get_certificates_of_key(&key).unwrap().is_empty());
    assert!(!pib.has_certificate(c1.name()).unwrap());
    assert!(!pib.has_certificate(c2.name()).unwrap());
    assert!(pib.get_default_key_of_identity(&alice).unwrap_err().is_not_found());
    assert!(pib.has_identity(&alice).unwrap());
    assert!(pib.has_key(&other).unwrap());

    // A key re-added under the same name has no leftover certificates.
    pib.add_key(&alice, &key, b"bits").unwrap();
    assert!(pib.get_certificates_of_key(&key).unwrap().is_empty());
    assert!(pib.get_default_certificate_of_key(&key).unwrap_err().is_not_found());
}

pub fn remove_certificate_clears_default(pib: &dyn PibImpl) {
    reset(pib);
    let key = name("/alice/KSK-1");
    let cert = make_certificate(&key, 1, b"bits");

    pib.add_certificate(&cert).unwrap();
    pib.remove_certificate(cert.name()).unwrap();
    assert!(!pib.has_certificate(cert.name()).unwrap());
    assert!(pib.has_key(&key).unwrap());
    assert!(pib.get_default_certificate_of_key(&key).unwrap_err().is_not_found());

    let next = make_certificate(&key, 2, b"bits");
    pib.add_certificate(&next).unwrap();
    assert_eq!(pib.get_default_certificate_of_key(&key).unwrap(), next);
}

pub fn parent_mismatch_leaves_store_unchanged(pib: &dyn PibImpl) {
    reset(pib);
    let alice = name("/alice");
    let bob = name("/bob");
    let alice_key = name("/alice/KSK-1");
    let bob_key = name("/bob/KSK-1");

    pib.add_key(&alice, &alice_key, b"bits").unwrap();

    assert!(pib
        .add_key(&alice, &bob_key, b"bits")
        .unwrap_err()
        .is_invalid_argument());
    assert!(!pib.has_key(&bob_key).unwrap());
    assert!(!pib.has_identity(&bob).unwrap());

    pib.add_key(&bob, &bob_key, b"bits").unwrap();
    assert!(pib
        .set_default_key_of_identity(&alice, &bob_key)
        .unwrap_err()
        .is_invalid_argument());
    assert_eq!(pib.get_default_key_of_identity(&alice).unwrap(), alice_key);

    let bob_cert = make_certificate(&bob_key, 1, b"bits");
    pib.add_certificate(&bob_cert).unwrap();
    assert!(pib
        .set_default_certificate_of_key(&alice_key, bob_cert.name())
        .unwrap_err()
        .is_invalid_argument());

    let malformed = Certificate::new(name("/alice/KSK-1"), b"bits".to_vec(), ValidityPeriod::new(0, 1));
    assert!(pib.add_certificate(&malformed).unwrap_err().is_invalid_argument());
    assert_eq!(pib.get_identities().unwrap().len(), 2);
}

pub fn clear_identities_removes_everything(pib: &dyn PibImpl) {
    reset(pib);
    let key = name("/alice/KSK-1");
    let cert = make_certificate(&key, 1, b"bits");
    pib.add_certificate(&cert).unwrap();
    pib.add_identity(&name("/bob")).unwrap();

    pib.clear_identities().unwrap();
    assert!(pib.get_identities().unwrap().is_empty());
    assert!(!pib.has_key(&key).unwrap());
    assert!(!pib.has_certificate(cert.name()).unwrap());
    assert!(pib.get_default_identity().unwrap_err().is_not_found());
}
