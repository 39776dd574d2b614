//! End-to-end identity, key and certificate lifecycles

use crate::test_utils::{memory_manager, name, next_key_id};
use ndnsec_core::now_millis;
use ndnsec_crypto::KeyParams;
use ndnsec_identity::naming::extract_key_name_from_cert_name;
use ndnsec_identity::pib::conformance::make_certificate;
use ndnsec_identity::{Data, IdentityError, Interest, SigningInfo, ValidityPeriod};

#[test]
fn test_rsa_identity_from_scratch() {
    let manager = memory_manager();
    let alice = name("/alice");

    manager.pib().backend().add_identity(&alice).unwrap();
    let key_name = manager.generate_rsa_key_pair(&alice, true, 1024).unwrap();
    let certificate = manager.self_sign(&key_name).unwrap();
    manager.add_certificate_as_identity_default(&certificate).unwrap();

    let backend = manager.pib().backend();
    assert_eq!(backend.get_default_identity().unwrap(), alice);
    assert_eq!(backend.get_default_key_of_identity(&alice).unwrap(), key_name);

    let stored = backend.get_default_certificate_of_key(&key_name).unwrap();
    assert_eq!(extract_key_name_from_cert_name(stored.name()).unwrap(), key_name);
    assert!(manager.verify(&stored).unwrap());
}

#[test]
fn test_default_identity_order_and_switch() {
    let manager = memory_manager();
    let alice = name("/alice");
    let bob = name("/bob");

    manager.create_identity_with_defaults(&alice).unwrap();
    manager.create_identity_with_defaults(&bob).unwrap();
    assert_eq!(manager.get_default_identity().unwrap(), alice);

    manager.set_default_identity(&bob).unwrap();
    assert_eq!(manager.get_default_identity().unwrap(), bob);
    assert_eq!(manager.pib().backend().get_default_identity().unwrap(), bob);
    assert!(manager.pib().is_consistent().unwrap());
}

#[test]
fn test_remove_key_with_two_certificates() {
    let manager = memory_manager();
    let alice = name("/alice");
    let key_name = manager.generate_ec_key_pair(&alice, true, 256).unwrap();
    let public_key = manager.get_public_key(&key_name).unwrap();

    let first = make_certificate(&key_name, 1, &public_key);
    let second = make_certificate(&key_name, 2, &public_key);
    manager.add_certificate(&first).unwrap();
    manager.add_certificate(&second).unwrap();

    manager.delete_key(&key_name).unwrap();

    let backend = manager.pib().backend();
    assert!(backend.get_certificates_of_key(&key_name).unwrap().is_empty());
    assert!(!backend.has_certificate(first.name()).unwrap());
    assert!(!backend.has_certificate(second.name()).unwrap());
    assert!(!manager.tpm().has_key(&key_name).unwrap());
}

#[test]
fn test_hierarchical_certificate_chain() {
    let manager = memory_manager();
    let org = name("/org");
    let alice = name("/org/alice");

    let org_cert = manager.create_identity_with_defaults(&org).unwrap();
    let alice_key = manager.generate_ec_key_pair(&alice, true, 256).unwrap();

    let mut certificate = manager
        .prepare_unsigned_identity_certificate(
            &alice_key,
            &org,
            ValidityPeriod::for_days(now_millis(), 365),
            None,
            None,
        )
        .unwrap();
    manager.sign_by_certificate(&mut certificate, &org_cert).unwrap();
    manager.add_certificate_as_identity_default(&certificate).unwrap();

    // The KEY marker follows the issuer's namespace.
    assert_eq!(certificate.name().get(0).unwrap().value(), b"org");
    assert_eq!(certificate.name().get(1).unwrap().value(), b"KEY");
    assert!(manager.verify(&certificate).unwrap());

    let mut data = Data::new(name("/org/alice/report"), b"quarterly".to_vec());
    manager.sign(&mut data, &SigningInfo::by_identity(alice.clone())).unwrap();
    assert_eq!(
        data.signature_info.key_locator.as_ref(),
        Some(&certificate.name().prefix(-1))
    );
    assert!(manager.verify(&data).unwrap());

    // Tampering breaks the signature.
    data.content = b"annual".to_vec();
    assert!(!manager.verify(&data).unwrap());
}

#[test]
fn test_signed_interest_survives_name_round_trip() {
    let manager = memory_manager();
    let alice = name("/alice");
    manager.create_identity_with_defaults(&alice).unwrap();

    let mut interest = Interest::new(name("/alice/command/reboot"));
    manager.sign(&mut interest, &SigningInfo::default()).unwrap();
    assert_eq!(interest.name().len(), 3 + 4);

    let received = Interest::from_signed_name(interest.name().clone()).unwrap();
    assert!(manager.verify(&received).unwrap());
    assert!(received.timestamp().is_some());
}

#[test]
fn test_key_rotation_keeps_old_certificates() {
    let manager = memory_manager();
    let alice = name("/alice");
    let old_cert = manager.create_identity_with_defaults(&alice).unwrap();
    let old_key = extract_key_name_from_cert_name(&old_cert).unwrap();

    next_key_id();
    let new_key = manager.generate_ec_key_pair_as_default(&alice, true, 256).unwrap();
    let new_cert = manager.self_sign(&new_key).unwrap();
    manager.add_certificate_as_identity_default(&new_cert).unwrap();

    assert_eq!(manager.get_default_key_name_for_identity(&alice).unwrap(), new_key);
    assert_eq!(
        manager.get_default_certificate_name_for_identity(&alice).unwrap(),
        *new_cert.name()
    );
    assert!(manager.get_certificate(&old_cert).is_ok());
    assert!(manager.tpm().has_key(&old_key).unwrap());
    assert!(manager.pib().is_consistent().unwrap());
}

#[test]
fn test_existing_key_of_other_type_is_replaced_as_default() {
    let manager = memory_manager();
    let alice = name("/alice");
    let ec_key = manager.generate_ec_key_pair(&alice, true, 256).unwrap();

    next_key_id();
    let cert_name = manager
        .create_identity_and_certificate(&alice, &KeyParams::Rsa { size: 1024 })
        .unwrap();
    let rsa_key = extract_key_name_from_cert_name(&cert_name).unwrap();

    assert_ne!(rsa_key, ec_key);
    assert_eq!(manager.get_default_key_name_for_identity(&alice).unwrap(), rsa_key);
    assert!(matches!(
        manager.create_identity(&alice, &KeyParams::Rsa { size: 1024 }),
        Err(IdentityError::IdentityExists { .. })
    ));
}
