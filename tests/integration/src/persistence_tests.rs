//! Durable key chains: SQLite PIB paired with the file TPM

use crate::test_utils::{name, temp_path};
use ndnsec_core::config::KeyParamsConfig;
use ndnsec_core::KeyChainConfig;
use ndnsec_identity::{Data, IdentityError, IdentityManager, SigningInfo};
use std::path::Path;

fn durable_config(root: &Path, tpm_dir: &str) -> KeyChainConfig {
    KeyChainConfig {
        pib: format!("pib-sqlite3:{}", root.display()),
        tpm: format!("tpm-file:{}", root.join(tpm_dir).display()),
        default_key: KeyParamsConfig {
            algorithm: "ec".to_string(),
            size: 256,
        },
        ..KeyChainConfig::default_config()
    }
}

#[test]
fn test_key_chain_survives_reopen() {
    let root = temp_path("persist_reopen");
    let config = durable_config(&root, "keys");
    let alice = name("/alice");

    let cert_name = {
        let manager = IdentityManager::from_config(&config, false).expect("Failed to open key chain");
        manager.create_identity_with_defaults(&alice).unwrap()
    };

    let manager = IdentityManager::from_config(&config, false).expect("Failed to reopen key chain");
    assert_eq!(manager.get_default_identity().unwrap(), alice);
    assert_eq!(
        manager.get_default_certificate_name_for_identity(&alice).unwrap(),
        cert_name
    );

    // The private key came back too.
    let mut data = Data::new(name("/alice/after-restart"), b"still here".to_vec());
    manager.sign(&mut data, &SigningInfo::by_certificate(cert_name)).unwrap();
    assert!(manager.verify(&data).unwrap());

    // Cleanup
    drop(manager);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn test_tpm_locator_mismatch_is_detected() {
    let root = temp_path("persist_mismatch");
    let alice = name("/alice");

    {
        let manager = IdentityManager::from_config(&durable_config(&root, "keys"), false).unwrap();
        manager.create_identity_with_defaults(&alice).unwrap();
        assert_eq!(
            manager.pib().tpm_locator().unwrap(),
            format!("tpm-file:{}", root.join("keys").display())
        );
    }

    let moved = durable_config(&root, "other-keys");
    let err = IdentityManager::from_config(&moved, false).unwrap_err();
    assert!(matches!(err, IdentityError::LocatorMismatch { .. }));

    // Resetting drops every identity and adopts the new TPM.
    let manager = IdentityManager::from_config(&moved, true).unwrap();
    assert!(manager.get_identities().unwrap().is_empty());
    assert!(manager.get_default_identity().unwrap_err().is_not_found());
    assert_eq!(
        manager.pib().tpm_locator().unwrap(),
        format!("tpm-file:{}", root.join("other-keys").display())
    );

    // Cleanup
    drop(manager);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn test_delete_identity_removes_key_files() {
    let root = temp_path("persist_delete");
    let config = durable_config(&root, "keys");
    let alice = name("/alice");

    let manager = IdentityManager::from_config(&config, false).unwrap();
    manager.create_identity_with_defaults(&alice).unwrap();
    let key_name = manager.get_default_key_name_for_identity(&alice).unwrap();
    assert!(manager.tpm().has_key(&key_name).unwrap());

    manager.delete_identity(&alice).unwrap();
    drop(manager);

    let reopened = IdentityManager::from_config(&config, false).unwrap();
    assert!(!reopened.tpm().has_key(&key_name).unwrap());
    assert!(reopened.get_identities().unwrap().is_empty());

    // Cleanup
    drop(reopened);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn test_osx_keychain_is_rejected() {
    let config = KeyChainConfig {
        tpm: "tpm-osxkeychain:".to_string(),
        ..KeyChainConfig::in_memory()
    };
    assert!(matches!(
        IdentityManager::from_config(&config, false),
        Err(IdentityError::Core(_))
    ));
}
