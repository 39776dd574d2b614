//! PIB backend conformance
//!
//! Every backend must pass the same property suite. The durable backends are
//! also exercised on real files, not only in-memory databases.

use crate::test_utils::temp_path;
use ndnsec_core::config::Locator;
use ndnsec_identity::pib::{conformance, open_pib, PibMemory, PibPlatformSqlite, PibSqlite3};
use ndnsec_identity::PibImpl;

#[test]
fn test_memory_backend_conformance() {
    conformance::run_all(&PibMemory::new());
}

#[test]
fn test_sqlite3_backend_conformance() {
    let dir = temp_path("conformance_sqlite3");
    let pib = PibSqlite3::open(&dir).expect("Failed to open PIB");

    conformance::run_all(&pib);

    // Cleanup
    drop(pib);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_platform_backend_conformance() {
    let dir = temp_path("conformance_platform");
    std::fs::create_dir_all(&dir).unwrap();
    let pib = PibPlatformSqlite::open(dir.join("pib.db")).expect("Failed to open PIB");

    conformance::run_all(&pib);

    // Cleanup
    drop(pib);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_backends_from_locators() {
    let dir = temp_path("conformance_locator");
    let locator = Locator::parse(&format!("pib-sqlite3:{}", dir.display()));
    let durable = open_pib(&locator).expect("Failed to open PIB");
    assert_eq!(durable.locator(), format!("pib-sqlite3:{}", dir.display()));
    conformance::run_all(durable.as_ref());

    let memory = open_pib(&Locator::parse("pib-memory:")).expect("Failed to open PIB");
    assert_eq!(memory.locator(), "pib-memory:");
    conformance::run_all(memory.as_ref());

    // Cleanup
    drop(durable);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_backends_agree_on_one_sequence() {
    let dir = temp_path("conformance_agree");
    std::fs::create_dir_all(&dir).unwrap();
    let backends: Vec<Box<dyn PibImpl>> = vec![
        Box::new(PibMemory::new()),
        Box::new(PibSqlite3::open(dir.join("sqlite3")).unwrap()),
        Box::new(PibPlatformSqlite::open(dir.join("platform.db")).unwrap()),
    ];

    let alice = crate::test_utils::name("/alice");
    let bob = crate::test_utils::name("/bob");
    let key = crate::test_utils::name("/bob/KSK-1");
    let certificate = conformance::make_certificate(&key, 7, b"bob key");

    let mut snapshots = Vec::new();
    for pib in &backends {
        pib.add_identity(&alice).unwrap();
        pib.add_certificate(&certificate).unwrap();
        pib.set_default_identity(&bob).unwrap();
        pib.remove_identity(&alice).unwrap();

        snapshots.push((
            pib.get_identities().unwrap(),
            pib.get_default_identity().unwrap(),
            pib.get_default_key_of_identity(&bob).unwrap(),
            pib.get_default_certificate_of_key(&key).unwrap(),
        ));
    }

    assert!(snapshots.windows(2).all(|pair| pair[0] == pair[1]));

    // Cleanup
    drop(backends);
    std::fs::remove_dir_all(&dir).ok();
}
