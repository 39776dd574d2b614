//! Integration tests for the NDN key chain
//!
//! This test suite validates:
//! - Identical observable behaviour of every PIB backend
//! - Identity, key and certificate lifecycles through the manager
//! - Persistence of the durable PIB and file TPM across reopen
//! - The PIB/TPM locator cross-check

pub mod test_utils;

#[cfg(test)]
mod conformance_tests;

#[cfg(test)]
mod lifecycle_tests;

#[cfg(test)]
mod persistence_tests;
