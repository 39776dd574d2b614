//! Private-key store and signature primitives for the NDN security stack.
//!
//! This crate is the "TPM" side of the PIB/TPM pair: it generates key pairs,
//! keeps the private halves, and signs on request. Callers only ever see
//! public keys and signatures.
//!
//! # Supported Algorithms
//!
//! - **RSA** (PKCS#1 v1.5 with SHA-256), modulus of at least 1024 bits
//! - **ECDSA** over NIST P-256 with SHA-256, DER-encoded signatures
//! - **SHA-256 digest** for integrity-only signatures (see [`verify`])
//!
//! # Stores
//!
//! - `tpm-file:<dir>`: [`TpmFile`], one PKCS#8 file per key
//! - `tpm-memory:`: [`TpmMemory`], process-local

pub mod error;
pub mod key_params;
pub mod keys;
pub mod tpm;
pub mod tpm_file;
pub mod tpm_memory;
pub mod verify;

pub use error::{TpmError, TpmResult};
pub use key_params::{DigestAlgorithm, KeyParams, KeyType};
pub use keys::PrivateKey;
pub use tpm::{open_tpm, Tpm};
pub use tpm_file::TpmFile;
pub use tpm_memory::TpmMemory;
pub use verify::{digest_sha256, verify_digest_sha256, verify_signature};
