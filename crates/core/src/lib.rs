//! Core types for the NDN security stack.
//!
//! This crate provides the name model shared by the PIB, the TPM and the
//! identity manager, together with configuration and logging setup.

pub mod config;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod name;

pub use config::{KeyChainConfig, KeyParamsConfig, Locator};
pub use error::{CoreError, Result};
pub use name::{Component, Name};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
