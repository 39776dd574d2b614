//! Structured logging setup for key chain tools.
//!
//! Library code only emits `tracing` events; binaries call one of the
//! initialisers below once at startup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize human-readable logging on stderr.
///
/// # Example
/// ```no_run
/// use ndnsec_core::logging;
///
/// logging::init();
/// tracing::info!(identity = "/alice", "Identity created");
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}

/// Initialize JSON logging for log aggregation.
pub fn init_json() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
        .init();
}

/// Install a test-friendly subscriber; repeated calls are ignored.
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_for_tests_is_idempotent() {
        init_for_tests();
        init_for_tests();
        tracing::debug!("logging initialised twice without panicking");
    }
}
