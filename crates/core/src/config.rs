//! Configuration for the key chain: which PIB and TPM to open, and the
//! defaults used when minting new keys and certificates.
//!
//! Values come from built-in defaults, an optional TOML file and finally the
//! `NDN_CLIENT_PIB` / `NDN_CLIENT_TPM` environment variables.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
#[cfg(feature = "toml")]
use std::path::Path;
use std::path::PathBuf;

/// PIB scheme backed by SQLite.
pub const PIB_SQLITE3_SCHEME: &str = "pib-sqlite3";
/// PIB scheme kept in process memory.
pub const PIB_MEMORY_SCHEME: &str = "pib-memory";
/// TPM scheme storing one key file per private key.
pub const TPM_FILE_SCHEME: &str = "tpm-file";
/// TPM scheme kept in process memory.
pub const TPM_MEMORY_SCHEME: &str = "tpm-memory";
/// Platform keychain TPM; recognised but not supported.
pub const TPM_OSX_KEYCHAIN_SCHEME: &str = "tpm-osxkeychain";

/// Environment variable overriding the PIB locator.
pub const ENV_PIB_LOCATOR: &str = "NDN_CLIENT_PIB";
/// Environment variable overriding the TPM locator.
pub const ENV_TPM_LOCATOR: &str = "NDN_CLIENT_TPM";

/// A `scheme:location` pair naming a PIB or TPM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub scheme: String,
    pub location: String,
}

impl Locator {
    /// Split a locator string. A string without `:` is taken as a bare scheme.
    pub fn parse(locator: &str) -> Self {
        match locator.split_once(':') {
            Some((scheme, location)) => Self {
                scheme: scheme.to_string(),
                location: location.to_string(),
            },
            None => Self {
                scheme: locator.to_string(),
                location: String::new(),
            },
        }
    }

    /// Canonical `scheme:location` form.
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.scheme, self.location)
    }

    /// Location as a directory, falling back to `default_dir` when empty.
    pub fn directory_or(&self, default_dir: PathBuf) -> PathBuf {
        if self.location.is_empty() {
            default_dir
        } else {
            PathBuf::from(&self.location)
        }
    }
}

/// Algorithm and size used for newly generated keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyParamsConfig {
    /// `"rsa"` or `"ec"`
    pub algorithm: String,
    /// Key size in bits
    pub size: u32,
}

impl Default for KeyParamsConfig {
    fn default() -> Self {
        Self {
            algorithm: "rsa".to_string(),
            size: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyChainConfig {
    /// PIB locator, e.g. `pib-sqlite3:/home/alice/.ndn`
    pub pib: String,
    /// TPM locator, e.g. `tpm-file:/home/alice/.ndn/ndnsec-key-file`
    pub tpm: String,
    /// Parameters for keys created by identity creation
    pub default_key: KeyParamsConfig,
    /// Validity window of self-signed certificates, in days
    pub certificate_validity_days: u64,
}

impl Default for KeyChainConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl KeyChainConfig {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            pib: format!("{}:", PIB_SQLITE3_SCHEME),
            tpm: format!("{}:", TPM_FILE_SCHEME),
            default_key: KeyParamsConfig::default(),
            certificate_validity_days: 730,
        }
    }

    /// Configuration for a throwaway key chain that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            pib: format!("{}:", PIB_MEMORY_SCHEME),
            tpm: format!("{}:", TPM_MEMORY_SCHEME),
            ..Self::default_config()
        }
    }

    /// Apply `NDN_CLIENT_PIB` / `NDN_CLIENT_TPM` if they are set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(pib) = std::env::var(ENV_PIB_LOCATOR) {
            if !pib.is_empty() {
                self.pib = pib;
            }
        }
        if let Ok(tpm) = std::env::var(ENV_TPM_LOCATOR) {
            if !tpm.is_empty() {
                self.tpm = tpm;
            }
        }
        self
    }

    pub fn pib_locator(&self) -> Result<Locator> {
        let locator = Locator::parse(&self.pib);
        match locator.scheme.as_str() {
            "" => Ok(Locator::parse(&format!("{}:", PIB_SQLITE3_SCHEME))),
            PIB_SQLITE3_SCHEME | PIB_MEMORY_SCHEME => Ok(locator),
            other => Err(CoreError::Config(format!("unknown PIB scheme '{}'", other))),
        }
    }

    pub fn tpm_locator(&self) -> Result<Locator> {
        let locator = Locator::parse(&self.tpm);
        match locator.scheme.as_str() {
            "" => Ok(Locator::parse(&format!("{}:", TPM_FILE_SCHEME))),
            TPM_FILE_SCHEME | TPM_MEMORY_SCHEME => Ok(locator),
            TPM_OSX_KEYCHAIN_SCHEME => Err(CoreError::Config(
                "tpm-osxkeychain is not supported on this platform".to_string(),
            )),
            other => Err(CoreError::Config(format!("unknown TPM scheme '{}'", other))),
        }
    }
}

/// `$HOME/.ndn`, or `./.ndn` when no home directory is known.
pub fn default_ndn_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ndn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_parse() {
        let locator = Locator::parse("pib-sqlite3:/tmp/pib");
        assert_eq!(locator.scheme, "pib-sqlite3");
        assert_eq!(locator.location, "/tmp/pib");
        assert_eq!(locator.canonical(), "pib-sqlite3:/tmp/pib");

        let bare = Locator::parse("tpm-file");
        assert_eq!(bare.location, "");
        assert_eq!(bare.canonical(), "tpm-file:");
    }

    #[test]
    fn test_default_locators() {
        let config = KeyChainConfig::default_config();
        assert_eq!(config.pib_locator().unwrap().scheme, PIB_SQLITE3_SCHEME);
        assert_eq!(config.tpm_locator().unwrap().scheme, TPM_FILE_SCHEME);
        assert_eq!(config.certificate_validity_days, 730);
    }

    #[test]
    fn test_osx_keychain_is_fatal() {
        let config = KeyChainConfig {
            tpm: "tpm-osxkeychain:".to_string(),
            ..KeyChainConfig::default_config()
        };
        assert!(matches!(config.tpm_locator(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_unknown_pib_scheme() {
        let config = KeyChainConfig {
            pib: "pib-mysql:".to_string(),
            ..KeyChainConfig::default_config()
        };
        assert!(config.pib_locator().is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("keychain_{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "pib = \"pib-memory:\"\n[default_key]\nalgorithm = \"ec\"\nsize = 256\n",
        )
        .unwrap();

        let config = KeyChainConfig::from_file(&path).unwrap();
        assert_eq!(config.pib, "pib-memory:");
        assert_eq!(config.tpm, "tpm-file:");
        assert_eq!(config.default_key.algorithm, "ec");

        std::fs::remove_file(path).ok();
    }
}
