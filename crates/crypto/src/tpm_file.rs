//! File-based TPM (`tpm-file:`).
//!
//! Each private key is stored as a PKCS#8 DER file inside the TPM directory.
//! The file name is the hex BLAKE3 hash of the key name's wire encoding, so
//! arbitrary binary key names map onto safe file names.

use crate::error::{TpmError, TpmResult};
use crate::key_params::{DigestAlgorithm, KeyParams, KeyType};
use crate::keys::PrivateKey;
use crate::tpm::Tpm;
use ndnsec_core::config::TPM_FILE_SCHEME;
use ndnsec_core::Name;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

const KEY_FILE_EXTENSION: &str = "privkey";

#[derive(Debug)]
pub struct TpmFile {
    dir: PathBuf,
    location: String,
}

impl TpmFile {
    /// Open (creating if needed) a key directory.
    pub fn open(dir: impl AsRef<Path>) -> TpmResult<Self> {
        let dir = dir.as_ref();
        Self::open_with_locator(dir.to_path_buf(), &dir.display().to_string())
    }

    /// Open a key directory and remember the location as written in the locator.
    pub(crate) fn open_with_locator(dir: PathBuf, location: &str) -> TpmResult<Self> {
        fs::create_dir_all(&dir)?;
        info!(path = %dir.display(), "File TPM ready");
        Ok(Self {
            dir,
            location: location.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key_name: &Name) -> PathBuf {
        let hash = blake3::hash(&key_name.wire_encode());
        self.dir
            .join(format!("{}.{}", hex::encode(hash.as_bytes()), KEY_FILE_EXTENSION))
    }

    fn load(&self, key_name: &Name) -> TpmResult<PrivateKey> {
        let der = match fs::read(self.key_path(key_name)) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TpmError::KeyNotFound {
                    key_name: key_name.to_uri(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        PrivateKey::from_pkcs8_der(&der)
    }

    fn store(&self, key_name: &Name, key: &PrivateKey) -> TpmResult<()> {
        let der = key.to_pkcs8_der()?;
        let path = self.key_path(key_name);

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(TpmError::KeyExists {
                    key_name: key_name.to_uri(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&der)?;
        file.sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o400))?;
        }

        Ok(())
    }
}

impl Tpm for TpmFile {
    fn locator(&self) -> String {
        format!("{}:{}", TPM_FILE_SCHEME, self.location)
    }

    fn has_key(&self, key_name: &Name) -> TpmResult<bool> {
        Ok(self.key_path(key_name).is_file())
    }

    fn generate_key_pair(&self, key_name: &Name, params: &KeyParams) -> TpmResult<Vec<u8>> {
        if self.has_key(key_name)? {
            return Err(TpmError::KeyExists {
                key_name: key_name.to_uri(),
            });
        }

        let key = PrivateKey::generate(params)?;
        self.store(key_name, &key)?;

        debug!(key = %key_name, key_type = %params.key_type(), "Generated key pair in file TPM");
        key.public_key_der()
    }

    fn delete_key_pair(&self, key_name: &Name) -> TpmResult<()> {
        match fs::remove_file(self.key_path(key_name)) {
            Ok(()) => {
                debug!(key = %key_name, "Deleted key file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn get_public_key(&self, key_name: &Name) -> TpmResult<Vec<u8>> {
        self.load(key_name)?.public_key_der()
    }

    fn get_key_type(&self, key_name: &Name) -> TpmResult<KeyType> {
        Ok(self.load(key_name)?.key_type())
    }

    fn sign(&self, data: &[u8], key_name: &Name, digest: DigestAlgorithm) -> TpmResult<Vec<u8>> {
        self.load(key_name)?.sign(data, digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::verify_signature;

    fn temp_tpm_dir() -> PathBuf {
        std::env::temp_dir().join(format!("tpm_file_{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_keys_survive_reopen() {
        let dir = temp_tpm_dir();
        let name = Name::from_uri("/alice/KSK-1").unwrap();

        let public = {
            let tpm = TpmFile::open(&dir).unwrap();
            tpm.generate_key_pair(&name, &KeyParams::ec()).unwrap()
        };

        let tpm = TpmFile::open(&dir).unwrap();
        assert!(tpm.has_key(&name).unwrap());
        assert_eq!(tpm.get_public_key(&name).unwrap(), public);

        let signature = tpm.sign(b"hello", &name, DigestAlgorithm::Sha256).unwrap();
        assert!(verify_signature(&public, b"hello", &signature).unwrap());

        // Cleanup
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_delete_and_missing_key() {
        let dir = temp_tpm_dir();
        let tpm = TpmFile::open(&dir).unwrap();
        let name = Name::from_uri("/bob/DSK-7").unwrap();

        tpm.generate_key_pair(&name, &KeyParams::ec()).unwrap();
        assert!(matches!(
            tpm.generate_key_pair(&name, &KeyParams::ec()),
            Err(TpmError::KeyExists { .. })
        ));

        tpm.delete_key_pair(&name).unwrap();
        tpm.delete_key_pair(&name).unwrap();
        assert!(matches!(
            tpm.get_key_type(&name),
            Err(TpmError::KeyNotFound { .. })
        ));

        // Cleanup
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_locator_reflects_location() {
        let dir = temp_tpm_dir();
        let tpm = TpmFile::open(&dir).unwrap();
        assert_eq!(tpm.locator(), format!("tpm-file:{}", dir.display()));

        // Cleanup
        fs::remove_dir_all(dir).ok();
    }
}
