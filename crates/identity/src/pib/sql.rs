//! Shared SQL schema, query templates and backend logic.
//!
//! [`SqlPib`] implements [`PibImpl`] once over a [`SqlDriver`], which only
//! decides how parameters are bound and rows are read. Names are stored in
//! their TLV wire form; every query binds blobs and returns a single blob
//! column.

use super::{check_certificate_parent, check_key_parent, PibImpl};
use crate::certificate::Certificate;
use crate::error::{EntityKind, PibError, PibResult};
use crate::naming::extract_identity_from_key_name;
use ndnsec_core::Name;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tpmInfo (
    tpm_locator BLOB
);

CREATE TABLE IF NOT EXISTS identities (
    id INTEGER PRIMARY KEY,
    identity BLOB NOT NULL,
    is_default INTEGER DEFAULT 0
);
CREATE UNIQUE INDEX IF NOT EXISTS identityIndex ON identities(identity);

CREATE TABLE IF NOT EXISTS keys (
    id INTEGER PRIMARY KEY,
    identity_id INTEGER NOT NULL,
    key_name BLOB NOT NULL,
    key_bits BLOB NOT NULL,
    is_default INTEGER DEFAULT 0,
    FOREIGN KEY(identity_id) REFERENCES identities(id)
        ON DELETE CASCADE ON UPDATE CASCADE
);
CREATE UNIQUE INDEX IF NOT EXISTS keyIndex ON keys(key_name);

CREATE TABLE IF NOT EXISTS certificates (
    id INTEGER PRIMARY KEY,
    key_id INTEGER NOT NULL,
    certificate_name BLOB NOT NULL,
    certificate_data BLOB NOT NULL,
    is_default INTEGER DEFAULT 0,
    FOREIGN KEY(key_id) REFERENCES keys(id)
        ON DELETE CASCADE ON UPDATE CASCADE
);
CREATE UNIQUE INDEX IF NOT EXISTS certIndex ON certificates(certificate_name);
";

/// Query templates shared by every driver.
mod query {
    pub const GET_TPM_LOCATOR: &str = "SELECT tpm_locator FROM tpmInfo";
    pub const DELETE_TPM_LOCATOR: &str = "DELETE FROM tpmInfo";
    pub const INSERT_TPM_LOCATOR: &str = "INSERT INTO tpmInfo (tpm_locator) VALUES (?)";

    pub const HAS_IDENTITY: &str = "SELECT identity FROM identities WHERE identity=?";
    pub const INSERT_IDENTITY: &str = "INSERT INTO identities (identity) VALUES (?)";
    pub const DELETE_IDENTITY_CERTIFICATES: &str = "DELETE FROM certificates WHERE key_id IN \
         (SELECT keys.id FROM keys JOIN identities ON keys.identity_id=identities.id \
          WHERE identities.identity=?)";
    pub const DELETE_IDENTITY_KEYS: &str = "DELETE FROM keys WHERE identity_id IN \
         (SELECT id FROM identities WHERE identity=?)";
    pub const DELETE_IDENTITY: &str = "DELETE FROM identities WHERE identity=?";
    pub const DELETE_ALL_CERTIFICATES: &str = "DELETE FROM certificates";
    pub const DELETE_ALL_KEYS: &str = "DELETE FROM keys";
    pub const DELETE_ALL_IDENTITIES: &str = "DELETE FROM identities";
    pub const GET_IDENTITIES: &str = "SELECT identity FROM identities";
    pub const GET_DEFAULT_IDENTITY: &str = "SELECT identity FROM identities WHERE is_default=1";
    pub const RESET_DEFAULT_IDENTITY: &str =
        "UPDATE identities SET is_default=0 WHERE is_default=1";
    pub const SET_DEFAULT_IDENTITY: &str = "UPDATE identities SET is_default=1 WHERE identity=?";

    pub const HAS_KEY: &str = "SELECT key_name FROM keys WHERE key_name=?";
    pub const INSERT_KEY: &str = "INSERT INTO keys (identity_id, key_name, key_bits) \
         VALUES ((SELECT id FROM identities WHERE identity=?), ?, ?)";
    pub const UPDATE_KEY_BITS: &str = "UPDATE keys SET key_bits=? WHERE key_name=?";
    pub const DELETE_KEY_CERTIFICATES: &str = "DELETE FROM certificates WHERE key_id IN \
         (SELECT id FROM keys WHERE key_name=?)";
    pub const DELETE_KEY: &str = "DELETE FROM keys WHERE key_name=?";
    pub const GET_KEY_BITS: &str = "SELECT key_bits FROM keys WHERE key_name=?";
    pub const GET_KEYS_OF_IDENTITY: &str = "SELECT keys.key_name FROM keys \
         JOIN identities ON keys.identity_id=identities.id WHERE identities.identity=?";
    pub const GET_DEFAULT_KEY_OF_IDENTITY: &str = "SELECT keys.key_name FROM keys \
         JOIN identities ON keys.identity_id=identities.id \
         WHERE identities.identity=? AND keys.is_default=1";
    pub const RESET_DEFAULT_KEY_OF_IDENTITY: &str = "UPDATE keys SET is_default=0 \
         WHERE is_default=1 AND identity_id=(SELECT id FROM identities WHERE identity=?)";
    pub const SET_DEFAULT_KEY: &str = "UPDATE keys SET is_default=1 WHERE key_name=?";

    pub const HAS_CERTIFICATE: &str =
        "SELECT certificate_name FROM certificates WHERE certificate_name=?";
    pub const INSERT_CERTIFICATE: &str = "INSERT INTO certificates \
         (key_id, certificate_name, certificate_data) \
         VALUES ((SELECT id FROM keys WHERE key_name=?), ?, ?)";
    pub const UPDATE_CERTIFICATE_DATA: &str =
        "UPDATE certificates SET certificate_data=? WHERE certificate_name=?";
    pub const DELETE_CERTIFICATE: &str = "DELETE FROM certificates WHERE certificate_name=?";
    pub const GET_CERTIFICATE: &str =
        "SELECT certificate_data FROM certificates WHERE certificate_name=?";
    pub const GET_CERTIFICATES_OF_KEY: &str = "SELECT certificates.certificate_name \
         FROM certificates JOIN keys ON certificates.key_id=keys.id WHERE keys.key_name=?";
    pub const GET_DEFAULT_CERTIFICATE_OF_KEY: &str = "SELECT certificates.certificate_data \
         FROM certificates JOIN keys ON certificates.key_id=keys.id \
         WHERE keys.key_name=? AND certificates.is_default=1";
    pub const RESET_DEFAULT_CERTIFICATE_OF_KEY: &str = "UPDATE certificates SET is_default=0 \
         WHERE is_default=1 AND key_id=(SELECT id FROM keys WHERE key_name=?)";
    pub const SET_DEFAULT_CERTIFICATE: &str =
        "UPDATE certificates SET is_default=1 WHERE certificate_name=?";
}

/// How a backend binds parameters and reads rows.
pub trait SqlDriver: Send + Sync + 'static {
    /// Run a statement, returning the number of changed rows.
    fn execute(conn: &Connection, sql: &str, params: &[&[u8]]) -> PibResult<usize>;

    /// Run a query selecting one blob column.
    fn query_blobs(conn: &Connection, sql: &str, params: &[&[u8]]) -> PibResult<Vec<Vec<u8>>>;
}

/// Enable foreign keys and create the schema.
pub(crate) fn init_connection(conn: &Connection) -> PibResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn decode_name(bytes: &[u8]) -> PibResult<Name> {
    Name::wire_decode(bytes).map_err(|e| PibError::corrupt("name", e))
}

fn decode_certificate(bytes: &[u8]) -> PibResult<Certificate> {
    Certificate::wire_decode(bytes).map_err(|e| PibError::corrupt("certificate", e))
}

/// A [`PibImpl`] over one SQLite connection.
pub struct SqlPib<D: SqlDriver> {
    conn: Mutex<Connection>,
    locator: String,
    driver: PhantomData<fn() -> D>,
}

impl<D: SqlDriver> std::fmt::Debug for SqlPib<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlPib")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

impl<D: SqlDriver> SqlPib<D> {
    pub(crate) fn new(conn: Connection, locator: String) -> PibResult<Self> {
        init_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            locator,
            driver: PhantomData,
        })
    }

    fn lock(&self) -> PibResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PibError::Storage(format!("PIB connection lock poisoned: {}", e)))
    }

    #[cfg(test)]
    pub(crate) fn raw_connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Run read-only statements.
    fn read<T>(&self, f: impl FnOnce(&Connection) -> PibResult<T>) -> PibResult<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run statements in one transaction; nothing is kept if any fails.
    fn write<T>(&self, f: impl FnOnce(&Connection) -> PibResult<T>) -> PibResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn exists(conn: &Connection, sql: &str, name: &Name) -> PibResult<bool> {
        let blob = name.wire_encode();
        Ok(!D::query_blobs(conn, sql, &[blob.as_slice()])?.is_empty())
    }

    fn names(conn: &Connection, sql: &str, params: &[&[u8]]) -> PibResult<BTreeSet<Name>> {
        D::query_blobs(conn, sql, params)?
            .iter()
            .map(|bytes| decode_name(bytes))
            .collect()
    }

    fn first(conn: &Connection, sql: &str, params: &[&[u8]]) -> PibResult<Option<Vec<u8>>> {
        Ok(D::query_blobs(conn, sql, params)?.into_iter().next())
    }

    fn ensure_identity(conn: &Connection, identity: &Name) -> PibResult<()> {
        let blob = identity.wire_encode();
        if !Self::exists(conn, query::HAS_IDENTITY, identity)? {
            D::execute(conn, query::INSERT_IDENTITY, &[&blob])?;
        }
        if Self::first(conn, query::GET_DEFAULT_IDENTITY, &[])?.is_none() {
            D::execute(conn, query::SET_DEFAULT_IDENTITY, &[&blob])?;
        }
        Ok(())
    }

    fn ensure_key(
        conn: &Connection,
        identity: &Name,
        key_name: &Name,
        key_bits: &[u8],
    ) -> PibResult<()> {
        Self::ensure_identity(conn, identity)?;

        let identity_blob = identity.wire_encode();
        let key_blob = key_name.wire_encode();
        if Self::exists(conn, query::HAS_KEY, key_name)? {
            D::execute(conn, query::UPDATE_KEY_BITS, &[key_bits, &key_blob])?;
        } else {
            D::execute(conn, query::INSERT_KEY, &[&identity_blob, &key_blob, key_bits])?;
        }

        if Self::first(conn, query::GET_DEFAULT_KEY_OF_IDENTITY, &[&identity_blob])?.is_none() {
            D::execute(conn, query::SET_DEFAULT_KEY, &[&key_blob])?;
        }
        Ok(())
    }
}

impl<D: SqlDriver> PibImpl for SqlPib<D> {
    fn locator(&self) -> String {
        self.locator.clone()
    }

    fn set_tpm_locator(&self, tpm_locator: &str) -> PibResult<()> {
        self.write(|conn| {
            D::execute(conn, query::DELETE_TPM_LOCATOR, &[])?;
            D::execute(conn, query::INSERT_TPM_LOCATOR, &[tpm_locator.as_bytes()])?;
            Ok(())
        })?;
        debug!(tpm = tpm_locator, "Recorded TPM locator");
        Ok(())
    }

    fn get_tpm_locator(&self) -> PibResult<String> {
        match self.read(|conn| Self::first(conn, query::GET_TPM_LOCATOR, &[]))? {
            Some(bytes) => String::from_utf8(bytes).map_err(|e| PibError::corrupt("TPM locator", e)),
            None => Ok(String::new()),
        }
    }

    fn has_identity(&self, identity: &Name) -> PibResult<bool> {
        self.read(|conn| Self::exists(conn, query::HAS_IDENTITY, identity))
    }

    fn add_identity(&self, identity: &Name) -> PibResult<()> {
        self.write(|conn| Self::ensure_identity(conn, identity))?;
        debug!(identity = %identity, "Added identity");
        Ok(())
    }

    fn remove_identity(&self, identity: &Name) -> PibResult<()> {
        let blob = identity.wire_encode();
        self.write(|conn| {
            D::execute(conn, query::DELETE_IDENTITY_CERTIFICATES, &[&blob])?;
            D::execute(conn, query::DELETE_IDENTITY_KEYS, &[&blob])?;
            D::execute(conn, query::DELETE_IDENTITY, &[&blob])?;
            Ok(())
        })?;
        debug!(identity = %identity, "Removed identity");
        Ok(())
    }

    fn clear_identities(&self) -> PibResult<()> {
        self.write(|conn| {
            D::execute(conn, query::DELETE_ALL_CERTIFICATES, &[])?;
            D::execute(conn, query::DELETE_ALL_KEYS, &[])?;
            D::execute(conn, query::DELETE_ALL_IDENTITIES, &[])?;
            Ok(())
        })?;
        debug!("Cleared all identities");
        Ok(())
    }

    fn get_identities(&self) -> PibResult<BTreeSet<Name>> {
        self.read(|conn| Self::names(conn, query::GET_IDENTITIES, &[]))
    }

    fn set_default_identity(&self, identity: &Name) -> PibResult<()> {
        let blob = identity.wire_encode();
        self.write(|conn| {
            if !Self::exists(conn, query::HAS_IDENTITY, identity)? {
                D::execute(conn, query::INSERT_IDENTITY, &[&blob])?;
            }
            D::execute(conn, query::RESET_DEFAULT_IDENTITY, &[])?;
            D::execute(conn, query::SET_DEFAULT_IDENTITY, &[&blob])?;
            Ok(())
        })?;
        debug!(identity = %identity, "Set default identity");
        Ok(())
    }

    fn get_default_identity(&self) -> PibResult<Name> {
        match self.read(|conn| Self::first(conn, query::GET_DEFAULT_IDENTITY, &[]))? {
            Some(bytes) => decode_name(&bytes),
            None => Err(PibError::not_found(EntityKind::DefaultIdentity, &Name::new())),
        }
    }

    fn has_key(&self, key_name: &Name) -> PibResult<bool> {
        self.read(|conn| Self::exists(conn, query::HAS_KEY, key_name))
    }

    fn add_key(&self, identity: &Name, key_name: &Name, key_bits: &[u8]) -> PibResult<()> {
        check_key_parent(identity, key_name)?;
        self.write(|conn| Self::ensure_key(conn, identity, key_name, key_bits))?;
        debug!(identity = %identity, key = %key_name, "Added key");
        Ok(())
    }

    fn remove_key(&self, key_name: &Name) -> PibResult<()> {
        let blob = key_name.wire_encode();
        self.write(|conn| {
            D::execute(conn, query::DELETE_KEY_CERTIFICATES, &[&blob])?;
            D::execute(conn, query::DELETE_KEY, &[&blob])?;
            Ok(())
        })?;
        debug!(key = %key_name, "Removed key");
        Ok(())
    }

    fn get_key_bits(&self, key_name: &Name) -> PibResult<Vec<u8>> {
        let blob = key_name.wire_encode();
        self.read(|conn| Self::first(conn, query::GET_KEY_BITS, &[&blob]))?
            .ok_or_else(|| PibError::not_found(EntityKind::Key, key_name))
    }

    fn get_keys_of_identity(&self, identity: &Name) -> PibResult<BTreeSet<Name>> {
        let blob = identity.wire_encode();
        self.read(|conn| Self::names(conn, query::GET_KEYS_OF_IDENTITY, &[&blob]))
    }

    fn set_default_key_of_identity(&self, identity: &Name, key_name: &Name) -> PibResult<()> {
        check_key_parent(identity, key_name)?;
        let identity_blob = identity.wire_encode();
        let key_blob = key_name.wire_encode();
        self.write(|conn| {
            if !Self::exists(conn, query::HAS_KEY, key_name)? {
                return Err(PibError::not_found(EntityKind::Key, key_name));
            }
            D::execute(conn, query::RESET_DEFAULT_KEY_OF_IDENTITY, &[&identity_blob])?;
            D::execute(conn, query::SET_DEFAULT_KEY, &[&key_blob])?;
            Ok(())
        })?;
        debug!(identity = %identity, key = %key_name, "Set default key");
        Ok(())
    }

    fn get_default_key_of_identity(&self, identity: &Name) -> PibResult<Name> {
        let blob = identity.wire_encode();
        let default = self.read(|conn| {
            if !Self::exists(conn, query::HAS_IDENTITY, identity)? {
                return Err(PibError::not_found(EntityKind::Identity, identity));
            }
            Self::first(conn, query::GET_DEFAULT_KEY_OF_IDENTITY, &[&blob])
        })?;
        match default {
            Some(bytes) => decode_name(&bytes),
            None => Err(PibError::not_found(EntityKind::DefaultKey, identity)),
        }
    }

    fn has_certificate(&self, cert_name: &Name) -> PibResult<bool> {
        self.read(|conn| Self::exists(conn, query::HAS_CERTIFICATE, cert_name))
    }

    fn add_certificate(&self, certificate: &Certificate) -> PibResult<()> {
        let key_name = certificate.key_name()?;
        let identity = extract_identity_from_key_name(&key_name);
        let key_blob = key_name.wire_encode();
        let cert_blob = certificate.name().wire_encode();
        let data = certificate
            .wire_encode()
            .map_err(|e| PibError::Storage(format!("cannot encode certificate: {}", e)))?;

        self.write(|conn| {
            Self::ensure_key(conn, &identity, &key_name, certificate.public_key())?;

            if Self::exists(conn, query::HAS_CERTIFICATE, certificate.name())? {
                D::execute(conn, query::UPDATE_CERTIFICATE_DATA, &[&data, &cert_blob])?;
            } else {
                D::execute(conn, query::INSERT_CERTIFICATE, &[&key_blob, &cert_blob, &data])?;
            }

            if Self::first(conn, query::GET_DEFAULT_CERTIFICATE_OF_KEY, &[&key_blob])?.is_none() {
                D::execute(conn, query::SET_DEFAULT_CERTIFICATE, &[&cert_blob])?;
            }
            Ok(())
        })?;
        debug!(key = %key_name, certificate = %certificate.name(), "Added certificate");
        Ok(())
    }

    fn remove_certificate(&self, cert_name: &Name) -> PibResult<()> {
        let blob = cert_name.wire_encode();
        self.write(|conn| D::execute(conn, query::DELETE_CERTIFICATE, &[&blob]))?;
        debug!(certificate = %cert_name, "Removed certificate");
        Ok(())
    }

    fn get_certificate(&self, cert_name: &Name) -> PibResult<Certificate> {
        let blob = cert_name.wire_encode();
        match self.read(|conn| Self::first(conn, query::GET_CERTIFICATE, &[&blob]))? {
            Some(bytes) => decode_certificate(&bytes),
            None => Err(PibError::not_found(EntityKind::Certificate, cert_name)),
        }
    }

    fn get_certificates_of_key(&self, key_name: &Name) -> PibResult<BTreeSet<Name>> {
        let blob = key_name.wire_encode();
        self.read(|conn| Self::names(conn, query::GET_CERTIFICATES_OF_KEY, &[&blob]))
    }

    fn set_default_certificate_of_key(
        &self,
        key_name: &Name,
        cert_name: &Name,
    ) -> PibResult<()> {
        check_certificate_parent(key_name, cert_name)?;
        let key_blob = key_name.wire_encode();
        let cert_blob = cert_name.wire_encode();
        self.write(|conn| {
            if !Self::exists(conn, query::HAS_CERTIFICATE, cert_name)? {
                return Err(PibError::not_found(EntityKind::Certificate, cert_name));
            }
            D::execute(conn, query::RESET_DEFAULT_CERTIFICATE_OF_KEY, &[&key_blob])?;
            D::execute(conn, query::SET_DEFAULT_CERTIFICATE, &[&cert_blob])?;
            Ok(())
        })?;
        debug!(key = %key_name, certificate = %cert_name, "Set default certificate");
        Ok(())
    }

    fn get_default_certificate_of_key(&self, key_name: &Name) -> PibResult<Certificate> {
        let blob = key_name.wire_encode();
        let default = self.read(|conn| {
            if !Self::exists(conn, query::HAS_KEY, key_name)? {
                return Err(PibError::not_found(EntityKind::Key, key_name));
            }
            Self::first(conn, query::GET_DEFAULT_CERTIFICATE_OF_KEY, &[&blob])
        })?;
        match default {
            Some(bytes) => decode_certificate(&bytes),
            None => Err(PibError::not_found(EntityKind::DefaultCertificate, key_name)),
        }
    }
}
