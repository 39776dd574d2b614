//! Durable SQLite PIB (`pib-sqlite3:<dir>`), stored in `<dir>/pib.db`.

use super::sql::{SqlDriver, SqlPib};
use crate::error::{PibError, PibResult};
use ndnsec_core::config::PIB_SQLITE3_SCHEME;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the database inside the PIB directory.
pub const PIB_DB_FILE: &str = "pib.db";

/// Binds parameters through rusqlite's statement cache.
#[derive(Debug)]
pub struct ConnectionDriver;

impl SqlDriver for ConnectionDriver {
    fn execute(conn: &Connection, sql: &str, params: &[&[u8]]) -> PibResult<usize> {
        let mut stmt = conn.prepare_cached(sql)?;
        Ok(stmt.execute(params_from_iter(params.iter()))?)
    }

    fn query_blobs(conn: &Connection, sql: &str, params: &[&[u8]]) -> PibResult<Vec<Vec<u8>>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// SQLite-backed PIB.
pub type PibSqlite3 = SqlPib<ConnectionDriver>;

impl SqlPib<ConnectionDriver> {
    /// Open (creating if needed) the PIB database in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> PibResult<Self> {
        let dir = dir.as_ref();
        Self::open_with_locator(dir.to_path_buf(), &dir.display().to_string())
    }

    pub(crate) fn open_with_locator(dir: PathBuf, location: &str) -> PibResult<Self> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| PibError::Storage(format!("{}: {}", dir.display(), e)))?;
        let path = dir.join(PIB_DB_FILE);

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        info!(path = %path.display(), "SQLite PIB ready");
        Self::new(conn, format!("{}:{}", PIB_SQLITE3_SCHEME, location))
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> PibResult<Self> {
        Self::new(
            Connection::open_in_memory()?,
            format!("{}::memory:", PIB_SQLITE3_SCHEME),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pib::{conformance, PibImpl};
    use ndnsec_core::Name;

    fn temp_pib_dir() -> PathBuf {
        std::env::temp_dir().join(format!("pib_sqlite3_{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_sqlite3_conformance() {
        conformance::run_all(&PibSqlite3::open_in_memory().unwrap());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = temp_pib_dir();
        let alice = Name::from_uri("/alice").unwrap();
        let key = Name::from_uri("/alice/KSK-1").unwrap();

        {
            let pib = PibSqlite3::open(&dir).unwrap();
            pib.add_key(&alice, &key, b"bits").unwrap();
            pib.set_tpm_locator("tpm-file:/keys").unwrap();
        }

        let pib = PibSqlite3::open(&dir).unwrap();
        assert_eq!(pib.get_default_identity().unwrap(), alice);
        assert_eq!(pib.get_default_key_of_identity(&alice).unwrap(), key);
        assert_eq!(pib.get_key_bits(&key).unwrap(), b"bits");
        assert_eq!(pib.get_tpm_locator().unwrap(), "tpm-file:/keys");
        assert_eq!(pib.locator(), format!("pib-sqlite3:{}", dir.display()));

        // Cleanup
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_corrupt_certificate_is_storage_error() {
        let pib = PibSqlite3::open_in_memory().unwrap();
        let key = Name::from_uri("/alice/KSK-1").unwrap();
        pib.add_key(&Name::from_uri("/alice").unwrap(), &key, b"bits")
            .unwrap();

        let cert_name = Name::from_uri("/alice/KEY/KSK-1/ID-CERT/%FD%01").unwrap();
        {
            let conn = pib.raw_connection();
            ConnectionDriver::execute(
                &conn,
                "INSERT INTO certificates (key_id, certificate_name, certificate_data) \
                 VALUES ((SELECT id FROM keys WHERE key_name=?), ?, ?)",
                &[&key.wire_encode(), &cert_name.wire_encode(), b"garbage"],
            )
            .unwrap();
        }

        assert!(pib.get_certificate(&cert_name).unwrap_err().is_storage());
    }
}
