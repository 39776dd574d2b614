//! Platform SQLite PIB.
//!
//! Hosts such as mobile runtimes own the database file and its location, so
//! this backend opens a caller-supplied file instead of a PIB directory. It
//! shares the schema and queries of [`super::PibSqlite3`] but binds every
//! parameter positionally as a raw byte buffer and steps rows by hand.

use super::sql::{SqlDriver, SqlPib};
use crate::error::{PibError, PibResult};
use ndnsec_core::config::PIB_SQLITE3_SCHEME;
use rusqlite::{Connection, OpenFlags, Statement};
use std::path::Path;
use tracing::info;

/// Positional raw-buffer binding.
#[derive(Debug)]
pub struct RawBindingDriver;

impl RawBindingDriver {
    fn bind(stmt: &mut Statement<'_>, params: &[&[u8]]) -> PibResult<()> {
        if stmt.parameter_count() != params.len() {
            return Err(PibError::Storage(format!(
                "statement expects {} parameters, got {}",
                stmt.parameter_count(),
                params.len()
            )));
        }
        for (index, param) in params.iter().enumerate() {
            stmt.raw_bind_parameter(index + 1, *param)?;
        }
        Ok(())
    }
}

impl SqlDriver for RawBindingDriver {
    fn execute(conn: &Connection, sql: &str, params: &[&[u8]]) -> PibResult<usize> {
        let mut stmt = conn.prepare(sql)?;
        Self::bind(&mut stmt, params)?;
        Ok(stmt.raw_execute()?)
    }

    fn query_blobs(conn: &Connection, sql: &str, params: &[&[u8]]) -> PibResult<Vec<Vec<u8>>> {
        let mut stmt = conn.prepare(sql)?;
        Self::bind(&mut stmt, params)?;

        let mut rows = stmt.raw_query();
        let mut blobs = Vec::new();
        while let Some(row) = rows.next()? {
            blobs.push(row.get::<_, Vec<u8>>(0)?);
        }
        Ok(blobs)
    }
}

/// PIB over a host-managed SQLite file.
pub type PibPlatformSqlite = SqlPib<RawBindingDriver>;

impl SqlPib<RawBindingDriver> {
    /// Open (creating if needed) the database file at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> PibResult<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        info!(path = %db_path.display(), "Platform SQLite PIB ready");
        Self::new(
            conn,
            format!("{}:{}", PIB_SQLITE3_SCHEME, db_path.display()),
        )
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

    #[test]
    fn test_platform_conformance() {
        conformance::run_all(&PibPlatformSqlite::open_in_memory().unwrap());
    }

    #[test]
    fn test_parameter_count_checked() {
        let pib = PibPlatformSqlite::open_in_memory().unwrap();
        let conn = pib.raw_connection();
        assert!(RawBindingDriver::execute(&conn, "DELETE FROM keys WHERE key_name=?", &[])
            .unwrap_err()
            .is_storage());
    }

    #[test]
    fn test_shares_file_format_with_sqlite3() {
        let dir = std::env::temp_dir().join(format!("pib_platform_{}", uuid::Uuid::new_v4()));
        let alice = Name::from_uri("/alice").unwrap();

        {
            let pib = crate::pib::PibSqlite3::open(&dir).unwrap();
            pib.add_identity(&alice).unwrap();
        }

        let pib = PibPlatformSqlite::open(dir.join("pib.db")).unwrap();
        assert!(pib.has_identity(&alice).unwrap());
        assert_eq!(pib.get_default_identity().unwrap(), alice);

        // Cleanup
        std::fs::remove_dir_all(dir).ok();
    }
}
