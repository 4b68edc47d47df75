//! Schema migrations for the device store.
//!
//! Each migration is guarded by the SQLite `user_version` pragma and applied
//! at open time, so every handle observes a fully migrated schema. A database
//! written by a newer build is refused rather than guessed at.

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Schema version this build expects. Bump together with a new migration
/// module whenever the schema changes.
const CURRENT_VERSION: u32 = 1;

/// Bring the connection's schema up to [`CURRENT_VERSION`], one step at a
/// time.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let mut version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{version} is newer than this build (v{CURRENT_VERSION})"
        )));
    }

    while version < CURRENT_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "applying schema migration");

        match next {
            1 => v001_initial::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?,
            _ => {
                return Err(StoreError::Migration(format!(
                    "no migration registered for schema v{next}"
                )))
            }
        }

        conn.pragma_update(None, "user_version", next)?;
        version = next;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_migrates_to_current_version() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("test.db")).unwrap();

        run_migrations(&conn).unwrap();
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);

        // A second run finds nothing to do.
        run_migrations(&conn).unwrap();
    }

    #[test]
    fn newer_schema_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("test.db")).unwrap();
        conn.pragma_update(None, "user_version", 99u32).unwrap();

        assert!(run_migrations(&conn).is_err());
    }
}
