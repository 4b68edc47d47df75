//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. Most callers hold a
//! [`Store`], the clonable thread-safe handle shared across the client
//! layers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/brillprime/brillprime.db`
    /// - macOS:   `~/Library/Application Support/com.brillprime.brillprime/brillprime.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\brillprime\brillprime\data\brillprime.db`
    pub fn open_default() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "brillprime", "brillprime").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("brillprime.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    ///
    /// This is useful for tests and for embedding the store inside custom
    /// directory layouts.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Recommended SQLite settings.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // Run schema migrations.
        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    ///
    /// Callers should prefer the typed key-value helpers, but direct access
    /// is occasionally needed for ad-hoc queries.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}

/// Cheap clonable, thread-safe handle sharing one [`Database`].
///
/// Every operation takes the inner lock for the duration of a single
/// read-modify-write, so concurrent callers never observe a half-applied
/// update. The lock is never held across an `.await`.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<Database>>,
}

impl Store {
    /// Open the default application database. See [`Database::open_default`].
    pub fn open_default() -> Result<Self> {
        Ok(Self::from_database(Database::open_default()?))
    }

    /// Open a database at an explicit path. See [`Database::open_at`].
    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::from_database(Database::open_at(path)?))
    }

    /// Wrap an already opened [`Database`].
    pub fn from_database(database: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(database)),
        }
    }

    /// Lock the inner database. A poisoned lock is recovered rather than
    /// propagated; the database itself is consistent after a panicking
    /// writer because every helper issues single-statement updates.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Database> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
    }

    #[test]
    fn store_clones_share_one_database() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_at(&dir.path().join("test.db")).expect("should open");
        let clone = store.clone();

        store.set_item("probe", &42u32).unwrap();
        let read: Option<u32> = clone.get_item("probe").unwrap();
        assert_eq!(read, Some(42));
    }
}
