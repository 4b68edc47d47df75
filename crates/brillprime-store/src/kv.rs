//! Namespaced JSON key-value operations.
//!
//! Every key is prefixed with [`STORAGE_PREFIX`] before it reaches SQL, so
//! [`Store::clear`] can wipe this application's entries without touching
//! anything else that may share the device store.
//!
//! Read-side corruption (a stored value that no longer deserializes) is
//! treated as an absent key, not as a fatal error; write failures always
//! surface to the caller.

use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use brillprime_shared::constants::STORAGE_PREFIX;

use crate::database::{Database, Store};
use crate::error::Result;

fn namespaced(key: &str) -> String {
    format!("{STORAGE_PREFIX}{key}")
}

impl Database {
    /// Serialize `value` and write it under `key`, overwriting any existing
    /// entry.
    pub fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, ?3)",
            params![
                namespaced(key),
                json,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Read and deserialize the value stored under `key`.
    ///
    /// Returns `None` when the key was never set, or when the stored text no
    /// longer matches the expected shape.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let row: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![namespaced(key)],
                |row| row.get(0),
            )
            .optional()?;

        let Some(json) = row else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding corrupt stored value");
                Ok(None)
            }
        }
    }

    /// Delete the entry under `key`. Removing an absent key is not an error.
    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM kv_entries WHERE key = ?1",
            params![namespaced(key)],
        )?;
        Ok(())
    }

    /// Remove every entry under this application's namespace prefix.
    pub fn clear(&self) -> Result<()> {
        let removed = self.conn().execute(
            "DELETE FROM kv_entries WHERE key LIKE ?1",
            params![format!("{STORAGE_PREFIX}%")],
        )?;
        tracing::debug!(removed, "cleared application storage namespace");
        Ok(())
    }
}

impl Store {
    /// See [`Database::set_item`].
    pub fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.lock().set_item(key, value)
    }

    /// See [`Database::get_item`].
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.lock().get_item(key)
    }

    /// See [`Database::remove_item`].
    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.lock().remove_item(key)
    }

    /// See [`Database::clear`].
    pub fn clear(&self) -> Result<()> {
        self.lock().clear()
    }
}
