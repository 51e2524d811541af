//! SQLite-based storage implementation for Quorum.
//!
//! This crate implements the [`QuorumStorageProvider`] trait on top of a single SQLite
//! connection. It is the durable backend: the action queue, session records and the
//! replicated space log survive process restarts.
//!
//! The schema is managed by embedded `refinery` migrations that run when the storage is
//! opened.
//!
//! ```no_run
//! use quorum_sqlite_storage::QuorumSqliteStorage;
//!
//! let storage = QuorumSqliteStorage::new("/path/to/quorum.sqlite")?;
//! # Ok::<(), quorum_sqlite_storage::error::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use quorum_storage_traits::{Backend, QuorumStorageProvider, StorageError};
use rusqlite::Connection;

mod db;
mod encryption;
pub mod error;
mod messages;
mod migrations;
mod queue;
mod spaces;
mod user_config;

use self::error::Error;

/// A SQLite-based storage implementation for Quorum.
///
/// All record families share one connection, so a multi-statement operation such as
/// the dedupe-aware enqueue runs in a single transaction.
pub struct QuorumSqliteStorage {
    connection: Arc<Mutex<Connection>>,
}

impl QuorumSqliteStorage {
    /// Opens (or creates) the database at `file_path` and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or a migration fails.
    pub fn new<P>(file_path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let connection = Connection::open(file_path)?;
        Self::from_connection(connection)
    }

    /// Creates a storage backed by a private in-memory database.
    pub fn new_in_memory() -> Result<Self, Error> {
        let connection = Connection::open_in_memory()?;
        Self::from_connection(connection)
    }

    fn from_connection(mut connection: Connection) -> Result<Self, Error> {
        connection.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;

        migrations::run_migrations(&mut connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub(crate) fn with_connection<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&Connection) -> T,
    {
        let conn = self.connection.lock();
        f(&conn)
    }
}

impl fmt::Debug for QuorumSqliteStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuorumSqliteStorage").finish_non_exhaustive()
    }
}

impl QuorumStorageProvider for QuorumSqliteStorage {
    fn backend(&self) -> Backend {
        Backend::SQLite
    }
}

#[inline]
pub(crate) fn into_storage_err<T>(e: T) -> StorageError
where
    T: std::error::Error,
{
    StorageError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use quorum_storage_traits::SpaceId;
    use quorum_storage_traits::spaces::SpaceStorage;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_new_in_memory() {
        let storage = QuorumSqliteStorage::new_in_memory().unwrap();
        assert_eq!(storage.backend(), Backend::SQLite);
        assert!(storage.backend().is_persistent());
    }

    #[test]
    fn test_file_database_is_created_and_migrated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quorum.sqlite");

        let storage = QuorumSqliteStorage::new(&path).unwrap();
        assert!(path.exists());
        assert!(storage.find_space(&SpaceId::new("none")).unwrap().is_none());

        // Re-opening must not re-apply migrations
        drop(storage);
        let storage = QuorumSqliteStorage::new(&path).unwrap();
        let applied: i64 = storage.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM _refinery_schema_history_quorum",
                [],
                |row| row.get(0),
            )
            .unwrap()
        });
        assert_eq!(applied, 1);
    }
}
