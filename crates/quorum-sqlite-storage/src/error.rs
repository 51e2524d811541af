//! Errors raised while opening a queue database

/// Failure to open or migrate the database
///
/// Once open, every operation reports through
/// [`StorageError`](quorum_storage_traits::StorageError) instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection could not be opened or configured
    #[error("cannot open queue database: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A schema migration failed; the file is left at its previous version
    #[error("queue database migration failed: {0}")]
    Migration(#[from] refinery::Error),
}
