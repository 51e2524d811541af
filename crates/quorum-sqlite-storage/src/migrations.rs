//! Embedded schema migrations

use rusqlite::Connection;

use crate::error::Error;

refinery::embed_migrations!("migrations");

/// Kept apart from refinery's default so a host can share the file with its own schema
const HISTORY_TABLE: &str = "_refinery_schema_history_quorum";

/// Bring the schema up to date. Already-applied versions are skipped.
pub fn run_migrations(conn: &mut Connection) -> Result<(), Error> {
    let report = migrations::runner()
        .set_migration_table_name(HISTORY_TABLE)
        .run(conn)?;

    for migration in report.applied_migrations() {
        tracing::info!(
            target: "quorum_sqlite_storage::migrations",
            name = migration.name(),
            version = migration.version(),
            "Applied migration"
        );
    }

    Ok(())
}
