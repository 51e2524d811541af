//! Implementation of ActionQueueStorage trait for SQLite storage.

use quorum_storage_traits::queue::ActionQueueStorage;
use quorum_storage_traits::queue::types::{
    Action, ActionStatus, EnqueueOutcome, NewAction, QueueStats,
};
use quorum_storage_traits::{ActionId, StorageError, Timestamp};
use rusqlite::{Connection, OptionalExtension, params};

use crate::db::to_sql_millis;
use crate::{QuorumSqliteStorage, db, into_storage_err};

fn find_action_by_id(conn: &Connection, id: &ActionId) -> Result<Option<Action>, StorageError> {
    let mut stmt = conn
        .prepare("SELECT * FROM action_queue WHERE id = ?")
        .map_err(into_storage_err)?;

    stmt.query_row(params![id.to_string()], db::row_to_action)
        .optional()
        .map_err(into_storage_err)
}

fn not_found(id: &ActionId) -> StorageError {
    StorageError::ActionNotFound(*id)
}

impl ActionQueueStorage for QuorumSqliteStorage {
    fn enqueue_action(&self, new: NewAction) -> Result<EnqueueOutcome, StorageError> {
        let context_json = serde_json::to_string(&new.context)
            .map_err(|e| StorageError::Serialization(format!("action context: {e}")))?;
        let enqueued_at = to_sql_millis(new.enqueued_at);

        self.with_connection(|conn| {
            let tx = conn.unchecked_transaction().map_err(into_storage_err)?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM action_queue
                     WHERE dedupe_key = ? AND status = 'pending'
                     ORDER BY seq LIMIT 1",
                    params![&new.dedupe_key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(into_storage_err)?;

            let (id, replaced) = match existing {
                Some(existing_id) => {
                    tx.execute(
                        "UPDATE action_queue
                         SET context = ?, attempts = 0, last_error = NULL, next_attempt_at = ?
                         WHERE id = ?",
                        params![&context_json, enqueued_at, &existing_id],
                    )
                    .map_err(into_storage_err)?;
                    let id = existing_id
                        .parse::<ActionId>()
                        .map_err(|e| StorageError::Deserialization(e.to_string()))?;
                    (id, true)
                }
                None => {
                    tx.execute(
                        "INSERT INTO action_queue
                         (id, action_type, dedupe_key, context, status, attempts,
                          enqueued_at, next_attempt_at)
                         VALUES (?, ?, ?, ?, 'pending', 0, ?, ?)",
                        params![
                            new.id.to_string(),
                            new.context.action_type().as_str(),
                            &new.dedupe_key,
                            &context_json,
                            enqueued_at,
                            enqueued_at,
                        ],
                    )
                    .map_err(into_storage_err)?;
                    (new.id, false)
                }
            };

            let action = find_action_by_id(&tx, &id)?.ok_or_else(|| not_found(&id))?;
            tx.commit().map_err(into_storage_err)?;

            if replaced {
                Ok(EnqueueOutcome::Replaced(action))
            } else {
                Ok(EnqueueOutcome::Inserted(action))
            }
        })
    }

    fn find_action(&self, id: &ActionId) -> Result<Option<Action>, StorageError> {
        self.with_connection(|conn| find_action_by_id(conn, id))
    }

    fn pending_actions(&self) -> Result<Vec<Action>, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM action_queue
                     WHERE status IN ('pending', 'processing') ORDER BY seq",
                )
                .map_err(into_storage_err)?;

            let rows = stmt
                .query_map([], db::row_to_action)
                .map_err(into_storage_err)?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(into_storage_err)
        })
    }

    fn actions_by_status(
        &self,
        status: ActionStatus,
        limit: usize,
    ) -> Result<Vec<Action>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM action_queue WHERE status = ? ORDER BY seq LIMIT ?")
                .map_err(into_storage_err)?;

            let rows = stmt
                .query_map(params![status.as_str(), limit], db::row_to_action)
                .map_err(into_storage_err)?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(into_storage_err)
        })
    }

    fn update_action(&self, action: &Action) -> Result<(), StorageError> {
        self.with_connection(|conn| {
            let updated = conn
                .execute(
                    "UPDATE action_queue
                     SET status = ?, attempts = ?, last_attempt_at = ?, next_attempt_at = ?,
                         last_error = ?, processed_at = ?
                     WHERE id = ?",
                    params![
                        action.status.as_str(),
                        action.attempts,
                        action.last_attempt_at.map(to_sql_millis),
                        to_sql_millis(action.next_attempt_at),
                        &action.last_error,
                        action.processed_at.map(to_sql_millis),
                        action.id.to_string(),
                    ],
                )
                .map_err(into_storage_err)?;

            if updated == 0 {
                return Err(not_found(&action.id));
            }
            Ok(())
        })
    }

    fn delete_action(&self, id: &ActionId) -> Result<bool, StorageError> {
        self.with_connection(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM action_queue WHERE id = ?",
                    params![id.to_string()],
                )
                .map_err(into_storage_err)?;
            Ok(removed > 0)
        })
    }

    fn reset_processing_actions(&self) -> Result<usize, StorageError> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE action_queue SET status = 'pending' WHERE status = 'processing'",
                [],
            )
            .map_err(into_storage_err)
        })
    }

    fn queue_stats(&self) -> Result<QueueStats, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT status, COUNT(*) FROM action_queue GROUP BY status")
                .map_err(into_storage_err)?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .map_err(into_storage_err)?;

            let mut stats = QueueStats::default();
            for row in rows {
                let (status, count) = row.map_err(into_storage_err)?;
                let count = usize::try_from(count).unwrap_or_default();
                match status.parse::<ActionStatus>()? {
                    ActionStatus::Pending => stats.pending = count,
                    ActionStatus::Processing => stats.processing = count,
                    ActionStatus::Failed => stats.failed = count,
                }
            }
            Ok(stats)
        })
    }

    fn prune_failed_actions(&self, before: Timestamp) -> Result<usize, StorageError> {
        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM action_queue
                 WHERE status = 'failed' AND COALESCE(processed_at, enqueued_at) < ?",
                params![to_sql_millis(before)],
            )
            .map_err(into_storage_err)
        })
    }
}
