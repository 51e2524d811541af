//! Implementation of MessageStorage trait for SQLite storage.

use quorum_storage_traits::messages::MessageStorage;
use quorum_storage_traits::messages::types::Message;
use quorum_storage_traits::{ChannelId, MessageId, SpaceId, StorageError};
use rusqlite::{OptionalExtension, params};

use crate::db::to_sql_millis;
use crate::{QuorumSqliteStorage, db, into_storage_err};

impl MessageStorage for QuorumSqliteStorage {
    fn find_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<Option<Message>, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM messages
                     WHERE space_id = ? AND channel_id = ? AND message_id = ?",
                )
                .map_err(into_storage_err)?;

            stmt.query_row(
                params![space_id.as_str(), channel_id.as_str(), message_id.as_str()],
                db::row_to_message,
            )
            .optional()
            .map_err(into_storage_err)
        })
    }

    fn save_message(&self, message: Message) -> Result<(), StorageError> {
        let content_json = serde_json::to_string(&message.content)
            .map_err(|e| StorageError::Serialization(format!("message content: {e}")))?;

        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO messages
                 (space_id, channel_id, message_id, sender, created_at, modified_at, content, pinned)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(space_id, channel_id, message_id) DO UPDATE SET
                     sender = excluded.sender,
                     created_at = excluded.created_at,
                     modified_at = excluded.modified_at,
                     content = excluded.content,
                     pinned = excluded.pinned",
                params![
                    message.space_id.as_str(),
                    message.channel_id.as_str(),
                    message.message_id.as_str(),
                    message.sender.as_str(),
                    to_sql_millis(message.created_at),
                    to_sql_millis(message.modified_at),
                    &content_json,
                    message.pinned,
                ],
            )
            .map_err(into_storage_err)?;

            Ok(())
        })
    }

    fn delete_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<bool, StorageError> {
        self.with_connection(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM messages WHERE space_id = ? AND channel_id = ? AND message_id = ?",
                    params![space_id.as_str(), channel_id.as_str(), message_id.as_str()],
                )
                .map_err(into_storage_err)?;
            Ok(removed > 0)
        })
    }

    fn all_space_messages(&self, space_id: &SpaceId) -> Result<Vec<Message>, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM messages WHERE space_id = ?
                     ORDER BY created_at ASC, message_id ASC",
                )
                .map_err(into_storage_err)?;

            let rows = stmt
                .query_map(params![space_id.as_str()], db::row_to_message)
                .map_err(into_storage_err)?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(into_storage_err)
        })
    }
}
