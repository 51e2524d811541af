//! Implementation of EncryptionStateStorage trait for SQLite storage.

use quorum_storage_traits::encryption::EncryptionStateStorage;
use quorum_storage_traits::encryption::types::EncryptionState;
use quorum_storage_traits::{ConversationId, InboxAddress, StorageError};
use rusqlite::{OptionalExtension, params};

use crate::db::to_sql_millis;
use crate::{QuorumSqliteStorage, db, into_storage_err};

impl EncryptionStateStorage for QuorumSqliteStorage {
    fn encryption_states(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<EncryptionState>, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM encryption_states WHERE conversation_id = ? ORDER BY tag")
                .map_err(into_storage_err)?;

            let rows = stmt
                .query_map(params![conversation_id.as_str()], db::row_to_encryption_state)
                .map_err(into_storage_err)?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(into_storage_err)
        })
    }

    fn find_encryption_state(
        &self,
        conversation_id: &ConversationId,
        tag: &str,
    ) -> Result<Option<EncryptionState>, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM encryption_states WHERE conversation_id = ? AND tag = ?")
                .map_err(into_storage_err)?;

            stmt.query_row(
                params![conversation_id.as_str(), tag],
                db::row_to_encryption_state,
            )
            .optional()
            .map_err(into_storage_err)
        })
    }

    fn latest_encryption_state(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<EncryptionState>, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM latest_states WHERE conversation_id = ?")
                .map_err(into_storage_err)?;

            stmt.query_row(params![conversation_id.as_str()], db::row_to_encryption_state)
                .optional()
                .map_err(into_storage_err)
        })
    }

    fn save_encryption_state(
        &self,
        state: EncryptionState,
        set_latest: bool,
    ) -> Result<(), StorageError> {
        if state.tag.is_empty() {
            return Err(StorageError::InvalidParameters(
                "encryption state tag must not be empty".to_string(),
            ));
        }

        let inbox_id = state.inbox_id.as_ref().map(|i| i.as_str());
        let updated_at = to_sql_millis(state.updated_at);

        self.with_connection(|conn| {
            let tx = conn.unchecked_transaction().map_err(into_storage_err)?;

            tx.execute(
                "INSERT INTO encryption_states (conversation_id, tag, inbox_id, state, updated_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(conversation_id, tag) DO UPDATE SET
                     inbox_id = excluded.inbox_id,
                     state = excluded.state,
                     updated_at = excluded.updated_at",
                params![
                    state.conversation_id.as_str(),
                    &state.tag,
                    inbox_id,
                    state.state.as_bytes(),
                    updated_at,
                ],
            )
            .map_err(into_storage_err)?;

            if let Some(inbox) = inbox_id {
                tx.execute(
                    "INSERT INTO inbox_mappings (inbox_address, conversation_id) VALUES (?, ?)
                     ON CONFLICT(inbox_address) DO UPDATE SET
                         conversation_id = excluded.conversation_id",
                    params![inbox, state.conversation_id.as_str()],
                )
                .map_err(into_storage_err)?;
            }

            if set_latest {
                tx.execute(
                    "INSERT INTO latest_states (conversation_id, tag, inbox_id, state, updated_at)
                     VALUES (?, ?, ?, ?, ?)
                     ON CONFLICT(conversation_id) DO UPDATE SET
                         tag = excluded.tag,
                         inbox_id = excluded.inbox_id,
                         state = excluded.state,
                         updated_at = excluded.updated_at",
                    params![
                        state.conversation_id.as_str(),
                        &state.tag,
                        inbox_id,
                        state.state.as_bytes(),
                        updated_at,
                    ],
                )
                .map_err(into_storage_err)?;
            }

            tx.commit().map_err(into_storage_err)
        })
    }

    fn delete_encryption_state(
        &self,
        conversation_id: &ConversationId,
        tag: &str,
    ) -> Result<(), StorageError> {
        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM encryption_states WHERE conversation_id = ? AND tag = ?",
                params![conversation_id.as_str(), tag],
            )
            .map_err(into_storage_err)?;
            Ok(())
        })
    }

    fn find_inbox_mapping(
        &self,
        inbox: &InboxAddress,
    ) -> Result<Option<ConversationId>, StorageError> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT conversation_id FROM inbox_mappings WHERE inbox_address = ?",
                params![inbox.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map(|found| found.map(ConversationId::new))
            .map_err(into_storage_err)
        })
    }

    fn inbox_mappings(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<InboxAddress>, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT inbox_address FROM inbox_mappings
                     WHERE conversation_id = ? ORDER BY inbox_address",
                )
                .map_err(into_storage_err)?;

            let rows = stmt
                .query_map(params![conversation_id.as_str()], |row| {
                    row.get::<_, String>(0).map(InboxAddress::new)
                })
                .map_err(into_storage_err)?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(into_storage_err)
        })
    }

    fn delete_inbox_mapping(&self, inbox: &InboxAddress) -> Result<(), StorageError> {
        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM inbox_mappings WHERE inbox_address = ?",
                params![inbox.as_str()],
            )
            .map_err(into_storage_err)?;
            Ok(())
        })
    }

    fn delete_latest_state(&self, conversation_id: &ConversationId) -> Result<(), StorageError> {
        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM latest_states WHERE conversation_id = ?",
                params![conversation_id.as_str()],
            )
            .map_err(into_storage_err)?;
            Ok(())
        })
    }
}
