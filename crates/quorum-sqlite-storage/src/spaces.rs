//! Implementation of SpaceStorage trait for SQLite storage.

use quorum_storage_traits::spaces::SpaceStorage;
use quorum_storage_traits::spaces::types::{Space, SpaceMember};
use quorum_storage_traits::{SpaceId, StorageError, UserAddress};
use rusqlite::{OptionalExtension, params};

use crate::db::to_sql_millis;
use crate::{QuorumSqliteStorage, db, into_storage_err};

impl SpaceStorage for QuorumSqliteStorage {
    fn find_space(&self, space_id: &SpaceId) -> Result<Option<Space>, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM spaces WHERE space_id = ?")
                .map_err(into_storage_err)?;

            stmt.query_row(params![space_id.as_str()], db::row_to_space)
                .optional()
                .map_err(into_storage_err)
        })
    }

    fn save_space(&self, space: Space) -> Result<(), StorageError> {
        let channels_json = serde_json::to_string(&space.channels)
            .map_err(|e| StorageError::Serialization(format!("channels: {e}")))?;

        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO spaces
                 (space_id, name, description, channels, hub_address, inbox_address, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(space_id) DO UPDATE SET
                     name = excluded.name,
                     description = excluded.description,
                     channels = excluded.channels,
                     hub_address = excluded.hub_address,
                     inbox_address = excluded.inbox_address,
                     created_at = excluded.created_at",
                params![
                    space.space_id.as_str(),
                    &space.name,
                    &space.description,
                    &channels_json,
                    space.hub_address.as_ref().map(|a| a.as_str()),
                    space.inbox_address.as_ref().map(|a| a.as_str()),
                    to_sql_millis(space.created_at),
                ],
            )
            .map_err(into_storage_err)?;

            Ok(())
        })
    }

    fn delete_space(&self, space_id: &SpaceId) -> Result<(), StorageError> {
        self.with_connection(|conn| {
            let tx = conn.unchecked_transaction().map_err(into_storage_err)?;
            tx.execute(
                "DELETE FROM space_members WHERE space_id = ?",
                params![space_id.as_str()],
            )
            .map_err(into_storage_err)?;
            tx.execute(
                "DELETE FROM spaces WHERE space_id = ?",
                params![space_id.as_str()],
            )
            .map_err(into_storage_err)?;
            tx.commit().map_err(into_storage_err)
        })
    }

    fn space_members(&self, space_id: &SpaceId) -> Result<Vec<SpaceMember>, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM space_members WHERE space_id = ? ORDER BY user_address")
                .map_err(into_storage_err)?;

            let rows = stmt
                .query_map(params![space_id.as_str()], db::row_to_space_member)
                .map_err(into_storage_err)?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(into_storage_err)
        })
    }

    fn save_space_member(&self, member: SpaceMember) -> Result<(), StorageError> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO space_members
                 (space_id, user_address, inbox_address, display_name, joined_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(space_id, user_address) DO UPDATE SET
                     inbox_address = excluded.inbox_address,
                     display_name = excluded.display_name,
                     joined_at = excluded.joined_at",
                params![
                    member.space_id.as_str(),
                    member.user_address.as_str(),
                    member.inbox_address.as_ref().map(|a| a.as_str()),
                    &member.display_name,
                    to_sql_millis(member.joined_at),
                ],
            )
            .map_err(into_storage_err)?;

            Ok(())
        })
    }

    fn delete_space_member(
        &self,
        space_id: &SpaceId,
        user_address: &UserAddress,
    ) -> Result<bool, StorageError> {
        self.with_connection(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM space_members WHERE space_id = ? AND user_address = ?",
                    params![space_id.as_str(), user_address.as_str()],
                )
                .map_err(into_storage_err)?;
            Ok(removed > 0)
        })
    }
}
