//! Implementation of UserConfigStorage trait for SQLite storage.

use quorum_storage_traits::user_config::{UserConfig, UserConfigStorage};
use quorum_storage_traits::{StorageError, UserAddress};
use rusqlite::{OptionalExtension, params};

use crate::{QuorumSqliteStorage, db, into_storage_err};

impl UserConfigStorage for QuorumSqliteStorage {
    fn find_user_config(
        &self,
        user_address: &UserAddress,
    ) -> Result<Option<UserConfig>, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT config FROM user_configs WHERE user_address = ?")
                .map_err(into_storage_err)?;

            stmt.query_row(params![user_address.as_str()], db::row_to_user_config)
                .optional()
                .map_err(into_storage_err)
        })
    }

    fn save_user_config(&self, config: UserConfig) -> Result<(), StorageError> {
        let config_json = serde_json::to_string(&config)
            .map_err(|e| StorageError::Serialization(format!("user config: {e}")))?;

        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO user_configs (user_address, config) VALUES (?, ?)
                 ON CONFLICT(user_address) DO UPDATE SET config = excluded.config",
                params![config.user_address.as_str(), &config_json],
            )
            .map_err(into_storage_err)?;
            Ok(())
        })
    }
}
