//! User configuration records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{SpaceId, StorageError, Timestamp, UserAddress};

/// Per-account settings synchronized across the user's devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Owner of the configuration
    pub user_address: UserAddress,
    /// Spaces the user has joined, in display order
    #[serde(default)]
    pub space_ids: Vec<SpaceId>,
    /// Free-form preferences
    #[serde(default)]
    pub preferences: BTreeMap<String, serde_json::Value>,
    /// When the configuration was last changed
    pub updated_at: Timestamp,
}

/// Storage traits for user configuration
pub trait UserConfigStorage {
    /// Find the configuration of a user
    fn find_user_config(
        &self,
        user_address: &UserAddress,
    ) -> Result<Option<UserConfig>, StorageError>;

    /// Insert or replace a user configuration
    fn save_user_config(&self, config: UserConfig) -> Result<(), StorageError>;
}
