//! Memory-based storage implementation of the UserConfigStorage trait

use quorum_storage_traits::user_config::{UserConfig, UserConfigStorage};
use quorum_storage_traits::{StorageError, UserAddress};

use crate::QuorumMemoryStorage;

impl UserConfigStorage for QuorumMemoryStorage {
    fn find_user_config(
        &self,
        user_address: &UserAddress,
    ) -> Result<Option<UserConfig>, StorageError> {
        Ok(self.inner.read().user_configs.get(user_address).cloned())
    }

    fn save_user_config(&self, config: UserConfig) -> Result<(), StorageError> {
        self.inner
            .write()
            .user_configs
            .insert(config.user_address.clone(), config);
        Ok(())
    }
}
