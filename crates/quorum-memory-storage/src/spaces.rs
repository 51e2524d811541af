//! Memory-based storage implementation of the SpaceStorage trait

use quorum_storage_traits::spaces::SpaceStorage;
use quorum_storage_traits::spaces::types::{Space, SpaceMember};
use quorum_storage_traits::{SpaceId, StorageError, UserAddress};

use crate::QuorumMemoryStorage;

impl SpaceStorage for QuorumMemoryStorage {
    fn find_space(&self, space_id: &SpaceId) -> Result<Option<Space>, StorageError> {
        Ok(self.inner.read().spaces.get(space_id).cloned())
    }

    fn save_space(&self, space: Space) -> Result<(), StorageError> {
        self.inner.write().spaces.insert(space.space_id.clone(), space);
        Ok(())
    }

    fn delete_space(&self, space_id: &SpaceId) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        inner.spaces.remove(space_id);
        inner.members.remove(space_id);
        Ok(())
    }

    fn space_members(&self, space_id: &SpaceId) -> Result<Vec<SpaceMember>, StorageError> {
        Ok(self
            .inner
            .read()
            .members
            .get(space_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default())
    }

    fn save_space_member(&self, member: SpaceMember) -> Result<(), StorageError> {
        self.inner
            .write()
            .members
            .entry(member.space_id.clone())
            .or_default()
            .insert(member.user_address.clone(), member);
        Ok(())
    }

    fn delete_space_member(
        &self,
        space_id: &SpaceId,
        user_address: &UserAddress,
    ) -> Result<bool, StorageError> {
        Ok(self
            .inner
            .write()
            .members
            .get_mut(space_id)
            .and_then(|members| members.remove(user_address))
            .is_some())
    }
}
