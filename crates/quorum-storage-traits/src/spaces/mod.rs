//! Spaces module
//!
//! Space records and their membership lists.

use crate::{SpaceId, StorageError, UserAddress};

pub mod types;

use self::types::*;

/// Storage traits for the spaces module
pub trait SpaceStorage {
    /// Find a space by id
    fn find_space(&self, space_id: &SpaceId) -> Result<Option<Space>, StorageError>;

    /// Insert or replace a space
    fn save_space(&self, space: Space) -> Result<(), StorageError>;

    /// Delete a space together with its members. Deleting a missing space is not an error.
    fn delete_space(&self, space_id: &SpaceId) -> Result<(), StorageError>;

    /// All members of a space, ordered by user address
    fn space_members(&self, space_id: &SpaceId) -> Result<Vec<SpaceMember>, StorageError>;

    /// Insert or replace a membership record
    fn save_space_member(&self, member: SpaceMember) -> Result<(), StorageError>;

    /// Remove a member. Returns whether a record was removed.
    fn delete_space_member(
        &self,
        space_id: &SpaceId,
        user_address: &UserAddress,
    ) -> Result<bool, StorageError>;
}
