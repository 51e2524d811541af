//! Messages module
//!
//! This module is responsible for storing and retrieving the message/event log of a space.
//! Messages are addressed by space, channel and message id.

use crate::{ChannelId, MessageId, SpaceId, StorageError};

pub mod types;

use self::types::*;

/// Storage traits for the messages module
pub trait MessageStorage {
    /// Find a message within a channel
    fn find_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<Option<Message>, StorageError>;

    /// Insert or replace a message
    fn save_message(&self, message: Message) -> Result<(), StorageError>;

    /// Delete a message. Returns whether a record was removed.
    fn delete_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<bool, StorageError>;

    /// Every message of a space across all channels, in
    /// [`Message::chronological_cmp`] order
    fn all_space_messages(&self, space_id: &SpaceId) -> Result<Vec<Message>, StorageError>;
}
