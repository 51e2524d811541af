//! Memory-based storage implementation of the MessageStorage trait

use quorum_storage_traits::messages::MessageStorage;
use quorum_storage_traits::messages::types::Message;
use quorum_storage_traits::{ChannelId, MessageId, SpaceId, StorageError};

use crate::QuorumMemoryStorage;

impl MessageStorage for QuorumMemoryStorage {
    fn find_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<Option<Message>, StorageError> {
        let inner = self.inner.read();
        Ok(inner.messages.get(space_id).and_then(|messages| {
            messages
                .get(&(channel_id.clone(), message_id.clone()))
                .cloned()
        }))
    }

    fn save_message(&self, message: Message) -> Result<(), StorageError> {
        let key = (message.channel_id.clone(), message.message_id.clone());
        self.inner
            .write()
            .messages
            .entry(message.space_id.clone())
            .or_default()
            .insert(key, message);
        Ok(())
    }

    fn delete_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<bool, StorageError> {
        let mut inner = self.inner.write();
        Ok(inner
            .messages
            .get_mut(space_id)
            .and_then(|messages| messages.remove(&(channel_id.clone(), message_id.clone())))
            .is_some())
    }

    fn all_space_messages(&self, space_id: &SpaceId) -> Result<Vec<Message>, StorageError> {
        let inner = self.inner.read();
        let mut messages: Vec<Message> = inner
            .messages
            .get(space_id)
            .map(|messages| messages.values().cloned().collect())
            .unwrap_or_default();
        messages.sort_by(|a, b| a.chronological_cmp(b));
        Ok(messages)
    }
}
