//! Memory-based storage implementation of the EncryptionStateStorage trait

use quorum_storage_traits::encryption::EncryptionStateStorage;
use quorum_storage_traits::encryption::types::EncryptionState;
use quorum_storage_traits::{ConversationId, InboxAddress, StorageError};

use crate::QuorumMemoryStorage;

impl EncryptionStateStorage for QuorumMemoryStorage {
    fn encryption_states(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<EncryptionState>, StorageError> {
        Ok(self
            .inner
            .read()
            .encryption_states
            .get(conversation_id)
            .map(|states| states.values().cloned().collect())
            .unwrap_or_default())
    }

    fn find_encryption_state(
        &self,
        conversation_id: &ConversationId,
        tag: &str,
    ) -> Result<Option<EncryptionState>, StorageError> {
        Ok(self
            .inner
            .read()
            .encryption_states
            .get(conversation_id)
            .and_then(|states| states.get(tag).cloned()))
    }

    fn latest_encryption_state(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<EncryptionState>, StorageError> {
        Ok(self.inner.read().latest_states.get(conversation_id).cloned())
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

        let mut inner = self.inner.write();
        if let Some(inbox) = &state.inbox_id {
            inner
                .inbox_mappings
                .insert(inbox.clone(), state.conversation_id.clone());
        }
        if set_latest {
            inner
                .latest_states
                .insert(state.conversation_id.clone(), state.clone());
        }
        inner
            .encryption_states
            .entry(state.conversation_id.clone())
            .or_default()
            .insert(state.tag.clone(), state);
        Ok(())
    }

    fn delete_encryption_state(
        &self,
        conversation_id: &ConversationId,
        tag: &str,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        if let Some(states) = inner.encryption_states.get_mut(conversation_id) {
            states.remove(tag);
            if states.is_empty() {
                inner.encryption_states.remove(conversation_id);
            }
        }
        Ok(())
    }

    fn find_inbox_mapping(
        &self,
        inbox: &InboxAddress,
    ) -> Result<Option<ConversationId>, StorageError> {
        Ok(self.inner.read().inbox_mappings.get(inbox).cloned())
    }

    fn inbox_mappings(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<InboxAddress>, StorageError> {
        let mut inboxes: Vec<InboxAddress> = self
            .inner
            .read()
            .inbox_mappings
            .iter()
            .filter(|(_, conversation)| *conversation == conversation_id)
            .map(|(inbox, _)| inbox.clone())
            .collect();
        inboxes.sort();
        Ok(inboxes)
    }

    fn delete_inbox_mapping(&self, inbox: &InboxAddress) -> Result<(), StorageError> {
        self.inner.write().inbox_mappings.remove(inbox);
        Ok(())
    }

    fn delete_latest_state(&self, conversation_id: &ConversationId) -> Result<(), StorageError> {
        self.inner.write().latest_states.remove(conversation_id);
        Ok(())
    }
}
