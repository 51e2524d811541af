//! Encryption state module
//!
//! Persistence for opaque session records. Three record families are kept per
//! conversation: the session records themselves, inbox-to-conversation mappings derived
//! from `inbox_id`, and a "latest state" pointer. Deletions are idempotent.

use crate::{ConversationId, InboxAddress, StorageError};

pub mod types;

use self::types::*;

/// Storage traits for the encryption state module
pub trait EncryptionStateStorage {
    /// All session records of a conversation, ordered by tag
    fn encryption_states(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<EncryptionState>, StorageError>;

    /// One session record
    fn find_encryption_state(
        &self,
        conversation_id: &ConversationId,
        tag: &str,
    ) -> Result<Option<EncryptionState>, StorageError>;

    /// The record the latest pointer refers to
    fn latest_encryption_state(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<EncryptionState>, StorageError>;

    /// Insert or replace a session record. When `inbox_id` is set the inbox mapping is
    /// written too; when `set_latest` is true the latest pointer moves to this record.
    fn save_encryption_state(
        &self,
        state: EncryptionState,
        set_latest: bool,
    ) -> Result<(), StorageError>;

    /// Delete one session record
    fn delete_encryption_state(
        &self,
        conversation_id: &ConversationId,
        tag: &str,
    ) -> Result<(), StorageError>;

    /// Resolve an inbox to its conversation
    fn find_inbox_mapping(
        &self,
        inbox: &InboxAddress,
    ) -> Result<Option<ConversationId>, StorageError>;

    /// Every inbox currently mapped to `conversation_id`
    fn inbox_mappings(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<InboxAddress>, StorageError>;

    /// Delete an inbox mapping
    fn delete_inbox_mapping(&self, inbox: &InboxAddress) -> Result<(), StorageError>;

    /// Delete the latest pointer of a conversation
    fn delete_latest_state(&self, conversation_id: &ConversationId) -> Result<(), StorageError>;
}
