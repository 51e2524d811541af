//! Encryption State Store
//!
//! Persistence façade over [`EncryptionStateStorage`]. Session blobs pass through
//! untouched. Mutations of one conversation are serialized so two writers never
//! interleave on the same session material.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use quorum_storage_traits::encryption::EncryptionStateStorage;
use quorum_storage_traits::encryption::types::EncryptionState;
use quorum_storage_traits::{ConversationId, InboxAddress, StorageError};

/// What [`EncryptionStateStore::delete_all`] removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteAllReport {
    /// Session records deleted
    pub states: usize,
    /// Inbox mappings deleted
    pub mappings: usize,
}

type ConversationLocks = HashMap<ConversationId, Arc<tokio::sync::Mutex<()>>>;

/// Read/save/delete access to per-conversation session records
#[derive(Debug)]
pub struct EncryptionStateStore<S> {
    storage: Arc<S>,
    locks: Arc<parking_lot::Mutex<ConversationLocks>>,
}

impl<S> Clone for EncryptionStateStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S> EncryptionStateStore<S>
where
    S: EncryptionStateStorage,
{
    /// Wrap a storage backend
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            locks: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    fn conversation_lock(&self, conversation_id: &ConversationId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(conversation_id.clone()).or_default())
    }

    /// Forget a torn-down conversation's lock unless another caller holds or awaits it.
    ///
    /// Clones are only handed out under the map lock, so the count check cannot race.
    fn release_lock(&self, conversation_id: &ConversationId, held: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock();
        // One reference in the map, one held by the caller
        if Arc::strong_count(held) <= 2 {
            locks.remove(conversation_id);
        }
    }

    /// One session record
    pub fn get(
        &self,
        conversation_id: &ConversationId,
        tag: &str,
    ) -> Result<Option<EncryptionState>, StorageError> {
        self.storage.find_encryption_state(conversation_id, tag)
    }

    /// Every session record of a conversation
    pub fn list(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<EncryptionState>, StorageError> {
        self.storage.encryption_states(conversation_id)
    }

    /// The session record outbound envelopes are sealed with
    pub fn latest(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<EncryptionState>, StorageError> {
        self.storage.latest_encryption_state(conversation_id)
    }

    /// Persist a session record, optionally making it the latest
    pub async fn save(&self, state: EncryptionState, set_latest: bool) -> Result<(), StorageError> {
        let lock = self.conversation_lock(&state.conversation_id);
        let _guard = lock.lock().await;
        self.storage.save_encryption_state(state, set_latest)
    }

    /// Delete one session record
    pub async fn delete(
        &self,
        conversation_id: &ConversationId,
        tag: &str,
    ) -> Result<(), StorageError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;
        self.storage.delete_encryption_state(conversation_id, tag)
    }

    /// Remove every trace of a conversation's sessions.
    ///
    /// Session records go first, then every inbox mapping, then the latest pointer. Any
    /// failure aborts; every step is idempotent, so the caller retries the whole call.
    pub async fn delete_all(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<DeleteAllReport, StorageError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let states = self.storage.encryption_states(conversation_id)?;

        // Collect before deleting: mappings are only reachable from the records on a first run
        let mut inboxes: BTreeSet<InboxAddress> = states
            .iter()
            .filter_map(|state| state.inbox_id.clone())
            .collect();
        inboxes.extend(self.storage.inbox_mappings(conversation_id)?);

        for state in &states {
            self.storage
                .delete_encryption_state(conversation_id, &state.tag)?;
        }

        for inbox in &inboxes {
            self.storage.delete_inbox_mapping(inbox)?;
        }

        self.storage.delete_latest_state(conversation_id)?;
        self.release_lock(conversation_id, &lock);

        tracing::debug!(
            conversation_id = %conversation_id,
            states = states.len(),
            mappings = inboxes.len(),
            "Deleted all encryption state"
        );

        Ok(DeleteAllReport {
            states: states.len(),
            mappings: inboxes.len(),
        })
    }
}
