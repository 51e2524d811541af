//! Memory-based storage implementation for Quorum.
//!
//! This crate implements the [`QuorumStorageProvider`] trait entirely in memory. State is
//! lost when the value is dropped, which makes it suited to tests and ephemeral hosts.
//!
//! All record families live behind a single [`RwLock`], so every trait method is atomic
//! with respect to every other, including the dedupe check in
//! [`ActionQueueStorage::enqueue_action`](quorum_storage_traits::queue::ActionQueueStorage::enqueue_action).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use quorum_storage_traits::encryption::types::EncryptionState;
use quorum_storage_traits::messages::types::Message;
use quorum_storage_traits::queue::types::Action;
use quorum_storage_traits::spaces::types::{Space, SpaceMember};
use quorum_storage_traits::user_config::UserConfig;
use quorum_storage_traits::{
    ActionId, Backend, ChannelId, ConversationId, InboxAddress, MessageId, QuorumStorageProvider,
    SpaceId, UserAddress,
};

mod encryption;
mod messages;
mod queue;
mod spaces;
mod user_config;

type MessageKey = (ChannelId, MessageId);

#[derive(Debug, Default)]
struct Inner {
    spaces: HashMap<SpaceId, Space>,
    members: HashMap<SpaceId, BTreeMap<UserAddress, SpaceMember>>,
    messages: HashMap<SpaceId, HashMap<MessageKey, Message>>,
    encryption_states: HashMap<ConversationId, BTreeMap<String, EncryptionState>>,
    inbox_mappings: HashMap<InboxAddress, ConversationId>,
    latest_states: HashMap<ConversationId, EncryptionState>,
    user_configs: HashMap<UserAddress, UserConfig>,
    actions: BTreeMap<u64, Action>,
    action_index: HashMap<ActionId, u64>,
    next_seq: u64,
}

/// An in-memory storage implementation for Quorum.
#[derive(Debug, Default)]
pub struct QuorumMemoryStorage {
    inner: RwLock<Inner>,
}

impl QuorumMemoryStorage {
    /// Creates a new, empty [`QuorumMemoryStorage`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuorumStorageProvider for QuorumMemoryStorage {
    fn backend(&self) -> Backend {
        Backend::Memory
    }
}
