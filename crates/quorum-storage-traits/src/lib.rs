//! Quorum storage - storage provider traits and domain types for the offline action queue
//! and the space synchronization engine.
//!
//! Backends implement every trait in this crate and expose themselves through
//! [`QuorumStorageProvider`]. All methods are synchronous; async callers hold no lock
//! across an await point.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod encryption;
pub mod error;
pub mod ids;
pub mod messages;
pub mod queue;
pub mod spaces;
pub mod timestamp;
pub mod user_config;

pub use error::StorageError;
pub use ids::{ActionId, ChannelId, ConversationId, InboxAddress, MessageId, SpaceId, UserAddress};
pub use timestamp::Timestamp;

use self::encryption::EncryptionStateStorage;
use self::messages::MessageStorage;
use self::queue::ActionQueueStorage;
use self::spaces::SpaceStorage;
use self::user_config::UserConfigStorage;

/// Backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Memory
    Memory,
    /// SQLite
    SQLite,
}

impl Backend {
    /// Check if it's a persistent backend
    ///
    /// All values different from [`Backend::Memory`] are considered persistent
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Memory)
    }
}

/// Storage provider for the Quorum core.
///
/// Implementors must provide:
/// - Space and membership records
/// - The space message/event log
/// - Opaque encryption session records with their inbox mappings and latest pointer
/// - User configuration records
/// - The durable action queue
pub trait QuorumStorageProvider:
    SpaceStorage
    + MessageStorage
    + EncryptionStateStorage
    + UserConfigStorage
    + ActionQueueStorage
    + Send
    + Sync
{
    /// Returns the backend type.
    fn backend(&self) -> Backend;
}
