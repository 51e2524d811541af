//! Quorum Core Public Prelude
//!
//! The types a host needs to wire up a queue and a sync engine. Storage backends are
//! imported from their own crates.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use quorum_core::prelude::*;
//! use quorum_memory_storage::QuorumMemoryStorage;
//!
//! let storage = Arc::new(QuorumMemoryStorage::default());
//! let queue = ActionQueue::builder(Arc::clone(&storage), HandlerRegistry::new())
//!     .open()
//!     .unwrap();
//! let sync = SyncEngine::new(storage, queue.clone());
//! assert_eq!(sync.phase(&SpaceId::new("space")), SyncPhase::Idle);
//! ```

// === Errors ===
pub use crate::error::{ActionError, Error, FailureKind, SanitizedError};

// === Queue ===
pub use crate::queue::{ActionQueue, ActionQueueBuilder, QueueEvent};

// === Handlers ===
pub use crate::handlers::{ActionHandler, HandlerDeps, HandlerRegistry};

// === Sync ===
pub use crate::sync::{ManifestDelta, SyncCandidate, SyncEngine, SyncPhase};

// === Collaborators ===
pub use crate::clock::{Clock, SystemClock};
pub use crate::encryption::EncryptionStateStore;
pub use crate::keyring::{MemoryKeyring, SpaceKeyring};
pub use crate::sealer::{EnvelopeSealer, SealError, SealedEnvelope};
pub use crate::transport::{Transport, TransportError};

// === Configuration ===
pub use crate::config::{CoreConfig, QueueConfig, SyncConfig};

// === Storage types ===
pub use quorum_storage_traits::queue::types::{
    Action, ActionContext, ActionStatus, ActionType, PeerEntry, SyncManifest,
};
pub use quorum_storage_traits::{
    ActionId, ChannelId, ConversationId, InboxAddress, MessageId, QuorumStorageProvider, SpaceId,
    Timestamp, UserAddress,
};
