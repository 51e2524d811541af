//! Encryption collaborator
//!
//! Sealing is done by the host's ratchet implementation. The core hands it the latest
//! session record for the conversation and persists whatever advanced state comes back.

use std::fmt::Debug;

use async_trait::async_trait;
use quorum_storage_traits::ConversationId;
use quorum_storage_traits::encryption::types::EncryptionState;

/// Output of [`EnvelopeSealer::seal`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEnvelope {
    /// Ciphertext ready for transport
    pub envelope: Vec<u8>,
    /// Advanced session state to persist before the envelope is sent
    pub next_state: Option<EncryptionState>,
}

/// Sealing failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SealError {
    /// The sealer needs a session and none was supplied
    #[error("no session for conversation {0}")]
    MissingSession(ConversationId),
    /// Any other cryptographic failure
    #[error("{0}")]
    Failed(String),
}

/// Seals plaintext payloads for a conversation
#[async_trait]
pub trait EnvelopeSealer: Send + Sync + Debug {
    /// Seal `plaintext` for `conversation_id` using `state`, the latest session record
    async fn seal(
        &self,
        conversation_id: &ConversationId,
        state: Option<&EncryptionState>,
        plaintext: &[u8],
    ) -> Result<SealedEnvelope, SealError>;
}
