//! Types for the encryption module

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ConversationId, InboxAddress, Timestamp};

/// Opaque ratchet/session material.
///
/// Never parsed at this layer. `Debug` prints only the length so session secrets do not
/// end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState(Vec<u8>);

impl SessionState {
    /// Wrap raw session bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the blob is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionState({} bytes)", self.0.len())
    }
}

/// A persisted session record for a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionState {
    /// Conversation the session belongs to
    pub conversation_id: ConversationId,
    /// Session identifier within the conversation
    pub tag: String,
    /// Inbox this session receives on, if any. Saving the record also maps the inbox
    /// back to the conversation.
    pub inbox_id: Option<InboxAddress>,
    /// Opaque session blob
    pub state: SessionState,
    /// When the record was last written
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_debug_redacts() {
        let state = SessionState::new(b"secret ratchet".to_vec());
        let debug = format!("{state:?}");
        assert_eq!(debug, "SessionState(14 bytes)");
        assert!(!debug.contains("secret"));
    }
}
