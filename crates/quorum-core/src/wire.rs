//! Plaintext payloads handed to the sealer
//!
//! Serialized as tagged JSON. The envelope format around them belongs to the encryption
//! collaborator.

use quorum_storage_traits::messages::types::Message;
use quorum_storage_traits::queue::types::{PeerEntry, SyncManifest, SyncSummary};
use quorum_storage_traits::spaces::types::{Space, SpaceMember};
use quorum_storage_traits::user_config::UserConfig;
use quorum_storage_traits::{
    ChannelId, InboxAddress, MessageId, SpaceId, Timestamp, UserAddress,
};
use serde::{Deserialize, Serialize};

use crate::error::ActionError;

/// Moderation operations carried by [`WirePayload::Moderation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModerationKind {
    /// Remove from the space
    Kick,
    /// Silence
    Mute,
    /// Lift a mute
    Unmute,
}

/// Everything this core puts on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WirePayload {
    /// A new message
    Post {
        /// The message
        message: Message,
    },
    /// Add or withdraw a reaction
    Reaction {
        /// Space
        space_id: SpaceId,
        /// Channel
        channel_id: ChannelId,
        /// Target
        message_id: MessageId,
        /// Emoji or short code
        reaction: String,
        /// Withdraw instead of add
        remove: bool,
        /// Reacting user
        sender: UserAddress,
    },
    /// Pin or unpin
    Pin {
        /// Space
        space_id: SpaceId,
        /// Channel
        channel_id: ChannelId,
        /// Target
        message_id: MessageId,
        /// New pin state
        pinned: bool,
        /// Acting user
        sender: UserAddress,
    },
    /// Replace a message body
    Edit {
        /// Space
        space_id: SpaceId,
        /// Channel
        channel_id: ChannelId,
        /// Target
        message_id: MessageId,
        /// New body
        text: String,
        /// Acting user
        sender: UserAddress,
        /// Edit time
        edited_at: Timestamp,
    },
    /// Remove a message
    Delete {
        /// Space
        space_id: SpaceId,
        /// Channel
        channel_id: ChannelId,
        /// Target
        message_id: MessageId,
        /// Acting user
        sender: UserAddress,
    },
    /// Kick, mute or unmute a member
    Moderation {
        /// Space
        space_id: SpaceId,
        /// Operation
        kind: ModerationKind,
        /// Affected member
        user_address: UserAddress,
        /// Acting user
        sender: UserAddress,
    },
    /// Full user configuration
    UserConfig {
        /// The configuration
        config: UserConfig,
    },
    /// Full space settings
    SpaceManifest {
        /// The space
        space: Space,
    },
    /// Ask the space who holds more data
    SyncRequest {
        /// Space
        space_id: SpaceId,
        /// Where answers go
        inbox_address: InboxAddress,
        /// When answers stop being collected
        expiry: Timestamp,
        /// Sender state
        summary: SyncSummary,
    },
    /// Advertise what we hold
    SyncInfo {
        /// Space
        space_id: SpaceId,
        /// Where follow-ups go
        inbox_address: InboxAddress,
        /// Sender state
        summary: SyncSummary,
    },
    /// Ask a peer for its delta
    SyncInitiate {
        /// Space
        space_id: SpaceId,
        /// Where the delta goes
        inbox_address: InboxAddress,
        /// Sender state
        summary: SyncSummary,
        /// Sender's per-record view
        #[serde(default, skip_serializing_if = "Option::is_none")]
        manifest: Option<SyncManifest>,
    },
    /// Reply to a manifest-carrying initiate
    SyncManifest {
        /// Space
        space_id: SpaceId,
        /// Where the counter-delta goes
        inbox_address: InboxAddress,
        /// Sender's per-record view
        manifest: SyncManifest,
    },
    /// One chunk of a delta
    SyncDelta {
        /// Space
        space_id: SpaceId,
        /// Chunk index
        chunk: u32,
        /// Members
        members: Vec<SpaceMember>,
        /// Messages
        messages: Vec<Message>,
        /// Peer map entries
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        peers: Vec<PeerEntry>,
        /// Last chunk of the delta
        #[serde(default)]
        is_final: bool,
    },
    /// Re-assert a kick
    VerifyKicked {
        /// Space
        space_id: SpaceId,
        /// Kicked user
        user_address: UserAddress,
    },
}

impl WirePayload {
    /// Serialize to the plaintext handed to the sealer
    pub fn to_plaintext(&self) -> Result<Vec<u8>, ActionError> {
        serde_json::to_vec(self).map_err(|e| ActionError::Defect(format!("encode payload: {e}")))
    }
}
