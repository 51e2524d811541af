//! Types for the action queue module

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::messages::types::Message;
use crate::spaces::types::{Space, SpaceMember};
use crate::user_config::UserConfig;
use crate::{
    ActionId, ChannelId, ConversationId, InboxAddress, MessageId, SpaceId, StorageError,
    Timestamp, UserAddress,
};

/// Closed set of action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionType {
    /// Post a message to a space channel
    SendChannelMessage,
    /// Post a message to a direct conversation
    SendDirectMessage,
    /// Add or remove a reaction in a channel
    Reaction,
    /// Add or remove a reaction in a direct conversation
    ReactionDirect,
    /// Pin a channel message
    Pin,
    /// Unpin a channel message
    Unpin,
    /// Edit a channel message
    Edit,
    /// Edit a direct message
    EditDirect,
    /// Delete a channel message
    Delete,
    /// Delete a direct message
    DeleteDirect,
    /// Remove a member from a space
    KickUser,
    /// Mute a member of a space
    MuteUser,
    /// Unmute a member of a space
    UnmuteUser,
    /// Publish the user's configuration
    SaveUserConfig,
    /// Publish new space settings
    UpdateSpace,
    /// Broadcast a sync request to the space hub
    SyncRequest,
    /// Tell a peer what we hold for a space
    SyncInfo,
    /// Ask the chosen candidate peer to send its delta
    SyncInitiate,
    /// Send a chunk of members/messages to a peer
    SyncDelta,
    /// Re-assert a kick to lagging peers
    VerifyKicked,
    /// Answer a manifest-carrying `sync-initiate` with our own manifest
    SyncManifest,
}

impl ActionType {
    /// Every action type
    pub const ALL: [ActionType; 21] = [
        Self::SendChannelMessage,
        Self::SendDirectMessage,
        Self::Reaction,
        Self::ReactionDirect,
        Self::Pin,
        Self::Unpin,
        Self::Edit,
        Self::EditDirect,
        Self::Delete,
        Self::DeleteDirect,
        Self::KickUser,
        Self::MuteUser,
        Self::UnmuteUser,
        Self::SaveUserConfig,
        Self::UpdateSpace,
        Self::SyncRequest,
        Self::SyncInfo,
        Self::SyncInitiate,
        Self::SyncDelta,
        Self::VerifyKicked,
        Self::SyncManifest,
    ];

    /// Get as `&str`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendChannelMessage => "send-channel-message",
            Self::SendDirectMessage => "send-direct-message",
            Self::Reaction => "reaction",
            Self::ReactionDirect => "reaction-direct",
            Self::Pin => "pin",
            Self::Unpin => "unpin",
            Self::Edit => "edit",
            Self::EditDirect => "edit-direct",
            Self::Delete => "delete",
            Self::DeleteDirect => "delete-direct",
            Self::KickUser => "kick-user",
            Self::MuteUser => "mute-user",
            Self::UnmuteUser => "unmute-user",
            Self::SaveUserConfig => "save-user-config",
            Self::UpdateSpace => "update-space",
            Self::SyncRequest => "sync-request",
            Self::SyncInfo => "sync-info",
            Self::SyncInitiate => "sync-initiate",
            Self::SyncDelta => "sync-delta",
            Self::VerifyKicked => "verify-kicked",
            Self::SyncManifest => "sync-manifest",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StorageError::InvalidParameters(format!("Invalid action type: {s}")))
    }
}

impl Serialize for ActionType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state of a queued action
///
/// Completed actions are deleted, so there is no terminal success state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionStatus {
    /// Waiting for its ready time
    Pending,
    /// Handed to a handler and not yet resolved
    Processing,
    /// Abandoned; kept as a terminal record for reporting
    Failed,
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ActionStatus {
    /// Get as `&str`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for ActionStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "failed" => Ok(Self::Failed),
            _ => Err(StorageError::InvalidParameters(format!(
                "Invalid action status: {}",
                s
            ))),
        }
    }
}

impl Serialize for ActionStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Destination of a channel-scoped action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTarget {
    /// Space
    pub space_id: SpaceId,
    /// Channel within the space
    pub channel_id: ChannelId,
    /// Space hub the envelope is broadcast to
    pub hub_address: InboxAddress,
}

/// Destination of a direct-conversation action
///
/// Direct conversations are stored as a space and channel both named after the
/// counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectTarget {
    /// The other party
    pub counterparty: UserAddress,
    /// Every inbox of the counterparty's devices
    pub inbox_addresses: Vec<InboxAddress>,
}

impl DirectTarget {
    /// Space id the conversation is stored under
    pub fn space_id(&self) -> SpaceId {
        SpaceId::new(self.counterparty.as_str())
    }

    /// Channel id the conversation is stored under
    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(self.counterparty.as_str())
    }

    /// Conversation keying the session records
    pub fn conversation_id(&self) -> ConversationId {
        ConversationId::direct(&self.counterparty)
    }
}

/// Summary of local space state exchanged during sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Number of messages in the space log
    pub message_count: u64,
    /// Number of members
    pub member_count: u64,
    /// Hash over the message manifest; equal hashes mean equal message sets
    pub manifest_hash: String,
    /// Newest message creation time
    pub newest_message_at: Option<Timestamp>,
    /// Oldest message creation time
    pub oldest_message_at: Option<Timestamp>,
}

/// Digest of one message, as listed in a [`SyncManifest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDigest {
    /// Channel
    pub channel_id: ChannelId,
    /// Message
    pub message_id: MessageId,
    /// Creation time
    pub created_at: Timestamp,
    /// Last modification time; the newer side of a disagreement wins
    pub modified_at: Timestamp,
    /// SHA-256 hex of the serialized content
    pub content_hash: String,
}

/// Digest of one membership record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDigest {
    /// Member
    pub user_address: UserAddress,
    /// SHA-256 hex of the serialized record
    pub digest: String,
}

/// One entry of a space's ratchet peer map
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerEntry {
    /// Peer id within the group ratchet
    pub peer_id: u64,
    /// Hex public key of the peer
    pub public_key: String,
}

/// Per-record view of a space, exchanged so each side can send exactly what the other
/// lacks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncManifest {
    /// One digest per message
    pub messages: Vec<MessageDigest>,
    /// One digest per member
    pub members: Vec<MemberDigest>,
    /// Ids present in the sender's peer map
    #[serde(default)]
    pub peer_ids: Vec<u64>,
}

/// Everything a handler needs to perform an action
///
/// The variant determines the [`ActionType`], so type and payload never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionContext {
    /// Post to a channel
    SendChannelMessage {
        /// Destination
        target: ChannelTarget,
        /// The message as rendered optimistically
        message: Message,
    },
    /// Post to a direct conversation
    SendDirectMessage {
        /// Destination
        target: DirectTarget,
        /// The message as rendered optimistically
        message: Message,
    },
    /// React to a channel message
    Reaction {
        /// Destination
        target: ChannelTarget,
        /// Message reacted to
        message_id: MessageId,
        /// Emoji or short code
        reaction: String,
        /// Withdraw instead of add
        remove: bool,
        /// Reacting user
        sender: UserAddress,
    },
    /// React to a direct message
    ReactionDirect {
        /// Destination
        target: DirectTarget,
        /// Message reacted to
        message_id: MessageId,
        /// Emoji or short code
        reaction: String,
        /// Withdraw instead of add
        remove: bool,
        /// Reacting user
        sender: UserAddress,
    },
    /// Pin a channel message
    Pin {
        /// Destination
        target: ChannelTarget,
        /// Message to pin
        message_id: MessageId,
        /// Acting user
        sender: UserAddress,
    },
    /// Unpin a channel message
    Unpin {
        /// Destination
        target: ChannelTarget,
        /// Message to unpin
        message_id: MessageId,
        /// Acting user
        sender: UserAddress,
    },
    /// Edit a channel message
    Edit {
        /// Destination
        target: ChannelTarget,
        /// Edited message
        message_id: MessageId,
        /// Replacement body
        text: String,
        /// Editing user
        sender: UserAddress,
        /// Edit time
        edited_at: Timestamp,
    },
    /// Edit a direct message
    EditDirect {
        /// Destination
        target: DirectTarget,
        /// Edited message
        message_id: MessageId,
        /// Replacement body
        text: String,
        /// Editing user
        sender: UserAddress,
        /// Edit time
        edited_at: Timestamp,
    },
    /// Delete a channel message
    Delete {
        /// Destination
        target: ChannelTarget,
        /// Message to delete
        message_id: MessageId,
        /// Acting user
        sender: UserAddress,
    },
    /// Delete a direct message
    DeleteDirect {
        /// Destination
        target: DirectTarget,
        /// Message to delete
        message_id: MessageId,
        /// Acting user
        sender: UserAddress,
    },
    /// Remove a member from a space
    KickUser {
        /// Space
        space_id: SpaceId,
        /// Space hub
        hub_address: InboxAddress,
        /// Member to remove
        user_address: UserAddress,
        /// Acting user
        sender: UserAddress,
    },
    /// Mute a member
    MuteUser {
        /// Space
        space_id: SpaceId,
        /// Space hub
        hub_address: InboxAddress,
        /// Member to mute
        user_address: UserAddress,
        /// Acting user
        sender: UserAddress,
    },
    /// Unmute a member
    UnmuteUser {
        /// Space
        space_id: SpaceId,
        /// Space hub
        hub_address: InboxAddress,
        /// Member to unmute
        user_address: UserAddress,
        /// Acting user
        sender: UserAddress,
    },
    /// Publish the user's configuration
    SaveUserConfig {
        /// Full replacement configuration
        config: UserConfig,
        /// Where the sealed configuration is published
        config_address: InboxAddress,
    },
    /// Publish new space settings
    UpdateSpace {
        /// Full replacement space record
        space: Space,
    },
    /// Broadcast a sync request
    SyncRequest {
        /// Space
        space_id: SpaceId,
        /// Space hub
        hub_address: InboxAddress,
        /// Our inbox, where answers go
        inbox_address: InboxAddress,
        /// When the request window closes
        expiry: Timestamp,
        /// Our state
        summary: SyncSummary,
    },
    /// Answer a peer's sync request with our counts
    SyncInfo {
        /// Space
        space_id: SpaceId,
        /// Peer to answer
        peer_inbox: InboxAddress,
        /// Our inbox
        inbox_address: InboxAddress,
        /// Our state
        summary: SyncSummary,
    },
    /// Ask a candidate for its delta
    SyncInitiate {
        /// Space
        space_id: SpaceId,
        /// Chosen candidate
        peer_inbox: InboxAddress,
        /// Our inbox
        inbox_address: InboxAddress,
        /// Our state
        summary: SyncSummary,
        /// Our per-record view; peers without one fall back to a range delta
        #[serde(default, skip_serializing_if = "Option::is_none")]
        manifest: Option<SyncManifest>,
    },
    /// One chunk of a delta sent to a peer
    SyncDelta {
        /// Space
        space_id: SpaceId,
        /// Receiving peer
        peer_inbox: InboxAddress,
        /// Chunk index within this delta
        chunk: u32,
        /// Members carried by the chunk
        #[serde(default)]
        members: Vec<SpaceMember>,
        /// Messages carried by the chunk
        #[serde(default)]
        messages: Vec<Message>,
        /// Peer map entries carried by the chunk
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        peers: Vec<PeerEntry>,
        /// Last chunk of this delta
        #[serde(default)]
        is_final: bool,
    },
    /// Re-assert that a user is kicked
    VerifyKicked {
        /// Space
        space_id: SpaceId,
        /// Space hub
        hub_address: InboxAddress,
        /// Kicked user
        user_address: UserAddress,
    },
    /// Send our manifest to the peer that initiated with one
    SyncManifest {
        /// Space
        space_id: SpaceId,
        /// Initiating peer
        peer_inbox: InboxAddress,
        /// Our inbox, where its delta goes
        inbox_address: InboxAddress,
        /// Our per-record view
        manifest: SyncManifest,
    },
}

impl ActionContext {
    /// The action type this payload belongs to
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::SendChannelMessage { .. } => ActionType::SendChannelMessage,
            Self::SendDirectMessage { .. } => ActionType::SendDirectMessage,
            Self::Reaction { .. } => ActionType::Reaction,
            Self::ReactionDirect { .. } => ActionType::ReactionDirect,
            Self::Pin { .. } => ActionType::Pin,
            Self::Unpin { .. } => ActionType::Unpin,
            Self::Edit { .. } => ActionType::Edit,
            Self::EditDirect { .. } => ActionType::EditDirect,
            Self::Delete { .. } => ActionType::Delete,
            Self::DeleteDirect { .. } => ActionType::DeleteDirect,
            Self::KickUser { .. } => ActionType::KickUser,
            Self::MuteUser { .. } => ActionType::MuteUser,
            Self::UnmuteUser { .. } => ActionType::UnmuteUser,
            Self::SaveUserConfig { .. } => ActionType::SaveUserConfig,
            Self::UpdateSpace { .. } => ActionType::UpdateSpace,
            Self::SyncRequest { .. } => ActionType::SyncRequest,
            Self::SyncInfo { .. } => ActionType::SyncInfo,
            Self::SyncInitiate { .. } => ActionType::SyncInitiate,
            Self::SyncDelta { .. } => ActionType::SyncDelta,
            Self::VerifyKicked { .. } => ActionType::VerifyKicked,
            Self::SyncManifest { .. } => ActionType::SyncManifest,
        }
    }

    /// Deterministic key naming the logical intent of the action.
    ///
    /// Two contexts with the same key supersede each other in the queue.
    pub fn dedupe_key(&self) -> String {
        let kind = self.action_type();
        match self {
            Self::SendChannelMessage { target, message } => format!(
                "{kind}:{}:{}:{}",
                target.space_id, target.channel_id, message.message_id
            ),
            Self::SendDirectMessage { target, message } => {
                format!("{kind}:{}:{}", target.counterparty, message.message_id)
            }
            Self::Reaction {
                target,
                message_id,
                reaction,
                sender,
                ..
            } => format!(
                "{kind}:{}:{}:{message_id}:{sender}:{reaction}",
                target.space_id, target.channel_id
            ),
            Self::ReactionDirect {
                target,
                message_id,
                reaction,
                sender,
                ..
            } => format!("{kind}:{}:{message_id}:{sender}:{reaction}", target.counterparty),
            Self::Pin {
                target, message_id, ..
            }
            | Self::Unpin {
                target, message_id, ..
            }
            | Self::Edit {
                target, message_id, ..
            }
            | Self::Delete {
                target, message_id, ..
            } => format!(
                "{kind}:{}:{}:{message_id}",
                target.space_id, target.channel_id
            ),
            Self::EditDirect {
                target, message_id, ..
            }
            | Self::DeleteDirect {
                target, message_id, ..
            } => format!("{kind}:{}:{message_id}", target.counterparty),
            Self::KickUser {
                space_id,
                user_address,
                ..
            }
            | Self::MuteUser {
                space_id,
                user_address,
                ..
            }
            | Self::UnmuteUser {
                space_id,
                user_address,
                ..
            }
            | Self::VerifyKicked {
                space_id,
                user_address,
                ..
            } => format!("{kind}:{space_id}:{user_address}"),
            Self::SaveUserConfig { config, .. } => format!("{kind}:{}", config.user_address),
            Self::UpdateSpace { space } => format!("{kind}:{}", space.space_id),
            Self::SyncRequest { space_id, .. } | Self::SyncInitiate { space_id, .. } => {
                format!("{kind}:{space_id}")
            }
            Self::SyncInfo {
                space_id,
                peer_inbox,
                ..
            }
            | Self::SyncManifest {
                space_id,
                peer_inbox,
                ..
            } => format!("{kind}:{space_id}:{peer_inbox}"),
            Self::SyncDelta {
                space_id,
                peer_inbox,
                chunk,
                ..
            } => format!("{kind}:{space_id}:{peer_inbox}:{chunk}"),
        }
    }

    /// The conversation this action belongs to. Actions sharing an ordering key execute
    /// in enqueue order.
    pub fn ordering_key(&self) -> String {
        match self {
            Self::SendChannelMessage { target, .. }
            | Self::Reaction { target, .. }
            | Self::Pin { target, .. }
            | Self::Unpin { target, .. }
            | Self::Edit { target, .. }
            | Self::Delete { target, .. } => format!("space:{}", target.space_id),
            Self::SendDirectMessage { target, .. }
            | Self::ReactionDirect { target, .. }
            | Self::EditDirect { target, .. }
            | Self::DeleteDirect { target, .. } => format!("direct:{}", target.counterparty),
            Self::KickUser { space_id, .. }
            | Self::MuteUser { space_id, .. }
            | Self::UnmuteUser { space_id, .. }
            | Self::SyncRequest { space_id, .. }
            | Self::SyncInfo { space_id, .. }
            | Self::SyncInitiate { space_id, .. }
            | Self::SyncDelta { space_id, .. }
            | Self::SyncManifest { space_id, .. }
            | Self::VerifyKicked { space_id, .. } => format!("space:{space_id}"),
            Self::UpdateSpace { space } => format!("space:{}", space.space_id),
            Self::SaveUserConfig { config, .. } => format!("config:{}", config.user_address),
        }
    }
}

/// A durable unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Identifier assigned at enqueue time
    pub id: ActionId,
    /// Position in processing order; preserved when the payload is superseded
    pub seq: u64,
    /// Handler payload
    pub context: ActionContext,
    /// Logical intent, see [`ActionContext::dedupe_key`]
    pub dedupe_key: String,
    /// Lifecycle state
    pub status: ActionStatus,
    /// Failed executions so far
    pub attempts: u32,
    /// When the action was first enqueued
    pub enqueued_at: Timestamp,
    /// When the last execution started
    pub last_attempt_at: Option<Timestamp>,
    /// Earliest time the next execution may start
    pub next_attempt_at: Timestamp,
    /// Sanitized description of the last failure
    pub last_error: Option<String>,
    /// When the action reached a terminal state
    pub processed_at: Option<Timestamp>,
}

impl Action {
    /// The action type
    pub fn action_type(&self) -> ActionType {
        self.context.action_type()
    }
}

/// Input to [`crate::queue::ActionQueueStorage::enqueue_action`]
#[derive(Debug, Clone, PartialEq)]
pub struct NewAction {
    /// Identifier used if the action is inserted
    pub id: ActionId,
    /// Handler payload
    pub context: ActionContext,
    /// Logical intent
    pub dedupe_key: String,
    /// Enqueue time; also the initial ready time
    pub enqueued_at: Timestamp,
}

impl NewAction {
    /// New action keyed by [`ActionContext::dedupe_key`]
    pub fn new(context: ActionContext, enqueued_at: Timestamp) -> Self {
        let dedupe_key = context.dedupe_key();
        Self {
            id: ActionId::new(),
            context,
            dedupe_key,
            enqueued_at,
        }
    }

    /// Override the dedupe key
    pub fn with_dedupe_key<S>(mut self, dedupe_key: S) -> Self
    where
        S: Into<String>,
    {
        self.dedupe_key = dedupe_key.into();
        self
    }
}

/// Result of an enqueue
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// A new record was appended
    Inserted(Action),
    /// A pending record with the same dedupe key took the new payload
    Replaced(Action),
}

impl EnqueueOutcome {
    /// The stored record
    pub fn action(&self) -> &Action {
        match self {
            Self::Inserted(action) | Self::Replaced(action) => action,
        }
    }

    /// Consume into the stored record
    pub fn into_action(self) -> Action {
        match self {
            Self::Inserted(action) | Self::Replaced(action) => action,
        }
    }

    /// Whether an existing record was superseded
    pub fn is_replaced(&self) -> bool {
        matches!(self, Self::Replaced(_))
    }
}

/// Record counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Waiting records
    pub pending: usize,
    /// Records handed to a handler
    pub processing: usize,
    /// Terminal failure records
    pub failed: usize,
}

impl QueueStats {
    /// Every record
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.failed
    }
}
