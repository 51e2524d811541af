//! Types for the spaces module

use serde::{Deserialize, Serialize};

use crate::{ChannelId, InboxAddress, SpaceId, Timestamp, UserAddress};

/// A channel inside a space
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    /// Channel identifier
    pub channel_id: ChannelId,
    /// Display name
    pub name: String,
}

/// A space (group conversation) as replicated locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Space identifier
    pub space_id: SpaceId,
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Channels in the space
    #[serde(default)]
    pub channels: Vec<Channel>,
    /// Broadcast address all members listen on
    pub hub_address: Option<InboxAddress>,
    /// Our own inbox address for this space
    pub inbox_address: Option<InboxAddress>,
    /// When the space was created
    pub created_at: Timestamp,
}

impl Space {
    /// Whether the space still contains `channel_id`
    pub fn has_channel(&self, channel_id: &ChannelId) -> bool {
        self.channels.iter().any(|c| &c.channel_id == channel_id)
    }
}

/// Membership record for a user in a space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceMember {
    /// Space the member belongs to
    pub space_id: SpaceId,
    /// Member's account address
    pub user_address: UserAddress,
    /// Member's inbox for this space, if known
    pub inbox_address: Option<InboxAddress>,
    /// Display name, if the member published one
    pub display_name: Option<String>,
    /// When the member joined
    pub joined_at: Timestamp,
}
