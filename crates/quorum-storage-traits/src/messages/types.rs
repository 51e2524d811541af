//! Types for the messages module

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{ChannelId, MessageId, SpaceId, Timestamp, UserAddress};

/// A message or control event in a space's log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Space the message belongs to
    pub space_id: SpaceId,
    /// Channel the message belongs to
    pub channel_id: ChannelId,
    /// Message identifier
    pub message_id: MessageId,
    /// Author
    pub sender: UserAddress,
    /// Creation time as stamped by the author
    pub created_at: Timestamp,
    /// Last local modification (edit, pin)
    pub modified_at: Timestamp,
    /// Typed content
    pub content: MessageContent,
    /// Whether the message is pinned in its channel
    #[serde(default)]
    pub pinned: bool,
}

impl Message {
    /// Chronological ordering used by every backend: `created_at` ascending, then
    /// `message_id` so equal timestamps still replay deterministically.
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.message_id.cmp(&other.message_id))
    }
}

/// Message payloads
///
/// Membership events (`Join`, `Kick`, ...) name the affected user in `user_address`,
/// which may differ from the message sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessageContent {
    /// A regular post
    Post {
        /// Body
        text: String,
        /// Message this replies to
        #[serde(default)]
        reply_to: Option<MessageId>,
    },
    /// Edit of an earlier post
    Edit {
        /// Edited message
        target: MessageId,
        /// Replacement body
        text: String,
    },
    /// Removal of an earlier post
    Delete {
        /// Removed message
        target: MessageId,
    },
    /// Reaction added to a message
    Reaction {
        /// Message reacted to
        target: MessageId,
        /// Emoji or short code
        reaction: String,
    },
    /// Reaction withdrawn from a message
    RemoveReaction {
        /// Message reacted to
        target: MessageId,
        /// Emoji or short code
        reaction: String,
    },
    /// Message pinned
    Pin {
        /// Pinned message
        target: MessageId,
    },
    /// Message unpinned
    Unpin {
        /// Unpinned message
        target: MessageId,
    },
    /// User joined the space
    Join {
        /// Joining user
        user_address: UserAddress,
    },
    /// User left the space
    Leave {
        /// Leaving user
        user_address: UserAddress,
    },
    /// User was removed from the space
    Kick {
        /// Removed user
        user_address: UserAddress,
    },
    /// User was muted
    Mute {
        /// Muted user
        user_address: UserAddress,
    },
    /// User was unmuted
    Unmute {
        /// Unmuted user
        user_address: UserAddress,
    },
}

impl MessageContent {
    /// Wire tag of the content variant
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Post { .. } => "post",
            Self::Edit { .. } => "edit",
            Self::Delete { .. } => "delete",
            Self::Reaction { .. } => "reaction",
            Self::RemoveReaction { .. } => "remove-reaction",
            Self::Pin { .. } => "pin",
            Self::Unpin { .. } => "unpin",
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Kick { .. } => "kick",
            Self::Mute { .. } => "mute",
            Self::Unmute { .. } => "unmute",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, created_at: u64) -> Message {
        Message {
            space_id: SpaceId::new("s"),
            channel_id: ChannelId::new("c"),
            message_id: MessageId::new(id),
            sender: UserAddress::new("alice"),
            created_at: Timestamp::from_millis(created_at),
            modified_at: Timestamp::from_millis(created_at),
            content: MessageContent::Post {
                text: "hi".to_string(),
                reply_to: None,
            },
            pinned: false,
        }
    }

    #[test]
    fn test_chronological_cmp_breaks_ties_by_id() {
        let a = message("a", 10);
        let b = message("b", 10);
        let c = message("c", 5);
        let mut all = vec![b.clone(), a.clone(), c.clone()];
        all.sort_by(|x, y| x.chronological_cmp(y));
        assert_eq!(all, vec![c, a, b]);
    }

    #[test]
    fn test_content_is_type_tagged() {
        let content = MessageContent::Kick {
            user_address: UserAddress::new("bob"),
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "kick");
        assert_eq!(json["user_address"], "bob");
        assert_eq!(content.kind(), "kick");
    }
}
