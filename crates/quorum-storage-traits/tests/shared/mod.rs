//! Shared test functions run against every storage backend

#![allow(dead_code)]

use quorum_storage_traits::encryption::types::{EncryptionState, SessionState};
use quorum_storage_traits::messages::types::{Message, MessageContent};
use quorum_storage_traits::queue::types::{ActionContext, ChannelTarget};
use quorum_storage_traits::spaces::types::{Channel, Space, SpaceMember};
use quorum_storage_traits::{
    ChannelId, ConversationId, InboxAddress, MessageId, SpaceId, Timestamp, UserAddress,
};

pub mod encryption_tests;
pub mod queue_tests;
pub mod space_tests;

pub fn create_test_space(space_id: &str) -> Space {
    Space {
        space_id: SpaceId::new(space_id),
        name: format!("Space {space_id}"),
        description: "A test space".to_string(),
        channels: vec![Channel {
            channel_id: ChannelId::new("general"),
            name: "general".to_string(),
        }],
        hub_address: Some(InboxAddress::new(format!("hub-{space_id}"))),
        inbox_address: Some(InboxAddress::new(format!("inbox-{space_id}"))),
        created_at: Timestamp::from_millis(1_000),
    }
}

pub fn create_test_member(space_id: &str, user: &str) -> SpaceMember {
    SpaceMember {
        space_id: SpaceId::new(space_id),
        user_address: UserAddress::new(user),
        inbox_address: Some(InboxAddress::new(format!("inbox-{user}"))),
        display_name: Some(user.to_uppercase()),
        joined_at: Timestamp::from_millis(2_000),
    }
}

pub fn create_test_message(space_id: &str, message_id: &str, created_at: u64) -> Message {
    Message {
        space_id: SpaceId::new(space_id),
        channel_id: ChannelId::new("general"),
        message_id: MessageId::new(message_id),
        sender: UserAddress::new("alice"),
        created_at: Timestamp::from_millis(created_at),
        modified_at: Timestamp::from_millis(created_at),
        content: MessageContent::Post {
            text: format!("message {message_id}"),
            reply_to: None,
        },
        pinned: false,
    }
}

pub fn create_test_state(conversation: &str, tag: &str, inbox: Option<&str>) -> EncryptionState {
    EncryptionState {
        conversation_id: ConversationId::new(conversation),
        tag: tag.to_string(),
        inbox_id: inbox.map(InboxAddress::new),
        state: SessionState::new(format!("ratchet-{tag}").into_bytes()),
        updated_at: Timestamp::from_millis(3_000),
    }
}

pub fn edit_context(message_id: &str, text: &str) -> ActionContext {
    ActionContext::Edit {
        target: ChannelTarget {
            space_id: SpaceId::new("space"),
            channel_id: ChannelId::new("general"),
            hub_address: InboxAddress::new("hub-space"),
        },
        message_id: MessageId::new(message_id),
        text: text.to_string(),
        sender: UserAddress::new("alice"),
        edited_at: Timestamp::from_millis(5_000),
    }
}
