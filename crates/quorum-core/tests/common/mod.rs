//! Collaborators and fixtures shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use quorum_core::clock::ManualClock;
use quorum_core::prelude::*;
use quorum_core::status::StatusProjection;
use quorum_core::wire::WirePayload;
use quorum_storage_traits::encryption::types::EncryptionState;
use quorum_storage_traits::messages::types::{Message, MessageContent};
use quorum_storage_traits::queue::types::ChannelTarget;
use quorum_storage_traits::spaces::types::{Channel, Space, SpaceMember};

pub const START: Timestamp = Timestamp::from_millis(1_000_000);

/// Transport that records envelopes and fails on demand
#[derive(Debug, Default)]
pub struct RecordingTransport {
    scripted: Mutex<VecDeque<TransportError>>,
    always: Mutex<Option<TransportError>>,
    sent: Mutex<Vec<(InboxAddress, WirePayload)>>,
    calls: Mutex<usize>,
}

impl RecordingTransport {
    pub fn fail_next(&self, error: TransportError) {
        self.scripted.lock().push_back(error);
    }

    pub fn fail_always(&self, error: TransportError) {
        *self.always.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.always.lock() = None;
        self.scripted.lock().clear();
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }

    pub fn sent(&self) -> Vec<(InboxAddress, WirePayload)> {
        self.sent.lock().clone()
    }

    /// Ids of the posted messages, in send order
    pub fn posted_ids(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|(_, payload)| match payload {
                WirePayload::Post { message } => Some(message.message_id.to_string()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, destination: &InboxAddress, envelope: &[u8]) -> Result<(), TransportError> {
        *self.calls.lock() += 1;
        if let Some(error) = self.scripted.lock().pop_front() {
            return Err(error);
        }
        if let Some(error) = self.always.lock().clone() {
            return Err(error);
        }
        let payload: WirePayload = serde_json::from_slice(envelope)
            .map_err(|e| TransportError::new(format!("undecodable envelope: {e}")))?;
        self.sent.lock().push((destination.clone(), payload));
        Ok(())
    }
}

/// Sealer whose envelope is the plaintext
#[derive(Debug, Default)]
pub struct PlainSealer;

#[async_trait]
impl EnvelopeSealer for PlainSealer {
    async fn seal(
        &self,
        _conversation_id: &ConversationId,
        _state: Option<&EncryptionState>,
        plaintext: &[u8],
    ) -> Result<SealedEnvelope, SealError> {
        Ok(SealedEnvelope {
            envelope: plaintext.to_vec(),
            next_state: None,
        })
    }
}

/// A queue with every built-in handler over `storage`
pub struct Node<S> {
    pub storage: Arc<S>,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<RecordingTransport>,
    pub status: StatusProjection,
    pub queue: ActionQueue<S>,
}

impl<S> Node<S>
where
    S: QuorumStorageProvider + 'static,
{
    pub fn open(storage: Arc<S>) -> Self {
        Self::open_with(storage, Arc::new(RecordingTransport::default()))
    }

    pub fn open_with(storage: Arc<S>, transport: Arc<RecordingTransport>) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let deps = HandlerDeps::new(Arc::clone(&storage), Arc::new(PlainSealer), transport.clone());
        let status = deps.status_projection().clone();
        let queue = ActionQueue::builder(Arc::clone(&storage), HandlerRegistry::with_defaults(deps))
            .with_clock(clock.clone())
            .open()
            .unwrap();
        Self {
            storage,
            clock,
            transport,
            status,
            queue,
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.clock.advance(duration);
    }
}

pub fn space(space_id: &str) -> Space {
    Space {
        space_id: SpaceId::new(space_id),
        name: format!("Space {space_id}"),
        description: String::new(),
        channels: vec![Channel {
            channel_id: ChannelId::new("general"),
            name: "General".to_string(),
        }],
        hub_address: Some(InboxAddress::new(format!("hub-{space_id}"))),
        inbox_address: Some(InboxAddress::new(format!("inbox-{space_id}"))),
        created_at: Timestamp::from_millis(1),
    }
}

pub fn member(space_id: &str, user: &str) -> SpaceMember {
    SpaceMember {
        space_id: SpaceId::new(space_id),
        user_address: UserAddress::new(user),
        inbox_address: Some(InboxAddress::new(format!("inbox-{user}"))),
        display_name: None,
        joined_at: Timestamp::from_millis(1),
    }
}

pub fn post(space_id: &str, message_id: &str, created_at: u64) -> Message {
    event(
        space_id,
        message_id,
        created_at,
        MessageContent::Post {
            text: format!("message {message_id}"),
            reply_to: None,
        },
    )
}

pub fn event(space_id: &str, message_id: &str, created_at: u64, content: MessageContent) -> Message {
    Message {
        space_id: SpaceId::new(space_id),
        channel_id: ChannelId::new("general"),
        message_id: MessageId::new(message_id),
        sender: UserAddress::new("alice"),
        created_at: Timestamp::from_millis(created_at),
        modified_at: Timestamp::from_millis(created_at),
        content,
        pinned: false,
    }
}

pub fn send(space_id: &str, message: Message) -> ActionContext {
    ActionContext::SendChannelMessage {
        target: ChannelTarget {
            space_id: SpaceId::new(space_id),
            channel_id: ChannelId::new("general"),
            hub_address: InboxAddress::new(format!("hub-{space_id}")),
        },
        message,
    }
}

pub fn unavailable() -> TransportError {
    TransportError::with_status(503, "relay unavailable")
}
