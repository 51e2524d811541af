//! Message delivery status projection consumed by the UI

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use quorum_storage_traits::{ChannelId, MessageId, SpaceId};

/// Delivery status of a locally originated message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageStatus {
    /// Queued or being retried
    Pending,
    /// Delivered to transport
    Sent,
    /// Abandoned
    Failed,
}

impl MessageStatus {
    /// Get as `&str`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Space
    pub space_id: SpaceId,
    /// Channel
    pub channel_id: ChannelId,
    /// Message
    pub message_id: MessageId,
    /// New status
    pub status: MessageStatus,
    /// Sanitized failure reason for [`MessageStatus::Failed`]
    pub reason: Option<String>,
}

type MessageKey = (SpaceId, ChannelId, MessageId);

#[derive(Debug, Default)]
struct ProjectionInner {
    latest: HashMap<MessageKey, MessageStatus>,
    subscribers: Vec<flume::Sender<StatusUpdate>>,
}

/// Latest delivery status per message, plus a stream of every transition
#[derive(Debug, Clone, Default)]
pub struct StatusProjection {
    inner: Arc<Mutex<ProjectionInner>>,
}

impl StatusProjection {
    /// Empty projection
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every subsequent status transition
    pub fn subscribe(&self) -> flume::Receiver<StatusUpdate> {
        let (tx, rx) = flume::unbounded();
        self.inner.lock().subscribers.push(tx);
        rx
    }

    /// Record a status transition and notify subscribers
    pub fn update_message_status(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
        status: MessageStatus,
        reason: Option<String>,
    ) {
        let update = StatusUpdate {
            space_id: space_id.clone(),
            channel_id: channel_id.clone(),
            message_id: message_id.clone(),
            status,
            reason,
        };

        let key = (space_id.clone(), channel_id.clone(), message_id.clone());
        let mut inner = self.inner.lock();
        match status {
            MessageStatus::Pending => {
                inner.latest.insert(key, status);
            }
            // Resolved messages are only streamed
            MessageStatus::Sent | MessageStatus::Failed => {
                inner.latest.remove(&key);
            }
        }
        // Dropped receivers unsubscribe themselves
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(update.clone()).is_ok());
    }

    /// Status of a message still in flight.
    ///
    /// `sent` and `failed` are delivered to subscribers and then forgotten, so a resolved
    /// message reads as `None`.
    pub fn status(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Option<MessageStatus> {
        self.inner
            .lock()
            .latest
            .get(&(space_id.clone(), channel_id.clone(), message_id.clone()))
            .copied()
    }

    /// Number of messages still pending
    pub fn pending_count(&self) -> usize {
        self.inner.lock().latest.len()
    }
}
