//! Handlers for message-level actions: send, react, pin, edit, delete

use async_trait::async_trait;
use quorum_storage_traits::messages::types::{Message, MessageContent};
use quorum_storage_traits::queue::types::ActionContext;
use quorum_storage_traits::{
    ChannelId, ConversationId, InboxAddress, MessageId, QuorumStorageProvider, SpaceId,
};

use super::{ActionHandler, HandlerDeps, mismatched};
use crate::error::{ActionError, FailureKind, SanitizedError};
use crate::status::MessageStatus;
use crate::wire::WirePayload;

/// Where a message-level action lands: storage coordinates plus delivery route
struct Route {
    space_id: SpaceId,
    channel_id: ChannelId,
    conversation_id: ConversationId,
    destinations: Vec<InboxAddress>,
}

fn route(context: &ActionContext) -> Option<Route> {
    match context {
        ActionContext::SendChannelMessage { target, .. }
        | ActionContext::Reaction { target, .. }
        | ActionContext::Pin { target, .. }
        | ActionContext::Unpin { target, .. }
        | ActionContext::Edit { target, .. }
        | ActionContext::Delete { target, .. } => Some(Route {
            space_id: target.space_id.clone(),
            channel_id: target.channel_id.clone(),
            conversation_id: ConversationId::for_space(&target.space_id),
            destinations: vec![target.hub_address.clone()],
        }),
        ActionContext::SendDirectMessage { target, .. }
        | ActionContext::ReactionDirect { target, .. }
        | ActionContext::EditDirect { target, .. }
        | ActionContext::DeleteDirect { target, .. } => Some(Route {
            space_id: target.space_id(),
            channel_id: target.channel_id(),
            conversation_id: target.conversation_id(),
            destinations: target.inbox_addresses.clone(),
        }),
        _ => None,
    }
}

fn find_target<S>(
    deps: &HandlerDeps<S>,
    route: &Route,
    message_id: &MessageId,
) -> Result<Option<Message>, ActionError>
where
    S: QuorumStorageProvider,
{
    Ok(deps
        .storage
        .find_message(&route.space_id, &route.channel_id, message_id)?)
}

/// Posts channel and direct messages
///
/// Channel sends are gated on the space and channel still existing. Both kinds drive
/// the status projection: `pending` per attempt, `sent` on success, `failed` on
/// abandonment.
pub struct SendMessageHandler<S> {
    deps: HandlerDeps<S>,
}

impl<S> SendMessageHandler<S>
where
    S: QuorumStorageProvider,
{
    /// New handler
    pub fn new(deps: HandlerDeps<S>) -> Self {
        Self { deps }
    }

    fn set_status(&self, route: &Route, message: &Message, status: MessageStatus, reason: Option<String>) {
        self.deps.status.update_message_status(
            &route.space_id,
            &route.channel_id,
            &message.message_id,
            status,
            reason,
        );
    }
}

#[async_trait]
impl<S> ActionHandler for SendMessageHandler<S>
where
    S: QuorumStorageProvider + 'static,
{
    async fn execute(&self, context: &ActionContext) -> Result<(), ActionError> {
        let (route, message) = match (route(context), context) {
            (Some(route), ActionContext::SendChannelMessage { message, .. })
            | (Some(route), ActionContext::SendDirectMessage { message, .. }) => (route, message),
            _ => return Err(mismatched("SendMessageHandler", context)),
        };

        if let ActionContext::SendChannelMessage { target, .. } = context {
            let space = self.deps.storage.find_space(&target.space_id)?;
            let channel_exists = space
                .as_ref()
                .is_some_and(|space| space.has_channel(&target.channel_id));
            if !channel_exists {
                tracing::debug!(
                    space_id = %target.space_id,
                    channel_id = %target.channel_id,
                    "Channel no longer exists, dropping send"
                );
                // An earlier attempt may have left the message pending
                let reason = SanitizedError::new(FailureKind::Permission);
                self.set_status(
                    &route,
                    message,
                    MessageStatus::Failed,
                    Some(reason.message().to_string()),
                );
                return Ok(());
            }
        }

        self.set_status(&route, message, MessageStatus::Pending, None);

        let payload = WirePayload::Post {
            message: message.clone(),
        };
        self.deps
            .deliver(&route.conversation_id, &route.destinations, &payload)
            .await?;

        self.deps.storage.save_message(message.clone())?;
        self.set_status(&route, message, MessageStatus::Sent, None);
        Ok(())
    }

    fn is_permanent_error(&self, error: &ActionError) -> bool {
        error.is_rejection()
    }

    async fn on_failure(&self, context: &ActionContext, error: &SanitizedError) {
        if let (Some(route), ActionContext::SendChannelMessage { message, .. })
        | (Some(route), ActionContext::SendDirectMessage { message, .. }) = (route(context), context)
        {
            self.set_status(
                &route,
                message,
                MessageStatus::Failed,
                Some(error.message().to_string()),
            );
        }
    }
}

/// Adds or withdraws reactions; gated on the target message. Fails silently.
pub struct ReactionHandler<S> {
    deps: HandlerDeps<S>,
}

impl<S> ReactionHandler<S>
where
    S: QuorumStorageProvider,
{
    /// New handler
    pub fn new(deps: HandlerDeps<S>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl<S> ActionHandler for ReactionHandler<S>
where
    S: QuorumStorageProvider + 'static,
{
    async fn execute(&self, context: &ActionContext) -> Result<(), ActionError> {
        let (route, message_id, reaction, remove, sender) = match (route(context), context) {
            (
                Some(route),
                ActionContext::Reaction {
                    message_id,
                    reaction,
                    remove,
                    sender,
                    ..
                },
            )
            | (
                Some(route),
                ActionContext::ReactionDirect {
                    message_id,
                    reaction,
                    remove,
                    sender,
                    ..
                },
            ) => (route, message_id, reaction, *remove, sender),
            _ => return Err(mismatched("ReactionHandler", context)),
        };

        if find_target(&self.deps, &route, message_id)?.is_none() {
            return Ok(());
        }

        let payload = WirePayload::Reaction {
            space_id: route.space_id.clone(),
            channel_id: route.channel_id.clone(),
            message_id: message_id.clone(),
            reaction: reaction.clone(),
            remove,
            sender: sender.clone(),
        };
        self.deps
            .deliver(&route.conversation_id, &route.destinations, &payload)
            .await
    }

    fn is_permanent_error(&self, error: &ActionError) -> bool {
        error.is_rejection()
    }
}

/// Pins or unpins a channel message
pub struct PinHandler<S> {
    deps: HandlerDeps<S>,
    pinned: bool,
}

impl<S> PinHandler<S>
where
    S: QuorumStorageProvider,
{
    /// New handler; `pinned` selects pin or unpin
    pub fn new(deps: HandlerDeps<S>, pinned: bool) -> Self {
        Self { deps, pinned }
    }
}

#[async_trait]
impl<S> ActionHandler for PinHandler<S>
where
    S: QuorumStorageProvider + 'static,
{
    async fn execute(&self, context: &ActionContext) -> Result<(), ActionError> {
        let (route, message_id, sender) = match (route(context), context) {
            (
                Some(route),
                ActionContext::Pin {
                    message_id, sender, ..
                },
            ) if self.pinned => (route, message_id, sender),
            (
                Some(route),
                ActionContext::Unpin {
                    message_id, sender, ..
                },
            ) if !self.pinned => (route, message_id, sender),
            _ => return Err(mismatched("PinHandler", context)),
        };

        let Some(mut message) = find_target(&self.deps, &route, message_id)? else {
            return Ok(());
        };

        let payload = WirePayload::Pin {
            space_id: route.space_id.clone(),
            channel_id: route.channel_id.clone(),
            message_id: message_id.clone(),
            pinned: self.pinned,
            sender: sender.clone(),
        };
        self.deps
            .deliver(&route.conversation_id, &route.destinations, &payload)
            .await?;

        if message.pinned != self.pinned {
            message.pinned = self.pinned;
            self.deps.storage.save_message(message)?;
        }
        Ok(())
    }

    fn is_permanent_error(&self, error: &ActionError) -> bool {
        error.is_rejection()
    }

    fn failure_message(&self) -> Option<&'static str> {
        if self.pinned {
            Some("Failed to pin message")
        } else {
            Some("Failed to unpin message")
        }
    }
}

/// Edits a channel or direct message; gated on the target message
pub struct EditHandler<S> {
    deps: HandlerDeps<S>,
}

impl<S> EditHandler<S>
where
    S: QuorumStorageProvider,
{
    /// New handler
    pub fn new(deps: HandlerDeps<S>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl<S> ActionHandler for EditHandler<S>
where
    S: QuorumStorageProvider + 'static,
{
    async fn execute(&self, context: &ActionContext) -> Result<(), ActionError> {
        let (route, message_id, text, sender, edited_at) = match (route(context), context) {
            (
                Some(route),
                ActionContext::Edit {
                    message_id,
                    text,
                    sender,
                    edited_at,
                    ..
                },
            )
            | (
                Some(route),
                ActionContext::EditDirect {
                    message_id,
                    text,
                    sender,
                    edited_at,
                    ..
                },
            ) => (route, message_id, text, sender, *edited_at),
            _ => return Err(mismatched("EditHandler", context)),
        };

        let Some(mut message) = find_target(&self.deps, &route, message_id)? else {
            return Ok(());
        };

        let payload = WirePayload::Edit {
            space_id: route.space_id.clone(),
            channel_id: route.channel_id.clone(),
            message_id: message_id.clone(),
            text: text.clone(),
            sender: sender.clone(),
            edited_at,
        };
        self.deps
            .deliver(&route.conversation_id, &route.destinations, &payload)
            .await?;

        if let MessageContent::Post { text: body, .. } = &mut message.content {
            body.clone_from(text);
        }
        message.modified_at = message.modified_at.max(edited_at);
        self.deps.storage.save_message(message)?;
        Ok(())
    }

    fn is_permanent_error(&self, error: &ActionError) -> bool {
        error.is_rejection()
    }

    fn failure_message(&self) -> Option<&'static str> {
        Some("Failed to edit message")
    }
}

/// Deletes a channel or direct message.
///
/// A target that is already gone, remotely or locally, counts as deleted. No error is
/// ever permanent.
pub struct DeleteHandler<S> {
    deps: HandlerDeps<S>,
}

impl<S> DeleteHandler<S>
where
    S: QuorumStorageProvider,
{
    /// New handler
    pub fn new(deps: HandlerDeps<S>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl<S> ActionHandler for DeleteHandler<S>
where
    S: QuorumStorageProvider + 'static,
{
    async fn execute(&self, context: &ActionContext) -> Result<(), ActionError> {
        let (route, message_id, sender) = match (route(context), context) {
            (
                Some(route),
                ActionContext::Delete {
                    message_id, sender, ..
                },
            )
            | (
                Some(route),
                ActionContext::DeleteDirect {
                    message_id, sender, ..
                },
            ) => (route, message_id, sender),
            _ => return Err(mismatched("DeleteHandler", context)),
        };

        let payload = WirePayload::Delete {
            space_id: route.space_id.clone(),
            channel_id: route.channel_id.clone(),
            message_id: message_id.clone(),
            sender: sender.clone(),
        };
        match self
            .deps
            .deliver(&route.conversation_id, &route.destinations, &payload)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(message_id = %message_id, "Delete target already gone");
            }
            Err(e) => return Err(e),
        }

        self.deps
            .storage
            .delete_message(&route.space_id, &route.channel_id, message_id)?;
        Ok(())
    }

    fn is_permanent_error(&self, _error: &ActionError) -> bool {
        false
    }

    fn failure_message(&self) -> Option<&'static str> {
        Some("Failed to delete message")
    }
}
