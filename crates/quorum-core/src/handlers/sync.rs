//! Sync control messages produced by the sync engine

use async_trait::async_trait;
use quorum_storage_traits::queue::types::ActionContext;
use quorum_storage_traits::{ConversationId, InboxAddress, QuorumStorageProvider, SpaceId};

use super::{ActionHandler, HandlerDeps, mismatched};
use crate::error::ActionError;
use crate::wire::WirePayload;

/// Delivers `sync-*` and `verify-kicked` actions.
///
/// All of them are moot once the space is gone locally.
pub struct SyncHandler<S> {
    deps: HandlerDeps<S>,
}

impl<S> SyncHandler<S>
where
    S: QuorumStorageProvider,
{
    /// New handler
    pub fn new(deps: HandlerDeps<S>) -> Self {
        Self { deps }
    }
}

fn outbound(context: &ActionContext) -> Option<(&SpaceId, &InboxAddress, WirePayload)> {
    let outbound = match context {
        ActionContext::SyncRequest {
            space_id,
            hub_address,
            inbox_address,
            expiry,
            summary,
        } => (
            space_id,
            hub_address,
            WirePayload::SyncRequest {
                space_id: space_id.clone(),
                inbox_address: inbox_address.clone(),
                expiry: *expiry,
                summary: summary.clone(),
            },
        ),
        ActionContext::SyncInfo {
            space_id,
            peer_inbox,
            inbox_address,
            summary,
        } => (
            space_id,
            peer_inbox,
            WirePayload::SyncInfo {
                space_id: space_id.clone(),
                inbox_address: inbox_address.clone(),
                summary: summary.clone(),
            },
        ),
        ActionContext::SyncInitiate {
            space_id,
            peer_inbox,
            inbox_address,
            summary,
            manifest,
        } => (
            space_id,
            peer_inbox,
            WirePayload::SyncInitiate {
                space_id: space_id.clone(),
                inbox_address: inbox_address.clone(),
                summary: summary.clone(),
                manifest: manifest.clone(),
            },
        ),
        ActionContext::SyncManifest {
            space_id,
            peer_inbox,
            inbox_address,
            manifest,
        } => (
            space_id,
            peer_inbox,
            WirePayload::SyncManifest {
                space_id: space_id.clone(),
                inbox_address: inbox_address.clone(),
                manifest: manifest.clone(),
            },
        ),
        ActionContext::SyncDelta {
            space_id,
            peer_inbox,
            chunk,
            members,
            messages,
            peers,
            is_final,
        } => (
            space_id,
            peer_inbox,
            WirePayload::SyncDelta {
                space_id: space_id.clone(),
                chunk: *chunk,
                members: members.clone(),
                messages: messages.clone(),
                peers: peers.clone(),
                is_final: *is_final,
            },
        ),
        ActionContext::VerifyKicked {
            space_id,
            hub_address,
            user_address,
        } => (
            space_id,
            hub_address,
            WirePayload::VerifyKicked {
                space_id: space_id.clone(),
                user_address: user_address.clone(),
            },
        ),
        _ => return None,
    };
    Some(outbound)
}

#[async_trait]
impl<S> ActionHandler for SyncHandler<S>
where
    S: QuorumStorageProvider + 'static,
{
    async fn execute(&self, context: &ActionContext) -> Result<(), ActionError> {
        let Some((space_id, destination, payload)) = outbound(context) else {
            return Err(mismatched("SyncHandler", context));
        };

        if self.deps.storage.find_space(space_id)?.is_none() {
            tracing::debug!(
                space_id = %space_id,
                action_type = %context.action_type(),
                "Space no longer exists, dropping sync message"
            );
            return Ok(());
        }

        self.deps
            .deliver(
                &ConversationId::for_space(space_id),
                std::slice::from_ref(destination),
                &payload,
            )
            .await
    }

    fn is_permanent_error(&self, error: &ActionError) -> bool {
        error.is_rejection()
    }
}
