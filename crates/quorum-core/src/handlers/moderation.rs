//! Kick, mute and unmute

use async_trait::async_trait;
use quorum_storage_traits::queue::types::ActionContext;
use quorum_storage_traits::{ConversationId, QuorumStorageProvider};

use super::{ActionHandler, HandlerDeps, mismatched};
use crate::error::ActionError;
use crate::wire::{ModerationKind, WirePayload};

/// Broadcasts a moderation decision to the space hub.
///
/// Kicks are gated on the user still being a member and remove the local membership
/// record once delivered. Mutes are plain state replacements.
pub struct ModerationHandler<S> {
    deps: HandlerDeps<S>,
    kind: ModerationKind,
}

impl<S> ModerationHandler<S>
where
    S: QuorumStorageProvider,
{
    /// New handler for one moderation operation
    pub fn new(deps: HandlerDeps<S>, kind: ModerationKind) -> Self {
        Self { deps, kind }
    }
}

#[async_trait]
impl<S> ActionHandler for ModerationHandler<S>
where
    S: QuorumStorageProvider + 'static,
{
    async fn execute(&self, context: &ActionContext) -> Result<(), ActionError> {
        let (space_id, hub_address, user_address, sender) = match (self.kind, context) {
            (
                ModerationKind::Kick,
                ActionContext::KickUser {
                    space_id,
                    hub_address,
                    user_address,
                    sender,
                },
            )
            | (
                ModerationKind::Mute,
                ActionContext::MuteUser {
                    space_id,
                    hub_address,
                    user_address,
                    sender,
                },
            )
            | (
                ModerationKind::Unmute,
                ActionContext::UnmuteUser {
                    space_id,
                    hub_address,
                    user_address,
                    sender,
                },
            ) => (space_id, hub_address, user_address, sender),
            _ => return Err(mismatched("ModerationHandler", context)),
        };

        if self.kind == ModerationKind::Kick {
            let is_member = self
                .deps
                .storage
                .space_members(space_id)?
                .iter()
                .any(|member| &member.user_address == user_address);
            if !is_member {
                tracing::debug!(
                    space_id = %space_id,
                    user_address = %user_address,
                    "User is not a member, nothing to kick"
                );
                return Ok(());
            }
        }

        let payload = WirePayload::Moderation {
            space_id: space_id.clone(),
            kind: self.kind,
            user_address: user_address.clone(),
            sender: sender.clone(),
        };
        self.deps
            .deliver(
                &ConversationId::for_space(space_id),
                std::slice::from_ref(hub_address),
                &payload,
            )
            .await?;

        if self.kind == ModerationKind::Kick {
            self.deps
                .storage
                .delete_space_member(space_id, user_address)?;
        }
        Ok(())
    }

    fn is_permanent_error(&self, error: &ActionError) -> bool {
        error.is_rejection()
    }

    fn failure_message(&self) -> Option<&'static str> {
        Some(match self.kind {
            ModerationKind::Kick => "Failed to remove user",
            ModerationKind::Mute => "Failed to mute user",
            ModerationKind::Unmute => "Failed to unmute user",
        })
    }
}
