//! User configuration and space settings

use async_trait::async_trait;
use quorum_storage_traits::queue::types::ActionContext;
use quorum_storage_traits::{ConversationId, QuorumStorageProvider};

use super::{ActionHandler, HandlerDeps, mismatched};
use crate::error::ActionError;
use crate::wire::WirePayload;

/// Stores and publishes the user's configuration. Full replacement, safe to repeat.
pub struct UserConfigHandler<S> {
    deps: HandlerDeps<S>,
}

impl<S> UserConfigHandler<S>
where
    S: QuorumStorageProvider,
{
    /// New handler
    pub fn new(deps: HandlerDeps<S>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl<S> ActionHandler for UserConfigHandler<S>
where
    S: QuorumStorageProvider + 'static,
{
    async fn execute(&self, context: &ActionContext) -> Result<(), ActionError> {
        let ActionContext::SaveUserConfig {
            config,
            config_address,
        } = context
        else {
            return Err(mismatched("UserConfigHandler", context));
        };

        if config.user_address.as_str().is_empty() {
            return Err(ActionError::Validation(
                "user config without an owner".to_string(),
            ));
        }

        self.deps.storage.save_user_config(config.clone())?;

        let payload = WirePayload::UserConfig {
            config: config.clone(),
        };
        self.deps
            .deliver(
                &ConversationId::direct(&config.user_address),
                std::slice::from_ref(config_address),
                &payload,
            )
            .await
    }

    fn is_permanent_error(&self, error: &ActionError) -> bool {
        error.is_rejection()
    }

    fn failure_message(&self) -> Option<&'static str> {
        Some("Failed to save settings")
    }
}

/// Publishes new space settings; gated on the space still existing
pub struct SpaceUpdateHandler<S> {
    deps: HandlerDeps<S>,
}

impl<S> SpaceUpdateHandler<S>
where
    S: QuorumStorageProvider,
{
    /// New handler
    pub fn new(deps: HandlerDeps<S>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl<S> ActionHandler for SpaceUpdateHandler<S>
where
    S: QuorumStorageProvider + 'static,
{
    async fn execute(&self, context: &ActionContext) -> Result<(), ActionError> {
        let ActionContext::UpdateSpace { space } = context else {
            return Err(mismatched("SpaceUpdateHandler", context));
        };

        let Some(existing) = self.deps.storage.find_space(&space.space_id)? else {
            tracing::debug!(space_id = %space.space_id, "Space no longer exists, dropping update");
            return Ok(());
        };

        let Some(hub_address) = space.hub_address.clone().or(existing.hub_address) else {
            return Err(ActionError::Validation(format!(
                "space {} has no hub address",
                space.space_id
            )));
        };

        let payload = WirePayload::SpaceManifest {
            space: space.clone(),
        };
        self.deps
            .deliver(
                &ConversationId::for_space(&space.space_id),
                &[hub_address],
                &payload,
            )
            .await?;

        self.deps.storage.save_space(space.clone())?;
        Ok(())
    }

    fn is_permanent_error(&self, error: &ActionError) -> bool {
        error.is_rejection()
    }

    fn failure_message(&self) -> Option<&'static str> {
        Some("Failed to save space settings")
    }
}
