//! Handler Registry
//!
//! One handler per [`ActionType`]. Handlers are stateless across invocations; everything
//! they touch comes from the [`HandlerDeps`] injected at construction.
//!
//! Each `execute` follows one of two idempotency disciplines:
//! - existence-gated: re-fetch the target first and treat its absence as success
//! - naturally idempotent: removals and full replacements that are safe to apply twice

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use quorum_storage_traits::QuorumStorageProvider;
use quorum_storage_traits::queue::types::{ActionContext, ActionType};

use crate::encryption::EncryptionStateStore;
use crate::error::{ActionError, SanitizedError};
use crate::sealer::EnvelopeSealer;
use crate::status::StatusProjection;
use crate::transport::Transport;
use crate::wire::ModerationKind;

mod messages;
mod moderation;
mod outbound;
mod settings;
mod sync;

pub use self::messages::{
    DeleteHandler, EditHandler, PinHandler, ReactionHandler, SendMessageHandler,
};
pub use self::moderation::ModerationHandler;
pub use self::settings::{SpaceUpdateHandler, UserConfigHandler};
pub use self::sync::SyncHandler;

/// Executes one action type
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Perform the effect described by `context`. Must be safe to retry.
    async fn execute(&self, context: &ActionContext) -> Result<(), ActionError>;

    /// Whether `error` is terminal for this action type
    fn is_permanent_error(&self, error: &ActionError) -> bool;

    /// Runs once when the action is abandoned
    async fn on_failure(&self, _context: &ActionContext, _error: &SanitizedError) {}

    /// Notice shown once when the action is abandoned; `None` fails silently
    fn failure_message(&self) -> Option<&'static str> {
        None
    }
}

/// Collaborators shared by the built-in handlers
pub struct HandlerDeps<S> {
    pub(crate) storage: Arc<S>,
    pub(crate) encryption: EncryptionStateStore<S>,
    pub(crate) sealer: Arc<dyn EnvelopeSealer>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) status: StatusProjection,
}

impl<S> Clone for HandlerDeps<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            encryption: self.encryption.clone(),
            sealer: Arc::clone(&self.sealer),
            transport: Arc::clone(&self.transport),
            status: self.status.clone(),
        }
    }
}

impl<S> fmt::Debug for HandlerDeps<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDeps")
            .field("sealer", &self.sealer)
            .field("transport", &self.transport)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<S> HandlerDeps<S>
where
    S: QuorumStorageProvider,
{
    /// Dependencies with a fresh status projection
    pub fn new(
        storage: Arc<S>,
        sealer: Arc<dyn EnvelopeSealer>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let encryption = EncryptionStateStore::new(Arc::clone(&storage));
        Self {
            storage,
            encryption,
            sealer,
            transport,
            status: StatusProjection::new(),
        }
    }

    /// Use an existing status projection
    pub fn with_status_projection(mut self, status: StatusProjection) -> Self {
        self.status = status;
        self
    }

    /// The status projection send handlers write to
    pub fn status_projection(&self) -> &StatusProjection {
        &self.status
    }

    /// The encryption state façade used for sealing
    pub fn encryption(&self) -> &EncryptionStateStore<S> {
        &self.encryption
    }
}

/// Maps action types to handlers
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ActionType, Arc<dyn ActionHandler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

impl HandlerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handler for every action type
    pub fn with_defaults<S>(deps: HandlerDeps<S>) -> Self
    where
        S: QuorumStorageProvider + 'static,
    {
        let send: Arc<dyn ActionHandler> = Arc::new(SendMessageHandler::new(deps.clone()));
        let reaction: Arc<dyn ActionHandler> = Arc::new(ReactionHandler::new(deps.clone()));
        let edit: Arc<dyn ActionHandler> = Arc::new(EditHandler::new(deps.clone()));
        let delete: Arc<dyn ActionHandler> = Arc::new(DeleteHandler::new(deps.clone()));
        let sync: Arc<dyn ActionHandler> = Arc::new(SyncHandler::new(deps.clone()));

        Self::new()
            .with_handler(ActionType::SendChannelMessage, Arc::clone(&send))
            .with_handler(ActionType::SendDirectMessage, send)
            .with_handler(ActionType::Reaction, Arc::clone(&reaction))
            .with_handler(ActionType::ReactionDirect, reaction)
            .with_handler(ActionType::Pin, Arc::new(PinHandler::new(deps.clone(), true)))
            .with_handler(
                ActionType::Unpin,
                Arc::new(PinHandler::new(deps.clone(), false)),
            )
            .with_handler(ActionType::Edit, Arc::clone(&edit))
            .with_handler(ActionType::EditDirect, edit)
            .with_handler(ActionType::Delete, Arc::clone(&delete))
            .with_handler(ActionType::DeleteDirect, delete)
            .with_handler(
                ActionType::KickUser,
                Arc::new(ModerationHandler::new(deps.clone(), ModerationKind::Kick)),
            )
            .with_handler(
                ActionType::MuteUser,
                Arc::new(ModerationHandler::new(deps.clone(), ModerationKind::Mute)),
            )
            .with_handler(
                ActionType::UnmuteUser,
                Arc::new(ModerationHandler::new(deps.clone(), ModerationKind::Unmute)),
            )
            .with_handler(
                ActionType::SaveUserConfig,
                Arc::new(UserConfigHandler::new(deps.clone())),
            )
            .with_handler(
                ActionType::UpdateSpace,
                Arc::new(SpaceUpdateHandler::new(deps)),
            )
            .with_handler(ActionType::SyncRequest, Arc::clone(&sync))
            .with_handler(ActionType::SyncInfo, Arc::clone(&sync))
            .with_handler(ActionType::SyncInitiate, Arc::clone(&sync))
            .with_handler(ActionType::SyncDelta, Arc::clone(&sync))
            .with_handler(ActionType::SyncManifest, Arc::clone(&sync))
            .with_handler(ActionType::VerifyKicked, sync)
    }

    /// Register `handler`, returning the one it replaces
    pub fn register(
        &mut self,
        action_type: ActionType,
        handler: Arc<dyn ActionHandler>,
    ) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.insert(action_type, handler)
    }

    /// Builder-style [`HandlerRegistry::register`]
    pub fn with_handler(mut self, action_type: ActionType, handler: Arc<dyn ActionHandler>) -> Self {
        self.register(action_type, handler);
        self
    }

    /// Handler for `action_type`, or `None` if it was never registered
    pub fn get_handler(&self, action_type: ActionType) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&action_type).cloned()
    }

    /// Registered types, sorted
    pub fn registered_types(&self) -> Vec<ActionType> {
        let mut types: Vec<ActionType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Error for a context routed to the wrong handler
pub(crate) fn mismatched(handler: &str, context: &ActionContext) -> ActionError {
    ActionError::Defect(format!(
        "{handler} cannot execute {}",
        context.action_type()
    ))
}
