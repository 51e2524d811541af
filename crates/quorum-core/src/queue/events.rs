//! Lifecycle notifications emitted by the action queue

use quorum_storage_traits::queue::types::ActionType;
use quorum_storage_traits::{ActionId, Timestamp};

use crate::error::FailureKind;

/// Something happened to a queued action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A new record was appended
    Enqueued {
        /// Action id
        id: ActionId,
        /// Action type
        action_type: ActionType,
    },
    /// A pending record took a newer payload with the same dedupe key
    Replaced {
        /// Action id
        id: ActionId,
        /// Action type
        action_type: ActionType,
    },
    /// The handler succeeded and the record was removed
    Completed {
        /// Action id
        id: ActionId,
        /// Action type
        action_type: ActionType,
    },
    /// A transient failure; the action runs again later
    Retrying {
        /// Action id
        id: ActionId,
        /// Action type
        action_type: ActionType,
        /// Failed executions so far
        attempts: u32,
        /// When the next execution may start
        next_attempt_at: Timestamp,
        /// Failure bucket
        kind: FailureKind,
    },
    /// The action will not run again
    Abandoned {
        /// Action id
        id: ActionId,
        /// Action type
        action_type: ActionType,
        /// Failure bucket
        kind: FailureKind,
        /// Whether a terminal `failed` record was kept
        retained: bool,
    },
    /// User-facing notice for an abandoned action. Emitted at most once per action.
    Notice {
        /// Action id
        id: ActionId,
        /// Action type
        action_type: ActionType,
        /// Fixed message of the action type
        message: &'static str,
    },
    /// The transport rejected our credentials; the user must sign in again
    SessionExpired {
        /// Action id
        id: ActionId,
        /// Action type
        action_type: ActionType,
    },
}

impl QueueEvent {
    /// Id of the action the event is about
    pub fn action_id(&self) -> &ActionId {
        match self {
            Self::Enqueued { id, .. }
            | Self::Replaced { id, .. }
            | Self::Completed { id, .. }
            | Self::Retrying { id, .. }
            | Self::Abandoned { id, .. }
            | Self::Notice { id, .. }
            | Self::SessionExpired { id, .. } => id,
        }
    }
}
