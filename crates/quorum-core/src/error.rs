//! Quorum core errors
//!
//! [`Error`] is returned by queue, sync and configuration operations. [`ActionError`] is
//! the raw outcome of a handler's `execute`; it never leaves the core unsanitized. Every
//! user- or handler-facing failure is reduced to a [`SanitizedError`] first.

use std::fmt;

use quorum_storage_traits::{ActionId, ConversationId, StorageError};

use crate::sealer::SealError;
use crate::transport::TransportError;

/// Quorum core error
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// Storage error
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The queue holds too many records to accept another one
    #[error("action queue is full ({0} records)")]
    QueueFull(usize),
    /// The queue was closed
    #[error("action queue is closed")]
    QueueClosed,
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
    /// No action with this id
    #[error("action not found: {0}")]
    ActionNotFound(ActionId),
}

/// Raw failure of a single handler execution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// Transport failed to deliver the envelope
    #[error("transport error (status {status:?}): {message}")]
    Transport {
        /// Status code reported by the transport, if any
        status: Option<u16>,
        /// Raw transport message
        message: String,
    },
    /// Sealing the envelope failed
    #[error("cipher error: {0}")]
    Cipher(String),
    /// Local storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// No session exists for the conversation
    #[error("no session for conversation {0}")]
    MissingSession(ConversationId),
    /// The action payload is invalid
    #[error("validation error: {0}")]
    Validation(String),
    /// The session expired
    #[error("unauthorized")]
    Unauthorized,
    /// The peer or hub refused the action
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The target no longer exists remotely
    #[error("not found: {0}")]
    NotFound(String),
    /// Programming error
    #[error("defect: {0}")]
    Defect(String),
}

impl ActionError {
    /// Taxonomy bucket of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport { .. } | Self::Storage(_) => FailureKind::Network,
            Self::Cipher(_) | Self::MissingSession(_) => FailureKind::Encryption,
            Self::Unauthorized | Self::Forbidden(_) | Self::NotFound(_) => FailureKind::Permission,
            Self::Validation(_) => FailureKind::Validation,
            Self::Defect(_) => FailureKind::UnknownDefect,
        }
    }

    /// Reduce to the user-safe form
    pub fn sanitize(&self) -> SanitizedError {
        SanitizedError::new(self.kind())
    }

    /// Whether this is a "target already gone" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the caller or the payload was refused. Retrying cannot change the outcome.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Permission | FailureKind::Validation
        )
    }
}

impl From<TransportError> for ActionError {
    fn from(err: TransportError) -> Self {
        match err.status {
            Some(401) => Self::Unauthorized,
            Some(403) => Self::Forbidden(err.message),
            Some(404) | Some(410) => Self::NotFound(err.message),
            status => Self::Transport {
                status,
                message: err.message,
            },
        }
    }
}

impl From<SealError> for ActionError {
    fn from(err: SealError) -> Self {
        match err {
            SealError::MissingSession(conversation_id) => Self::MissingSession(conversation_id),
            SealError::Failed(message) => Self::Cipher(message),
        }
    }
}

/// Error taxonomy surfaced outside the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Delivery or local I/O failed; retried
    Network,
    /// Session missing or sealing failed
    Encryption,
    /// Not authorized, or the space/channel/target is gone
    Permission,
    /// The payload was rejected
    Validation,
    /// Unregistered handler or programming error; always permanent
    UnknownDefect,
}

impl FailureKind {
    /// Get as `&str`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Encryption => "encryption",
            Self::Permission => "permission",
            Self::Validation => "validation",
            Self::UnknownDefect => "unknown-defect",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reduced to its kind and a fixed, user-safe message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizedError {
    kind: FailureKind,
}

impl SanitizedError {
    /// Sanitized error of the given kind
    pub fn new(kind: FailureKind) -> Self {
        Self { kind }
    }

    /// Taxonomy bucket
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// User-facing description
    pub fn message(&self) -> &'static str {
        match self.kind {
            FailureKind::Network => "network error",
            FailureKind::Encryption => "encryption error",
            FailureKind::Permission => "permission error",
            FailureKind::Validation => "validation error",
            FailureKind::UnknownDefect => "unexpected error",
        }
    }
}

impl fmt::Display for SanitizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
