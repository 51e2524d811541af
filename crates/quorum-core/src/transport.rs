//! Transport collaborator
//!
//! The host supplies the network call that moves a sealed envelope to an inbox. The core
//! only looks at the optional status code of a failure, to recognize expired sessions
//! (401), refusals (403) and targets that are already gone (404/410).

use std::fmt::Debug;

use async_trait::async_trait;
use quorum_storage_traits::InboxAddress;

/// Transport failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// Status code, if the transport reports one
    pub status: Option<u16>,
    /// Raw failure description
    pub message: String,
}

impl TransportError {
    /// Failure without a status code
    pub fn new<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Failure with a status code
    pub fn with_status<S>(status: u16, message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Delivers sealed envelopes
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Send `envelope` to `destination`
    async fn send(&self, destination: &InboxAddress, envelope: &[u8]) -> Result<(), TransportError>;
}
