//! Storage errors shared by every record family

use thiserror::Error;

use crate::ids::ActionId;

/// Failure of a storage call.
///
/// Backends flatten their native errors into [`StorageError::Database`]; the core treats
/// every variant as a local I/O problem and retries the action that hit it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backend rejected or failed the operation
    #[error("database error: {0}")]
    Database(String),

    /// A record could not be encoded for storage
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored record could not be decoded
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Bookkeeping update for an action that is no longer queued
    #[error("action not found: {0}")]
    ActionNotFound(ActionId),

    /// The caller passed a value the backend cannot store
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = StorageError::Database("database is locked".to_string());
        assert_eq!(err.to_string(), "database error: database is locked");

        let err = StorageError::Deserialization("unknown variant `post-v2`".to_string());
        assert_eq!(
            err.to_string(),
            "deserialization error: unknown variant `post-v2`"
        );

        let err = StorageError::InvalidParameters("empty tag".to_string());
        assert_eq!(err.to_string(), "invalid parameters: empty tag");
    }

    #[test]
    fn test_missing_action_names_the_id() {
        let id = ActionId::new();
        let err = StorageError::ActionNotFound(id);
        assert_eq!(err.to_string(), format!("action not found: {id}"));
    }
}
