//! Action queue module
//!
//! The durable, ordered list of pending work. Records are ordered by `seq`, which is
//! assigned on insert and never changes, including when a pending record's payload is
//! superseded by a newer submission with the same dedupe key.

use crate::{ActionId, StorageError, Timestamp};

pub mod types;

use self::types::*;

/// Storage traits for the action queue module
pub trait ActionQueueStorage {
    /// Durably record an action.
    ///
    /// The dedupe check and the write happen atomically. If a record with the same
    /// dedupe key is `pending`, its context is replaced in place: id and `seq` are kept,
    /// `attempts` and `last_error` are cleared, and `next_attempt_at` becomes
    /// `new.enqueued_at`. Records that are `processing` or `failed` are never coalesced
    /// into; a fresh record is appended instead.
    fn enqueue_action(&self, new: NewAction) -> Result<EnqueueOutcome, StorageError>;

    /// Find an action by id
    fn find_action(&self, id: &ActionId) -> Result<Option<Action>, StorageError>;

    /// All `pending` and `processing` actions in `seq` order
    fn pending_actions(&self) -> Result<Vec<Action>, StorageError>;

    /// Actions with the given status in `seq` order, at most `limit`
    fn actions_by_status(
        &self,
        status: ActionStatus,
        limit: usize,
    ) -> Result<Vec<Action>, StorageError>;

    /// Persist retry bookkeeping of an existing action: status, attempts, timestamps and
    /// last error. Context, dedupe key and `seq` are left untouched.
    fn update_action(&self, action: &Action) -> Result<(), StorageError>;

    /// Delete an action. Returns whether a record was removed.
    fn delete_action(&self, id: &ActionId) -> Result<bool, StorageError>;

    /// Move every `processing` record back to `pending`. Used on open to recover
    /// actions that were in flight when the process stopped.
    fn reset_processing_actions(&self) -> Result<usize, StorageError>;

    /// Record counts by status
    fn queue_stats(&self) -> Result<QueueStats, StorageError>;

    /// Delete `failed` records whose `processed_at` is before `before`
    fn prune_failed_actions(&self, before: Timestamp) -> Result<usize, StorageError>;
}
